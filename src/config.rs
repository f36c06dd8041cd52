use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use crate::core::{PricingConfig, DEFAULT_TOP_K};
use crate::models::ScoringWeights;
use crate::services::ForestParams;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            weights: WeightsConfig::default(),
        }
    }
}

fn default_top_k() -> usize { DEFAULT_TOP_K }
fn default_max_top_k() -> usize { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,
    #[serde(default = "default_equipment_weight")]
    pub equipment: f64,
    #[serde(default = "default_verified_weight")]
    pub verified: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            proximity: default_proximity_weight(),
            equipment: default_equipment_weight(),
            verified: default_verified_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            proximity: config.proximity,
            equipment: config.equipment,
            verified: config.verified,
        }
    }
}

fn default_proximity_weight() -> f64 { 0.6 }
fn default_equipment_weight() -> f64 { 0.3 }
fn default_verified_weight() -> f64 { 0.1 }

#[derive(Debug, Clone, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    #[serde(default = "default_price")]
    pub default_price: f64,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    #[serde(default = "default_bootstrap_iterations")]
    pub bootstrap_iterations: usize,
    #[serde(default = "default_forest_trees")]
    pub forest_trees: usize,
    #[serde(default = "default_bootstrap_trees")]
    pub bootstrap_trees: usize,
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_model_seed")]
    pub model_seed: u64,
    #[serde(default)]
    pub reuse_model: bool,
    pub random_seed: Option<u64>,
    pub model_path: Option<PathBuf>,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            min_history: default_min_history(),
            default_price: default_price(),
            jitter: default_jitter(),
            bootstrap_iterations: default_bootstrap_iterations(),
            forest_trees: default_forest_trees(),
            bootstrap_trees: default_bootstrap_trees(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            model_seed: default_model_seed(),
            reuse_model: false,
            random_seed: None,
            model_path: None,
        }
    }
}

impl PricingSettings {
    /// Engine configuration derived from these settings
    ///
    /// Rejects values the engine cannot sample from or branch on.
    pub fn engine_config(&self) -> Result<PricingConfig, ConfigError> {
        if !self.jitter.is_finite() || !(0.0..1.0).contains(&self.jitter) {
            return Err(ConfigError::Message(format!(
                "pricing.jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        if self.min_history < 1 {
            return Err(ConfigError::Message(
                "pricing.min_history must be at least 1".to_string(),
            ));
        }
        if !self.default_price.is_finite() {
            return Err(ConfigError::Message(format!(
                "pricing.default_price must be finite, got {}",
                self.default_price
            )));
        }

        Ok(PricingConfig {
            min_history: self.min_history,
            default_price: self.default_price,
            jitter: self.jitter,
            bootstrap_iterations: self.bootstrap_iterations,
            model: ForestParams {
                n_trees: self.forest_trees,
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                seed: self.model_seed,
            },
            bootstrap_trees: self.bootstrap_trees,
            reuse_model: self.reuse_model,
            random_seed: self.random_seed,
        })
    }
}

fn default_min_history() -> usize { 5 }
fn default_price() -> f64 { 1000.0 }
fn default_jitter() -> f64 { 0.1 }
fn default_bootstrap_iterations() -> usize { 10 }
fn default_forest_trees() -> usize { 100 }
fn default_bootstrap_trees() -> usize { 50 }
fn default_min_samples_split() -> usize { 2 }
fn default_model_seed() -> u64 { 42 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with FREIGHT_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., FREIGHT__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("FREIGHT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FREIGHT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply well-known unprefixed environment variables
///
/// `PRICE_MODEL_PATH` points at a persisted model artifact, as deployment
/// tooling sets it without the FREIGHT prefix.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    if let Ok(path) = std::env::var("PRICE_MODEL_PATH") {
        if !path.trim().is_empty() {
            builder = builder.set_override("pricing.model_path", path)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.proximity, 0.6);
        assert_eq!(weights.equipment, 0.3);
        assert_eq!(weights.verified, 0.1);
        assert_eq!(ScoringWeights::from(&weights), ScoringWeights::default());
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_default_pricing_matches_engine_defaults() {
        assert_eq!(PricingSettings::default().engine_config().unwrap(), PricingConfig::default());
    }

    #[test]
    fn test_engine_config_rejects_unusable_values() {
        let infinite_jitter = PricingSettings {
            jitter: f64::INFINITY,
            ..PricingSettings::default()
        };
        assert!(infinite_jitter.engine_config().is_err());

        let negative_jitter = PricingSettings {
            jitter: -0.1,
            ..PricingSettings::default()
        };
        assert!(negative_jitter.engine_config().is_err());

        let no_history = PricingSettings {
            min_history: 0,
            ..PricingSettings::default()
        };
        assert!(no_history.engine_config().is_err());

        let no_jitter = PricingSettings {
            jitter: 0.0,
            ..PricingSettings::default()
        };
        assert_eq!(no_jitter.engine_config().unwrap().jitter, 0.0);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("freight-settings-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[matching]
default_top_k = 3

[matching.weights]
proximity = 0.5
equipment = 0.4

[pricing]
bootstrap_iterations = 25
random_seed = 11
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.matching.default_top_k, 3);
        assert_eq!(settings.matching.weights.proximity, 0.5);
        assert_eq!(settings.matching.weights.verified, 0.1);

        let pricing = settings.pricing.engine_config().unwrap();
        assert_eq!(pricing.bootstrap_iterations, 25);
        assert_eq!(pricing.random_seed, Some(11));
        assert_eq!(pricing.model.n_trees, 100);
        assert!(settings.pricing.model_path.is_none());
    }
}
