use crate::core::features::{extract_pricing_features, observed_price};
use crate::models::{Confidence, FeatureError, Load, PriceRange, PriceSuggestion, PricingSource};
use crate::services::model_store::{ModelHandle, PriceModel};
use crate::services::regression::{ForestParams, ModelError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

/// 95% normal-approximation interval
const Z_95: f64 = 1.96;

/// Errors on the model path; always converted to the fallback suggestion
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("historical load {index}: {source}")]
    History { index: usize, source: FeatureError },

    #[error("query load: {0}")]
    Query(FeatureError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("prediction is not finite: {0}")]
    NonFinitePrediction(f64),
}

/// Tunables for the pricing engine
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Fewer historical loads than this use the heuristic
    pub min_history: usize,
    /// Base price when no history has a usable price
    pub default_price: f64,
    /// Heuristic jitter half-width, 0.1 draws from [0.9, 1.1]
    pub jitter: f64,
    /// Bootstrap resamples, never fewer than 10
    pub bootstrap_iterations: usize,
    pub model: ForestParams,
    pub bootstrap_trees: usize,
    /// Keep the first fitted model for every later call instead of fitting
    /// on each call's own history. Only suits a single-market deployment.
    pub reuse_model: bool,
    /// Seed for the engine's own generator, entropy when `None`
    pub random_seed: Option<u64>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_history: 5,
            default_price: 1000.0,
            jitter: 0.1,
            bootstrap_iterations: 10,
            model: ForestParams::default(),
            bootstrap_trees: 50,
            reuse_model: false,
            random_seed: None,
        }
    }
}

/// Dynamic pricing engine
///
/// Suggests a price for a load from historical transactions. With too little
/// history it falls back to a jittered mean; otherwise it fits a random
/// forest and estimates a confidence band by bootstrap resampling. It never
/// fails: any error on the model path yields `PriceSuggestion::fallback()`.
pub struct PricingEngine {
    config: PricingConfig,
    model: ModelHandle,
    rng: Mutex<StdRng>,
}

impl PricingEngine {
    pub fn new(config: PricingConfig, model: ModelHandle) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            model,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PricingConfig::default(), ModelHandle::empty())
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Suggest a price using the engine's own random source
    ///
    /// Only the per-call seed is drawn under the lock.
    pub fn suggest_price(&self, load: &Load, historical: &[Load]) -> PriceSuggestion {
        let seed: u64 = self.rng.lock().gen();
        let mut rng = StdRng::seed_from_u64(seed);
        self.suggest_price_with_rng(load, historical, &mut rng)
    }

    /// Suggest a price drawing jitter and bootstrap seeds from `rng`
    pub fn suggest_price_with_rng<R: Rng>(
        &self,
        load: &Load,
        historical: &[Load],
        rng: &mut R,
    ) -> PriceSuggestion {
        if historical.len() < self.config.min_history {
            let suggestion = self.heuristic_suggestion(historical, rng);
            tracing::debug!(
                "Heuristic price {:.2} for load {} ({} historical loads)",
                suggestion.suggested_price,
                load.label(),
                historical.len()
            );
            return suggestion;
        }

        match self.model_suggestion(load, historical, rng) {
            Ok(suggestion) => {
                tracing::debug!(
                    "Model price {:.2} ({:?}) for load {}",
                    suggestion.suggested_price,
                    suggestion.confidence,
                    load.label()
                );
                suggestion
            }
            Err(e) => {
                tracing::warn!("Pricing model failed for load {}: {}, using fallback", load.label(), e);
                PriceSuggestion::fallback()
            }
        }
    }

    fn heuristic_suggestion<R: Rng>(&self, historical: &[Load], rng: &mut R) -> PriceSuggestion {
        let prices: Vec<f64> = historical
            .iter()
            .filter_map(|load| observed_price(load).ok())
            .collect();

        let base_price = if prices.is_empty() {
            self.config.default_price
        } else {
            prices.iter().sum::<f64>() / prices.len() as f64
        };

        let jitter = self.config.jitter.abs();
        let adjustment = if jitter.is_finite() && jitter > 0.0 {
            rng.gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };

        PriceSuggestion {
            suggested_price: base_price * adjustment,
            price_range: None,
            confidence: Confidence::Low,
            source: PricingSource::Heuristic,
        }
    }

    fn model_suggestion<R: Rng>(
        &self,
        load: &Load,
        historical: &[Load],
        rng: &mut R,
    ) -> Result<PriceSuggestion, PricingError> {
        let (x, y) = training_set(historical)?;
        let query = extract_pricing_features(load)
            .map_err(PricingError::Query)?
            .to_vec();

        // A preloaded artifact always wins; otherwise fit on this call's history
        let fit = || PriceModel::fit(&x, &y, self.config.model);
        let model = if self.config.reuse_model {
            self.model.get_or_fit(fit)?
        } else {
            match self.model.get() {
                Some(model) => model,
                None => std::sync::Arc::new(fit()?),
            }
        };

        let predicted_price = model.predict_one(&query)?;
        if !predicted_price.is_finite() {
            return Err(PricingError::NonFinitePrediction(predicted_price));
        }

        let price_std = self.bootstrap_std(&x, &y, &query, rng)?;
        let confidence = if price_std < predicted_price * 0.1 {
            Confidence::High
        } else {
            Confidence::Medium
        };

        Ok(PriceSuggestion {
            suggested_price: round_cents(predicted_price),
            price_range: Some(PriceRange {
                min: round_cents(predicted_price - Z_95 * price_std),
                max: round_cents(predicted_price + Z_95 * price_std),
            }),
            confidence,
            source: PricingSource::Model,
        })
    }

    /// Standard deviation of query predictions across bootstrap refits
    ///
    /// Every resample gets a fresh model and its own seeded generator, so the
    /// fits run in parallel and the result only depends on `rng`.
    fn bootstrap_std<R: Rng>(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        query: &[f64],
        rng: &mut R,
    ) -> Result<f64, PricingError> {
        let iterations = self.config.bootstrap_iterations.max(10);
        let seeds: Vec<u64> = (0..iterations).map(|_| rng.gen()).collect();
        let params = ForestParams {
            n_trees: self.config.bootstrap_trees.max(1),
            ..self.config.model
        };

        let predictions = seeds
            .par_iter()
            .map(|&seed| {
                let mut resample_rng = StdRng::seed_from_u64(seed);
                let n = x.len();
                let (sample_x, sample_y): (Vec<Vec<f64>>, Vec<f64>) = (0..n)
                    .map(|_| {
                        let i = resample_rng.gen_range(0..n);
                        (x[i].clone(), y[i])
                    })
                    .unzip();

                let model = PriceModel::fit(&sample_x, &sample_y, ForestParams { seed, ..params })?;
                model.predict_one(query)
            })
            .collect::<Result<Vec<f64>, ModelError>>()?;

        let std = population_std(&predictions);
        if std.is_finite() {
            Ok(std)
        } else {
            Err(PricingError::NonFinitePrediction(std))
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Feature matrix and observed prices; any malformed entry fails the set
fn training_set(historical: &[Load]) -> Result<(Vec<Vec<f64>>, Vec<f64>), PricingError> {
    historical
        .iter()
        .enumerate()
        .map(|(index, load)| {
            let features = extract_pricing_features(load)
                .map_err(|source| PricingError::History { index, source })?;
            let price = observed_price(load).map_err(|source| PricingError::History { index, source })?;
            Ok((features.to_vec(), price))
        })
        .collect::<Result<Vec<(Vec<f64>, f64)>, PricingError>>()
        .map(|rows| rows.into_iter().unzip())
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
