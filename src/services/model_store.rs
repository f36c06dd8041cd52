use crate::services::regression::{ForestParams, ModelError, RandomForest, Regressor, StandardScaler};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur when loading a persisted model artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid artifact format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Artifact contains an unfitted model")]
    Unfitted,

    #[error("Artifact model is inconsistent: {0}")]
    Inconsistent(ModelError),
}

/// Fitted price model: scaling transform followed by a random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceModel {
    pub scaler: StandardScaler,
    pub forest: RandomForest,
}

impl PriceModel {
    /// Fit a scaler and a forest on the same training set
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self, ModelError> {
        let scaler = StandardScaler::fit(x)?;
        let scaled = scaler.transform(x)?;

        let mut forest = RandomForest::new(params);
        forest.fit(&scaled, y)?;

        Ok(Self { scaler, forest })
    }

    /// Check the scaler and every tree against the forest's feature width
    pub fn validate(&self) -> Result<(), ModelError> {
        self.forest.validate()?;
        self.scaler.validate()?;
        if self.scaler.width() != self.forest.n_features() {
            return Err(ModelError::ScalerMismatch {
                scaler: self.scaler.width(),
                forest: self.forest.n_features(),
            });
        }
        Ok(())
    }

    /// Predict a single row of raw (unscaled) features
    pub fn predict_one(&self, row: &[f64]) -> Result<f64, ModelError> {
        let scaled = self.scaler.transform_row(row)?;
        self.forest
            .predict(&[scaled])?
            .pop()
            .ok_or(ModelError::NotFitted)
    }
}

/// Shared handle to the pricing model
///
/// Either preloaded from an artifact or fitted on first use. The fit lock
/// guarantees concurrent first callers fit exactly once; readers only take
/// the read lock and clone the `Arc`.
#[derive(Debug, Default)]
pub struct ModelHandle {
    model: RwLock<Option<Arc<PriceModel>>>,
    fit_lock: Mutex<()>,
}

impl ModelHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn preloaded(model: PriceModel) -> Self {
        Self {
            model: RwLock::new(Some(Arc::new(model))),
            fit_lock: Mutex::new(()),
        }
    }

    /// Load a serialized `PriceModel` from a JSON artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let model: PriceModel = serde_json::from_reader(reader)?;
        if !model.forest.is_fitted() {
            return Err(ArtifactError::Unfitted);
        }
        model.validate().map_err(ArtifactError::Inconsistent)?;
        Ok(Self::preloaded(model))
    }

    /// Load the artifact if one is configured, otherwise train lazily
    ///
    /// A missing or unreadable artifact is not fatal.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("No model artifact configured, the price model will be fitted on first use");
            return Self::empty();
        };

        match Self::load(path) {
            Ok(handle) => {
                tracing::info!("Loaded price model artifact from {}", path.display());
                handle
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load model artifact {} ({}), falling back to on-the-fly training",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn get(&self) -> Option<Arc<PriceModel>> {
        self.model.read().clone()
    }

    /// Return the current model, fitting it with `fit` if there is none yet
    pub fn get_or_fit<F>(&self, fit: F) -> Result<Arc<PriceModel>, ModelError>
    where
        F: FnOnce() -> Result<PriceModel, ModelError>,
    {
        if let Some(model) = self.get() {
            return Ok(model);
        }

        let _guard = self.fit_lock.lock();
        // Another caller may have fitted while we waited
        if let Some(model) = self.get() {
            return Ok(model);
        }

        let model = Arc::new(fit()?);
        *self.model.write() = Some(Arc::clone(&model));
        tracing::info!("Fitted price model with {} trees", model.forest.n_trees());
        Ok(model)
    }

    /// Swap in a new model atomically
    pub fn replace(&self, model: PriceModel) {
        *self.model.write() = Some(Arc::new(model));
    }

    /// Drop the current model so the next call refits
    pub fn clear(&self) {
        *self.model.write() = None;
    }
}
