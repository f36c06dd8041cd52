// Service exports: collaborators consumed by the pricing engine
pub mod model_store;
pub mod regression;

pub use model_store::{ArtifactError, ModelHandle, PriceModel};
pub use regression::{ForestParams, ModelError, RandomForest, Regressor, StandardScaler};
