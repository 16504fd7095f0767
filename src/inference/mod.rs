pub mod adapter;
pub mod artifacts;
pub mod model;
pub mod scaler;

pub use adapter::InferenceAdapter;
pub use artifacts::{ArtifactPaths, ModelArtifacts, TargetNormalization};
pub use model::{Activation, DenseLayer, DenseNetwork, Regressor};
pub use scaler::StandardScaler;
