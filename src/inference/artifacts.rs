use crate::error::{PipelineError, Result};
use crate::inference::model::DenseNetwork;
use crate::inference::scaler::StandardScaler;
use crate::models::FEATURE_COUNT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Target standardization to undo after prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetNormalization {
    pub y_mean: f64,
    pub y_std: f64,
}

impl TargetNormalization {
    pub fn denormalize(&self, prediction: f64) -> f64 {
        prediction * self.y_std + self.y_mean
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub target: PathBuf,
}

/// Scaler, network and target normalization, validated together.
/// Only constructible through [`ModelArtifacts::new`] or [`ModelArtifacts::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    scaler: StandardScaler,
    network: DenseNetwork,
    target: TargetNormalization,
}

impl ModelArtifacts {
    pub fn new(
        scaler: StandardScaler,
        network: DenseNetwork,
        target: TargetNormalization,
    ) -> Result<Self> {
        scaler.validate()?;
        network.validate(FEATURE_COUNT)?;
        if !target.y_std.is_finite() || !target.y_mean.is_finite() {
            return Err(PipelineError::invalid_artifact(
                "target",
                "y_mean and y_std must be finite",
            ));
        }
        Ok(Self {
            scaler,
            network,
            target,
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let scaler: StandardScaler = read_json(&paths.scaler, "scaler")?;
        let network: DenseNetwork = read_json(&paths.model, "model")?;
        let target: TargetNormalization = read_json(&paths.target, "target")?;

        info!(
            layers = network.layers.len(),
            y_mean = target.y_mean,
            y_std = target.y_std,
            "Loaded model artifacts"
        );
        Self::new(scaler, network, target)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn network(&self) -> &DenseNetwork {
        &self.network
    }

    pub fn target(&self) -> TargetNormalization {
        self.target
    }

    pub(crate) fn into_parts(self) -> (StandardScaler, DenseNetwork, TargetNormalization) {
        (self.scaler, self.network, self.target)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, artifact: &str) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        PipelineError::invalid_artifact(artifact, format!("{}: {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        PipelineError::invalid_artifact(artifact, format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::model::{Activation, DenseLayer};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_load_artifacts() -> Result<()> {
        let dir = TempDir::new()?;
        let network = DenseNetwork {
            layers: vec![DenseLayer {
                weights: vec![vec![0.5]; FEATURE_COUNT],
                bias: vec![1.0],
                activation: Activation::Linear,
            }],
        };
        let paths = ArtifactPaths {
            scaler: write(&dir, "scaler.json", serde_json::to_value(StandardScaler::identity())?),
            model: write(&dir, "model.json", serde_json::to_value(&network)?),
            target: write(&dir, "target.json", serde_json::json!({"y_mean": 100.0, "y_std": 10.0})),
        };

        let artifacts = ModelArtifacts::load(&paths)?;
        assert_eq!(artifacts.network(), &network);
        assert_eq!(artifacts.target().denormalize(0.5), 105.0);
        Ok(())
    }

    #[test]
    fn test_missing_file_names_the_artifact() {
        let paths = ArtifactPaths {
            scaler: PathBuf::from("/nonexistent/scaler.json"),
            model: PathBuf::from("/nonexistent/model.json"),
            target: PathBuf::from("/nonexistent/target.json"),
        };
        let err = ModelArtifacts::load(&paths).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArtifact { ref artifact, .. } if artifact == "scaler"));
    }

    #[test]
    fn test_network_input_width_must_match_features() {
        let network = DenseNetwork {
            layers: vec![DenseLayer {
                weights: vec![vec![1.0]; FEATURE_COUNT - 1],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        };
        let target = TargetNormalization {
            y_mean: 0.0,
            y_std: 1.0,
        };
        assert!(ModelArtifacts::new(StandardScaler::identity(), network, target).is_err());
    }
}
