use crate::error::{PipelineError, Result};
use crate::inference::artifacts::{ArtifactPaths, ModelArtifacts, TargetNormalization};
use crate::inference::model::Regressor;
use crate::inference::scaler::StandardScaler;
use crate::models::{FeatureRecord, FeatureTable, FEATURE_COLUMNS, FEATURE_COUNT};
use std::sync::Arc;
use tracing::debug;

/// Scales feature rows, runs the regressor and denormalizes the output.
///
/// Cloning is cheap: the model is shared behind an `Arc`.
#[derive(Clone)]
pub struct InferenceAdapter {
    scaler: StandardScaler,
    model: Arc<dyn Regressor>,
    target: TargetNormalization,
}

impl InferenceAdapter {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        let (scaler, network, target) = artifacts.into_parts();
        Self {
            scaler,
            model: Arc::new(network),
            target,
        }
    }

    /// Build an adapter around any regressor taking the full feature vector
    pub fn with_regressor(
        scaler: StandardScaler,
        model: Arc<dyn Regressor>,
        target: TargetNormalization,
    ) -> Result<Self> {
        scaler.validate()?;
        if model.input_width() != FEATURE_COUNT {
            return Err(PipelineError::invalid_artifact(
                "model",
                format!(
                    "regressor takes {} inputs, expected {}",
                    model.input_width(),
                    FEATURE_COUNT
                ),
            ));
        }
        Ok(Self {
            scaler,
            model,
            target,
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        ModelArtifacts::load(paths).map(Self::new)
    }

    pub fn predict_record(&self, record: &FeatureRecord) -> Result<f64> {
        self.predict_array(&record.to_array())
    }

    pub fn predict_features(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        let predictions = table
            .matrix()
            .iter()
            .map(|row| self.predict_array(row))
            .collect::<Result<Vec<_>>>()?;
        debug!(rows = predictions.len(), "Predicted feature table");
        Ok(predictions)
    }

    /// Predict from loosely typed rows. The header must equal the feature
    /// columns exactly; columns are never reordered to fit.
    pub fn predict_rows(&self, header: &[String], rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_header(header)?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let values: [f64; FEATURE_COUNT] = row.as_slice().try_into().map_err(|_| {
                    PipelineError::FeatureMismatch(format!(
                        "row {} has {} values, expected {}",
                        i,
                        row.len(),
                        FEATURE_COUNT
                    ))
                })?;
                self.predict_array(&values)
            })
            .collect()
    }

    fn predict_array(&self, values: &[f64; FEATURE_COUNT]) -> Result<f64> {
        let scaled = self.scaler.transform(values)?;
        let normalized = self.model.predict(&scaled)?;
        Ok(self.target.denormalize(normalized))
    }
}

fn check_header(header: &[String]) -> Result<()> {
    if header.len() != FEATURE_COUNT {
        return Err(PipelineError::FeatureMismatch(format!(
            "expected {} columns, got {}: {:?}",
            FEATURE_COUNT,
            header.len(),
            header
        )));
    }
    if let Some((position, (got, expected))) = header
        .iter()
        .zip(FEATURE_COLUMNS)
        .enumerate()
        .find(|(_, (got, expected))| got.as_str() != *expected)
    {
        return Err(PipelineError::FeatureMismatch(format!(
            "column {} is '{}', expected '{}'",
            position, got, expected
        )));
    }
    Ok(())
}
