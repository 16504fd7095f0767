use crate::error::{PipelineError, Result};
use crate::models::{FEATURE_COLUMNS, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Column-wise standardization fitted at training time: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Identity transform over the feature contract
    pub fn identity() -> Self {
        Self {
            feature_names: Some(FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()),
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(names) = &self.feature_names {
            if names.len() != FEATURE_COUNT
                || names.iter().zip(FEATURE_COLUMNS).any(|(a, b)| a != b)
            {
                return Err(PipelineError::invalid_artifact(
                    "scaler",
                    format!(
                        "feature names {:?} do not match the expected columns {:?}",
                        names, FEATURE_COLUMNS
                    ),
                ));
            }
        }
        self.check_lengths()
    }

    fn check_lengths(&self) -> Result<()> {
        for (field, values) in [("mean", &self.mean), ("scale", &self.scale)] {
            if values.len() != FEATURE_COUNT {
                return Err(PipelineError::invalid_artifact(
                    "scaler",
                    format!("{} has {} entries, expected {}", field, values.len(), FEATURE_COUNT),
                ));
            }
        }
        Ok(())
    }

    /// Standardize one row. A zero scale leaves the centered value unscaled.
    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> Result<[f64; FEATURE_COUNT]> {
        self.check_lengths()?;
        let mut out = [0.0; FEATURE_COUNT];
        for (((out, value), mean), scale) in out
            .iter_mut()
            .zip(row)
            .zip(&self.mean)
            .zip(&self.scale)
        {
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            *out = (value - mean) / scale;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_with_zero_scale() {
        let mut scaler = StandardScaler::identity();
        scaler.mean[0] = 2.0;
        scaler.scale[0] = 4.0;
        scaler.mean[1] = 1.0;
        scaler.scale[1] = 0.0;

        let mut row = [0.0; FEATURE_COUNT];
        row[0] = 10.0;
        row[1] = 3.0;
        let out = scaler.transform(&row).unwrap();

        assert_eq!(out[0], 2.0);
        assert_eq!(out[1], 2.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn test_validate_rejects_wrong_names_and_widths() {
        let mut scaler = StandardScaler::identity();
        assert!(scaler.validate().is_ok());

        if let Some(names) = scaler.feature_names.as_mut() {
            names.swap(0, 1);
        }
        assert!(scaler.validate().is_err());

        let scaler = StandardScaler {
            feature_names: None,
            mean: vec![0.0; 15],
            scale: vec![1.0; FEATURE_COUNT],
        };
        let err = scaler.validate().unwrap_err();
        assert!(err.to_string().contains("mean has 15 entries"));
    }
}
