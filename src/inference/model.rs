use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// A fitted regression model over standardized feature vectors
pub trait Regressor: Send + Sync {
    fn input_width(&self) -> usize;

    /// Normalized prediction for one standardized row
    fn predict(&self, input: &[f64]) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    #[default]
    Linear,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// Fully connected layer. `weights` is laid out `[inputs][units]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn inputs(&self) -> usize {
        self.weights.len()
    }

    pub fn units(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out = self.bias.clone();
        for (x, row) in input.iter().zip(&self.weights) {
            for (acc, w) in out.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        out.into_iter().map(|v| self.activation.apply(v)).collect()
    }
}

/// Feed-forward network exported from the trained regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Check layer shapes chain from `input_width` down to a single output
    pub fn validate(&self, input_width: usize) -> Result<()> {
        let invalid = |message: String| PipelineError::invalid_artifact("model", message);

        if self.layers.is_empty() {
            return Err(invalid("network has no layers".to_string()));
        }

        let mut expected_inputs = input_width;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.inputs() != expected_inputs {
                return Err(invalid(format!(
                    "layer {} takes {} inputs, expected {}",
                    i,
                    layer.inputs(),
                    expected_inputs
                )));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != layer.units()) {
                return Err(invalid(format!(
                    "layer {} has a weight row of width {} but {} biases",
                    i,
                    row.len(),
                    layer.units()
                )));
            }
            expected_inputs = layer.units();
        }

        if expected_inputs != 1 {
            return Err(invalid(format!(
                "final layer emits {} units, expected 1",
                expected_inputs
            )));
        }
        Ok(())
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(input.to_vec(), |activations, layer| layer.forward(&activations))
    }
}

impl Regressor for DenseNetwork {
    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    fn predict(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.input_width() {
            return Err(PipelineError::FeatureMismatch(format!(
                "model expects {} inputs, got {}",
                self.input_width(),
                input.len()
            )));
        }
        self.forward(input)
            .first()
            .copied()
            .ok_or_else(|| PipelineError::invalid_artifact("model", "network produced no output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer() -> DenseNetwork {
        DenseNetwork {
            layers: vec![
                DenseLayer {
                    weights: vec![vec![1.0, -1.0], vec![1.0, 1.0]],
                    bias: vec![0.0, 0.0],
                    activation: Activation::Relu,
                },
                DenseLayer {
                    weights: vec![vec![2.0], vec![3.0]],
                    bias: vec![0.5],
                    activation: Activation::Linear,
                },
            ],
        }
    }

    #[test]
    fn test_forward_pass() {
        let network = two_layer();
        assert!(network.validate(2).is_ok());
        // hidden = relu([1+2, -1+2]) = [3, 1]; out = 6 + 3 + 0.5
        assert_eq!(network.predict(&[1.0, 2.0]).unwrap(), 9.5);
        // hidden = relu([-3, 1]) = [0, 1]
        assert_eq!(network.predict(&[-2.0, -1.0]).unwrap(), 3.5);
    }

    #[test]
    fn test_activation_parsing() {
        let layer: DenseLayer =
            serde_json::from_str(r#"{"weights": [[1.0]], "bias": [0.0], "activation": "sigmoid"}"#)
                .unwrap();
        assert_eq!(layer.activation, Activation::Sigmoid);
        assert_eq!(layer.activation.apply(0.0), 0.5);

        let layer: DenseLayer = serde_json::from_str(r#"{"weights": [[1.0]], "bias": [0.0]}"#).unwrap();
        assert_eq!(layer.activation, Activation::Linear);
    }

    #[test]
    fn test_shape_validation() {
        let network = two_layer();
        assert!(network.validate(3).is_err());

        let mut wide_output = two_layer();
        wide_output.layers[1].weights = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        wide_output.layers[1].bias = vec![0.0, 0.0];
        let err = wide_output.validate(2).unwrap_err();
        assert!(err.to_string().contains("expected 1"));

        let mut ragged = two_layer();
        ragged.layers[0].weights[1] = vec![1.0];
        assert!(ragged.validate(2).is_err());
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        assert!(matches!(
            two_layer().predict(&[1.0]),
            Err(PipelineError::FeatureMismatch(_))
        ));
    }
}
