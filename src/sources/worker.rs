//! Background prediction worker.
//!
//! One thread owns the point feature builder and the inference adapter.
//! Requests go in through one channel and results come back through
//! another, drained by the caller's own loop.

use crate::error::{PipelineError, Result};
use crate::inference::InferenceAdapter;
use crate::sources::point_features::{PointFeatureBuilder, PointFeatures};
use chrono::NaiveDate;
use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRequest {
    pub id: u64,
    pub lon: f64,
    pub lat: f64,
    pub date: Option<NaiveDate>,
}

/// Prediction for one point, with the features it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointPrediction {
    pub features: PointFeatures,
    pub prediction: f64,
}

#[derive(Debug)]
pub struct PredictionResult {
    pub id: u64,
    pub outcome: Result<PointPrediction>,
}

/// Fetch features for one point and run them through the model
pub fn predict_point(
    builder: &PointFeatureBuilder,
    adapter: &InferenceAdapter,
    lon: f64,
    lat: f64,
    date: Option<NaiveDate>,
) -> Result<PointPrediction> {
    let features = builder.build(lon, lat, date)?;
    let prediction = adapter.predict_record(&features.record)?;
    Ok(PointPrediction {
        features,
        prediction,
    })
}

pub struct PredictionWorker {
    requests: Option<Sender<PredictionRequest>>,
    results: Receiver<PredictionResult>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl PredictionWorker {
    pub fn spawn(builder: PointFeatureBuilder, adapter: InferenceAdapter) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<PredictionRequest>();
        let (result_tx, result_rx) = unbounded::<PredictionResult>();

        let handle = thread::Builder::new()
            .name("prediction-worker".to_string())
            .spawn(move || {
                for request in request_rx {
                    debug!(id = request.id, "Running prediction");
                    let outcome =
                        predict_point(&builder, &adapter, request.lon, request.lat, request.date);
                    if result_tx
                        .send(PredictionResult {
                            id: request.id,
                            outcome,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                debug!("Prediction worker stopped");
            })?;

        info!("Prediction worker started");
        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
            next_id: 0,
        })
    }

    /// Queue a point. Returns the id its result will carry.
    pub fn submit(&mut self, lon: f64, lat: f64, date: Option<NaiveDate>) -> Result<u64> {
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| PipelineError::Worker("worker is shut down".to_string()))?;
        let id = self.next_id;
        sender
            .send(PredictionRequest { id, lon, lat, date })
            .map_err(|_| PipelineError::Worker("worker thread has exited".to_string()))?;
        self.next_id += 1;
        Ok(id)
    }

    pub fn results(&self) -> &Receiver<PredictionResult> {
        &self.results
    }

    pub fn try_recv(&self) -> Option<PredictionResult> {
        self.results.try_recv().ok()
    }

    /// Block until the next result arrives
    pub fn recv(&self) -> Result<PredictionResult> {
        self.results
            .recv()
            .map_err(|_| PipelineError::Worker("worker thread has exited".to_string()))
    }

    /// Close the request queue and wait for queued requests to finish
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| PipelineError::Worker("worker thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for PredictionWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{
        Activation, DenseLayer, DenseNetwork, ModelArtifacts, StandardScaler,
        TargetNormalization,
    };
    use crate::models::FEATURE_COUNT;
    use crate::readers::DatasetReader;
    use crate::sources::source::DataFetcher;
    use crate::sources::table_source::TableSource;
    use crate::sources::variables::{ERA5_LAND_DAILY, SRTM};
    use std::sync::Arc;

    /// Prediction = 1000 * lag + 5
    fn adapter() -> InferenceAdapter {
        let mut weights = vec![vec![0.0]; FEATURE_COUNT];
        weights[13][0] = 1000.0;
        let network = DenseNetwork {
            layers: vec![DenseLayer {
                weights,
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        };
        let target = TargetNormalization {
            y_mean: 5.0,
            y_std: 1.0,
        };
        InferenceAdapter::new(
            ModelArtifacts::new(StandardScaler::identity(), network, target).unwrap(),
        )
    }

    fn builder(with_elevation: bool) -> PointFeatureBuilder {
        let reader = DatasetReader::new();
        let daily = "lon,lat,date,temperature_2m,dewpoint_temperature_2m,surface_pressure,\
            total_precipitation_sum,surface_net_solar_radiation_sum,\
            u_component_of_wind_10m,v_component_of_wind_10m\n\
            -79.5,8.98,2025-01-14,299.15,295.15,100000,0.5,2,1,1\n\
            -79.5,8.98,2025-01-15,300.15,296.15,101000,0.0,3,3,4\n";
        let mut source = TableSource::new()
            .with_dataset(ERA5_LAND_DAILY, reader.read_from_str(daily, "daily").unwrap().table);
        if with_elevation {
            let srtm = "lon,lat,date,elevation\n-79.5,8.98,2000-02-11,42\n";
            source = source.with_dataset(SRTM, reader.read_from_str(srtm, "srtm").unwrap().table);
        }
        PointFeatureBuilder::new(DataFetcher::new(Arc::new(source)))
    }

    fn date() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 1, 15)
    }

    #[test]
    fn test_results_arrive_through_channel() {
        let mut worker = PredictionWorker::spawn(builder(true), adapter()).unwrap();
        let first = worker.submit(-79.5, 8.98, date()).unwrap();
        let second = worker.submit(-79.5, 8.98, date()).unwrap();
        assert_ne!(first, second);

        let result = worker.recv().unwrap();
        assert_eq!(result.id, first);
        let prediction = result.outcome.unwrap();
        assert_eq!(prediction.prediction, 2005.0);
        assert_eq!(prediction.features.record.elevation, 42.0);
        assert_eq!(prediction.features.record.surface_pressure, 101_000.0);
        assert_eq!(prediction.features.observed_radiation, 3.0);

        assert_eq!(worker.recv().unwrap().id, second);
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_errors_are_posted_not_raised() {
        let mut worker = PredictionWorker::spawn(builder(false), adapter()).unwrap();
        worker.submit(-79.5, 8.98, date()).unwrap();

        let result = worker.recv().unwrap();
        assert!(matches!(result.outcome, Err(PipelineError::NoMatch { .. })));
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let mut worker = PredictionWorker::spawn(builder(true), adapter()).unwrap();
        for _ in 0..3 {
            worker.submit(-79.5, 8.98, date()).unwrap();
        }
        let results = worker.results().clone();
        worker.shutdown().unwrap();

        assert_eq!(results.iter().count(), 3);
    }
}
