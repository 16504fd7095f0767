pub mod coverage;
pub mod point_features;
pub mod source;
pub mod table_source;
pub mod variables;
pub mod worker;

pub use coverage::{CoveragePoint, CoverageRange, CoverageReport, CoverageScanner};
pub use point_features::{PointFeatureBuilder, PointFeatures};
pub use source::{BandSample, ClimateQuery, ClimateSource, DataFetcher, Reducer};
pub use table_source::TableSource;
pub use variables::{ClimateVariable, VariableKind};
pub use worker::{predict_point, PointPrediction, PredictionRequest, PredictionResult, PredictionWorker};
