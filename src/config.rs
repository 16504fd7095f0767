//! Layered pipeline configuration.
//!
//! Built-in defaults are overlaid by an optional TOML file and then by
//! `SOLAR__*` environment variables (`SOLAR__FEATURES__MAX_WORKERS=4`).
//! CLI flags are applied on top by the command layer.

use crate::error::{PipelineError, Result};
use crate::inference::ArtifactPaths;
use crate::processors::{FeatureEngineer, JoinEngine, LagStrategy, DEFAULT_REGION_VARIABLES};
use crate::readers::{BoundaryReader, DatasetReader, SourcePaths};
use crate::sources::{DataFetcher, PointFeatureBuilder, TableSource};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DATE_COLUMN, DEFAULT_BUFFER_RADIUS_M, DEFAULT_DATA_DELAY_DAYS, DEFAULT_ROW_GROUP_SIZE,
    DEFAULT_STATIC_BUFFER_M, GEOMETRY_COLUMN, REGION_ID_PROPERTY,
};
use crate::writers::ParquetWriter;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use validator::{Validate, ValidationError};

pub const ENV_PREFIX: &str = "SOLAR";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: SourcesConfig,
    pub reader: ReaderConfig,
    pub join: JoinConfig,
    #[validate(nested)]
    pub features: FeaturesConfig,
    pub artifacts: ArtifactsConfig,
    #[validate(nested)]
    pub climate: ClimateConfig,
    #[validate(nested)]
    pub output: OutputConfig,
    pub regions: RegionsConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub source_a: Option<PathBuf>,
    pub source_b: Option<PathBuf>,
    pub source_c: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub geometry_column: String,
    pub date_column: String,
    pub use_mmap: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            geometry_column: GEOMETRY_COLUMN.to_string(),
            date_column: DATE_COLUMN.to_string(),
            use_mmap: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub drop_suffixed_duplicates: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            drop_suffixed_duplicates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FeaturesConfig {
    pub lag_strategy: LagStrategy,
    pub drop_incomplete: bool,
    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            lag_strategy: LagStrategy::default(),
            drop_incomplete: false,
            max_workers: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub target: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        let dir = PathBuf::from("artifacts");
        Self {
            scaler: dir.join("scaler.json"),
            model: dir.join("model.json"),
            target: dir.join("target.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClimateConfig {
    #[validate(range(min = 1.0, max = 500_000.0))]
    pub buffer_radius_m: f64,
    #[validate(range(min = 1.0, max = 10_000.0))]
    pub static_buffer_m: f64,
    #[validate(range(max = 3650))]
    pub data_delay_days: u64,
    /// Band tables backing the offline climate source
    pub band_tables: Vec<BandTable>,
}

/// One exported band table and the dataset id it answers for. A list rather
/// than a map because configuration keys are case-folded and dataset ids are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
    pub dataset: String,
    pub path: PathBuf,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            buffer_radius_m: DEFAULT_BUFFER_RADIUS_M,
            static_buffer_m: DEFAULT_STATIC_BUFFER_M,
            data_delay_days: DEFAULT_DATA_DELAY_DAYS,
            band_tables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    #[validate(custom(function = "validate_compression"))]
    pub compression: String,
    #[validate(range(min = 1))]
    pub row_group_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: COMPRESSION_SNAPPY.to_string(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionsConfig {
    pub boundaries: Option<PathBuf>,
    /// Feature property holding the region id
    pub id_property: String,
    pub variables: Vec<String>,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            boundaries: None,
            id_property: REGION_ID_PROPERTY.to_string(),
            variables: DEFAULT_REGION_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

fn validate_compression(compression: &str) -> std::result::Result<(), ValidationError> {
    match compression.to_lowercase().as_str() {
        COMPRESSION_SNAPPY | COMPRESSION_GZIP | COMPRESSION_LZ4 | COMPRESSION_ZSTD
        | COMPRESSION_NONE => Ok(()),
        _ => Err(ValidationError::new("unsupported_compression")),
    }
}

impl PipelineConfig {
    /// Defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!(
            lag_strategy = ?config.features.lag_strategy,
            max_workers = config.features.max_workers,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults, without the environment
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn source_paths(&self) -> Result<SourcePaths> {
        let require = |path: &Option<PathBuf>, name: &str| {
            path.clone().ok_or_else(|| {
                PipelineError::Config(format!("sources.{} is not set", name))
            })
        };
        Ok(SourcePaths::new(
            require(&self.sources.source_a, "source_a")?,
            require(&self.sources.source_b, "source_b")?,
            require(&self.sources.source_c, "source_c")?,
        ))
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            scaler: self.artifacts.scaler.clone(),
            model: self.artifacts.model.clone(),
            target: self.artifacts.target.clone(),
        }
    }

    pub fn dataset_reader(&self) -> DatasetReader {
        DatasetReader::new()
            .with_geometry_column(self.reader.geometry_column.clone())
            .with_date_column(self.reader.date_column.clone())
            .with_mmap(self.reader.use_mmap)
    }

    pub fn join_engine(&self) -> JoinEngine {
        JoinEngine::with_drop_suffixed_duplicates(self.join.drop_suffixed_duplicates)
    }

    pub fn feature_engineer(&self) -> FeatureEngineer {
        FeatureEngineer::new()
            .with_lag_strategy(self.features.lag_strategy)
            .with_drop_incomplete(self.features.drop_incomplete)
            .with_max_workers(self.features.max_workers)
    }

    pub fn parquet_writer(&self) -> Result<ParquetWriter> {
        Ok(ParquetWriter::new()
            .with_compression(&self.output.compression)?
            .with_row_group_size(self.output.row_group_size))
    }

    /// Offline climate source over the configured band tables
    pub fn climate_source(&self) -> Result<TableSource> {
        if self.climate.band_tables.is_empty() {
            return Err(PipelineError::Config(
                "climate.band_tables is empty; no climate data to query".to_string(),
            ));
        }
        let reader = self.dataset_reader();
        self.climate
            .band_tables
            .iter()
            .try_fold(TableSource::new(), |source, table| {
                source.load_dataset(table.dataset.as_str(), &table.path, &reader)
            })
    }

    pub fn boundary_reader(&self) -> BoundaryReader {
        BoundaryReader::with_id_property(self.regions.id_property.clone())
    }

    pub fn data_fetcher(&self) -> Result<DataFetcher> {
        Ok(DataFetcher::new(Arc::new(self.climate_source()?))
            .with_buffer_radius(self.climate.buffer_radius_m)
            .with_static_buffer(self.climate.static_buffer_m))
    }

    pub fn point_feature_builder(&self) -> Result<PointFeatureBuilder> {
        Ok(PointFeatureBuilder::new(self.data_fetcher()?)
            .with_data_delay_days(self.climate.data_delay_days))
    }
}
