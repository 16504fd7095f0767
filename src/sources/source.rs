use crate::error::{PipelineError, Result};
use crate::sources::variables::{ClimateVariable, VariableKind};
use crate::utils::constants::{DEFAULT_BUFFER_RADIUS_M, DEFAULT_STATIC_BUFFER_M};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Band values of one image, already reduced over the query buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSample {
    values: BTreeMap<String, f64>,
}

impl BandSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, band: &str, value: f64) -> Self {
        self.insert(band, value);
        self
    }

    pub fn insert(&mut self, band: &str, value: f64) {
        self.values.insert(band.to_string(), value);
    }

    pub fn get(&self, band: &str) -> Option<f64> {
        self.values.get(band).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Per-band mean across samples, skipping samples that lack the band
    pub fn mean(samples: &[BandSample]) -> BandSample {
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for sample in samples {
            for (band, value) in &sample.values {
                let entry = sums.entry(band.as_str()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .fold(BandSample::new(), |acc, (band, (sum, count))| {
                acc.with(band, sum / count as f64)
            })
    }
}

/// How pixels inside the buffer are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    First,
}

/// A point query. `range` is `[start, end)`; static images have no range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateQuery {
    pub lon: f64,
    pub lat: f64,
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub buffer_m: f64,
    pub reducer: Reducer,
}

/// Provider of raster band values. Each returned sample is one image
/// matching the query, reduced over the buffer.
pub trait ClimateSource: Send + Sync {
    fn query(&self, dataset: &str, bands: &[&str], query: &ClimateQuery)
        -> Result<Vec<BandSample>>;
}

/// Fetches derived variable values for one point and day
#[derive(Clone)]
pub struct DataFetcher {
    source: Arc<dyn ClimateSource>,
    buffer_radius_m: f64,
    static_buffer_m: f64,
}

impl DataFetcher {
    pub fn new(source: Arc<dyn ClimateSource>) -> Self {
        Self {
            source,
            buffer_radius_m: DEFAULT_BUFFER_RADIUS_M,
            static_buffer_m: DEFAULT_STATIC_BUFFER_M,
        }
    }

    pub fn with_buffer_radius(mut self, buffer_radius_m: f64) -> Self {
        self.buffer_radius_m = buffer_radius_m;
        self
    }

    pub fn with_static_buffer(mut self, static_buffer_m: f64) -> Self {
        self.static_buffer_m = static_buffer_m;
        self
    }

    /// Query for `date` only, i.e. `[date, date + 1)`
    pub fn build_query(&self, variable: ClimateVariable, lon: f64, lat: f64, date: NaiveDate) -> ClimateQuery {
        match variable.kind() {
            VariableKind::Static => ClimateQuery {
                lon,
                lat,
                range: None,
                buffer_m: self.static_buffer_m,
                reducer: Reducer::First,
            },
            VariableKind::Hourly | VariableKind::Daily => ClimateQuery {
                lon,
                lat,
                range: Some((date, next_day(date))),
                buffer_m: self.buffer_radius_m,
                reducer: Reducer::Mean,
            },
        }
    }

    pub fn fetch_variable(
        &self,
        variable: ClimateVariable,
        lon: f64,
        lat: f64,
        date: NaiveDate,
    ) -> Result<f64> {
        let query = self.build_query(variable, lon, lat, date);
        let samples = self
            .source
            .query(variable.dataset(), variable.bands(), &query)?;
        debug!(variable = %variable, images = samples.len(), "Fetched samples");

        let Some(sample) = resolve_samples(variable, samples, date)? else {
            warn!(variable = %variable, %date, "No images for the day; using 0");
            return Ok(0.0);
        };
        Ok(variable.derive(&sample))
    }

    /// Fetch several variables, keyed by variable
    pub fn fetch(
        &self,
        variables: &[ClimateVariable],
        lon: f64,
        lat: f64,
        date: NaiveDate,
    ) -> Result<BTreeMap<ClimateVariable, f64>> {
        variables
            .iter()
            .map(|&variable| Ok((variable, self.fetch_variable(variable, lon, lat, date)?)))
            .collect()
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// Apply the per-kind match policy. `None` means "use the zero placeholder".
fn resolve_samples(
    variable: ClimateVariable,
    samples: Vec<BandSample>,
    date: NaiveDate,
) -> Result<Option<BandSample>> {
    let count = samples.len();
    match (variable.kind(), count) {
        (VariableKind::Hourly, 0) | (VariableKind::Daily, 0) => Ok(None),
        (VariableKind::Hourly, _) => Ok(Some(BandSample::mean(&samples))),
        (VariableKind::Static, 0) => Err(PipelineError::NoMatch {
            variable: variable.to_string(),
            start: date,
            end: next_day(date),
        }),
        (_, 1) => Ok(samples.into_iter().next()),
        (_, count) => Err(PipelineError::AmbiguousMatch {
            variable: variable.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned samples per dataset
    struct CannedSource {
        responses: HashMap<&'static str, Vec<BandSample>>,
    }

    impl ClimateSource for CannedSource {
        fn query(
            &self,
            dataset: &str,
            _bands: &[&str],
            _query: &ClimateQuery,
        ) -> Result<Vec<BandSample>> {
            Ok(self.responses.get(dataset).cloned().unwrap_or_default())
        }
    }

    fn fetcher(responses: Vec<(&'static str, Vec<BandSample>)>) -> DataFetcher {
        DataFetcher::new(Arc::new(CannedSource {
            responses: responses.into_iter().collect(),
        }))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_hourly_samples_are_averaged() {
        let band = "fraction_of_cloud_cover_850hPa";
        let fetcher = fetcher(vec![(
            "ECMWF/ERA5/HOURLY",
            vec![
                BandSample::new().with(band, 0.2),
                BandSample::new().with(band, 0.4),
                BandSample::new(),
            ],
        )]);
        let value = fetcher
            .fetch_variable(ClimateVariable::CloudCover, -79.5, 8.98, date())
            .unwrap();
        assert!((value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_daily_and_hourly_use_placeholder() {
        let fetcher = fetcher(vec![]);
        for variable in [ClimateVariable::CloudCover, ClimateVariable::Temperature] {
            assert_eq!(fetcher.fetch_variable(variable, -79.5, 8.98, date()).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_daily_with_many_images_is_ambiguous() {
        let sample = BandSample::new().with("surface_pressure", 100_000.0);
        let fetcher = fetcher(vec![(
            "ECMWF/ERA5_LAND/DAILY_AGGR",
            vec![sample.clone(), sample],
        )]);
        let err = fetcher
            .fetch_variable(ClimateVariable::SurfacePressure, -79.5, 8.98, date())
            .unwrap_err();
        assert!(matches!(err, PipelineError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_static_without_image_names_variable_and_range() {
        let err = fetcher(vec![])
            .fetch_variable(ClimateVariable::Elevation, -79.5, 8.98, date())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("elevation"));
        assert!(message.contains("2025-01-15"));
        assert!(message.contains("2025-01-16"));
    }

    #[test]
    fn test_queries_follow_variable_kind() {
        let fetcher = fetcher(vec![]).with_buffer_radius(5_000.0);
        let daily = fetcher.build_query(ClimateVariable::SolarRadiation, -79.5, 8.98, date());
        assert_eq!(
            daily.range,
            Some((date(), NaiveDate::from_ymd_opt(2025, 1, 16).unwrap()))
        );
        assert_eq!(daily.buffer_m, 5_000.0);
        assert_eq!(daily.reducer, Reducer::Mean);

        let elevation = fetcher.build_query(ClimateVariable::Elevation, -79.5, 8.98, date());
        assert_eq!(elevation.range, None);
        assert_eq!(elevation.buffer_m, DEFAULT_STATIC_BUFFER_M);
        assert_eq!(elevation.reducer, Reducer::First);
    }

    #[test]
    fn test_fetch_many() {
        let fetcher = fetcher(vec![(
            "ECMWF/ERA5_LAND/DAILY_AGGR",
            vec![BandSample::new().with("temperature_2m", 300.15)],
        )]);
        let values = fetcher
            .fetch(&[ClimateVariable::Temperature, ClimateVariable::CloudCover], -79.5, 8.98, date())
            .unwrap();
        assert!((values[&ClimateVariable::Temperature] - 27.0).abs() < 1e-9);
        assert_eq!(values[&ClimateVariable::CloudCover], 0.0);
    }
}
