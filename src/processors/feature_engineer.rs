use crate::error::{PipelineError, Result};
use crate::models::{
    FeatureInput, FeatureRecord, FeatureRow, FeatureTable, ObservationKey, ObservationTable,
    FEATURE_COUNT,
};
use crate::utils::constants::{
    CLOUD_COVER, DAYS_PER_YEAR, ELEVATION, PRECIPITATION, RELATIVE_HUMIDITY, SOLAR_RADIATION,
    SURFACE_PRESSURE, TEMPERATURE_C,
};
use chrono::Datelike;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use tracing::{debug, info, warn};

/// How the lag-1 radiation value is found for each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LagStrategy {
    /// Exact previous calendar day at the same `(lon, lat)`
    #[default]
    PartitionByLocation,
    /// Previous row of the table as ordered. Leaks values across locations at
    /// group boundaries; matches how the training set was generated.
    RowShift,
}

/// Measurement columns the table path reads
const INPUT_COLUMNS: [&str; 7] = [
    CLOUD_COVER,
    RELATIVE_HUMIDITY,
    TEMPERATURE_C,
    PRECIPITATION,
    SURFACE_PRESSURE,
    ELEVATION,
    SOLAR_RADIATION,
];

pub struct FeatureEngineer {
    lag_strategy: LagStrategy,
    drop_incomplete: bool,
    max_workers: usize,
}

impl FeatureEngineer {
    pub fn new() -> Self {
        Self {
            lag_strategy: LagStrategy::default(),
            drop_incomplete: false,
            max_workers: num_cpus::get(),
        }
    }

    pub fn with_lag_strategy(mut self, lag_strategy: LagStrategy) -> Self {
        self.lag_strategy = lag_strategy;
        self
    }

    /// Drop rows with a missing or infinite feature instead of zero-filling
    pub fn with_drop_incomplete(mut self, drop_incomplete: bool) -> Self {
        self.drop_incomplete = drop_incomplete;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Build one record. Missing and infinite values become 0.
    pub fn engineer_record(&self, input: &FeatureInput) -> FeatureRecord {
        FeatureRecord::from_array(raw_features(input).map(zero_fill))
    }

    /// Engineer every row of a merged table, preserving row order
    pub fn engineer_table(&self, table: &ObservationTable) -> Result<FeatureTable> {
        let indices = INPUT_COLUMNS
            .iter()
            .map(|column| table.require_column(column))
            .collect::<Result<Vec<usize>>>()?;
        let [cloud, humidity, temperature, precipitation, pressure, elevation, radiation] =
            <[usize; 7]>::try_from(indices).map_err(|_| {
                PipelineError::InvalidFormat("Unexpected input column count".to_string())
            })?;

        let value = |row: usize, column: usize| table.rows[row].values[column].as_f64();
        let lags = self.lag_values(table, radiation);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let rows: Vec<FeatureRow> = pool.install(|| {
            (0..table.len())
                .into_par_iter()
                .filter_map(|i| {
                    let key = table.rows[i].key;
                    let input = FeatureInput {
                        cloud_cover: value(i, cloud),
                        relative_humidity: value(i, humidity),
                        temperature_c: value(i, temperature),
                        precipitation: value(i, precipitation),
                        surface_pressure: value(i, pressure),
                        elevation: value(i, elevation),
                        solar_radiation_lag1: lags[i],
                        ..FeatureInput::new(key.lon_degrees(), key.lat_degrees(), key.date)
                    };

                    let raw = raw_features(&input);
                    if self.drop_incomplete && raw.iter().any(|v| !v.is_finite()) {
                        return None;
                    }

                    Some(FeatureRow {
                        source_index: i,
                        key,
                        target: value(i, radiation),
                        record: FeatureRecord::from_array(raw.map(zero_fill)),
                    })
                })
                .collect()
        });

        let dropped = table.len() - rows.len();
        if dropped > 0 {
            warn!(dropped, "Dropped rows with incomplete features");
        }
        info!(
            rows = rows.len(),
            lag = ?self.lag_strategy,
            "Engineered features"
        );

        Ok(FeatureTable::new(rows))
    }

    fn lag_values(&self, table: &ObservationTable, radiation: usize) -> Vec<Option<f64>> {
        let radiation_at = |i: usize| table.rows[i].values[radiation].as_f64();

        match self.lag_strategy {
            LagStrategy::RowShift => (0..table.len())
                .map(|i| i.checked_sub(1).and_then(radiation_at))
                .collect(),
            LagStrategy::PartitionByLocation => {
                let mut by_key: HashMap<ObservationKey, f64> = HashMap::with_capacity(table.len());
                for (i, row) in table.rows.iter().enumerate() {
                    if let Some(value) = radiation_at(i) {
                        by_key.entry(row.key).or_insert(value);
                    }
                }
                debug!(keyed = by_key.len(), "Indexed radiation by location and day");

                table
                    .rows
                    .iter()
                    .map(|row| {
                        row.key
                            .previous_day()
                            .and_then(|previous| by_key.get(&previous).copied())
                    })
                    .collect()
            }
        }
    }
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new()
    }
}

/// Feature values in contract order. Missing inputs propagate as NaN.
fn raw_features(input: &FeatureInput) -> [f64; FEATURE_COUNT] {
    let or_nan = |value: Option<f64>| value.unwrap_or(f64::NAN);

    let cloud = or_nan(input.cloud_cover);
    let humidity = or_nan(input.relative_humidity);
    let temperature = or_nan(input.temperature_c);
    let pressure = or_nan(input.surface_pressure);

    let lat = input.lat.to_radians();
    let lon = input.lon.to_radians();

    let day_of_year = f64::from(input.date.ordinal());
    let angle = 2.0 * PI * day_of_year / DAYS_PER_YEAR;

    let denominator = if pressure == 0.0 { 1.0 } else { pressure };

    [
        cloud,
        humidity,
        temperature,
        or_nan(input.precipitation),
        pressure,
        or_nan(input.elevation),
        lat.sin(),
        lat.cos(),
        lon.sin(),
        lon.cos(),
        angle.sin(),
        angle.cos(),
        day_of_year / DAYS_PER_YEAR,
        or_nan(input.solar_radiation_lag1),
        temperature * (humidity / 100.0),
        cloud / denominator,
    ]
}

fn zero_fill(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
