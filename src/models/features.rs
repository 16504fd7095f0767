use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ObservationKey;

pub const FEATURE_COUNT: usize = 16;

/// Feature columns in the order the scaler and model were fitted on.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Cloud_Cover_Mean_24h",
    "relative_humidity",
    "temperature_2m_C",
    "total_precipitation_sum",
    "surface_pressure",
    "elevation",
    "sin_lat",
    "cos_lat",
    "sin_lon",
    "cos_lon",
    "sin_doy",
    "cos_doy",
    "dayofyear_norm",
    "surface_net_solar_radiation_sum_lag1",
    "temp_humidity_index",
    "cloud_pressure_ratio",
];

/// Raw inputs for one engineered record. Missing measurements are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    pub lon: f64,
    pub lat: f64,
    pub date: NaiveDate,
    pub cloud_cover: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub temperature_c: Option<f64>,
    pub precipitation: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub elevation: Option<f64>,
    pub solar_radiation_lag1: Option<f64>,
}

impl FeatureInput {
    pub fn new(lon: f64, lat: f64, date: NaiveDate) -> Self {
        Self {
            lon,
            lat,
            date,
            cloud_cover: None,
            relative_humidity: None,
            temperature_c: None,
            precipitation: None,
            surface_pressure: None,
            elevation: None,
            solar_radiation_lag1: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Cloud_Cover_Mean_24h")]
    pub cloud_cover_mean_24h: f64,
    pub relative_humidity: f64,
    #[serde(rename = "temperature_2m_C")]
    pub temperature_2m_c: f64,
    pub total_precipitation_sum: f64,
    pub surface_pressure: f64,
    pub elevation: f64,
    pub sin_lat: f64,
    pub cos_lat: f64,
    pub sin_lon: f64,
    pub cos_lon: f64,
    pub sin_doy: f64,
    pub cos_doy: f64,
    pub dayofyear_norm: f64,
    pub surface_net_solar_radiation_sum_lag1: f64,
    pub temp_humidity_index: f64,
    pub cloud_pressure_ratio: f64,
}

impl FeatureRecord {
    /// Values in `FEATURE_COLUMNS` order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.cloud_cover_mean_24h,
            self.relative_humidity,
            self.temperature_2m_c,
            self.total_precipitation_sum,
            self.surface_pressure,
            self.elevation,
            self.sin_lat,
            self.cos_lat,
            self.sin_lon,
            self.cos_lon,
            self.sin_doy,
            self.cos_doy,
            self.dayofyear_norm,
            self.surface_net_solar_radiation_sum_lag1,
            self.temp_humidity_index,
            self.cloud_pressure_ratio,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [cloud_cover_mean_24h, relative_humidity, temperature_2m_c, total_precipitation_sum, surface_pressure, elevation, sin_lat, cos_lat, sin_lon, cos_lon, sin_doy, cos_doy, dayofyear_norm, surface_net_solar_radiation_sum_lag1, temp_humidity_index, cloud_pressure_ratio] =
            values;
        Self {
            cloud_cover_mean_24h,
            relative_humidity,
            temperature_2m_c,
            total_precipitation_sum,
            surface_pressure,
            elevation,
            sin_lat,
            cos_lat,
            sin_lon,
            cos_lon,
            sin_doy,
            cos_doy,
            dayofyear_norm,
            surface_net_solar_radiation_sum_lag1,
            temp_humidity_index,
            cloud_pressure_ratio,
        }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.to_array()[i])
    }
}

/// One engineered row with enough context to write it next to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Index of the row in the table the features were derived from
    pub source_index: usize,
    pub key: ObservationKey,
    /// Observed `surface_net_solar_radiation_sum`, when present
    pub target: Option<f64>,
    pub record: FeatureRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn matrix(&self) -> Vec<[f64; FEATURE_COUNT]> {
        self.rows.iter().map(|row| row.record.to_array()).collect()
    }
}
