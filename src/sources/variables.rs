use crate::error::{PipelineError, Result};
use crate::sources::source::BandSample;
use crate::utils::constants::{
    CLOUD_COVER, ELEVATION, PRECIPITATION, RELATIVE_HUMIDITY, SOLAR_RADIATION, SURFACE_PRESSURE,
    TEMPERATURE_C, WIND_DIRECTION, WIND_SPEED,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ERA5_HOURLY: &str = "ECMWF/ERA5/HOURLY";
pub const ERA5_LAND_DAILY: &str = "ECMWF/ERA5_LAND/DAILY_AGGR";
pub const CAMS_NRT: &str = "ECMWF/CAMS/NRT";
pub const SRTM: &str = "USGS/SRTMGL1_003";

const KELVIN_OFFSET: f64 = 273.15;

/// How a dataset is sampled for a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Many images per day, averaged
    Hourly,
    /// One aggregated image per day
    Daily,
    /// A single undated image
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateVariable {
    CloudCover,
    Elevation,
    RelativeHumidity,
    SolarRadiation,
    SurfacePressure,
    Temperature,
    Precipitation,
    WindDirection,
    WindSpeed,
    Aerosols,
}

impl ClimateVariable {
    pub const ALL: [ClimateVariable; 10] = [
        ClimateVariable::CloudCover,
        ClimateVariable::Elevation,
        ClimateVariable::RelativeHumidity,
        ClimateVariable::SolarRadiation,
        ClimateVariable::SurfacePressure,
        ClimateVariable::Temperature,
        ClimateVariable::Precipitation,
        ClimateVariable::WindDirection,
        ClimateVariable::WindSpeed,
        ClimateVariable::Aerosols,
    ];

    /// Variables fetched to build a point's feature record
    pub const FEATURE_INPUTS: [ClimateVariable; 9] = [
        ClimateVariable::CloudCover,
        ClimateVariable::Elevation,
        ClimateVariable::RelativeHumidity,
        ClimateVariable::SolarRadiation,
        ClimateVariable::SurfacePressure,
        ClimateVariable::Temperature,
        ClimateVariable::Precipitation,
        ClimateVariable::WindDirection,
        ClimateVariable::WindSpeed,
    ];

    /// Column name of the derived value in merged and feature tables
    pub fn column(&self) -> &'static str {
        match self {
            ClimateVariable::CloudCover => CLOUD_COVER,
            ClimateVariable::Elevation => ELEVATION,
            ClimateVariable::RelativeHumidity => RELATIVE_HUMIDITY,
            ClimateVariable::SolarRadiation => SOLAR_RADIATION,
            ClimateVariable::SurfacePressure => SURFACE_PRESSURE,
            ClimateVariable::Temperature => TEMPERATURE_C,
            ClimateVariable::Precipitation => PRECIPITATION,
            ClimateVariable::WindDirection => WIND_DIRECTION,
            ClimateVariable::WindSpeed => WIND_SPEED,
            ClimateVariable::Aerosols => "total_aerosol_optical_depth_at_550nm_surface",
        }
    }

    pub fn dataset(&self) -> &'static str {
        match self {
            ClimateVariable::CloudCover => ERA5_HOURLY,
            ClimateVariable::Aerosols => CAMS_NRT,
            ClimateVariable::Elevation => SRTM,
            _ => ERA5_LAND_DAILY,
        }
    }

    pub fn bands(&self) -> &'static [&'static str] {
        match self {
            ClimateVariable::CloudCover => &["fraction_of_cloud_cover_850hPa"],
            ClimateVariable::Elevation => &["elevation"],
            ClimateVariable::RelativeHumidity => &["temperature_2m", "dewpoint_temperature_2m"],
            ClimateVariable::SolarRadiation => &["surface_net_solar_radiation_sum"],
            ClimateVariable::SurfacePressure => &["surface_pressure"],
            ClimateVariable::Temperature => &["temperature_2m"],
            ClimateVariable::Precipitation => &["total_precipitation_sum"],
            ClimateVariable::WindDirection | ClimateVariable::WindSpeed => {
                &["u_component_of_wind_10m", "v_component_of_wind_10m"]
            }
            ClimateVariable::Aerosols => &["total_aerosol_optical_depth_at_550nm_surface"],
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            ClimateVariable::CloudCover | ClimateVariable::Aerosols => VariableKind::Hourly,
            ClimateVariable::Elevation => VariableKind::Static,
            _ => VariableKind::Daily,
        }
    }

    /// Turn reduced band values into the variable's value. Any missing band
    /// yields 0.
    pub fn derive(&self, sample: &BandSample) -> f64 {
        let bands = self.bands();
        let band = |i: usize| sample.get(bands[i]);

        let value = match self {
            ClimateVariable::WindSpeed => band(0)
                .zip(band(1))
                .map(|(u, v)| (u * u + v * v).sqrt()),
            ClimateVariable::WindDirection => {
                band(0).zip(band(1)).map(|(u, v)| v.atan2(u).to_degrees())
            }
            ClimateVariable::RelativeHumidity => band(0)
                .zip(band(1))
                .map(|(t, td)| relative_humidity(t - KELVIN_OFFSET, td - KELVIN_OFFSET)),
            ClimateVariable::Temperature => band(0).map(|k| k - KELVIN_OFFSET),
            _ => band(0),
        };
        value.unwrap_or(0.0)
    }
}

/// Magnus approximation from air and dewpoint temperature in °C
pub fn relative_humidity(temperature_c: f64, dewpoint_c: f64) -> f64 {
    let magnus = |t: f64| (17.625 * t / (243.04 + t)).exp();
    100.0 * magnus(dewpoint_c) / magnus(temperature_c)
}

impl fmt::Display for ClimateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for ClimateVariable {
    type Err = PipelineError;

    /// Accepts snake-case variant names or output column names
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ClimateVariable::ALL
            .into_iter()
            .find(|v| {
                v.column().eq_ignore_ascii_case(wanted)
                    || serde_json::to_value(v)
                        .ok()
                        .and_then(|name| name.as_str().map(|n| n == wanted))
                        .unwrap_or(false)
            })
            .ok_or_else(|| PipelineError::Config(format!("Unknown climate variable '{}'", s)))
    }
}
