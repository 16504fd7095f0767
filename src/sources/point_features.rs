use crate::error::{PipelineError, Result};
use crate::models::{FeatureInput, FeatureRecord};
use crate::processors::FeatureEngineer;
use crate::readers::parse_date;
use crate::sources::source::DataFetcher;
use crate::sources::variables::ClimateVariable;
use crate::utils::constants::DEFAULT_DATA_DELAY_DAYS;
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Features for one point and day, plus what was fetched to build them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFeatures {
    pub lon: f64,
    pub lat: f64,
    pub date: NaiveDate,
    pub record: FeatureRecord,
    /// Radiation measured on `date`, 0 when unavailable
    pub observed_radiation: f64,
    pub variables: BTreeMap<ClimateVariable, f64>,
}

/// Builds a point's feature record from a climate source
#[derive(Clone)]
pub struct PointFeatureBuilder {
    fetcher: DataFetcher,
    data_delay_days: u64,
}

impl PointFeatureBuilder {
    pub fn new(fetcher: DataFetcher) -> Self {
        Self {
            fetcher,
            data_delay_days: DEFAULT_DATA_DELAY_DAYS,
        }
    }

    /// Days behind today used when no date is given; reanalysis data lags
    pub fn with_data_delay_days(mut self, days: u64) -> Self {
        self.data_delay_days = days;
        self
    }

    pub fn fetcher(&self) -> &DataFetcher {
        &self.fetcher
    }

    pub fn default_date(&self) -> NaiveDate {
        let today = Local::now().date_naive();
        today
            .checked_sub_days(Days::new(self.data_delay_days))
            .unwrap_or(today)
    }

    /// Parse an ISO date, or fall back to the default date
    pub fn resolve_date(&self, raw: Option<&str>) -> Result<NaiveDate> {
        match raw {
            None => Ok(self.default_date()),
            Some(raw) => parse_date(raw)
                .ok_or_else(|| PipelineError::InvalidFormat(format!("Invalid date '{}'", raw))),
        }
    }

    pub fn build(&self, lon: f64, lat: f64, date: Option<NaiveDate>) -> Result<PointFeatures> {
        let date = date.unwrap_or_else(|| self.default_date());
        let previous = date.pred_opt().ok_or_else(|| {
            PipelineError::InvalidFormat(format!("No day before {}", date))
        })?;

        let variables = self
            .fetcher
            .fetch(&ClimateVariable::FEATURE_INPUTS, lon, lat, date)?;
        let lag = self
            .fetcher
            .fetch_variable(ClimateVariable::SolarRadiation, lon, lat, previous)?;

        let value = |variable: ClimateVariable| variables.get(&variable).copied();
        let input = FeatureInput {
            cloud_cover: value(ClimateVariable::CloudCover),
            relative_humidity: value(ClimateVariable::RelativeHumidity),
            temperature_c: value(ClimateVariable::Temperature),
            precipitation: value(ClimateVariable::Precipitation),
            surface_pressure: value(ClimateVariable::SurfacePressure),
            elevation: value(ClimateVariable::Elevation),
            solar_radiation_lag1: Some(lag),
            ..FeatureInput::new(lon, lat, date)
        };
        let record = FeatureEngineer::new().engineer_record(&input);
        let observed_radiation = value(ClimateVariable::SolarRadiation).unwrap_or(0.0);

        info!(lon, lat, %date, "Built point features");
        Ok(PointFeatures {
            lon,
            lat,
            date,
            record,
            observed_radiation,
            variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::DatasetReader;
    use crate::sources::table_source::TableSource;
    use crate::sources::variables::{ERA5_HOURLY, ERA5_LAND_DAILY, SRTM};
    use std::sync::Arc;

    fn builder() -> PointFeatureBuilder {
        let reader = DatasetReader::new();
        let daily = "lon,lat,date,temperature_2m,dewpoint_temperature_2m,surface_pressure,\
            total_precipitation_sum,surface_net_solar_radiation_sum,\
            u_component_of_wind_10m,v_component_of_wind_10m\n\
            -79.5,8.98,2025-01-14,299.15,295.15,100000,0.5,17000000,1,1\n\
            -79.5,8.98,2025-01-15,300.15,296.15,101000,0.0,18000000,3,4\n";
        let hourly = "lon,lat,date,fraction_of_cloud_cover_850hPa\n\
            -79.5,8.98,2025-01-15T00:00:00,0.25\n";
        let static_ = "lon,lat,date,elevation\n-79.5,8.98,2000-02-11,42\n";

        let source = TableSource::new()
            .with_dataset(ERA5_LAND_DAILY, reader.read_from_str(daily, "daily").unwrap().table)
            .with_dataset(ERA5_HOURLY, reader.read_from_str(hourly, "hourly").unwrap().table)
            .with_dataset(SRTM, reader.read_from_str(static_, "srtm").unwrap().table);
        PointFeatureBuilder::new(DataFetcher::new(Arc::new(source)))
    }

    #[test]
    fn test_build_point_features() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let features = builder().build(-79.5, 8.98, Some(date)).unwrap();

        assert_eq!(features.record.cloud_cover_mean_24h, 0.25);
        assert!((features.record.temperature_2m_c - 27.0).abs() < 1e-9);
        assert_eq!(features.record.surface_pressure, 101_000.0);
        assert_eq!(features.record.elevation, 42.0);
        assert_eq!(features.record.surface_net_solar_radiation_sum_lag1, 17_000_000.0);
        assert_eq!(features.observed_radiation, 18_000_000.0);
        assert_eq!(features.variables[&ClimateVariable::WindSpeed], 5.0);
        assert!((features.record.dayofyear_norm - 15.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_day_without_data_zero_fills() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let features = builder().build(-79.5, 8.98, Some(date)).unwrap();

        assert_eq!(features.record.temperature_2m_c, 0.0);
        assert_eq!(features.observed_radiation, 0.0);
        assert_eq!(features.record.elevation, 42.0);
    }

    #[test]
    fn test_resolve_date() {
        let builder = builder().with_data_delay_days(20);
        assert_eq!(
            builder.resolve_date(Some("2025-01-15")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
        assert_eq!(
            builder.resolve_date(None).unwrap(),
            Local::now().date_naive() - Days::new(20)
        );
        assert!(builder.resolve_date(Some("soon")).is_err());
    }
}
