//! Grid scan of where a climate source has data.
//!
//! Steps over a lon/lat box, fetches one variable per grid point and reports
//! which points returned a non-zero value and the range they span.

use crate::error::{PipelineError, Result};
use crate::sources::source::DataFetcher;
use crate::sources::variables::ClimateVariable;
use crate::utils::constants::{
    DEFAULT_SCAN_STEP, PANAMA_MAX_LAT, PANAMA_MAX_LON, PANAMA_MIN_LAT, PANAMA_MIN_LON,
};
use crate::utils::coordinates::round_coordinate;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoveragePoint {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

/// Bounding box of the points that returned data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageRange {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl CoverageRange {
    /// `(lon, lat)` midpoint
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub variable: ClimateVariable,
    pub step: f64,
    pub total_points: usize,
    pub valid: Vec<CoveragePoint>,
    /// Points answered with no data or a zero value
    pub empty: usize,
    /// Points whose fetch failed for another reason
    pub failed: usize,
}

impl CoverageReport {
    pub fn effective_range(&self) -> Option<CoverageRange> {
        let first = self.valid.first()?;
        let start = CoverageRange {
            min_lon: first.lon,
            max_lon: first.lon,
            min_lat: first.lat,
            max_lat: first.lat,
        };
        Some(self.valid.iter().fold(start, |range, point| CoverageRange {
            min_lon: range.min_lon.min(point.lon),
            max_lon: range.max_lon.max(point.lon),
            min_lat: range.min_lat.min(point.lat),
            max_lat: range.max_lat.max(point.lat),
        }))
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Coverage Scan ===\n");
        summary.push_str(&format!(
            "Variable: {} (step {}°, {} points)\n",
            self.variable, self.step, self.total_points
        ));
        summary.push_str(&format!("With data: {}\n", self.valid.len()));
        summary.push_str(&format!("Empty: {}\n", self.empty));
        if self.failed > 0 {
            summary.push_str(&format!("Failed: {}\n", self.failed));
        }

        match self.effective_range() {
            Some(range) => {
                let (lon, lat) = range.center();
                summary.push_str(&format!(
                    "\nLatitude:  {:.4} to {:.4}\n",
                    range.min_lat, range.max_lat
                ));
                summary.push_str(&format!(
                    "Longitude: {:.4} to {:.4}\n",
                    range.min_lon, range.max_lon
                ));
                summary.push_str(&format!("Center: ({:.4}, {:.4})\n", lon, lat));
            }
            None => summary.push_str("\nNo grid point returned data.\n"),
        }

        summary
    }
}

/// Scans a lon/lat grid, by default the Panama box at 0.2° with elevation
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageScanner {
    min_lon: f64,
    max_lon: f64,
    min_lat: f64,
    max_lat: f64,
    step: f64,
    variable: ClimateVariable,
}

impl CoverageScanner {
    pub fn new() -> Self {
        Self {
            min_lon: PANAMA_MIN_LON,
            max_lon: PANAMA_MAX_LON,
            min_lat: PANAMA_MIN_LAT,
            max_lat: PANAMA_MAX_LAT,
            step: DEFAULT_SCAN_STEP,
            variable: ClimateVariable::Elevation,
        }
    }

    pub fn with_bounds(mut self, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        self.min_lon = min_lon;
        self.min_lat = min_lat;
        self.max_lon = max_lon;
        self.max_lat = max_lat;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_variable(mut self, variable: ClimateVariable) -> Self {
        self.variable = variable;
        self
    }

    /// Grid points as `(lon, lat)`, latitude-major. Upper bounds are exclusive.
    pub fn grid(&self) -> Result<Vec<(f64, f64)>> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(PipelineError::InvalidFormat(format!(
                "Scan step must be positive, got {}",
                self.step
            )));
        }
        if !(self.min_lon < self.max_lon && self.min_lat < self.max_lat) {
            return Err(PipelineError::InvalidFormat(format!(
                "Empty scan box: lon [{}, {}), lat [{}, {})",
                self.min_lon, self.max_lon, self.min_lat, self.max_lat
            )));
        }

        let lats = axis(self.min_lat, self.max_lat, self.step);
        let lons = axis(self.min_lon, self.max_lon, self.step);
        Ok(lats
            .iter()
            .flat_map(|&lat| lons.iter().map(move |&lon| (lon, lat)))
            .collect())
    }

    pub fn scan(&self, fetcher: &DataFetcher, date: NaiveDate) -> Result<CoverageReport> {
        let grid = self.grid()?;
        info!(
            variable = %self.variable,
            points = grid.len(),
            step = self.step,
            "Scanning coverage"
        );

        let outcomes: Vec<Option<Result<f64>>> = grid
            .par_iter()
            .map(|&(lon, lat)| match fetcher.fetch_variable(self.variable, lon, lat, date) {
                Ok(value) => Some(Ok(value)),
                Err(PipelineError::NoMatch { .. }) => None,
                Err(e) => Some(Err(e)),
            })
            .collect();

        let mut report = CoverageReport {
            variable: self.variable,
            step: self.step,
            total_points: grid.len(),
            valid: Vec::new(),
            empty: 0,
            failed: 0,
        };
        for (&(lon, lat), outcome) in grid.iter().zip(outcomes) {
            match outcome {
                Some(Ok(value)) if value != 0.0 && value.is_finite() => {
                    report.valid.push(CoveragePoint { lon, lat, value });
                }
                Some(Ok(_)) | None => report.empty += 1,
                Some(Err(e)) => {
                    warn!(lon, lat, error = %e, "Coverage fetch failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            valid = report.valid.len(),
            empty = report.empty,
            failed = report.failed,
            "Coverage scan finished"
        );
        Ok(report)
    }
}

impl Default for CoverageScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let steps = ((max - min) / step).ceil() as usize;
    (0..steps)
        .map(|i| min + i as f64 * step)
        .filter(|value| *value < max)
        .map(|value| round_coordinate(value).unwrap_or(value))
        .collect()
}
