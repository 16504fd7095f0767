//! Attribution of point rows to boundary regions and per-region means.
//!
//! Regions without any attributed row take their province's mean, then the
//! mean across all regions, then 0.

use crate::models::{ObservationTable, RegionStatistics};
use crate::readers::Boundary;
use crate::utils::constants::{
    CLOUD_COVER, ELEVATION, PRECIPITATION, PREDICTION_COLUMN, RELATIVE_HUMIDITY,
    SOLAR_RADIATION, SURFACE_PRESSURE, TEMPERATURE_C, WIND_DIRECTION, WIND_SPEED,
};
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const DEFAULT_REGION_VARIABLES: [&str; 10] = [
    CLOUD_COVER,
    ELEVATION,
    RELATIVE_HUMIDITY,
    SOLAR_RADIATION,
    SURFACE_PRESSURE,
    TEMPERATURE_C,
    PRECIPITATION,
    WIND_DIRECTION,
    WIND_SPEED,
    PREDICTION_COLUMN,
];

struct RegionEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Output of one aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReport {
    /// Variable names, in the order of each region's `values`
    pub variables: Vec<String>,
    pub regions: Vec<RegionStatistics>,
    /// Rows whose point fell outside every region
    pub unmatched_rows: usize,
}

pub struct RegionAggregator {
    boundaries: Vec<Boundary>,
    index: RTree<RegionEntry>,
    variables: Vec<String>,
}

impl RegionAggregator {
    pub fn new(boundaries: Vec<Boundary>) -> Self {
        let entries = boundaries
            .iter()
            .enumerate()
            .filter_map(|(index, boundary)| {
                let Some(envelope) = compute_envelope(&boundary.polygon) else {
                    warn!(region = %boundary.region_id, "Skipping region with empty polygon");
                    return None;
                };
                Some(RegionEntry { index, envelope })
            })
            .collect();

        Self {
            boundaries,
            index: RTree::bulk_load(entries),
            variables: DEFAULT_REGION_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Index of the region containing the point. Points on a boundary edge
    /// belong to no region.
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        self.index
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .filter(|entry| self.boundaries[entry.index].polygon.contains(&point))
            .map(|entry| entry.index)
            .min()
    }

    pub fn aggregate(&self, table: &ObservationTable) -> RegionReport {
        let columns: Vec<Option<usize>> = self
            .variables
            .iter()
            .map(|variable| {
                let index = table.column_index(variable);
                if index.is_none() {
                    warn!(column = %variable, "Aggregated column missing; regions fall back to fill values");
                }
                index
            })
            .collect();

        let width = self.variables.len();
        let mut sums = vec![vec![Accumulator::default(); width]; self.boundaries.len()];
        let mut observations = vec![0usize; self.boundaries.len()];
        let mut unmatched_rows = 0;

        for row in &table.rows {
            let Some(region) = self.lookup(row.key.lon_degrees(), row.key.lat_degrees()) else {
                unmatched_rows += 1;
                continue;
            };
            observations[region] += 1;
            for (accumulator, column) in sums[region].iter_mut().zip(&columns) {
                if let Some(value) = column.and_then(|c| row.values[c].as_f64()) {
                    accumulator.add(value);
                }
            }
        }

        let region_means: Vec<Vec<Option<f64>>> = sums
            .iter()
            .map(|region| region.iter().map(Accumulator::mean).collect())
            .collect();

        // Province and global fallbacks average region means, not rows
        let mut province_sums: HashMap<&str, Vec<Accumulator>> = HashMap::new();
        let mut global = vec![Accumulator::default(); width];
        for (boundary, means) in self.boundaries.iter().zip(&region_means) {
            // Regions without a province only feed the global mean
            let mut province = boundary.province.as_deref().map(|name| {
                province_sums
                    .entry(name)
                    .or_insert_with(|| vec![Accumulator::default(); width])
            });
            for (i, mean) in means.iter().enumerate() {
                if let Some(mean) = mean {
                    if let Some(province) = province.as_mut() {
                        province[i].add(*mean);
                    }
                    global[i].add(*mean);
                }
            }
        }

        let regions = self
            .boundaries
            .iter()
            .zip(&region_means)
            .zip(&observations)
            .map(|((boundary, means), &count)| {
                let province = boundary
                    .province
                    .as_deref()
                    .and_then(|p| province_sums.get(p));
                let values = means
                    .iter()
                    .enumerate()
                    .map(|(i, mean)| {
                        mean.or_else(|| province.and_then(|p| p[i].mean()))
                            .or_else(|| global[i].mean())
                            .unwrap_or(0.0)
                    })
                    .collect();

                RegionStatistics {
                    region_id: boundary.region_id.clone(),
                    province: boundary.province.clone(),
                    district: boundary.district.clone(),
                    observations: count,
                    values,
                }
            })
            .collect::<Vec<_>>();

        let covered = regions.iter().filter(|r| r.has_observations()).count();
        debug!(unmatched_rows, "Rows outside every region");
        info!(regions = regions.len(), covered, "Aggregated regions");

        RegionReport {
            variables: self.variables.clone(),
            regions,
            unmatched_rows,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn compute_envelope(polygon: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = polygon.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, ObservationKey, ObservationRow};
    use chrono::NaiveDate;
    use geo::polygon;

    fn square(id: &str, province: &str, x: f64, y: f64) -> Boundary {
        let p = polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ];
        Boundary {
            region_id: id.to_string(),
            province: Some(province.to_string()),
            district: Some(format!("district {}", id)),
            polygon: MultiPolygon(vec![p]),
        }
    }

    fn predictions(rows: &[(f64, f64, Option<f64>)]) -> ObservationTable {
        let rows = rows
            .iter()
            .map(|&(lon, lat, pred)| {
                let key = ObservationKey::from_degrees(
                    lon,
                    lat,
                    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                )
                .unwrap();
                ObservationRow::new(key, vec![Cell::from(pred)])
            })
            .collect();
        ObservationTable::new("predictions", vec![PREDICTION_COLUMN.to_string()])
            .with_rows(rows)
            .unwrap()
    }

    #[test]
    fn test_lookup_point_in_polygon() {
        let aggregator = RegionAggregator::new(vec![
            square("1", "Panamá", -80.0, 8.0),
            square("2", "Panamá", -79.0, 8.0),
        ]);

        assert_eq!(aggregator.lookup(-79.5, 8.5), Some(0));
        assert_eq!(aggregator.lookup(-78.5, 8.5), Some(1));
        assert_eq!(aggregator.lookup(-70.0, 8.5), None);
    }

    #[test]
    fn test_fill_from_province_then_global() {
        let aggregator = RegionAggregator::new(vec![
            square("1", "Panamá", -80.0, 8.0),
            square("2", "Panamá", -79.0, 8.0),
            square("3", "Colón", -80.0, 9.0),
            square("4", "Chiriquí", -83.0, 8.0),
        ])
        .with_variables(vec![PREDICTION_COLUMN.to_string()]);

        let table = predictions(&[
            (-79.5, 8.5, Some(10.0)),
            (-79.5, 8.6, Some(20.0)),
            (-79.5, 9.5, Some(30.0)),
            (-79.5, 9.6, None),
            (-70.0, 8.0, Some(99.0)),
        ]);
        let report = aggregator.aggregate(&table);

        assert_eq!(report.unmatched_rows, 1);
        let values: Vec<f64> = report.regions.iter().map(|r| r.values[0]).collect();
        // region 2 takes the Panamá mean, region 4 the mean of all region means
        assert_eq!(values, vec![15.0, 15.0, 30.0, 22.5]);
        assert_eq!(report.regions[2].observations, 2);
        assert!(!report.regions[3].has_observations());
    }

    #[test]
    fn test_regions_without_province_skip_province_fill() {
        let mut unnamed = square("1", "", -80.0, 8.0);
        unnamed.province = None;
        let aggregator = RegionAggregator::new(vec![
            unnamed,
            square("2", "", -79.0, 8.0),
            square("3", "Colón", -80.0, 9.0),
        ])
        .with_variables(vec![PREDICTION_COLUMN.to_string()]);

        let table = predictions(&[(-79.5, 8.5, Some(10.0)), (-79.5, 9.5, Some(100.0))]);
        let report = aggregator.aggregate(&table);

        // the empty-named province has no data of its own, so it takes the global mean
        let values: Vec<f64> = report.regions.iter().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![10.0, 55.0, 100.0]);
    }

    #[test]
    fn test_no_data_anywhere_fills_zero() {
        let aggregator = RegionAggregator::new(vec![square("1", "Panamá", -80.0, 8.0)]);
        let report = aggregator.aggregate(&predictions(&[]));

        assert_eq!(report.variables.len(), DEFAULT_REGION_VARIABLES.len());
        assert!(report.regions[0].values.iter().all(|v| *v == 0.0));
    }
}
