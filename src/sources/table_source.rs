use crate::error::Result;
use crate::models::{ObservationRow, ObservationTable};
use crate::readers::DatasetReader;
use crate::sources::source::{BandSample, ClimateQuery, ClimateSource, Reducer};
use crate::utils::coordinates::haversine_distance_m;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// Offline climate source answering queries from exported band tables.
///
/// Each dataset is a table of raw band columns keyed by point and date; every
/// distinct date inside the query range counts as one image.
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    datasets: HashMap<String, ObservationTable>,
}

impl TableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>, table: ObservationTable) -> Self {
        self.datasets.insert(dataset.into(), table);
        self
    }

    /// Load a band table from CSV and register it under `dataset`
    pub fn load_dataset(
        mut self,
        dataset: impl Into<String>,
        path: &Path,
        reader: &DatasetReader,
    ) -> Result<Self> {
        let dataset = dataset.into();
        let loaded = reader.read_source(path, &dataset)?;
        info!(dataset = %dataset, rows = loaded.table.len(), "Registered band table");
        self.datasets.insert(dataset, loaded.table);
        Ok(self)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

impl ClimateSource for TableSource {
    fn query(
        &self,
        dataset: &str,
        bands: &[&str],
        query: &ClimateQuery,
    ) -> Result<Vec<BandSample>> {
        let Some(table) = self.datasets.get(dataset) else {
            return Ok(Vec::new());
        };
        let band_columns = bands
            .iter()
            .map(|band| Ok((*band, table.require_column(band)?)))
            .collect::<Result<Vec<_>>>()?;

        let in_range = |date: NaiveDate| {
            query
                .range
                .map_or(true, |(start, end)| start <= date && date < end)
        };

        let mut images: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (i, row) in table.rows.iter().enumerate() {
            if in_range(row.key.date) {
                images.entry(row.key.date).or_default().push(i);
            }
        }

        let samples = images
            .values()
            .map(|rows| {
                let mut pixels = rows
                    .iter()
                    .map(|&i| &table.rows[i])
                    .filter(|row| {
                        haversine_distance_m(
                            query.lon,
                            query.lat,
                            row.key.lon_degrees(),
                            row.key.lat_degrees(),
                        ) <= query.buffer_m
                    })
                    .map(|row| pixel_sample(row, &band_columns));

                match query.reducer {
                    Reducer::First => pixels.next().unwrap_or_default(),
                    Reducer::Mean => BandSample::mean(&pixels.collect::<Vec<_>>()),
                }
            })
            .collect();

        Ok(samples)
    }
}

/// Non-null band values of one table row
fn pixel_sample(row: &ObservationRow, band_columns: &[(&str, usize)]) -> BandSample {
    band_columns
        .iter()
        .fold(BandSample::new(), |sample, &(band, column)| {
            match row.values[column].as_f64() {
                Some(value) => sample.with(band, value),
                None => sample,
            }
        })
}
