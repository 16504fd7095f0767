use crate::error::{PipelineError, Result};
use crate::models::{Cell, ObservationKey, ObservationRow, ObservationTable};
use crate::readers::geometry::{extract_coordinates, Coordinates, ExtractionStats};
use crate::utils::constants::{
    DATE_COLUMN, DEFAULT_BUFFER_SIZE, GEOMETRY_COLUMN, LAT_COLUMN, LON_COLUMN,
    SYSTEM_INDEX_COLUMN,
};
use crate::utils::coordinates::{parse_coordinate, round_coordinate};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// A loaded source table plus the geometry extraction counts
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub table: ObservationTable,
    pub stats: ExtractionStats,
}

/// Where a row's coordinates come from
#[derive(Debug, Clone, Copy)]
enum CoordinateColumns {
    Geometry(usize),
    LonLat(usize, usize),
}

#[derive(Debug, Clone)]
pub struct DatasetReader {
    geometry_column: String,
    date_column: String,
    use_mmap: bool,
}

impl DatasetReader {
    pub fn new() -> Self {
        Self {
            geometry_column: GEOMETRY_COLUMN.to_string(),
            date_column: DATE_COLUMN.to_string(),
            use_mmap: false,
        }
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = column.into();
        self
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Read a source CSV, extracting coordinates and normalizing dates
    pub fn read_source(&self, path: &Path, name: &str) -> Result<LoadedSource> {
        debug!(source = name, path = %path.display(), mmap = self.use_mmap, "Reading source");
        if self.use_mmap {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            self.read_from_bytes(&mmap, name)
        } else {
            let file = File::open(path)?;
            let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            self.read_from_bytes(&bytes, name)
        }
    }

    pub fn read_from_bytes(&self, bytes: &[u8], name: &str) -> Result<LoadedSource> {
        let text = decode_text(bytes);
        self.read_from_str(&text, name)
    }

    pub fn read_from_str(&self, text: &str, name: &str) -> Result<LoadedSource> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let find = |column: &str| headers.iter().position(|h| h == column);

        let date_index = find(&self.date_column)
            .ok_or_else(|| PipelineError::missing_column(self.date_column.clone(), name))?;

        let coordinates = match (find(LON_COLUMN), find(LAT_COLUMN), find(&self.geometry_column)) {
            (Some(lon), Some(lat), _) => CoordinateColumns::LonLat(lon, lat),
            (None, None, Some(geo)) => CoordinateColumns::Geometry(geo),
            (Some(_), None, _) => return Err(PipelineError::missing_column(LAT_COLUMN, name)),
            (None, Some(_), _) => return Err(PipelineError::missing_column(LON_COLUMN, name)),
            (None, None, None) => {
                return Err(PipelineError::missing_column(
                    self.geometry_column.clone(),
                    name,
                ))
            }
        };

        // Key columns and the export index never become value columns
        let skip = |i: usize| {
            i == date_index
                || headers[i] == SYSTEM_INDEX_COLUMN
                || matches!(coordinates, CoordinateColumns::LonLat(lon, lat) if i == lon || i == lat)
        };
        let value_indices: Vec<usize> = (0..headers.len()).filter(|&i| !skip(i)).collect();
        let columns = value_indices.iter().map(|&i| headers[i].clone()).collect();

        let mut table = ObservationTable::new(name, columns);
        let mut stats = ExtractionStats::default();

        for record in reader.records() {
            let record = record?;

            let coords = match coordinates {
                CoordinateColumns::Geometry(geo) => {
                    extract_coordinates(record.get(geo).unwrap_or_default())
                }
                CoordinateColumns::LonLat(lon, lat) => {
                    parse_lon_lat(record.get(lon), record.get(lat))
                }
            };
            stats.record(coords.as_ref());
            let Some(coords) = coords else {
                continue;
            };

            let raw_date = record.get(date_index).unwrap_or_default();
            let date = parse_date(raw_date).ok_or_else(|| {
                PipelineError::InvalidFormat(format!(
                    "Invalid date '{}' in {}",
                    raw_date, name
                ))
            })?;

            let key = ObservationKey::from_degrees(coords.lon, coords.lat, date).ok_or_else(
                || PipelineError::InvalidFormat(format!("Invalid coordinates in {}", name)),
            )?;

            let values = value_indices
                .iter()
                .map(|&i| Cell::parse(record.get(i).unwrap_or_default()))
                .collect();
            table.push_row(ObservationRow::new(key, values))?;
        }

        info!(
            source = name,
            valid = stats.valid_rows,
            total = stats.total_rows,
            "Valid coordinates"
        );
        if stats.valid_rows == 0 && stats.total_rows > 0 {
            warn!(source = name, "No row has usable coordinates; joins will be empty");
        }

        Ok(LoadedSource { table, stats })
    }
}

impl Default for DatasetReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_lon_lat(lon: Option<&str>, lat: Option<&str>) -> Option<Coordinates> {
    let lon = parse_coordinate(lon?).ok()?;
    let lat = parse_coordinate(lat?).ok()?;
    Some(Coordinates {
        lon: round_coordinate(lon)?,
        lat: round_coordinate(lat)?,
    })
}

/// UTF-8 (BOM stripped) with a Windows-1252 fallback for spreadsheet exports
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    text
}

/// Parse an ISO-style date, discarding any time component
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }

    ["%Y%m%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
