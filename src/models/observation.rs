use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{PipelineError, Result};
use crate::utils::coordinates::{from_fixed, to_fixed};

/// A single CSV cell after loading. Numbers are kept as `f64`, anything that
/// does not parse as a number stays text, empty cells are `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Number)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

/// Join key triple. Coordinates are fixed-point (degrees * 10^7) so that
/// equality and ordering after rounding are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    pub lon: i64,
    pub lat: i64,
    pub date: NaiveDate,
}

impl ObservationKey {
    pub fn new(lon: i64, lat: i64, date: NaiveDate) -> Self {
        Self { lon, lat, date }
    }

    /// Build a key from degrees, rounding to 7 decimals
    pub fn from_degrees(lon: f64, lat: f64, date: NaiveDate) -> Option<Self> {
        Some(Self::new(to_fixed(lon)?, to_fixed(lat)?, date))
    }

    pub fn lon_degrees(&self) -> f64 {
        from_fixed(self.lon)
    }

    pub fn lat_degrees(&self) -> f64 {
        from_fixed(self.lat)
    }

    /// Key of the same location on the previous calendar day
    pub fn previous_day(&self) -> Option<Self> {
        self.date.pred_opt().map(|date| Self { date, ..*self })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub key: ObservationKey,
    pub values: Vec<Cell>,
}

impl ObservationRow {
    pub fn new(key: ObservationKey, values: Vec<Cell>) -> Self {
        Self { key, values }
    }
}

/// An in-memory observation table. `columns` names the non-key columns and
/// every row carries exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ObservationRow>,
}

impl ObservationTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<ObservationRow>) -> Result<Self> {
        for row in rows {
            self.push_row(row)?;
        }
        Ok(self)
    }

    pub fn push_row(&mut self, row: ObservationRow) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(PipelineError::InvalidFormat(format!(
                "Row for {:?} in {} has {} values, expected {}",
                row.key,
                self.name,
                row.values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column that must exist
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::missing_column(name, self.name.clone()))
    }

    /// Numeric value of a cell, `None` for nulls, text and unknown columns
    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.values.get(index)?.as_f64()
    }

    /// Stable sort by `(lon, lat, date)`
    pub fn sort_by_key(&mut self) {
        self.rows.sort_by_key(|row| row.key);
    }

    pub fn unique_keys(&self) -> BTreeSet<ObservationKey> {
        self.rows.iter().map(|row| row.key).collect()
    }

    /// Index rows by key. Later duplicates are appended in row order.
    pub fn index_by_key(&self) -> HashMap<ObservationKey, Vec<usize>> {
        let mut index: HashMap<ObservationKey, Vec<usize>> = HashMap::with_capacity(self.len());
        for (position, row) in self.rows.iter().enumerate() {
            index.entry(row.key).or_default().push(position);
        }
        index
    }

    /// Drop the named columns that are present, returning the ones removed
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        let drop: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| names.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        if drop.is_empty() {
            return Vec::new();
        }

        let removed = drop.iter().map(|&i| self.columns[i].clone()).collect();
        self.columns = retain_indices(std::mem::take(&mut self.columns), &drop);
        for row in &mut self.rows {
            row.values = retain_indices(std::mem::take(&mut row.values), &drop);
        }
        removed
    }
}

fn retain_indices<T>(items: Vec<T>, drop: &[usize]) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_cell_parsing() {
        assert_eq!(Cell::parse(""), Cell::Null);
        assert_eq!(Cell::parse("NaN"), Cell::Null);
        assert_eq!(Cell::parse(" 12.5 "), Cell::Number(12.5));
        assert_eq!(Cell::parse("abc"), Cell::Text("abc".to_string()));
        assert_eq!(Cell::Number(0.1).to_string(), "0.1");
        assert_eq!(Cell::Null.to_string(), "");
    }

    #[test]
    fn test_key_ordering_follows_lon_lat_date() {
        let a = ObservationKey::from_degrees(-80.0, 9.0, date(2)).unwrap();
        let b = ObservationKey::from_degrees(-79.5, 8.0, date(1)).unwrap();
        let c = ObservationKey::from_degrees(-79.5, 8.0, date(3)).unwrap();
        let mut keys = vec![c, b, a];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_previous_day() {
        let key = ObservationKey::from_degrees(-79.5, 8.98, date(1)).unwrap();
        let prev = key.previous_day().unwrap();
        assert_eq!(prev.date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!((prev.lon, prev.lat), (key.lon, key.lat));
    }

    #[test]
    fn test_drop_columns_keeps_rows_aligned() {
        let key = ObservationKey::from_degrees(-79.5, 8.98, date(1)).unwrap();
        let mut table = ObservationTable::new(
            "test",
            vec!["a".to_string(), ".geo".to_string(), "b".to_string()],
        )
        .with_rows(vec![ObservationRow::new(
            key,
            vec![Cell::Number(1.0), Cell::Text("{}".into()), Cell::Number(2.0)],
        )])
        .unwrap();

        let removed = table.drop_columns(&[".geo", "missing"]);
        assert_eq!(removed, vec![".geo".to_string()]);
        assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(table.number(0, "b"), Some(2.0));
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let key = ObservationKey::from_degrees(-79.5, 8.98, date(1)).unwrap();
        let mut table = ObservationTable::new("test", vec!["a".to_string()]);
        assert!(table
            .push_row(ObservationRow::new(key, vec![]))
            .is_err());
    }

    #[test]
    fn test_require_column_names_the_column() {
        let table = ObservationTable::new("source A", vec![]);
        let err = table.require_column("date").unwrap_err();
        assert!(err.to_string().contains("'date'"));
        assert!(err.to_string().contains("source A"));
    }
}
