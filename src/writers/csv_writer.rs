use crate::error::{PipelineError, Result};
use crate::models::{FeatureTable, ObservationKey, ObservationTable, FEATURE_COLUMNS};
use crate::processors::RegionReport;
use crate::utils::constants::{
    DATE_COLUMN, DISTRICT_PROPERTY, LAT_COLUMN, LON_COLUMN, PREDICTION_COLUMN, PROVINCE_PROPERTY,
    REGION_ID_PROPERTY,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Writes pipeline tables as CSV. Every table starts with `lon, lat, date`;
/// coordinates are printed from the fixed-point key so output is stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_table<W: Write>(&self, table: &ObservationTable, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(
            key_header().chain(table.columns.iter().map(String::as_str)),
        )?;

        for row in &table.rows {
            let mut record = key_fields(&row.key);
            record.extend(row.values.iter().map(|cell| cell.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_features<W: Write>(&self, features: &FeatureTable, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(key_header().chain(FEATURE_COLUMNS))?;

        for row in &features.rows {
            let mut record = key_fields(&row.key);
            record.extend(row.record.to_array().iter().map(f64::to_string));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Merged columns, then the 16 features, then `radiation_pred`.
    ///
    /// Merged columns sharing a feature name are replaced by the engineered
    /// value, so each name appears once.
    pub fn write_predictions<W: Write>(
        &self,
        table: &ObservationTable,
        features: &FeatureTable,
        predictions: &[f64],
        writer: W,
    ) -> Result<()> {
        if predictions.len() != features.len() {
            return Err(PipelineError::FeatureMismatch(format!(
                "{} predictions for {} feature rows",
                predictions.len(),
                features.len()
            )));
        }

        let kept: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !FEATURE_COLUMNS.contains(&column.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(
            key_header()
                .chain(kept.iter().map(|&i| table.columns[i].as_str()))
                .chain(FEATURE_COLUMNS)
                .chain(std::iter::once(PREDICTION_COLUMN)),
        )?;

        for (feature_row, prediction) in features.rows.iter().zip(predictions) {
            let source = table.rows.get(feature_row.source_index).ok_or_else(|| {
                PipelineError::FeatureMismatch(format!(
                    "feature row points at missing table row {}",
                    feature_row.source_index
                ))
            })?;

            let mut record = key_fields(&feature_row.key);
            record.extend(kept.iter().map(|&i| source.values[i].to_string()));
            record.extend(feature_row.record.to_array().iter().map(f64::to_string));
            record.push(prediction.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// One row per region: `ID_CORR, Provincia, Corregimiento` then `v_filled`
    /// for each aggregated variable.
    pub fn write_regions<W: Write>(&self, report: &RegionReport, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec![
            REGION_ID_PROPERTY.to_string(),
            PROVINCE_PROPERTY.to_string(),
            DISTRICT_PROPERTY.to_string(),
        ];
        header.extend(report.variables.iter().map(|v| format!("{}_filled", v)));
        writer.write_record(&header)?;

        for region in &report.regions {
            let mut record = vec![
                region.region_id.clone(),
                region.province.clone().unwrap_or_default(),
                region.district.clone().unwrap_or_default(),
            ];
            record.extend(region.values.iter().map(f64::to_string));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_table_file(&self, table: &ObservationTable, path: &Path) -> Result<()> {
        self.write_table(table, create_output(path)?)?;
        info!(rows = table.len(), path = %path.display(), "Wrote CSV file");
        Ok(())
    }

    pub fn write_features_file(&self, features: &FeatureTable, path: &Path) -> Result<()> {
        self.write_features(features, create_output(path)?)?;
        info!(rows = features.len(), path = %path.display(), "Wrote features CSV");
        Ok(())
    }

    pub fn write_predictions_file(
        &self,
        table: &ObservationTable,
        features: &FeatureTable,
        predictions: &[f64],
        path: &Path,
    ) -> Result<()> {
        self.write_predictions(table, features, predictions, create_output(path)?)?;
        info!(rows = predictions.len(), path = %path.display(), "Wrote predictions CSV");
        Ok(())
    }

    pub fn write_regions_file(&self, report: &RegionReport, path: &Path) -> Result<()> {
        self.write_regions(report, create_output(path)?)?;
        info!(regions = report.regions.len(), path = %path.display(), "Wrote region statistics");
        Ok(())
    }
}

/// Open `path` for writing, creating missing parent directories
pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

fn key_header<'a>() -> impl Iterator<Item = &'a str> {
    [LON_COLUMN, LAT_COLUMN, DATE_COLUMN].into_iter()
}

fn key_fields(key: &ObservationKey) -> Vec<String> {
    vec![
        key.lon_degrees().to_string(),
        key.lat_degrees().to_string(),
        key.date.format("%Y-%m-%d").to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, FeatureRecord, FeatureRow, ObservationRow, RegionStatistics, FEATURE_COUNT};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn key() -> ObservationKey {
        ObservationKey::from_degrees(-79.5, 8.98, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
            .unwrap()
    }

    fn table() -> ObservationTable {
        ObservationTable::new(
            "merged",
            vec!["surface_pressure".to_string(), "note".to_string()],
        )
        .with_rows(vec![ObservationRow::new(
            key(),
            vec![Cell::Number(101000.0), Cell::Null],
        )])
        .unwrap()
    }

    fn features() -> FeatureTable {
        FeatureTable::new(vec![FeatureRow {
            source_index: 0,
            key: key(),
            target: None,
            record: FeatureRecord::from_array([1.5; FEATURE_COUNT]),
        }])
    }

    fn to_string(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_write_table() {
        let mut out = Vec::new();
        CsvWriter::new().write_table(&table(), &mut out).unwrap();

        assert_eq!(
            to_string(out),
            "lon,lat,date,surface_pressure,note\n-79.5,8.98,2025-01-15,101000,\n"
        );
    }

    #[test]
    fn test_features_header_follows_contract() {
        let mut out = Vec::new();
        CsvWriter::new().write_features(&features(), &mut out).unwrap();
        let text = to_string(out);
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();

        assert_eq!(&header[..3], &["lon", "lat", "date"]);
        assert_eq!(&header[3..], &FEATURE_COLUMNS[..]);
        assert!(text.lines().nth(1).unwrap().ends_with(",1.5"));
    }

    #[test]
    fn test_predictions_replace_feature_named_columns() {
        let mut out = Vec::new();
        CsvWriter::new()
            .write_predictions(&table(), &features(), &[123.25], &mut out)
            .unwrap();
        let text = to_string(out);
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();

        assert_eq!(header.len(), 3 + 1 + FEATURE_COUNT + 1);
        assert_eq!(header[3], "note");
        assert_eq!(header.iter().filter(|h| **h == "surface_pressure").count(), 1);
        assert_eq!(*header.last().unwrap(), "radiation_pred");
        assert!(text.lines().nth(1).unwrap().ends_with(",123.25"));
    }

    #[test]
    fn test_prediction_count_must_match() {
        let result = CsvWriter::new().write_predictions(&table(), &features(), &[], Vec::new());
        assert!(matches!(result, Err(PipelineError::FeatureMismatch(_))));
    }

    #[test]
    fn test_write_regions() {
        let report = RegionReport {
            variables: vec!["radiation_pred".to_string()],
            regions: vec![RegionStatistics {
                region_id: "80101".to_string(),
                province: Some("Panamá".to_string()),
                district: None,
                observations: 0,
                values: vec![2.5],
            }],
            unmatched_rows: 0,
        };
        let mut out = Vec::new();
        CsvWriter::new().write_regions(&report, &mut out).unwrap();

        assert_eq!(
            to_string(out),
            "ID_CORR,Provincia,Corregimiento,radiation_pred_filled\n80101,Panamá,,2.5\n"
        );
    }

    #[test]
    fn test_file_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("merged.csv");
        CsvWriter::new().write_table_file(&table(), &path).unwrap();

        assert!(fs::read_to_string(&path).unwrap().starts_with("lon,lat,date"));
    }
}
