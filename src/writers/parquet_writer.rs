use crate::error::{PipelineError, Result};
use crate::models::{Cell, ObservationTable};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DATE_COLUMN, DEFAULT_ROW_GROUP_SIZE, LAT_COLUMN, LON_COLUMN,
};
use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write an observation table: `lon, lat, date` then one column per value
    /// column. All-numeric columns become Float64, anything else Utf8.
    pub fn write_table(&self, table: &ObservationTable, path: &Path) -> Result<()> {
        let schema = self.create_schema(table);
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        for start in (0..table.len()).step_by(self.row_group_size.max(1)) {
            let end = (start + self.row_group_size.max(1)).min(table.len());
            let batch = self.rows_to_batch(table, start..end, schema.clone())?;
            writer.write(&batch)?;
        }

        writer.close()?;
        info!(rows = table.len(), path = %path.display(), "Wrote Parquet file");
        Ok(())
    }

    fn create_schema(&self, table: &ObservationTable) -> Arc<Schema> {
        let mut fields = vec![
            Field::new(LON_COLUMN, DataType::Float64, false),
            Field::new(LAT_COLUMN, DataType::Float64, false),
            Field::new(DATE_COLUMN, DataType::Date32, false),
        ];
        for (i, column) in table.columns.iter().enumerate() {
            let data_type = if is_numeric_column(table, i) {
                DataType::Float64
            } else {
                DataType::Utf8
            };
            fields.push(Field::new(column, data_type, true));
        }
        Arc::new(Schema::new(fields))
    }

    fn rows_to_batch(
        &self,
        table: &ObservationTable,
        range: std::ops::Range<usize>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let rows = &table.rows[range];

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|r| r.key.lon_degrees()),
            )),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|r| r.key.lat_degrees()),
            )),
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| Date32Type::from_naive_date(r.key.date)),
            )),
        ];

        for (i, field) in schema.fields().iter().skip(3).enumerate() {
            let array: ArrayRef = match field.data_type() {
                DataType::Float64 => Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.values[i].as_f64()).collect::<Vec<_>>(),
                )),
                _ => Arc::new(StringArray::from(
                    rows.iter()
                        .map(|r| match &r.values[i] {
                            Cell::Null => None,
                            cell => Some(cell.to_string()),
                        })
                        .collect::<Vec<_>>(),
                )),
            };
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Get information about a Parquet file
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            num_row_groups: metadata.num_row_groups(),
            num_columns: metadata.file_metadata().schema_descr().num_columns(),
            file_size: std::fs::metadata(path)?.len(),
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_numeric_column(table: &ObservationTable, index: usize) -> bool {
    table
        .rows
        .iter()
        .all(|row| matches!(row.values[index], Cell::Null | Cell::Number(_)))
}

#[derive(Debug, Clone)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub num_row_groups: usize,
    pub num_columns: usize,
    pub file_size: u64,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {}, Row Groups: {}, Columns: {}, Size: {:.2} MB",
            self.total_rows,
            self.num_row_groups,
            self.num_columns,
            self.file_size as f64 / 1_048_576.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationKey, ObservationRow};
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn table(rows: usize) -> ObservationTable {
        let rows = (0..rows)
            .map(|i| {
                let key = ObservationKey::from_degrees(
                    -79.5,
                    8.98,
                    NaiveDate::from_ymd_opt(2025, 1, 1 + i as u32).unwrap(),
                )
                .unwrap();
                ObservationRow::new(
                    key,
                    vec![
                        Cell::Number(i as f64),
                        if i == 0 { Cell::Null } else { Cell::Text("x".into()) },
                    ],
                )
            })
            .collect();
        ObservationTable::new(
            "merged",
            vec!["surface_pressure".to_string(), ".geo".to_string()],
        )
        .with_rows(rows)
        .unwrap()
    }

    #[test]
    fn test_write_empty_table() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        ParquetWriter::new().write_table(&table(0), temp_file.path())?;

        let info = ParquetWriter::new().get_file_info(temp_file.path())?;
        assert_eq!(info.total_rows, 0);
        assert_eq!(info.num_columns, 5);
        Ok(())
    }

    #[test]
    fn test_write_in_row_groups() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let writer = ParquetWriter::new().with_row_group_size(2);
        writer.write_table(&table(5), temp_file.path())?;

        let info = writer.get_file_info(temp_file.path())?;
        assert_eq!(info.total_rows, 5);
        assert_eq!(info.num_row_groups, 3);
        assert!(info.summary().contains("Rows: 5"));
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        for compression in ["snappy", "gzip", "lz4", "zstd", "none"] {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let temp_file = NamedTempFile::new()?;
            let result = writer.write_table(&table(2), temp_file.path());
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }

        assert!(ParquetWriter::new().with_compression("brotli9").is_err());
        Ok(())
    }

    #[test]
    fn test_column_types() {
        let schema = ParquetWriter::new().create_schema(&table(2));
        assert_eq!(schema.field(2).data_type(), &DataType::Date32);
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);
    }
}
