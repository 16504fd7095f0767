use crate::models::ObservationTable;
use crate::utils::constants::REDUNDANT_COLUMNS;
use tracing::info;

/// Removes duplicated measurement columns left over from the merge
pub struct ColumnCleaner {
    columns: Vec<String>,
}

impl ColumnCleaner {
    pub fn new() -> Self {
        Self {
            columns: REDUNDANT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Drop the configured columns that are present. Returns the dropped names.
    pub fn clean(&self, table: &mut ObservationTable) -> Vec<String> {
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let dropped = table.drop_columns(&names);
        info!(dropped = ?dropped, remaining = table.columns.len(), "Cleaned columns");
        dropped
    }
}

impl Default for ColumnCleaner {
    fn default() -> Self {
        Self::new()
    }
}
