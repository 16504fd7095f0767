use crate::error::Result;
use crate::models::{ObservationRow, ObservationTable};
use crate::utils::constants::{SUFFIX_SOURCE_A, SUFFIX_SOURCE_B};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Output of a single pairwise inner join
#[derive(Debug, Clone)]
pub struct PairJoin {
    pub table: ObservationTable,
    /// Column names that were renamed because both sides carried them
    pub suffixed: Vec<String>,
}

/// Aligns sources on `(lon, lat, date)` with strict inner-join semantics.
///
/// Keys are typed, so a source without coordinates or dates never reaches the
/// engine: the reader rejects it with a missing-column error.
pub struct JoinEngine {
    drop_suffixed_duplicates: bool,
}

impl JoinEngine {
    pub fn new() -> Self {
        Self {
            drop_suffixed_duplicates: true,
        }
    }

    pub fn with_drop_suffixed_duplicates(drop_suffixed_duplicates: bool) -> Self {
        Self {
            drop_suffixed_duplicates,
        }
    }

    /// Join three sources. `c` wins every column collision with the A/B join.
    pub fn join_all(
        &self,
        a: &ObservationTable,
        b: &ObservationTable,
        c: &ObservationTable,
    ) -> Result<ObservationTable> {
        let PairJoin {
            table: mut ab,
            suffixed,
        } = inner_join(a, b, SUFFIX_SOURCE_A, SUFFIX_SOURCE_B, "merged")?;
        debug!(rows = ab.len(), suffixed = ?suffixed, "Joined first two sources");

        if self.drop_suffixed_duplicates {
            let names: Vec<&str> = suffixed.iter().map(String::as_str).collect();
            ab.drop_columns(&names);
        }

        // C's columns take precedence
        let conflicts: Vec<String> = ab
            .columns
            .iter()
            .filter(|column| c.has_column(column))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            let names: Vec<&str> = conflicts.iter().map(String::as_str).collect();
            ab.drop_columns(&names);
            debug!(columns = ?conflicts, "Dropped columns superseded by the third source");
        }

        let PairJoin {
            table: mut merged, ..
        } = inner_join(&ab, c, "", "", "merged")?;

        merged.sort_by_key();
        self.log_result(&merged);
        Ok(merged)
    }

    /// Simplified variant: one pairwise join, overlapping columns kept with
    /// source suffixes
    pub fn join_pair(
        &self,
        a: &ObservationTable,
        b: &ObservationTable,
    ) -> Result<ObservationTable> {
        let PairJoin {
            table: mut joined, ..
        } = inner_join(a, b, SUFFIX_SOURCE_A, SUFFIX_SOURCE_B, "merged")?;
        joined.sort_by_key();
        self.log_result(&joined);
        Ok(joined)
    }

    fn log_result(&self, table: &ObservationTable) {
        if table.is_empty() {
            warn!("Join produced no rows; no key triple is present in every source");
        } else {
            info!(rows = table.len(), columns = table.columns.len(), "Join complete");
        }
    }
}

impl Default for JoinEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner join on the key triple. Left rows keep their order; each left row is
/// paired with every matching right row in right order. Columns present on
/// both sides get the given suffixes.
pub fn inner_join(
    left: &ObservationTable,
    right: &ObservationTable,
    left_suffix: &str,
    right_suffix: &str,
    name: &str,
) -> Result<PairJoin> {
    let right_names: HashSet<&str> = right.columns.iter().map(String::as_str).collect();
    let overlap: HashSet<&str> = left
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| right_names.contains(c))
        .collect();

    let rename = |column: &String, suffix: &str| {
        if overlap.contains(column.as_str()) {
            format!("{}{}", column, suffix)
        } else {
            column.clone()
        }
    };

    let mut columns: Vec<String> = left.columns.iter().map(|c| rename(c, left_suffix)).collect();
    columns.extend(right.columns.iter().map(|c| rename(c, right_suffix)));

    let mut suffixed = Vec::new();
    for column in &left.columns {
        if overlap.contains(column.as_str()) {
            suffixed.push(rename(column, left_suffix));
            suffixed.push(rename(column, right_suffix));
        }
    }

    let right_index = right.index_by_key();
    let mut table = ObservationTable::new(name, columns);

    for left_row in &left.rows {
        let Some(matches) = right_index.get(&left_row.key) else {
            continue;
        };
        for &position in matches {
            let mut values = left_row.values.clone();
            values.extend(right.rows[position].values.iter().cloned());
            table.push_row(ObservationRow::new(left_row.key, values))?;
        }
    }

    Ok(PairJoin { table, suffixed })
}
