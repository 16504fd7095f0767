use crate::models::ObservationKey;
use crate::readers::{LoadedSource, SourceSet};
use std::collections::BTreeSet;

/// Per-source key statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceKeyStatistics {
    pub name: String,
    pub total_rows: usize,
    pub dropped_geometry_rows: usize,
    pub unique_keys: usize,
}

/// How the three sources' join keys overlap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapReport {
    pub sources: [SourceKeyStatistics; 3],
    pub a_b: usize,
    pub a_c: usize,
    pub b_c: usize,
    pub all_three: usize,
}

impl OverlapReport {
    /// True when an inner join of all three sources would return no rows
    pub fn is_disjoint(&self) -> bool {
        self.all_three == 0
    }
}

pub struct OverlapChecker;

impl OverlapChecker {
    pub fn new() -> Self {
        Self
    }

    /// Count unique keys per source and the keys each pair shares
    pub fn check_overlap(&self, sources: &SourceSet) -> OverlapReport {
        let a = sources.a.table.unique_keys();
        let b = sources.b.table.unique_keys();
        let c = sources.c.table.unique_keys();

        let a_b: BTreeSet<ObservationKey> = a.intersection(&b).copied().collect();
        let all_three = a_b.intersection(&c).count();

        OverlapReport {
            sources: [
                statistics(&sources.a, a.len()),
                statistics(&sources.b, b.len()),
                statistics(&sources.c, c.len()),
            ],
            a_b: a_b.len(),
            a_c: a.intersection(&c).count(),
            b_c: b.intersection(&c).count(),
            all_three,
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &OverlapReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Key Overlap Report ===\n");
        for source in &report.sources {
            summary.push_str(&format!(
                "{}: {} rows, {} dropped for geometry, {} unique keys\n",
                source.name, source.total_rows, source.dropped_geometry_rows, source.unique_keys
            ));
        }

        let [a, b, c] = &report.sources;
        summary.push_str(&format!("\n{} ∩ {}: {}\n", a.name, b.name, report.a_b));
        summary.push_str(&format!("{} ∩ {}: {}\n", a.name, c.name, report.a_c));
        summary.push_str(&format!("{} ∩ {}: {}\n", b.name, c.name, report.b_c));
        summary.push_str(&format!("All three: {}\n", report.all_three));

        if report.is_disjoint() {
            summary.push_str("\nNo key is present in every source; the merge will be empty.\n");
        }

        summary
    }
}

impl Default for OverlapChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn statistics(source: &LoadedSource, unique_keys: usize) -> SourceKeyStatistics {
    SourceKeyStatistics {
        name: source.table.name.clone(),
        total_rows: source.stats.total_rows,
        dropped_geometry_rows: source.stats.dropped_rows(),
        unique_keys,
    }
}
