use serde::{Deserialize, Serialize};

/// Aggregated statistics for one boundary region. `values` follows the
/// aggregator's variable order; every entry is already filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStatistics {
    pub region_id: String,
    pub province: Option<String>,
    pub district: Option<String>,
    /// Number of observation rows attributed to the region
    pub observations: usize,
    pub values: Vec<f64>,
}

impl RegionStatistics {
    pub fn has_observations(&self) -> bool {
        self.observations > 0
    }
}
