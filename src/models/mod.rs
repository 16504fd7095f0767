pub mod features;
pub mod observation;
pub mod region;

pub use features::{FeatureInput, FeatureRecord, FeatureRow, FeatureTable, FEATURE_COLUMNS, FEATURE_COUNT};
pub use observation::{Cell, ObservationKey, ObservationRow, ObservationTable};
pub use region::RegionStatistics;
