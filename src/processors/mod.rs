pub mod column_cleaner;
pub mod feature_engineer;
pub mod join_engine;
pub mod overlap_checker;
pub mod region_aggregator;

pub use column_cleaner::ColumnCleaner;
pub use feature_engineer::{FeatureEngineer, LagStrategy};
pub use join_engine::{inner_join, JoinEngine, PairJoin};
pub use overlap_checker::{OverlapChecker, OverlapReport, SourceKeyStatistics};
pub use region_aggregator::{RegionAggregator, RegionReport, DEFAULT_REGION_VARIABLES};
