pub mod boundary_reader;
pub mod concurrent_reader;
pub mod dataset_reader;
pub mod geometry;

pub use boundary_reader::{Boundary, BoundaryReader};
pub use concurrent_reader::{ConcurrentReader, SourcePaths, SourceSet};
pub use dataset_reader::{parse_date, DatasetReader, LoadedSource};
pub use geometry::{extract_coordinates, Coordinates, ExtractionStats};
