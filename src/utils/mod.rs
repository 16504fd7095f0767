pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use coordinates::{haversine_distance_m, round_coordinate};
pub use filename::{
    generate_default_merged_filename, generate_default_predictions_filename,
    generate_default_regions_filename,
};
pub use progress::ProgressReporter;
