use chrono::{Datelike, Local};
use std::path::PathBuf;

fn dated_output(stem: &str, extension: &str) -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!("{}-{:02}{:02}{:02}.{}", stem, year, month, day, extension);
    PathBuf::from("output").join(filename)
}

/// Generate default merged dataset filename: solar-merged-{YYMMDD}.{csv|parquet}
pub fn generate_default_merged_filename(extension: &str) -> PathBuf {
    dated_output("solar-merged", extension)
}

/// Generate default predictions filename: solar-predictions-{YYMMDD}.csv
pub fn generate_default_predictions_filename() -> PathBuf {
    dated_output("solar-predictions", "csv")
}

/// Generate default region statistics filename: solar-regions-{YYMMDD}.csv
pub fn generate_default_regions_filename() -> PathBuf {
    dated_output("solar-regions", "csv")
}
