use crate::processors::LagStrategy;
use crate::utils::constants::DEFAULT_SCAN_STEP;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "solar-pipeline")]
#[command(about = "Merge Panama climate datasets and predict net surface solar radiation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LagArg {
    /// Previous calendar day at the same location
    Partition,
    /// Previous row of the sorted table (legacy training behaviour)
    RowShift,
}

impl From<LagArg> for LagStrategy {
    fn from(arg: LagArg) -> Self {
        match arg {
            LagArg::Partition => LagStrategy::PartitionByLocation,
            LagArg::RowShift => LagStrategy::RowShift,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Join the three source tables on (lon, lat, date)
    Merge {
        #[arg(long, help = "First source CSV (suffix _dt1)")]
        source_a: Option<PathBuf>,

        #[arg(long, help = "Second source CSV (suffix _dt2)")]
        source_b: Option<PathBuf>,

        #[arg(long, help = "Third source CSV, wins column collisions")]
        source_c: Option<PathBuf>,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/solar-merged-{YYMMDD}.{csv|parquet}]"
        )]
        output_file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,

        #[arg(short, long, help = "Parquet compression [default: from config]")]
        compression: Option<String>,

        #[arg(long, help = "Keep the _dt1/_dt2 columns of the first join")]
        keep_suffixed: bool,
    },

    /// Drop redundant measurement columns from a merged table
    Clean {
        #[arg(short, long)]
        input_file: PathBuf,

        #[arg(short, long)]
        output_file: PathBuf,

        #[arg(long, value_delimiter = ',', help = "Columns to drop [default: built-in list]")]
        columns: Vec<String>,
    },

    /// Report key overlap between the three sources
    Diagnose {
        #[arg(long)]
        source_a: Option<PathBuf>,

        #[arg(long)]
        source_b: Option<PathBuf>,

        #[arg(long)]
        source_c: Option<PathBuf>,
    },

    /// Engineer the 16 model features for a merged table
    Features {
        #[arg(short, long)]
        input_file: PathBuf,

        #[arg(short, long)]
        output_file: PathBuf,

        #[arg(long, value_enum)]
        lag: Option<LagArg>,

        #[arg(long, help = "Drop rows with missing features instead of zero-filling")]
        drop_incomplete: bool,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Score every row of a merged table with the trained model
    Predict {
        #[arg(short, long)]
        input_file: PathBuf,

        #[arg(
            short,
            long,
            help = "Predictions CSV [default: output/solar-predictions-{YYMMDD}.csv]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, value_enum)]
        lag: Option<LagArg>,

        #[arg(long)]
        drop_incomplete: bool,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Predict radiation for one point from the configured climate tables
    PredictPoint {
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(short, long, help = "ISO date [default: today minus the data delay]")]
        date: Option<String>,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    /// Scan a grid over Panama and report where the climate source has data
    Scan {
        #[arg(long, default_value_t = DEFAULT_SCAN_STEP, help = "Grid step in degrees")]
        step: f64,

        #[arg(long, default_value = "elevation", help = "Variable to probe each point with")]
        variable: String,

        #[arg(short, long, help = "ISO date [default: today minus the data delay]")]
        date: Option<String>,
    },

    /// Average predictions per boundary region for the choropleth
    Aggregate {
        #[arg(short, long, help = "Predictions CSV")]
        input_file: PathBuf,

        #[arg(short, long, help = "GeoJSON boundaries [default: from config]")]
        boundaries: Option<PathBuf>,

        #[arg(
            short,
            long,
            help = "Region statistics CSV [default: output/solar-regions-{YYMMDD}.csv]"
        )]
        output_file: Option<PathBuf>,
    },
}
