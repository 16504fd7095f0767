use crate::cli::args::{Cli, Commands, LagArg, OutputFormat};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::inference::InferenceAdapter;
use crate::processors::{ColumnCleaner, FeatureEngineer, JoinEngine, OverlapChecker, RegionAggregator};
use crate::readers::{ConcurrentReader, SourcePaths};
use crate::sources::{ClimateVariable, CoverageScanner, PredictionWorker};
use crate::utils::filename::{
    generate_default_merged_filename, generate_default_predictions_filename,
    generate_default_regions_filename,
};
use crate::utils::coordinates::validate_panama_coordinates;
use crate::utils::progress::ProgressReporter;
use crate::writers::CsvWriter;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{warn, Level};

/// Install the global subscriber. `--log-file` writes plain text to the file
/// instead of stderr.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| PipelineError::Config(format!("Failed to initialise logging: {}", e)))
}

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Merge {
            source_a,
            source_b,
            source_c,
            output_file,
            format,
            compression,
            keep_suffixed,
        } => {
            let paths = resolve_sources(&config, source_a, source_b, source_c)?;
            println!("Merging climate sources...");
            println!("Source A: {}", paths.source_a.display());
            println!("Source B: {}", paths.source_b.display());
            println!("Source C: {}", paths.source_c.display());

            let progress = ProgressReporter::spinner("Reading sources...", false);
            let sources = ConcurrentReader::new(config.dataset_reader())
                .read_sources(&paths)
                .await?;

            progress.println(&format!(
                "Loaded {} / {} / {} rows",
                sources.a.table.len(),
                sources.b.table.len(),
                sources.c.table.len()
            ));
            progress.set_message("Joining on (lon, lat, date)...");
            let engine = if keep_suffixed {
                JoinEngine::with_drop_suffixed_duplicates(false)
            } else {
                config.join_engine()
            };
            let merged = engine.join_all(&sources.a.table, &sources.b.table, &sources.c.table)?;
            progress.finish(&format!(
                "Merged {} rows, {} columns",
                merged.len(),
                merged.columns.len()
            ));

            if merged.is_empty() {
                let checker = OverlapChecker::new();
                println!("\n{}", checker.generate_summary(&checker.check_overlap(&sources)));
            }

            let output_file =
                output_file.unwrap_or_else(|| generate_default_merged_filename(format.extension()));
            match format {
                OutputFormat::Csv => {
                    CsvWriter::new().write_table_file(&merged, &output_file)?;
                }
                OutputFormat::Parquet => {
                    let mut writer = config.parquet_writer()?;
                    if let Some(compression) = compression {
                        writer = writer.with_compression(&compression)?;
                    }

                    // Create output directory if it doesn't exist
                    if let Some(parent) = output_file.parent() {
                        std::fs::create_dir_all(parent)?;
                    }

                    writer.write_table(&merged, &output_file)?;
                    let file_info = writer.get_file_info(&output_file)?;
                    println!("\n{}", file_info.summary());
                }
            }

            println!("Merged dataset written to {}", output_file.display());
        }

        Commands::Clean {
            input_file,
            output_file,
            columns,
        } => {
            println!("Cleaning {}...", input_file.display());
            let mut table = config
                .dataset_reader()
                .read_source(&input_file, &source_label(&input_file))?
                .table;

            let cleaner = if columns.is_empty() {
                ColumnCleaner::new()
            } else {
                ColumnCleaner::with_columns(columns)
            };
            let dropped = cleaner.clean(&mut table);

            if dropped.is_empty() {
                println!("No redundant columns found");
            } else {
                println!("Dropped columns: {}", dropped.join(", "));
            }

            CsvWriter::new().write_table_file(&table, &output_file)?;
            println!("Cleaned dataset written to {}", output_file.display());
        }

        Commands::Diagnose {
            source_a,
            source_b,
            source_c,
        } => {
            let paths = resolve_sources(&config, source_a, source_b, source_c)?;
            let progress = ProgressReporter::spinner("Reading sources...", false);
            let sources = ConcurrentReader::new(config.dataset_reader())
                .read_sources(&paths)
                .await?;
            progress.finish("Sources loaded");

            let checker = OverlapChecker::new();
            let report = checker.check_overlap(&sources);
            println!("\n{}", checker.generate_summary(&report));
        }

        Commands::Features {
            input_file,
            output_file,
            lag,
            drop_incomplete,
            max_workers,
        } => {
            let table = config
                .dataset_reader()
                .read_source(&input_file, &source_label(&input_file))?
                .table;

            let progress = ProgressReporter::spinner("Engineering features...", false);
            let features =
                feature_engineer(&config, lag, drop_incomplete, max_workers).engineer_table(&table)?;
            progress.finish(&format!(
                "Engineered {} of {} rows",
                features.len(),
                table.len()
            ));

            CsvWriter::new().write_features_file(&features, &output_file)?;
            println!("Features written to {}", output_file.display());
        }

        Commands::Predict {
            input_file,
            output_file,
            lag,
            drop_incomplete,
            max_workers,
        } => {
            let adapter = InferenceAdapter::load(&config.artifact_paths())?;
            let table = config
                .dataset_reader()
                .read_source(&input_file, &source_label(&input_file))?
                .table;

            let progress = ProgressReporter::spinner("Engineering features...", false);
            let features =
                feature_engineer(&config, lag, drop_incomplete, max_workers).engineer_table(&table)?;

            progress.set_message("Running model...");
            let predictions = adapter.predict_features(&features)?;
            progress.finish(&format!("Predicted {} rows", predictions.len()));

            if !predictions.is_empty() {
                let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;
                println!("Mean predicted radiation: {:.1}", mean);
            }

            let output_file = output_file.unwrap_or_else(generate_default_predictions_filename);
            CsvWriter::new().write_predictions_file(&table, &features, &predictions, &output_file)?;
            println!("Predictions written to {}", output_file.display());
        }

        Commands::PredictPoint {
            lon,
            lat,
            date,
            json,
        } => {
            if let Err(e) = validate_panama_coordinates(lon, lat) {
                warn!("{}; the model was trained on Panama only", e);
            }
            let builder = config.point_feature_builder()?;
            let date = builder.resolve_date(date.as_deref())?;
            let adapter = InferenceAdapter::load(&config.artifact_paths())?;

            let progress = ProgressReporter::spinner("Fetching climate data...", json);
            let mut worker = PredictionWorker::spawn(builder, adapter)?;
            worker.submit(lon, lat, Some(date))?;
            let result = worker.recv()?;
            worker.shutdown()?;
            progress.finish("Prediction ready");

            let prediction = result.outcome?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else {
                println!("Point: ({}, {}) on {}", lon, lat, date);
                for (variable, value) in &prediction.features.variables {
                    println!("  {:<32} {:.4}", variable.to_string(), value);
                }
                println!(
                    "Observed radiation: {:.1}",
                    prediction.features.observed_radiation
                );
                println!("Predicted radiation: {:.1}", prediction.prediction);
            }
        }

        Commands::Scan {
            step,
            variable,
            date,
        } => {
            let variable: ClimateVariable = variable.parse()?;
            let builder = config.point_feature_builder()?;
            let date = builder.resolve_date(date.as_deref())?;
            let scanner = CoverageScanner::new()
                .with_step(step)
                .with_variable(variable);

            let progress = ProgressReporter::spinner("Scanning grid...", false);
            let report = scanner.scan(builder.fetcher(), date)?;
            progress.finish(&format!("Scanned {} points", report.total_points));

            println!("\n{}", report.generate_summary());
        }

        Commands::Aggregate {
            input_file,
            boundaries,
            output_file,
        } => {
            let boundaries_path = boundaries
                .or_else(|| config.regions.boundaries.clone())
                .ok_or_else(|| {
                    PipelineError::Config(
                        "No boundaries file; pass --boundaries or set regions.boundaries"
                            .to_string(),
                    )
                })?;

            let boundaries = config.boundary_reader().read_boundaries(&boundaries_path)?;
            let table = config
                .dataset_reader()
                .read_source(&input_file, &source_label(&input_file))?
                .table;

            let aggregator =
                RegionAggregator::new(boundaries).with_variables(config.regions.variables.clone());
            let report = aggregator.aggregate(&table);

            let covered = report.regions.iter().filter(|r| r.has_observations()).count();
            println!(
                "{} regions, {} with observations, {} rows outside every region",
                report.regions.len(),
                covered,
                report.unmatched_rows
            );

            let output_file = output_file.unwrap_or_else(generate_default_regions_filename);
            CsvWriter::new().write_regions_file(&report, &output_file)?;
            println!("Region statistics written to {}", output_file.display());
        }
    }

    Ok(())
}

/// CLI paths override configured ones
fn resolve_sources(
    config: &PipelineConfig,
    source_a: Option<PathBuf>,
    source_b: Option<PathBuf>,
    source_c: Option<PathBuf>,
) -> Result<SourcePaths> {
    let mut config = config.clone();
    let sources = &mut config.sources;
    sources.source_a = source_a.or(sources.source_a.take());
    sources.source_b = source_b.or(sources.source_b.take());
    sources.source_c = source_c.or(sources.source_c.take());
    config.source_paths()
}

fn feature_engineer(
    config: &PipelineConfig,
    lag: Option<LagArg>,
    drop_incomplete: bool,
    max_workers: Option<usize>,
) -> FeatureEngineer {
    let mut engineer = config.feature_engineer();
    if let Some(lag) = lag {
        engineer = engineer.with_lag_strategy(lag.into());
    }
    if drop_incomplete {
        engineer = engineer.with_drop_incomplete(true);
    }
    if let Some(max_workers) = max_workers {
        engineer = engineer.with_max_workers(max_workers);
    }
    engineer
}

fn source_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
