pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processors;
pub mod readers;
pub mod sources;
pub mod utils;
pub mod writers;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
