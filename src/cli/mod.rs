pub mod args;
pub mod commands;

pub use args::{Cli, Commands, LagArg, OutputFormat};
pub use commands::{init_logging, run};
