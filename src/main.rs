use clap::Parser;
use solar_pipeline::cli::{run, Cli};
use solar_pipeline::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
