use clap::Parser;
use quicktrack::cli::{self, Cli};
use quicktrack::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::run(cli).await
}
