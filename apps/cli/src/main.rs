//! newsreader CLI: collect news articles, enrich them, and archive them.
//!
//! Each stage runs as its own command and hands articles to the next one
//! through the local event log.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
