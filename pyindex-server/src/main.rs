//! `pyindex` binary entry point.

use anyhow::Result;
use clap::Parser;
use pyindex_logging::{init_subscriber, LogSettings};
use pyindex_server::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_subscriber(&LogSettings::from_env());

    let cli = Cli::parse();
    cli::run(cli).await
}
