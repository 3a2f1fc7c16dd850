//! crmsync CLI — reconcile a CRM export with web-form submissions.
//!
//! Fetches both sources, matches submissions to contacts, merges contact
//! history, classifies the latest message, and writes a sorted CSV.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
