//! Dossier subject intake service.
//!
//! Looks a person up in a sanctions registry and on the open web, grades
//! what comes back, and keeps an append-only audit trail of every run.

mod commands;
mod routes;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
