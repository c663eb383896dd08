//! CLI entry point for the paper harvester.

use anyhow::Result;

mod app;
mod app_config;
mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    app::runtime::run_harvester().await
}
