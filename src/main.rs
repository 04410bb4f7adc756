// src/main.rs
mod bridge;
mod cli;
mod config;
mod error;
mod file_utils;
mod models;
mod results_parser;
mod tracking;
mod yaml_parser;

use anyhow::{Context, Result};
use bridge::run_bridge;
use clap::Parser;
use cli::Cli;
use config::load_config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // 加载配置文件，命令行参数覆盖
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    info!("Base directory: {}", config.general.base_dir);

    let mut store = tracking::open_store(&config.tracking.tracking_uri, config.tracking.user.as_deref())
        .with_context(|| format!("Failed to open tracking store: {}", config.tracking.tracking_uri))?;

    let summary = run_bridge(&config, store.as_mut())?;
    info!(
        "Run {} in experiment {}: {} params, {} metric values, {} artifact files",
        summary.run_id, summary.experiment_id, summary.params, summary.metrics, summary.artifacts
    );

    Ok(())
}
