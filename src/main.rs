//! medialink - a local media gateway and link sync for an asset-manager library.

mod backend;
mod cli;
mod config;
mod core;
mod gateway;
mod library;
mod logger;
mod sync;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::AppConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    let shutdown = core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = AppConfig::load(&cli)?;
    if let Some(path) = &config.config_path {
        debug!("config"; "using {}", path.display());
    }

    match &cli.command {
        Commands::Serve { .. } => cli::serve::run_serve(&config, &shutdown),
        Commands::Latest => cli::serve::run_latest(&config),
        Commands::Sync { target, force } => cli::sync::run_sync(target, *force, &config),
        Commands::Retitle {
            target,
            link,
            name,
            ext,
        } => cli::sync::run_retitle(target, link, name.as_deref(), ext.as_deref(), &config),
        Commands::Unlink { target, link } => cli::sync::run_unlink(target, link),
        Commands::Edit { args } => cli::library::run_edit(args, &config),
        Commands::Search { terms, folders } => cli::library::run_search(terms, folders, &config),
    }
}
