use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::web;
use clap::Parser;

mod config;
mod error;
mod extractor;
mod handlers;
mod server;
mod state;
mod stream;
mod util;
mod workspace;

use crate::config::AppConfig;
use crate::extractor::YtDlp;
use crate::state::AppState;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Debug, Parser)]
#[command(name = "media-fetch-service", version, about = "Download a video by URL and stream it back as mp4")]
struct Cli {
    /// TOML config file (default: ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `listen_addr` from the config
    #[arg(long)]
    listen: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::load(DEFAULT_CONFIG),
        None => Ok(AppConfig::default()),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let mut cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[CONFIG] Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }

    println!("========================================");
    println!("  Media Fetch Service");
    println!("  http://{}", cfg.listen_addr);
    println!("========================================");
    println!();

    let config = Arc::new(cfg);
    let state = web::Data::new(AppState {
        extractor: Arc::new(YtDlp::new(config.clone())),
        config,
    });

    let bind_addr = state.config.listen_addr.clone();
    server::run(state, &bind_addr).await
}
