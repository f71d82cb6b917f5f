use std::path::PathBuf;

use clap::Parser;
use nr_client::NewsApp;
use nr_core::logging::init_tracing;
use nr_core::{AppConfig, Environment, LogLevel};
use tracing::info;

mod commands;
mod duration;

use commands::{handle_command, Commands};

#[derive(Parser, Debug)]
#[command(name = "news", author, version, about = "News reader client and mock API", long_about = None)]
pub struct Cli {
    /// Base URL of the news API
    #[arg(long, env = "NEWS_API_URL")]
    api_url: Option<String>,
    #[arg(long, default_value = "file", help = "Client storage backend: file (default), memory")]
    storage: String,
    #[arg(long, env = "NEWS_STORAGE_PATH")]
    storage_path: Option<PathBuf>,
    /// development or production
    #[arg(long, env = "NEWS_ENV")]
    env: Option<Environment>,
    #[arg(long, env = "NEWS_LOG_LEVEL")]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::from_env()?;
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url)?;
        }
        if let Some(path) = &self.storage_path {
            config.storage_path = path.clone();
        }
        if let Some(env) = self.env {
            config.environment = env;
        }
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    init_tracing(config.effective_log_level());

    if let Commands::Serve { addr, data_dir } = cli.command {
        info!("🗞️ Starting mock news API from {}", data_dir.display());
        return nr_web::run(nr_web::ServerConfig { addr, data_dir }).await;
    }

    let app = NewsApp::from_config(config, &cli.storage)?;
    info!("Using API at {}", app.config.api_base_url);
    let result = handle_command(cli.command, &app).await;
    app.shutdown();
    result
}
