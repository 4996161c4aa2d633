mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod problems;
mod query;
mod session;
mod ui;

use api::ApiClient;
use app::App;
use cache::QueryClient;
use clap::Parser;
use color_eyre::Result;
use config::Config;
use logging::{default_log_dir, init_logging};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "devdecks")]
#[command(about = "A terminal client for DevDecks flashcards and problem lists")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/devdecks/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// DevDecks API base URL, e.g. http://localhost:5000/api
  #[arg(long)]
  api_url: Option<String>,

  /// Problem list CSV (ID,Title,Rating,Tags)
  #[arg(short, long)]
  problems: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  if let Some(path) = args.problems {
    config.problems.csv = Some(path);
  }

  // Keep the guard alive so buffered log lines are flushed on exit
  let _log_guard = init_logging(&default_log_dir())?;
  info!(api = %config.api.url, "Starting devdecks");

  let api = ApiClient::new(&config.api.url, Config::get_api_token())?;
  let cache = QueryClient::new(config.cache.query_options());

  let mut app = App::new(&config, api, cache);
  app.run().await?;

  info!("Exiting");
  Ok(())
}
