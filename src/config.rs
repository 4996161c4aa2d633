use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{QueryOptions, RetryPolicy};
use crate::problems::{ProblemSource, PAGE_SIZE};

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub problems: ProblemsConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

/// Query cache timing, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub stale_time_secs: u64,
  pub gc_time_secs: u64,
  pub query_retries: u32,
  pub mutation_retries: u32,
  pub refetch_on_reconnect: bool,
  pub refetch_on_window_focus: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let defaults = QueryOptions::default();
    Self {
      stale_time_secs: defaults.stale_time.as_secs(),
      gc_time_secs: defaults.gc_time.as_secs(),
      query_retries: defaults.retry.max_retries,
      mutation_retries: defaults.mutation_retry.max_retries,
      refetch_on_reconnect: defaults.refetch_on_reconnect,
      refetch_on_window_focus: defaults.refetch_on_window_focus,
    }
  }
}

impl CacheConfig {
  pub fn query_options(&self) -> QueryOptions {
    QueryOptions {
      stale_time: Duration::from_secs(self.stale_time_secs),
      gc_time: Duration::from_secs(self.gc_time_secs),
      retry: RetryPolicy::new(self.query_retries),
      mutation_retry: RetryPolicy::new(self.mutation_retries),
      refetch_on_reconnect: self.refetch_on_reconnect,
      refetch_on_window_focus: self.refetch_on_window_focus,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProblemsConfig {
  /// CSV with `ID,Title,Rating,Tags`; the bundled sample is used when unset
  pub csv: Option<PathBuf>,
  pub page_size: usize,
}

impl Default for ProblemsConfig {
  fn default() -> Self {
    Self {
      csv: None,
      page_size: PAGE_SIZE,
    }
  }
}

impl ProblemsConfig {
  pub fn source(&self) -> ProblemSource {
    ProblemSource::from_path(self.csv.clone())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./devdecks.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/devdecks/config.yaml
  ///
  /// With no file found, defaults are used. `DEVDECKS_API_URL` overrides `api.url`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("DEVDECKS_API_URL") {
      if !url.trim().is_empty() {
        config.api.url = url;
      }
    }
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("devdecks.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("devdecks").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn validate(&self) -> Result<()> {
    if self.problems.page_size == 0 {
      return Err(eyre!("problems.page_size must be at least 1"));
    }
    if self.cache.gc_time_secs < self.cache.stale_time_secs {
      tracing::warn!(
        stale = self.cache.stale_time_secs,
        gc = self.cache.gc_time_secs,
        "gc_time_secs is shorter than stale_time_secs"
      );
    }
    Ok(())
  }

  /// Get the API token from the environment, if any.
  ///
  /// Checks DEVDECKS_API_TOKEN. It is sent as a bearer token as-is.
  pub fn get_api_token() -> Option<String> {
    std::env::var("DEVDECKS_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
