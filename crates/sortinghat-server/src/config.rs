//! Server configuration: an optional TOML file under `SORTINGHAT_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use sortinghat_api::Credential;

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  /// One SQLite file per logical database lives here.
  pub data_dir:         PathBuf,
  pub default_database: String,
  pub tenant_header:    String,
  /// API accounts; none means the API is open.
  #[serde(default)]
  pub users:            Vec<Credential>,
}

impl ServerConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8000)?
      .set_default("data_dir", "data")?
      .set_default("default_database", "default")?
      .set_default("tenant_header", "sortinghat-tenant")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SORTINGHAT"))
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.data_dir = expand_tilde(&cfg.data_dir);
    Ok(cfg)
  }

  /// Path of the SQLite file backing logical database `name`.
  pub fn database_path(&self, name: &str) -> PathBuf { self.data_dir.join(format!("{name}.db")) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
