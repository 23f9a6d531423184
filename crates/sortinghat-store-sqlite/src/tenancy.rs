//! [`TenantRouter`] maps `(user, header)` pairs onto SQLite databases.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use tokio::sync::RwLock;

use sortinghat_core::{
  self as core,
  tenancy::{Route, Tenancy},
};

use crate::SqliteStore;

/// Routes requests to one of several [`SqliteStore`]s.
///
/// The default database owns the `tenants` table. Other databases are either
/// registered up front or opened on first use from `<data_dir>/<name>.db`.
pub struct TenantRouter {
  default_name: String,
  default:      SqliteStore,
  data_dir:     Option<PathBuf>,
  stores:       RwLock<HashMap<String, SqliteStore>>,
}

impl TenantRouter {
  pub fn new(default_name: impl Into<String>, default: SqliteStore) -> Self {
    Self {
      default_name: default_name.into(),
      default,
      data_dir: None,
      stores: RwLock::new(HashMap::new()),
    }
  }

  /// Open unknown databases lazily from files under `dir`.
  pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.data_dir = Some(dir.as_ref().to_path_buf());
    self
  }

  /// Make `store` reachable under `name`, replacing any previous mapping.
  pub async fn register(&self, name: impl Into<String>, store: SqliteStore) {
    self.stores.write().await.insert(name.into(), store);
  }

  /// The database holding the `tenants` table.
  pub fn default_store(&self) -> &SqliteStore { &self.default }

  pub fn default_name(&self) -> &str { &self.default_name }

  /// The store for logical database `name`, opening it if needed.
  pub async fn store(&self, name: &str) -> core::Result<SqliteStore> {
    if name == self.default_name {
      return Ok(self.default.clone());
    }
    if let Some(store) = self.stores.read().await.get(name) {
      return Ok(store.clone());
    }

    let Some(dir) = &self.data_dir else {
      return Err(core::Error::not_found("database", name));
    };
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
      return Err(core::Error::invalid(format!("invalid database name {name:?}")));
    }

    let mut stores = self.stores.write().await;
    if let Some(store) = stores.get(name) {
      return Ok(store.clone());
    }
    let path = dir.join(format!("{name}.db"));
    tracing::info!(database = name, path = %path.display(), "opening tenant database");
    let store = SqliteStore::open(&path).await?;
    stores.insert(name.to_owned(), store.clone());
    Ok(store)
  }
}

impl Tenancy for TenantRouter {
  type Store = SqliteStore;

  async fn route(&self, user: Option<&str>, header: Option<&str>) -> core::Result<Route<SqliteStore>> {
    let mapped = match (user, header) {
      (Some(user), Some(header)) => self.default.find_tenant(user, header).await?,
      _ => None,
    };
    if header.is_some() && mapped.is_none() {
      tracing::debug!(user, header, "no tenant mapping, using default database");
    }

    let database = mapped.unwrap_or_else(|| self.default_name.clone());
    let store = self.store(&database).await?;
    Ok(Route { database, store })
  }
}
