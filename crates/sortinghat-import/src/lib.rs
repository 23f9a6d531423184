//! Bulk import of identities and affiliations into SortingHat.
//!
//! Backends turn source documents (gitdm mapping files, git mailmaps) into
//! [`ImportData`]; [`load`] then reconciles that data with the registry
//! through regular engine operations, merging individuals whose identities
//! are already known.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn demo(ctx: sortinghat_core::Ctx<sortinghat_store_sqlite::SqliteStore>) {
//! use std::collections::BTreeMap;
//!
//! let params = BTreeMap::from([("domains_url".to_owned(), "domains.txt".to_owned())]);
//! let report = sortinghat_import::import(&ctx, "gitdm", "email-map.txt", &params).await.unwrap();
//! println!("{} identities added", report.identities_added);
//! # }
//! ```

mod backend;
pub mod error;
mod fetch;
pub mod gitdm;
mod load;
pub mod mailmap;
pub mod model;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

pub use backend::{Backend, BackendSpec, Documents, find_backends, open};
pub use error::{Error, Result};
pub use fetch::fetch;
pub use load::load;
pub use model::{ImportData, ImportIndividual, ImportReport};
use sortinghat_core::{Ctx, store::Store};
use tracing::info;

/// Fetch `location` with backend `name` and load what it yields.
pub async fn import<S: Store>(
  ctx: &Ctx<S>,
  name: &str,
  location: &str,
  params: &BTreeMap<String, String>,
) -> Result<ImportReport> {
  let backend = open(name, location, params).await?;
  let data = backend.read();
  info!(
    backend = backend.name(),
    %location,
    individuals = data.individuals.len(),
    organizations = data.organizations.len(),
    rejected = data.rejected.len(),
    "importing"
  );
  Ok(load(ctx, data).await?)
}
