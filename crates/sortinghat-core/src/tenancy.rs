//! Multi-tenant routing.
//!
//! A request carries an opaque header value. Together with the authenticated
//! user it selects a logical database through the `tenants` table, which is
//! unique on `(user, header)`. Requests without a mapping go to the default
//! database.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{Result, store::Store};

/// One row of the `tenants` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
  pub user:     String,
  pub header:   String,
  pub database: String,
}

/// The database a request was routed to.
#[derive(Clone)]
pub struct Route<S> {
  pub database: String,
  pub store:    S,
}

/// Resolves the active database for a request.
pub trait Tenancy: Send + Sync + 'static {
  type Store: Store;

  fn route(
    &self,
    user: Option<&str>,
    header: Option<&str>,
  ) -> impl Future<Output = Result<Route<Self::Store>>> + Send;
}
