//! JSON REST API for SortingHat.
//!
//! Exposes an axum [`Router`] over the identity and affiliation engines.
//! Every request is authenticated (HTTP Basic, when accounts are configured)
//! and routed to its tenant database before the engine sees it.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::new(router, AuthConfig::new(users, "sortinghat-tenant"));
//! axum::serve(listener, sortinghat_api::api_router(state)).await?;
//! ```

pub mod auth;
pub mod countries;
pub mod error;
pub mod identities;
pub mod individuals;
pub mod journal;
pub mod organizations;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use sortinghat_core::{store::PageRequest, tenancy::Tenancy};

pub use auth::{AuthConfig, Caller, Credential};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<T> {
  pub tenancy: Arc<T>,
  pub auth:    Arc<AuthConfig>,
}

impl<T> AppState<T> {
  pub fn new(tenancy: T, auth: AuthConfig) -> Self {
    Self { tenancy: Arc::new(tenancy), auth: Arc::new(auth) }
  }
}

impl<T> Clone for AppState<T> {
  fn clone(&self) -> Self {
    Self { tenancy: Arc::clone(&self.tenancy), auth: Arc::clone(&self.auth) }
  }
}

// ─── Shared payloads ──────────────────────────────────────────────────────────

/// `?page=<n>&page_size=<n>` on every listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

impl From<&PageParams> for PageRequest {
  fn from(p: &PageParams) -> Self { PageRequest::new(p.page, p.page_size) }
}

/// Body returned by mutations that answer with an individual key.
#[derive(Debug, Serialize, Deserialize)]
pub struct UuidBody {
  pub uuid: String,
}

/// Body returned by mutations that answer with an entity name.
#[derive(Debug, Serialize, Deserialize)]
pub struct NameBody {
  pub name: String,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
pub fn api_router<T: Tenancy>(state: AppState<T>) -> Router<()> {
  Router::new()
    // Identities
    .route("/identities", post(identities::create::<T>))
    .route("/identities/{uuid}", delete(identities::delete_one::<T>))
    .route("/identities/{uuid}/move", post(identities::move_one::<T>))
    // Individuals
    .route("/individuals", get(individuals::list::<T>))
    .route("/individuals/merge", post(individuals::merge::<T>))
    .route("/individuals/unmerge", post(individuals::unmerge::<T>))
    .route("/individuals/affiliate", post(individuals::affiliate::<T>))
    .route("/individuals/{uuid}", get(individuals::get_one::<T>))
    .route("/individuals/{uuid}/lock", post(individuals::lock::<T>))
    .route("/individuals/{uuid}/unlock", post(individuals::unlock::<T>))
    .route("/individuals/{uuid}/profile", patch(individuals::update_profile::<T>))
    .route("/individuals/{uuid}/enroll", post(individuals::enroll::<T>))
    .route("/individuals/{uuid}/withdraw", post(individuals::withdraw::<T>))
    .route("/individuals/{uuid}/enrollment", post(individuals::update_enrollment::<T>))
    // Organizations
    .route("/organizations", get(organizations::list::<T>).post(organizations::create::<T>))
    .route(
      "/organizations/{name}",
      get(organizations::get_one::<T>).delete(organizations::delete_one::<T>),
    )
    .route("/organizations/{name}/domains", post(organizations::add_domain::<T>))
    .route("/organizations/{name}/aliases", post(organizations::add_alias::<T>))
    .route("/organizations/{name}/teams", post(organizations::add_team::<T>))
    .route("/organizations/{name}/teams/{team}", delete(organizations::delete_team::<T>))
    .route("/domains/{domain}", delete(organizations::delete_domain::<T>))
    .route("/aliases/{alias}", delete(organizations::delete_alias::<T>))
    // Reference data and journal
    .route("/countries", get(countries::list::<T>))
    .route("/transactions", get(journal::transactions::<T>))
    .route("/transactions/{tuid}/operations", get(journal::operations::<T>))
    .with_state(state)
}
