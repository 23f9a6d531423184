//! SQLite backend for the SortingHat identity registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each [`SqliteStore`] is one logical
//! database; [`TenantRouter`] maps tenants onto several of them.

mod encode;
mod schema;
mod store;
mod tenancy;
mod unit;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
pub use tenancy::TenantRouter;

#[cfg(test)]
mod tests;
