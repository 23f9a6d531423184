//! Core types and trait definitions for the SortingHat identity registry.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the data model, the error taxonomy, the identity hasher, the enrollment
//! period algebra, and the store abstraction every other crate builds on.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod context;
pub mod error;
pub mod hash;
pub mod journal;
pub mod model;
pub mod period;
pub mod store;
pub mod tenancy;

pub use context::Ctx;
pub use error::{Error, Result};
pub use period::Period;
