//! The SortingHat mutation algebra.
//!
//! Every public operation takes a [`Ctx`] and runs inside exactly one store
//! unit of work. Mutations journal one transaction plus an operation per
//! entity touched; reads journal nothing. Nothing here knows about HTTP or
//! SQLite.
//!
//! ```rust,ignore
//! let ctx = Ctx::new(store).with_principal("admin");
//! let id = sortinghat_engine::add_identity(&ctx, NewIdentity::new("scm").email("jsmith@example.com"), None).await?;
//! sortinghat_engine::enroll(&ctx, Enroll::new(&id, "Example")).await?;
//! ```

mod enrollments;
mod groups;
mod identities;
mod queries;
mod recommend;
mod resolve;
mod txn;

pub use enrollments::{Enroll, UpdateEnrollment, Withdraw, enroll, update_enrollment, withdraw};
pub use groups::{
  add_alias, add_domain, add_organization, add_team, delete_alias, delete_domain,
  delete_organization, delete_team,
};
pub use identities::{
  add_identity, delete_identity, lock, merge, move_identity, unlock, unmerge, update_profile,
};
pub use queries::{countries, individual, individuals, operations, organization, organizations, transactions};
pub use recommend::{AffiliationResult, DomainRecommender, Recommender, affiliate};
pub use sortinghat_core::{Ctx, Error, Result};
