//! The `Store` and `UnitOfWork` traits and supporting query types.
//!
//! A [`Store`] hands out units of work: every engine call runs inside exactly
//! one of them, and the whole unit either commits or rolls back. Backends
//! (e.g. `sortinghat-store-sqlite`) implement both traits; the engine only
//! ever sees `&mut dyn UnitOfWork`.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
  Result,
  journal::{Operation, Transaction},
  model::{Alias, Country, Domain, Enrollment, Group, GroupKind, Identity, Individual, Profile},
  period::Period,
};

// ─── Pagination ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
  /// Clamp out-of-range values instead of rejecting them.
  pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
    Self {
      page:      page.unwrap_or(1).max(1),
      page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
  }

  pub fn limit(&self) -> i64 { i64::from(self.page_size) }

  pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.page_size) }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub entities:  Vec<T>,
  pub page:      u32,
  pub page_size: u32,
  pub num_pages: u32,
  pub has_next:  bool,
  pub has_prev:  bool,
  pub total:     u64,
}

impl<T> Page<T> {
  pub fn new(entities: Vec<T>, request: PageRequest, total: u64) -> Self {
    let num_pages = total.div_ceil(u64::from(request.page_size)) as u32;
    Self {
      entities,
      page: request.page,
      page_size: request.page_size,
      num_pages,
      has_next: request.page < num_pages,
      has_prev: request.page > 1,
      total,
    }
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      entities:  self.entities.into_iter().map(f).collect(),
      page:      self.page,
      page_size: self.page_size,
      num_pages: self.num_pages,
      has_next:  self.has_next,
      has_prev:  self.has_prev,
      total:     self.total,
    }
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Parameters for [`UnitOfWork::search_individuals`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndividualFilter {
  /// Individual `mk` or the uuid of any of its identities.
  pub uuid:        Option<String>,
  /// Substring matched against identity and profile names, emails and
  /// usernames.
  pub term:        Option<String>,
  pub is_locked:   Option<bool>,
  /// Name of an organization the individual is enrolled in.
  pub enrolled_in: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationFilter {
  /// Substring matched against names, domains and aliases.
  pub term: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryFilter {
  pub code: Option<String>,
  pub term: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
  pub name:        Option<String>,
  pub authored_by: Option<String>,
  pub from_date:   Option<DateTime<Utc>>,
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Keyed access to every entity inside one atomic store transaction.
///
/// Reads take `&self`, writes `&mut self`. Deleting an individual or a group
/// cascades to its dependents; nothing else cascades. Uniqueness is checked
/// by the engine before writing, so a unique-key violation surfacing here is a
/// race and reports as `Conflict`.
pub trait UnitOfWork {
  // ── Individuals ───────────────────────────────────────────────────────

  fn individual(&self, mk: &str) -> Result<Option<Individual>>;

  fn insert_individual(&mut self, individual: &Individual) -> Result<()>;

  fn set_locked(&mut self, mk: &str, locked: bool, at: DateTime<Utc>) -> Result<()>;

  /// Bump `last_modified`.
  fn touch_individual(&mut self, mk: &str, at: DateTime<Utc>) -> Result<()>;

  /// Delete the individual along with its identities, profile and
  /// enrollments.
  fn delete_individual(&mut self, mk: &str) -> Result<()>;

  // ── Identities ────────────────────────────────────────────────────────

  fn identity(&self, uuid: &str) -> Result<Option<Identity>>;

  /// Identities of an individual, ordered by uuid.
  fn identities_of(&self, mk: &str) -> Result<Vec<Identity>>;

  fn insert_identity(&mut self, identity: &Identity) -> Result<()>;

  fn reassign_identity(&mut self, uuid: &str, mk: &str, at: DateTime<Utc>) -> Result<()>;

  fn delete_identity(&mut self, uuid: &str) -> Result<()>;

  // ── Profiles & countries ──────────────────────────────────────────────

  fn profile(&self, mk: &str) -> Result<Option<Profile>>;

  /// Insert or replace the profile of `profile.individual`.
  fn save_profile(&mut self, profile: &Profile) -> Result<()>;

  fn country(&self, code: &str) -> Result<Option<Country>>;

  // ── Groups ────────────────────────────────────────────────────────────

  fn group(&self, id: i64) -> Result<Option<Group>>;

  fn organization(&self, name: &str) -> Result<Option<Group>>;

  fn team(&self, org: i64, name: &str) -> Result<Option<Group>>;

  /// Every team below `org`, in tree order.
  fn teams_of(&self, org: i64) -> Result<Vec<Group>>;

  fn insert_group(
    &mut self,
    name: &str,
    kind: GroupKind,
    parent_org: Option<i64>,
    parent: Option<i64>,
  ) -> Result<Group>;

  /// Delete the group, its subtree, and every enrollment, domain and alias
  /// attached to any of them.
  fn delete_group(&mut self, id: i64) -> Result<()>;

  // ── Domains & aliases ─────────────────────────────────────────────────

  fn domain(&self, domain: &str) -> Result<Option<Domain>>;

  fn domains_of(&self, org: i64) -> Result<Vec<Domain>>;

  fn insert_domain(&mut self, domain: &str, is_top_domain: bool, org: i64) -> Result<Domain>;

  fn delete_domain(&mut self, domain: &str) -> Result<()>;

  fn alias(&self, alias: &str) -> Result<Option<Alias>>;

  fn aliases_of(&self, org: i64) -> Result<Vec<Alias>>;

  fn insert_alias(&mut self, alias: &str, org: i64) -> Result<Alias>;

  fn delete_alias(&mut self, alias: &str) -> Result<()>;

  // ── Enrollments ───────────────────────────────────────────────────────

  /// Enrollments of an individual, optionally restricted to one group,
  /// ordered by `(start, end)`.
  fn enrollments(&self, mk: &str, group: Option<i64>) -> Result<Vec<Enrollment>>;

  fn insert_enrollment(&mut self, mk: &str, group: i64, period: Period) -> Result<Enrollment>;

  fn delete_enrollment(&mut self, id: i64) -> Result<()>;

  // ── Journal ───────────────────────────────────────────────────────────

  fn insert_transaction(&mut self, trx: &Transaction) -> Result<()>;

  fn close_transaction(&mut self, tuid: &str, at: DateTime<Utc>) -> Result<()>;

  fn insert_operation(&mut self, op: &Operation) -> Result<()>;

  // ── Paginated reads ───────────────────────────────────────────────────

  /// Matching individual keys ordered by `mk`, plus the total match count.
  fn search_individuals(
    &self,
    filter: &IndividualFilter,
    page: PageRequest,
  ) -> Result<(Vec<String>, u64)>;

  fn search_organizations(
    &self,
    filter: &OrganizationFilter,
    page: PageRequest,
  ) -> Result<(Vec<Group>, u64)>;

  fn search_countries(
    &self,
    filter: &CountryFilter,
    page: PageRequest,
  ) -> Result<(Vec<Country>, u64)>;

  /// Newest first.
  fn search_transactions(
    &self,
    filter: &TransactionFilter,
    page: PageRequest,
  ) -> Result<(Vec<Transaction>, u64)>;

  /// Operations of one transaction ordered by `(timestamp, ouid)`.
  fn operations(&self, tuid: &str) -> Result<Vec<Operation>>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A logical database that can run units of work.
///
/// `transact` commits when `f` returns `Ok` and rolls back otherwise. Once
/// `cancel` fires, the next store call inside `f` fails with
/// [`crate::Error::Cancelled`] and the unit rolls back; after commit,
/// cancellation has no effect.
pub trait Store: Clone + Send + Sync + 'static {
  fn transact<F, R>(
    &self,
    cancel: CancellationToken,
    f: F,
  ) -> impl Future<Output = Result<R>> + Send
  where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<R> + Send + 'static,
    R: Send + 'static;
}
