//! Per-request execution context.
//!
//! A [`Ctx`] is built by the boundary for every request and threaded through
//! each engine call. The engine reads and writes only through `ctx.store`, so
//! a request never reaches a database other than the one it was routed to.

use tokio_util::sync::CancellationToken;

use crate::tenancy::Route;

#[derive(Clone)]
pub struct Ctx<S> {
  /// Caller principal, recorded as `authored_by` in the journal.
  pub principal: Option<String>,
  /// Logical database the request was routed to.
  pub tenant:    Option<String>,
  pub store:     S,
  pub cancel:    CancellationToken,
}

impl<S> Ctx<S> {
  /// A context with no principal and no tenant; mostly for tests and tools.
  pub fn new(store: S) -> Self {
    Self {
      principal: None,
      tenant: None,
      store,
      cancel: CancellationToken::new(),
    }
  }

  /// Context for a request routed by the tenancy layer.
  pub fn routed(route: Route<S>, principal: Option<String>) -> Self {
    Self {
      principal,
      tenant: Some(route.database),
      store: route.store,
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
    self.principal = Some(principal.into());
    self
  }

  pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
    self.tenant = Some(tenant.into());
    self
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }
}
