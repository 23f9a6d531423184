//! HTTP Basic authentication and per-request routing.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use sortinghat_core::{Ctx, tenancy::Tenancy};
use tokio_util::sync::DropGuard;

use crate::{AppState, error::ApiError};

/// One account allowed to use the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
  /// Accounts; an empty list turns authentication off.
  pub users:         Vec<Credential>,
  /// Header carrying the tenant selector.
  pub tenant_header: String,
}

impl AuthConfig {
  pub fn new(users: Vec<Credential>, tenant_header: impl Into<String>) -> Self {
    Self { users, tenant_header: tenant_header.into() }
  }
}

/// Check the `Authorization` header and return the authenticated username.
/// Returns `None` when authentication is off.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Option<String>, ApiError> {
  if config.users.is_empty() {
    return Ok(None);
  }

  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Some(user.username.clone()))
}

/// An authenticated request routed to its database.
///
/// Dropping the caller cancels `ctx`, so a request abandoned by its client
/// rolls back instead of committing.
pub struct Caller<S> {
  pub ctx: Ctx<S>,
  _cancel: DropGuard,
}

impl<T: Tenancy> FromRequestParts<AppState<T>> for Caller<T::Store> {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<T>,
  ) -> Result<Self, Self::Rejection> {
    let principal = verify_auth(&parts.headers, &state.auth)?;
    let header = parts
      .headers
      .get(state.auth.tenant_header.as_str())
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);

    let route = state.tenancy.route(principal.as_deref(), header.as_deref()).await?;
    let ctx = Ctx::routed(route, principal);
    let guard = ctx.cancel.clone().drop_guard();
    Ok(Caller { ctx, _cancel: guard })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::header;
  use rand_core::OsRng;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig::new(
      vec![Credential { username: "user".to_string(), password_hash: hash }],
      "sortinghat-tenant",
    )
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value.parse().unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials() {
    let config = config("secret");
    let user = verify_auth(&headers(&basic("user", "secret")), &config).unwrap();
    assert_eq!(user.as_deref(), Some("user"));
  }

  #[test]
  fn wrong_password_or_user() {
    let config = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("user", "wrong")), &config),
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      verify_auth(&headers(&basic("other", "secret")), &config),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn missing_header_or_bad_base64() {
    let config = config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &config), Err(ApiError::Unauthorized)));
    assert!(matches!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &config),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn no_users_means_no_auth() {
    let config = AuthConfig::new(vec![], "sortinghat-tenant");
    assert_eq!(verify_auth(&HeaderMap::new(), &config).unwrap(), None);
  }
}
