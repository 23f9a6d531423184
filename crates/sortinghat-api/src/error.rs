//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every body has the shape `{"error": message, "code": n}`, plus
//! `"existing"` when a unique key collided.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use sortinghat_core::Error as CoreError;
use thiserror::Error;

/// Code sent with authentication failures.
const UNAUTHORIZED_CODE: u16 = 1401;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error(transparent)]
  Core(#[from] CoreError),
}

fn status(e: &CoreError) -> StatusCode {
  match e {
    CoreError::InvalidValue(_) | CoreError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,
    CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
    CoreError::AlreadyExists { .. } | CoreError::DuplicateRange { .. } | CoreError::Conflict(_) => {
      StatusCode::CONFLICT
    }
    CoreError::Locked(_) => StatusCode::LOCKED,
    CoreError::LoadError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let body = json!({ "error": "unauthorized", "code": UNAUTHORIZED_CODE });
        let mut res = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"sortinghat\""),
        );
        res
      }
      ApiError::Core(e) => {
        let status = status(&e);
        if status.is_server_error() {
          tracing::error!(error = %e, "request failed");
        }
        let mut body = json!({ "error": e.to_string(), "code": e.code() });
        if let Some(existing) = e.existing_key() {
          body["existing"] = existing.into();
        }
        (status, Json(body)).into_response()
      }
    }
  }
}
