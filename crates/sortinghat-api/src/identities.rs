//! Handlers for `/identities` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/identities` | Body: `{"source":"git","email":"…","uuid":"…"?}` |
//! | `DELETE` | `/identities/{uuid}` | Deleting an individual's `mk` deletes the individual |
//! | `POST`   | `/identities/{uuid}/move` | Body: `{"to":"…"}` |

use axum::{
  Json,
  extract::Path,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sortinghat_core::{model::NewIdentity, tenancy::Tenancy};
use sortinghat_engine as engine;

use crate::{Caller, UuidBody, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(flatten)]
  pub identity: NewIdentity,
  /// Individual to attach the identity to; a new one is created otherwise.
  pub uuid:     Option<String>,
}

/// `POST /identities`
pub async fn create<T: Tenancy>(
  caller: Caller<T::Store>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let uuid = engine::add_identity(&caller.ctx, body.identity, body.uuid.as_deref()).await?;
  Ok((StatusCode::CREATED, Json(UuidBody { uuid })))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedBody {
  pub uuid:               String,
  pub individual_deleted: bool,
}

/// `DELETE /identities/{uuid}`
pub async fn delete_one<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
) -> Result<Json<DeletedBody>, ApiError> {
  let individual_deleted = engine::delete_identity(&caller.ctx, &uuid).await?;
  Ok(Json(DeletedBody { uuid, individual_deleted }))
}

// ─── Move ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MoveBody {
  pub to: String,
}

/// `POST /identities/{uuid}/move`: answers with the receiving individual.
pub async fn move_one<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
  Json(body): Json<MoveBody>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::move_identity(&caller.ctx, &uuid, &body.to).await?;
  Ok(Json(UuidBody { uuid }))
}
