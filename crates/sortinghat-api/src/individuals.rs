//! Handlers for `/individuals` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/individuals` | `?uuid=&term=&is_locked=&enrolled_in=&page=&page_size=` |
//! | `GET`   | `/individuals/{uuid}` | `mk` or any identity uuid |
//! | `POST`  | `/individuals/merge` | Body: `{"from_uuids":[…],"to_uuid":"…"}` |
//! | `POST`  | `/individuals/unmerge` | Body: `{"uuids":[…]}` |
//! | `POST`  | `/individuals/affiliate` | Body: `{"uuids":[…]}`; empty means everyone |
//! | `POST`  | `/individuals/{uuid}/lock`, `/unlock` | |
//! | `PATCH` | `/individuals/{uuid}/profile` | `null` or `""` clears a field |
//! | `POST`  | `/individuals/{uuid}/enroll`, `/withdraw`, `/enrollment` | |

use axum::{
  Json,
  extract::{Path, Query},
};
use serde::{Deserialize, Serialize};
use sortinghat_core::{
  model::{IndividualView, ProfileUpdate},
  store::{IndividualFilter, Page},
  tenancy::Tenancy,
};
use sortinghat_engine::{
  self as engine, AffiliationResult, DomainRecommender, Enroll, UpdateEnrollment, Withdraw,
};

use crate::{Caller, PageParams, UuidBody, error::ApiError};

// ─── Reads ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub uuid:        Option<String>,
  pub term:        Option<String>,
  pub is_locked:   Option<bool>,
  pub enrolled_in: Option<String>,
  pub page:        Option<u32>,
  pub page_size:   Option<u32>,
}

/// `GET /individuals`
pub async fn list<T: Tenancy>(
  caller: Caller<T::Store>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<IndividualView>>, ApiError> {
  let page = PageParams { page: params.page, page_size: params.page_size };
  let filter = IndividualFilter {
    uuid:        params.uuid,
    term:        params.term,
    is_locked:   params.is_locked,
    enrolled_in: params.enrolled_in,
  };
  Ok(Json(engine::individuals(&caller.ctx, filter, (&page).into()).await?))
}

/// `GET /individuals/{uuid}`
pub async fn get_one<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
) -> Result<Json<IndividualView>, ApiError> {
  Ok(Json(engine::individual(&caller.ctx, &uuid).await?))
}

// ─── Merge / unmerge ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MergeBody {
  pub from_uuids: Vec<String>,
  pub to_uuid:    String,
}

/// `POST /individuals/merge`
pub async fn merge<T: Tenancy>(
  caller: Caller<T::Store>,
  Json(body): Json<MergeBody>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::merge(&caller.ctx, &body.from_uuids, &body.to_uuid).await?;
  Ok(Json(UuidBody { uuid }))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UuidsBody {
  #[serde(default)]
  pub uuids: Vec<String>,
}

/// `POST /individuals/unmerge`: answers with the `mk`s of the new individuals.
pub async fn unmerge<T: Tenancy>(
  caller: Caller<T::Store>,
  Json(body): Json<UuidsBody>,
) -> Result<Json<UuidsBody>, ApiError> {
  let uuids = engine::unmerge(&caller.ctx, &body.uuids).await?;
  Ok(Json(UuidsBody { uuids }))
}

/// `POST /individuals/affiliate`
pub async fn affiliate<T: Tenancy>(
  caller: Caller<T::Store>,
  Json(body): Json<UuidsBody>,
) -> Result<Json<AffiliationResult>, ApiError> {
  Ok(Json(engine::affiliate(&caller.ctx, &body.uuids, DomainRecommender).await?))
}

// ─── Lock / profile ───────────────────────────────────────────────────────────

/// `POST /individuals/{uuid}/lock`
pub async fn lock<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::lock(&caller.ctx, &uuid).await?;
  Ok(Json(UuidBody { uuid }))
}

/// `POST /individuals/{uuid}/unlock`
pub async fn unlock<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::unlock(&caller.ctx, &uuid).await?;
  Ok(Json(UuidBody { uuid }))
}

/// `PATCH /individuals/{uuid}/profile`
pub async fn update_profile<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
  Json(update): Json<ProfileUpdate>,
) -> Result<Json<IndividualView>, ApiError> {
  Ok(Json(engine::update_profile(&caller.ctx, &uuid, update).await?))
}

// ─── Enrollments ──────────────────────────────────────────────────────────────

/// `POST /individuals/{uuid}/enroll`
pub async fn enroll<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
  Json(req): Json<Enroll>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::enroll(&caller.ctx, &uuid, req).await?;
  Ok(Json(UuidBody { uuid }))
}

/// `POST /individuals/{uuid}/withdraw`
pub async fn withdraw<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
  Json(req): Json<Withdraw>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::withdraw(&caller.ctx, &uuid, req).await?;
  Ok(Json(UuidBody { uuid }))
}

/// `POST /individuals/{uuid}/enrollment`
pub async fn update_enrollment<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(uuid): Path<String>,
  Json(req): Json<UpdateEnrollment>,
) -> Result<Json<UuidBody>, ApiError> {
  let uuid = engine::update_enrollment(&caller.ctx, &uuid, req).await?;
  Ok(Json(UuidBody { uuid }))
}
