//! Handlers for organizations and everything hanging off them.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/organizations` | `?term=&page=&page_size=` |
//! | `POST`   | `/organizations` | Body: `{"name":"…"}` |
//! | `GET`    | `/organizations/{name}` | |
//! | `DELETE` | `/organizations/{name}` | Cascades to teams, domains, aliases, enrollments |
//! | `POST`   | `/organizations/{name}/domains` | Body: `{"domain":"…","is_top_domain":false}` |
//! | `POST`   | `/organizations/{name}/aliases` | Body: `{"alias":"…"}` |
//! | `POST`   | `/organizations/{name}/teams` | Body: `{"name":"…","parent":"…"?}` |
//! | `DELETE` | `/organizations/{name}/teams/{team}` | |
//! | `DELETE` | `/domains/{domain}`, `/aliases/{alias}` | |

use axum::{
  Json,
  extract::{Path, Query},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sortinghat_core::{
  model::OrganizationView,
  store::{OrganizationFilter, Page},
  tenancy::Tenancy,
};
use sortinghat_engine as engine;

use crate::{Caller, NameBody, PageParams, error::ApiError};

// ─── Organizations ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub term:      Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /organizations`
pub async fn list<T: Tenancy>(
  caller: Caller<T::Store>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<OrganizationView>>, ApiError> {
  let page = PageParams { page: params.page, page_size: params.page_size };
  let filter = OrganizationFilter { term: params.term };
  Ok(Json(engine::organizations(&caller.ctx, filter, (&page).into()).await?))
}

/// `POST /organizations`
pub async fn create<T: Tenancy>(
  caller: Caller<T::Store>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = engine::add_organization(&caller.ctx, &body.name).await?;
  Ok((StatusCode::CREATED, Json(NameBody { name })))
}

/// `GET /organizations/{name}`
pub async fn get_one<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(name): Path<String>,
) -> Result<Json<OrganizationView>, ApiError> {
  Ok(Json(engine::organization(&caller.ctx, &name).await?))
}

/// `DELETE /organizations/{name}`
pub async fn delete_one<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(name): Path<String>,
) -> Result<Json<NameBody>, ApiError> {
  let name = engine::delete_organization(&caller.ctx, &name).await?;
  Ok(Json(NameBody { name }))
}

// ─── Domains ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DomainBody {
  pub domain:        String,
  #[serde(default)]
  pub is_top_domain: bool,
}

/// `POST /organizations/{name}/domains`
pub async fn add_domain<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(org): Path<String>,
  Json(body): Json<DomainBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = engine::add_domain(&caller.ctx, &org, &body.domain, body.is_top_domain).await?;
  Ok((StatusCode::CREATED, Json(NameBody { name })))
}

/// `DELETE /domains/{domain}`
pub async fn delete_domain<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(domain): Path<String>,
) -> Result<Json<NameBody>, ApiError> {
  let name = engine::delete_domain(&caller.ctx, &domain).await?;
  Ok(Json(NameBody { name }))
}

// ─── Aliases ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AliasBody {
  pub alias: String,
}

/// `POST /organizations/{name}/aliases`
pub async fn add_alias<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(org): Path<String>,
  Json(body): Json<AliasBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = engine::add_alias(&caller.ctx, &org, &body.alias).await?;
  Ok((StatusCode::CREATED, Json(NameBody { name })))
}

/// `DELETE /aliases/{alias}`
pub async fn delete_alias<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(alias): Path<String>,
) -> Result<Json<NameBody>, ApiError> {
  let name = engine::delete_alias(&caller.ctx, &alias).await?;
  Ok(Json(NameBody { name }))
}

// ─── Teams ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TeamBody {
  pub name:   String,
  /// Parent team inside the same organization.
  pub parent: Option<String>,
}

/// `POST /organizations/{name}/teams`
pub async fn add_team<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(org): Path<String>,
  Json(body): Json<TeamBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = engine::add_team(&caller.ctx, &org, &body.name, body.parent.as_deref()).await?;
  Ok((StatusCode::CREATED, Json(NameBody { name })))
}

/// `DELETE /organizations/{name}/teams/{team}`
pub async fn delete_team<T: Tenancy>(
  caller: Caller<T::Store>,
  Path((org, team)): Path<(String, String)>,
) -> Result<Json<NameBody>, ApiError> {
  let name = engine::delete_team(&caller.ctx, &org, &team).await?;
  Ok(Json(NameBody { name }))
}
