//! Read-only access to the transaction journal.

use axum::{
  Json,
  extract::{Path, Query},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sortinghat_core::{
  journal::{Operation, Transaction},
  store::{Page, TransactionFilter},
  tenancy::Tenancy,
};
use sortinghat_engine as engine;

use crate::{Caller, PageParams, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Engine operation name, e.g. `merge`.
  pub name:        Option<String>,
  pub authored_by: Option<String>,
  /// Only transactions created at or after this instant.
  pub from_date:   Option<DateTime<Utc>>,
  pub page:        Option<u32>,
  pub page_size:   Option<u32>,
}

/// `GET /transactions`, newest first.
pub async fn transactions<T: Tenancy>(
  caller: Caller<T::Store>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Transaction>>, ApiError> {
  let page = PageParams { page: params.page, page_size: params.page_size };
  let filter = TransactionFilter {
    name:        params.name,
    authored_by: params.authored_by,
    from_date:   params.from_date,
  };
  Ok(Json(engine::transactions(&caller.ctx, filter, (&page).into()).await?))
}

/// `GET /transactions/{tuid}/operations`
pub async fn operations<T: Tenancy>(
  caller: Caller<T::Store>,
  Path(tuid): Path<String>,
) -> Result<Json<Vec<Operation>>, ApiError> {
  Ok(Json(engine::operations(&caller.ctx, &tuid).await?))
}
