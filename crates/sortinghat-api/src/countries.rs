//! Handler for `GET /countries`.

use axum::{
  Json,
  extract::Query,
};
use serde::Deserialize;
use sortinghat_core::{
  model::Country,
  store::{CountryFilter, Page},
  tenancy::Tenancy,
};
use sortinghat_engine as engine;

use crate::{Caller, PageParams, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Exact alpha-2 code.
  pub code:      Option<String>,
  /// Substring of the name, or an exact alpha-2 or alpha-3 code.
  pub term:      Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /countries[?code=..][&term=..][&page=..][&page_size=..]`
pub async fn list<T: Tenancy>(
  caller: Caller<T::Store>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Country>>, ApiError> {
  let page = PageParams { page: params.page, page_size: params.page_size };
  let filter = CountryFilter { code: params.code, term: params.term };
  Ok(Json(engine::countries(&caller.ctx, filter, (&page).into()).await?))
}
