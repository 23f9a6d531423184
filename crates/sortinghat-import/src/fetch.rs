//! Document retrieval for import backends.

use crate::error::{Error, Result};

/// Read the document at `location`: an `http(s)://` URL, a `file://` URL or
/// a plain path.
pub async fn fetch(location: &str) -> Result<String> {
  if location.starts_with("http://") || location.starts_with("https://") {
    let fetch_error = |source: reqwest::Error| Error::Fetch { location: location.to_owned(), source };
    let response = reqwest::get(location)
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(fetch_error)?;
    return response.text().await.map_err(fetch_error);
  }

  let path = location.strip_prefix("file://").unwrap_or(location);
  tokio::fs::read_to_string(path)
    .await
    .map_err(|source| Error::Read { location: location.to_owned(), source })
}
