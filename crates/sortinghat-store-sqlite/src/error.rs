//! Error type for `sortinghat-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sortinghat_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored discriminant column holds a value this build does not know.
  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `true` for failures the caller may retry: unique-key races and busy or
/// locked database files.
fn is_conflict(e: &rusqlite::Error) -> bool {
  use rusqlite::ErrorCode;
  match e.sqlite_error_code() {
    Some(ErrorCode::ConstraintViolation) => {
      matches!(e, rusqlite::Error::SqliteFailure(f, _)
        if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
          || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    }
    Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => true,
    _ => false,
  }
}

impl From<Error> for sortinghat_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::Sqlite(ref inner) if is_conflict(inner) => Self::Conflict(inner.to_string()),
      Error::Database(tokio_rusqlite::Error::Rusqlite(ref inner)) if is_conflict(inner) => {
        Self::Conflict(inner.to_string())
      }
      other => Self::Storage(Box::new(other)),
    }
  }
}
