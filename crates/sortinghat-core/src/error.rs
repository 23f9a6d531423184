//! Error taxonomy shared by every SortingHat crate.
//!
//! Each variant maps to a stable numeric code (see [`Error::code`]) that
//! boundary adapters forward to their transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input: bad date, unknown country, empty identity tuple,
  /// self-merge and the like.
  #[error("invalid value: {0}")]
  InvalidValue(String),

  #[error("{entity} {key} not found")]
  NotFound { entity: &'static str, key: String },

  /// Unique-key collision. `existing` is the primary key already stored;
  /// the importer relies on it to pivot into a merge.
  #[error("{entity} {existing} already exists")]
  AlreadyExists {
    entity:   &'static str,
    existing: String,
  },

  #[error("individual {0} is locked")]
  Locked(String),

  #[error("range {start}..{end} for {group} is enclosed by an existing enrollment")]
  DuplicateRange {
    group: String,
    start: String,
    end:   String,
  },

  #[error("unable to load {record}: {cause}")]
  LoadError { record: String, cause: String },

  #[error("invalid format{}: {cause}", at_line(.line))]
  InvalidFormat { cause: String, line: Option<usize> },

  /// Store-level isolation failure; the caller may retry.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("request cancelled before commit")]
  Cancelled,

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
    Self::NotFound { entity, key: key.into() }
  }

  pub fn already_exists(entity: &'static str, existing: impl Into<String>) -> Self {
    Self::AlreadyExists { entity, existing: existing.into() }
  }

  pub fn invalid(message: impl Into<String>) -> Self {
    Self::InvalidValue(message.into())
  }

  /// Numeric code carried alongside the human message at the boundary.
  pub fn code(&self) -> u16 {
    match self {
      Self::InvalidValue(_) => 1001,
      Self::NotFound { .. } => 1002,
      Self::AlreadyExists { .. } => 1003,
      Self::Locked(_) => 1004,
      Self::DuplicateRange { .. } => 1005,
      Self::LoadError { .. } => 1006,
      Self::InvalidFormat { .. } => 1007,
      Self::Conflict(_) => 1008,
      Self::Cancelled => 1009,
      Self::Storage(_) => 1500,
    }
  }

  /// The existing key of an [`Error::AlreadyExists`], if that is what this is.
  pub fn existing_key(&self) -> Option<&str> {
    match self {
      Self::AlreadyExists { existing, .. } => Some(existing),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self { Self::Storage(Box::new(e)) }
}

fn at_line(line: &Option<usize>) -> String {
  line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
