use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] sortinghat_core::Error),

  #[error("unknown import backend {0:?}")]
  UnknownBackend(String),

  #[error("backend {backend} does not accept parameter {param:?}")]
  UnknownParam {
    backend: &'static str,
    param:   String,
  },

  #[error("invalid value {value:?} for parameter {param}")]
  InvalidParam { param: String, value: String },

  #[error("unable to read {location}: {source}")]
  Read {
    location: String,
    #[source]
    source:   std::io::Error,
  },

  #[error("unable to fetch {location}: {source}")]
  Fetch {
    location: String,
    #[source]
    source:   reqwest::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for sortinghat_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      Error::UnknownBackend(_) | Error::UnknownParam { .. } | Error::InvalidParam { .. } => {
        Self::InvalidValue(e.to_string())
      }
      Error::Read { ref location, .. } | Error::Fetch { ref location, .. } => Self::LoadError {
        record: location.clone(),
        cause:  e.to_string(),
      },
    }
  }
}
