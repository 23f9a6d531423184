//! Import backends and their registry.
//!
//! A backend is built from a fetched main document plus its extra
//! parameters. Parameters ending in `_url` name further documents; they are
//! fetched before the backend is built.

use std::collections::{BTreeMap, HashMap};

use crate::{
  error::{Error, Result},
  fetch::fetch,
  gitdm::GitdmParser,
  mailmap::MailmapParser,
  model::ImportData,
};

/// A source of individuals and organizations to load into the registry.
pub trait Backend: Send + Sync {
  fn name(&self) -> &'static str;

  /// Parse the documents the backend was built from.
  fn read(&self) -> ImportData;
}

/// Inputs handed to a backend constructor.
#[derive(Debug, Default)]
pub struct Documents {
  pub main:   String,
  /// Fetched `*_url` parameters, keyed by parameter name.
  pub extras: HashMap<String, String>,
  /// Every other parameter, verbatim.
  pub params: HashMap<String, String>,
}

impl Documents {
  fn flag(&self, param: &str, default: bool) -> Result<bool> {
    match self.params.get(param).map(|v| v.trim().to_ascii_lowercase()) {
      None => Ok(default),
      Some(v) => match v.as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::InvalidParam { param: param.to_owned(), value: v }),
      },
    }
  }
}

/// Registry entry: a backend name, the extra parameters it accepts and its
/// constructor.
pub struct BackendSpec {
  pub name:   &'static str,
  pub params: &'static [&'static str],
  build:      fn(Documents) -> Result<Box<dyn Backend>>,
}

impl std::fmt::Debug for BackendSpec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BackendSpec")
      .field("name", &self.name)
      .field("params", &self.params)
      .finish()
  }
}

static BACKENDS: &[BackendSpec] = &[
  BackendSpec {
    name:   "gitdm",
    params: &["aliases_url", "domains_url", "email_validation"],
    build:  GitdmBackend::build,
  },
  BackendSpec {
    name:   "mailmap",
    params: &["has_orgs"],
    build:  MailmapBackend::build,
  },
];

/// Every registered backend, by name.
pub fn find_backends() -> BTreeMap<&'static str, &'static BackendSpec> {
  BACKENDS.iter().map(|spec| (spec.name, spec)).collect()
}

/// Fetch the documents of backend `name` and build it.
///
/// Unknown backends and parameters are rejected before anything is fetched.
pub async fn open(
  name: &str,
  location: &str,
  params: &BTreeMap<String, String>,
) -> Result<Box<dyn Backend>> {
  let spec = find_backends()
    .remove(name)
    .ok_or_else(|| Error::UnknownBackend(name.to_owned()))?;
  if let Some(param) = params.keys().find(|p| !spec.params.contains(&p.as_str())) {
    return Err(Error::UnknownParam { backend: spec.name, param: param.clone() });
  }

  let mut docs = Documents { main: fetch(location).await?, ..Default::default() };
  for (param, value) in params {
    if param.ends_with("_url") {
      docs.extras.insert(param.clone(), fetch(value).await?);
    } else {
      docs.params.insert(param.clone(), value.clone());
    }
  }
  (spec.build)(docs)
}

// ─── gitdm ───────────────────────────────────────────────────────────────────

/// The main document is the email-to-employer stream.
struct GitdmBackend {
  parser: GitdmParser,
  docs:   Documents,
}

impl GitdmBackend {
  fn build(docs: Documents) -> Result<Box<dyn Backend>> {
    let parser = GitdmParser::new().email_validation(docs.flag("email_validation", true)?);
    Ok(Box::new(Self { parser, docs }))
  }
}

impl Backend for GitdmBackend {
  fn name(&self) -> &'static str { "gitdm" }

  fn read(&self) -> ImportData {
    self.parser.parse(
      Some(&self.docs.main),
      self.docs.extras.get("aliases_url").map(String::as_str),
      self.docs.extras.get("domains_url").map(String::as_str),
    )
  }
}

// ─── mailmap ─────────────────────────────────────────────────────────────────

struct MailmapBackend {
  parser:  MailmapParser,
  mailmap: String,
}

impl MailmapBackend {
  fn build(docs: Documents) -> Result<Box<dyn Backend>> {
    let parser = MailmapParser::new().has_orgs(docs.flag("has_orgs", false)?);
    Ok(Box::new(Self { parser, mailmap: docs.main }))
  }
}

impl Backend for MailmapBackend {
  fn name(&self) -> &'static str { "mailmap" }

  fn read(&self) -> ImportData { self.parser.parse(&self.mailmap) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_lists_backends_with_params() {
    let backends = find_backends();
    assert_eq!(backends.keys().copied().collect::<Vec<_>>(), vec!["gitdm", "mailmap"]);
    assert_eq!(backends["mailmap"].params, &["has_orgs"]);
  }

  #[tokio::test]
  async fn unknown_backend_and_param_are_rejected_before_fetching() {
    let err = open("eclipse", "/nonexistent", &BTreeMap::new()).await.err().unwrap();
    assert!(matches!(err, Error::UnknownBackend(_)));

    let params = BTreeMap::from([("colour".to_owned(), "blue".to_owned())]);
    let err = open("gitdm", "/nonexistent", &params).await.err().unwrap();
    assert!(matches!(err, Error::UnknownParam { backend: "gitdm", .. }));
    assert!(matches!(
      sortinghat_core::Error::from(err),
      sortinghat_core::Error::InvalidValue(_)
    ));
  }

  #[test]
  fn flags_parse_or_fail() {
    let docs = Documents {
      params: HashMap::from([("has_orgs".to_owned(), "Yes".to_owned())]),
      ..Default::default()
    };
    assert!(docs.flag("has_orgs", false).unwrap());
    assert!(!docs.flag("email_validation", false).unwrap());

    let docs = Documents {
      params: HashMap::from([("has_orgs".to_owned(), "maybe".to_owned())]),
      ..Default::default()
    };
    assert!(matches!(docs.flag("has_orgs", false), Err(Error::InvalidParam { .. })));
  }
}
