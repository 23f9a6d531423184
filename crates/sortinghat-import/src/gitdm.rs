//! gitdm mapping files.
//!
//! gitdm describes affiliations in up to three tab separated streams:
//!
//! ```text
//! # aliases: alias email -> canonical email
//! jsmith@users.example.org    jsmith@example.com
//!
//! # email to employer, optionally ending on a date
//! jsmith@example.com    Bitergia < 2015-01-01
//! jsmith@example.com    Example Company
//!
//! # domain to employer
//! example.com    Example Company
//! ```
//!
//! Pipeline:
//! 1. `!` becomes `@` (old files obfuscate addresses that way).
//! 2. Comment and blank lines are dropped.
//! 3. Each remaining line is split into its two fields; lines that do not
//!    split, or whose fields do not validate, are rejected with their line
//!    number and the rest of the stream is still read.
//! 4. Employer entries of one email are sorted by end date and chained into
//!    contiguous enrollments.

use std::{
  collections::HashMap,
  sync::LazyLock,
};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::warn;

use sortinghat_core::{Error, model::NewIdentity};

use crate::model::{ImportData, ImportDomain, ImportEnrollment, ImportIndividual, ImportOrganization};

pub const SOURCE: &str = "gitdm";

static IGNORED_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*(?:#.*)?\s*$").expect("valid pattern"));
static VALID_LINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(\S+)[ \t]+([^#\n\r\f\v]*[^#\s])(?:[ \t]+#.*)?\s*$").expect("valid pattern")
});
static EMAIL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+\.[^\s@]+$").expect("valid pattern"));
static DOMAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w\S+$").expect("valid pattern"));
static ORGANIZATION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[^#<\t\n\r\f\v]*[^#<\t\n\r\f\v\s]$").expect("valid pattern"));
static ENROLLMENT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^([^#<\n\r\f\v]*[^#<\t\n\r\f\v\s])(?:[ \t]+<[ \t]+(\d{4}-\d{2}-\d{2}))?$")
    .expect("valid pattern")
});

/// Parser for the three gitdm streams.
#[derive(Debug, Clone, Copy)]
pub struct GitdmParser {
  email_validation: bool,
}

impl Default for GitdmParser {
  fn default() -> Self { Self { email_validation: true } }
}

impl GitdmParser {
  pub fn new() -> Self { Self::default() }

  /// With validation off every identity token is taken as an email address,
  /// whatever its shape.
  pub fn email_validation(mut self, on: bool) -> Self {
    self.email_validation = on;
    self
  }

  pub fn parse(
    &self,
    employers: Option<&str>,
    aliases: Option<&str>,
    domains: Option<&str>,
  ) -> ImportData {
    let (employers, aliases, domains) =
      (employers.map(normalize), aliases.map(normalize), domains.map(normalize));
    let mut data = ImportData::default();
    let mut by_token: HashMap<String, usize> = HashMap::new();

    if let Some(stream) = employers.as_deref() {
      let mut entries: Vec<(String, Vec<(String, Option<DateTime<Utc>>)>)> = Vec::new();
      for (line, token, value) in fields(stream, &mut data.rejected) {
        let parsed = self.identity(token).and_then(|id| Ok((id, enrollment(value)?)));
        let (_, (org, date)) = match parsed {
          Ok(parsed) => parsed,
          Err(cause) => {
            reject(&mut data.rejected, line, cause);
            continue;
          }
        };
        match by_token.get(token) {
          Some(&i) => entries[i].1.push((org, date)),
          None => {
            by_token.insert(token.to_owned(), entries.len());
            entries.push((token.to_owned(), vec![(org, date)]));
          }
        }
      }

      for (token, orgs) in entries {
        // Tokens were validated above.
        let Ok(identity) = self.identity(&token) else { continue };
        data.individuals.push(ImportIndividual {
          identities: vec![identity],
          enrollments: chain(orgs),
          profile: None,
        });
      }
    }

    if let Some(stream) = aliases.as_deref() {
      for (line, alias, canonical) in fields(stream, &mut data.rejected) {
        let parsed = self.identity(alias).and_then(|a| Ok((a, self.identity(canonical)?)));
        let (alias_id, canonical_id) = match parsed {
          Ok(parsed) => parsed,
          Err(cause) => {
            reject(&mut data.rejected, line, cause);
            continue;
          }
        };
        match by_token.get(canonical) {
          Some(&i) => {
            let identities = &mut data.individuals[i].identities;
            if !identities.contains(&alias_id) {
              identities.push(alias_id);
            }
          }
          None => {
            by_token.insert(canonical.to_owned(), data.individuals.len());
            data.individuals.push(ImportIndividual {
              identities: vec![canonical_id, alias_id],
              ..Default::default()
            });
          }
        }
      }
    }

    if let Some(stream) = domains.as_deref() {
      let mut index: HashMap<String, usize> = HashMap::new();
      for (line, domain, org) in fields(stream, &mut data.rejected) {
        if !DOMAIN.is_match(domain) {
          reject(&mut data.rejected, line, format!("invalid domain {domain:?}"));
          continue;
        }
        if !ORGANIZATION.is_match(org) {
          reject(&mut data.rejected, line, format!("invalid organization {org:?}"));
          continue;
        }
        let domain = ImportDomain { domain: domain.to_lowercase(), is_top_domain: false };
        match index.get(org) {
          Some(&i) => data.organizations[i].domains.push(domain),
          None => {
            index.insert(org.to_owned(), data.organizations.len());
            data.organizations.push(ImportOrganization { name: org.to_owned(), domains: vec![domain] });
          }
        }
      }
    }

    data
  }

  fn identity(&self, token: &str) -> Result<NewIdentity, String> {
    let identity = NewIdentity::new(SOURCE);
    if !self.email_validation {
      return Ok(identity.email(token));
    }
    if EMAIL.is_match(token) {
      Ok(identity.email(token))
    } else if !token.contains('@') {
      Ok(identity.username(token))
    } else {
      Err(format!("invalid email address {token:?}"))
    }
  }
}

/// Split every meaningful line of `stream` into its two fields, rejecting
/// the lines that do not split. Line numbers are 1-based.
fn fields<'s>(stream: &'s str, rejected: &mut Vec<Error>) -> Vec<(usize, &'s str, &'s str)> {
  let mut out = Vec::new();
  for (n, raw) in stream.lines().enumerate() {
    let line = n + 1;
    if IGNORED_LINE.is_match(raw) {
      continue;
    }
    match VALID_LINE.captures(raw) {
      Some(caps) => match (caps.get(1), caps.get(2)) {
        (Some(a), Some(b)) => out.push((line, a.as_str(), b.as_str())),
        _ => reject(rejected, line, "missing field".to_owned()),
      },
      None => reject(rejected, line, format!("invalid line {raw:?}")),
    }
  }
  out
}

fn enrollment(value: &str) -> Result<(String, Option<DateTime<Utc>>), String> {
  let caps = ENROLLMENT
    .captures(value)
    .ok_or_else(|| format!("invalid enrollment {value:?}"))?;
  let org = caps.get(1).map(|m| m.as_str().to_owned()).unwrap_or_default();
  let date = match caps.get(2) {
    Some(m) => Some(
      NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date {:?}: {e}", m.as_str()))?
        .and_time(NaiveTime::MIN)
        .and_utc(),
    ),
    None => None,
  };
  Ok((org, date))
}

/// Chain the employer entries of one person into contiguous enrollments.
/// Dated entries sort first; each starts where the previous dated one ended.
fn chain(mut orgs: Vec<(String, Option<DateTime<Utc>>)>) -> Vec<ImportEnrollment> {
  orgs.sort_by_key(|(_, date)| (date.is_none(), *date));
  let mut start = None;
  let mut out = Vec::with_capacity(orgs.len());
  for (organization, end) in orgs {
    out.push(ImportEnrollment { organization, start, end });
    if end.is_some() {
      start = end;
    }
  }
  out
}

fn reject(rejected: &mut Vec<Error>, line: usize, cause: String) {
  warn!(line, %cause, "skipping gitdm line");
  rejected.push(Error::InvalidFormat { cause, line: Some(line) });
}

/// gitdm files may spell `@` as `!`.
fn normalize(stream: &str) -> String { stream.replace('!', "@") }
