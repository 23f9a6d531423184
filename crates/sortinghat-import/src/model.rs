//! Records produced by import backends, before reconciliation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sortinghat_core::model::{NewIdentity, ProfileUpdate};

/// One person as described by an import source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportIndividual {
  /// Raw identities, in source order. The first one anchors the individual.
  pub identities:  Vec<NewIdentity>,
  pub enrollments: Vec<ImportEnrollment>,
  pub profile:     Option<ProfileUpdate>,
}

/// An organization membership. Open bounds fall back to the full range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEnrollment {
  pub organization: String,
  pub start:        Option<DateTime<Utc>>,
  pub end:          Option<DateTime<Utc>>,
}

impl ImportEnrollment {
  pub fn new(organization: impl Into<String>) -> Self {
    Self { organization: organization.into(), start: None, end: None }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOrganization {
  pub name:    String,
  pub domains: Vec<ImportDomain>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDomain {
  pub domain:        String,
  pub is_top_domain: bool,
}

/// Everything a backend read from its documents.
#[derive(Debug, Default)]
pub struct ImportData {
  pub organizations: Vec<ImportOrganization>,
  pub individuals:   Vec<ImportIndividual>,
  /// Lines the parser could not use, as `InvalidFormat` errors.
  pub rejected:      Vec<sortinghat_core::Error>,
}

/// Counters returned by a finished import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  pub individuals:       usize,
  pub identities_added:  usize,
  pub merges:            usize,
  pub enrollments_added: usize,
  /// Rejected lines plus records the loop skipped.
  pub skipped:           usize,
}
