//! Registry entities: individuals, identities, profiles, groups and the
//! enrollments linking them.
//!
//! Ownership is acyclic: an [`Individual`] owns its identities, its profile
//! and its enrollments. Back-references (identity to individual, enrollment to
//! group) are plain keys resolved through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::Period;

// ─── Individuals & identities ────────────────────────────────────────────────

/// A real-world person. `mk` is the uuid of the identity that founded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
  pub mk:            String,
  pub is_locked:     bool,
  pub created_at:    DateTime<Utc>,
  pub last_modified: DateTime<Utc>,
}

/// One observation of an actor in a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub uuid:          String,
  pub source:        String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  /// `mk` of the owning individual.
  pub individual:    String,
  pub created_at:    DateTime<Utc>,
  pub last_modified: DateTime<Utc>,
}

/// Input to `add_identity`: the raw tuple, before hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
  pub source:   String,
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub username: Option<String>,
}

impl NewIdentity {
  pub fn new(source: impl Into<String>) -> Self {
    Self { source: source.into(), ..Default::default() }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn email(mut self, email: impl Into<String>) -> Self {
    self.email = Some(email.into());
    self
  }

  pub fn username(mut self, username: impl Into<String>) -> Self {
    self.username = Some(username.into());
    self
  }
}

// ─── Profiles & countries ────────────────────────────────────────────────────

/// An ISO 3166-1 country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  /// Alpha-2 code.
  pub code:   String,
  pub name:   String,
  pub alpha3: String,
}

/// Summary attributes of an individual, at most one per individual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub individual: String,
  pub name:       Option<String>,
  pub email:      Option<String>,
  pub gender:     Option<String>,
  /// Confidence in `gender`, `1..=100`.
  pub gender_acc: Option<u8>,
  pub is_bot:     bool,
  pub country:    Option<Country>,
}

impl Profile {
  /// A profile seeded from an identity's `name` and `email`.
  pub fn seeded(individual: &str, name: Option<String>, email: Option<String>) -> Self {
    Self {
      individual: individual.to_owned(),
      name,
      email,
      ..Default::default()
    }
  }
}

/// Partial profile update. The outer `Option` says whether the field is
/// touched at all; an inner `None` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub name:         Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub email:        Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub gender:       Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub gender_acc:   Option<Option<i64>>,
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub is_bot:       Option<Option<bool>>,
  #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
  pub country_code: Option<Option<String>>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool { self == &Self::default() }
}

/// Distinguishes an explicit `null` from an absent field.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: serde::Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// Whether a group is a top-level organization or a team inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
  Organization,
  Team,
}

/// A node of the group tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub id:         i64,
  pub name:       String,
  pub kind:       GroupKind,
  /// For teams: the organization at the root of the tree.
  pub parent_org: Option<i64>,
  /// For teams nested under another team.
  pub parent:     Option<i64>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
  pub domain:        String,
  pub is_top_domain: bool,
  /// Name of the owning organization.
  pub organization:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
  pub alias:        String,
  pub organization: String,
}

/// An organization together with its lookup keys and teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationView {
  pub name:    String,
  pub domains: Vec<Domain>,
  pub aliases: Vec<String>,
  pub teams:   Vec<String>,
}

// ─── Enrollments ─────────────────────────────────────────────────────────────

/// Affiliation of an individual with a group during a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub id:         i64,
  pub individual: String,
  pub group:      i64,
  pub period:     Period,
}

/// An enrollment as presented to callers, with group names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentView {
  pub group:      String,
  pub kind:       GroupKind,
  pub parent_org: Option<String>,
  pub start:      DateTime<Utc>,
  pub end:        DateTime<Utc>,
}

// ─── Materialised view ───────────────────────────────────────────────────────

/// The read model for an individual. Assembled on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualView {
  pub mk:            String,
  pub is_locked:     bool,
  pub created_at:    DateTime<Utc>,
  pub last_modified: DateTime<Utc>,
  pub identities:    Vec<Identity>,
  pub profile:       Option<Profile>,
  /// Ordered by `(start, end)`.
  pub enrollments:   Vec<EnrollmentView>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn profile_update_tells_null_from_absent() {
    let update: ProfileUpdate =
      serde_json::from_str(r#"{"name": null, "is_bot": true}"#).unwrap();
    assert_eq!(update.name, Some(None));
    assert_eq!(update.is_bot, Some(Some(true)));
    assert_eq!(update.email, None);
    assert!(!update.is_empty());
    assert!(ProfileUpdate::default().is_empty());
  }

  #[test]
  fn new_identity_builder() {
    let id = NewIdentity::new("scm").email("jsmith@example.com").username("jsmith");
    assert_eq!(id.source, "scm");
    assert_eq!(id.email.as_deref(), Some("jsmith@example.com"));
    assert_eq!(id.name, None);
  }
}
