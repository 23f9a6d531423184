//! Audit journal records.
//!
//! Every engine mutation opens one [`Transaction`] and appends one or more
//! [`Operation`]s to it. Both tables are append-only; the only write a
//! transaction row ever receives after insertion is its closing stamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fresh journal key: a UUIDv7 as 32 lowercase hex characters. Keys minted in
/// the same process sort in creation order.
pub fn new_key() -> String { Uuid::now_v7().simple().to_string() }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
  Add,
  Delete,
  Update,
}

impl OperationType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Add => "ADD",
      Self::Delete => "DELETE",
      Self::Update => "UPDATE",
    }
  }
}

/// Kind of entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
  Individual,
  Identity,
  Profile,
  Enrollment,
  Organization,
  Team,
  Domain,
  Alias,
}

impl EntityType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Individual => "individual",
      Self::Identity => "identity",
      Self::Profile => "profile",
      Self::Enrollment => "enrollment",
      Self::Organization => "organization",
      Self::Team => "team",
      Self::Domain => "domain",
      Self::Alias => "alias",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub tuid:        String,
  /// Engine operation name, e.g. `add_identity`.
  pub name:        String,
  pub created_at:  DateTime<Utc>,
  pub closed_at:   Option<DateTime<Utc>>,
  pub is_closed:   bool,
  pub authored_by: Option<String>,
  pub tenant:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
  pub ouid:        String,
  pub op_type:     OperationType,
  pub entity_type: EntityType,
  /// Primary key (or name) of the entity touched.
  pub target:      String,
  pub timestamp:   DateTime<Utc>,
  /// Normalised inputs, enough to replay the operation against a cold store.
  pub args:        serde_json::Value,
  pub tuid:        String,
}
