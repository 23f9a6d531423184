//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so lexical order equals chronological order.
//! Booleans are stored as `0`/`1`; operation arguments as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use sortinghat_core::{
  journal::{EntityType, Operation, OperationType, Transaction},
  model::{Alias, Country, Domain, Enrollment, Group, GroupKind, Identity, Individual, Profile},
  period::Period,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── GroupKind ───────────────────────────────────────────────────────────────

pub fn encode_group_kind(k: GroupKind) -> &'static str {
  match k {
    GroupKind::Organization => "organization",
    GroupKind::Team => "team",
  }
}

pub fn decode_group_kind(s: &str) -> Result<GroupKind> {
  match s {
    "organization" => Ok(GroupKind::Organization),
    "team" => Ok(GroupKind::Team),
    other => Err(Error::UnknownValue { column: "kind", value: other.to_owned() }),
  }
}

// ─── Journal discriminants ───────────────────────────────────────────────────

pub fn decode_op_type(s: &str) -> Result<OperationType> {
  match s {
    "ADD" => Ok(OperationType::Add),
    "DELETE" => Ok(OperationType::Delete),
    "UPDATE" => Ok(OperationType::Update),
    other => Err(Error::UnknownValue { column: "op_type", value: other.to_owned() }),
  }
}

pub fn decode_entity_type(s: &str) -> Result<EntityType> {
  match s {
    "individual" => Ok(EntityType::Individual),
    "identity" => Ok(EntityType::Identity),
    "profile" => Ok(EntityType::Profile),
    "enrollment" => Ok(EntityType::Enrollment),
    "organization" => Ok(EntityType::Organization),
    "team" => Ok(EntityType::Team),
    "domain" => Ok(EntityType::Domain),
    "alias" => Ok(EntityType::Alias),
    other => Err(Error::UnknownValue { column: "entity_type", value: other.to_owned() }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `individuals` row.
pub struct RawIndividual {
  pub mk:            String,
  pub is_locked:     bool,
  pub created_at:    String,
  pub last_modified: String,
}

impl RawIndividual {
  pub const COLUMNS: &'static str = "mk, is_locked, created_at, last_modified";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mk:            row.get(0)?,
      is_locked:     row.get(1)?,
      created_at:    row.get(2)?,
      last_modified: row.get(3)?,
    })
  }

  pub fn into_individual(self) -> Result<Individual> {
    Ok(Individual {
      mk:            self.mk,
      is_locked:     self.is_locked,
      created_at:    decode_dt(&self.created_at)?,
      last_modified: decode_dt(&self.last_modified)?,
    })
  }
}

/// Raw values read directly from an `identities` row.
pub struct RawIdentity {
  pub uuid:          String,
  pub source:        String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  pub individual:    String,
  pub created_at:    String,
  pub last_modified: String,
}

impl RawIdentity {
  pub const COLUMNS: &'static str =
    "uuid, source, name, email, username, individual, created_at, last_modified";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      uuid:          row.get(0)?,
      source:        row.get(1)?,
      name:          row.get(2)?,
      email:         row.get(3)?,
      username:      row.get(4)?,
      individual:    row.get(5)?,
      created_at:    row.get(6)?,
      last_modified: row.get(7)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      uuid:          self.uuid,
      source:        self.source,
      name:          self.name,
      email:         self.email,
      username:      self.username,
      individual:    self.individual,
      created_at:    decode_dt(&self.created_at)?,
      last_modified: decode_dt(&self.last_modified)?,
    })
  }
}

/// A `profiles` row left-joined with `countries`.
pub struct RawProfile {
  pub individual:     String,
  pub name:           Option<String>,
  pub email:          Option<String>,
  pub gender:         Option<String>,
  pub gender_acc:     Option<u8>,
  pub is_bot:         bool,
  pub country_code:   Option<String>,
  pub country_alpha3: Option<String>,
  pub country_name:   Option<String>,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      individual:     row.get(0)?,
      name:           row.get(1)?,
      email:          row.get(2)?,
      gender:         row.get(3)?,
      gender_acc:     row.get(4)?,
      is_bot:         row.get(5)?,
      country_code:   row.get(6)?,
      country_alpha3: row.get(7)?,
      country_name:   row.get(8)?,
    })
  }

  pub fn into_profile(self) -> Profile {
    let country = match (self.country_code, self.country_alpha3, self.country_name) {
      (Some(code), Some(alpha3), Some(name)) => Some(Country { code, name, alpha3 }),
      _ => None,
    };
    Profile {
      individual: self.individual,
      name: self.name,
      email: self.email,
      gender: self.gender,
      gender_acc: self.gender_acc,
      is_bot: self.is_bot,
      country,
    }
  }
}

pub fn country_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Country> {
  Ok(Country {
    code:   row.get(0)?,
    alpha3: row.get(1)?,
    name:   row.get(2)?,
  })
}

/// Raw values read directly from an `org_groups` row.
pub struct RawGroup {
  pub id:         i64,
  pub name:       String,
  pub kind:       String,
  pub parent_org: Option<i64>,
  pub parent:     Option<i64>,
  pub created_at: String,
}

impl RawGroup {
  pub const COLUMNS: &'static str = "id, name, kind, parent_org, parent, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      kind:       row.get(2)?,
      parent_org: row.get(3)?,
      parent:     row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      id:         self.id,
      name:       self.name,
      kind:       decode_group_kind(&self.kind)?,
      parent_org: self.parent_org,
      parent:     self.parent,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// `domains` joined with the owning organization's name.
pub fn domain_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Domain> {
  Ok(Domain {
    domain:        row.get(0)?,
    is_top_domain: row.get(1)?,
    organization:  row.get(2)?,
  })
}

/// `aliases` joined with the owning organization's name.
pub fn alias_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alias> {
  Ok(Alias {
    alias:        row.get(0)?,
    organization: row.get(1)?,
  })
}

/// Raw values read directly from an `enrollments` row.
pub struct RawEnrollment {
  pub id:         i64,
  pub individual: String,
  pub group_id:   i64,
  pub start_at:   String,
  pub end_at:     String,
}

impl RawEnrollment {
  pub const COLUMNS: &'static str = "id, individual, group_id, start_at, end_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      individual: row.get(1)?,
      group_id:   row.get(2)?,
      start_at:   row.get(3)?,
      end_at:     row.get(4)?,
    })
  }

  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      id:         self.id,
      individual: self.individual,
      group:      self.group_id,
      period:     Period {
        start: decode_dt(&self.start_at)?,
        end:   decode_dt(&self.end_at)?,
      },
    })
  }
}

/// Raw values read directly from a `transactions` row.
pub struct RawTransaction {
  pub tuid:        String,
  pub name:        String,
  pub created_at:  String,
  pub closed_at:   Option<String>,
  pub is_closed:   bool,
  pub authored_by: Option<String>,
  pub tenant:      Option<String>,
}

impl RawTransaction {
  pub const COLUMNS: &'static str =
    "tuid, name, created_at, closed_at, is_closed, authored_by, tenant";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tuid:        row.get(0)?,
      name:        row.get(1)?,
      created_at:  row.get(2)?,
      closed_at:   row.get(3)?,
      is_closed:   row.get(4)?,
      authored_by: row.get(5)?,
      tenant:      row.get(6)?,
    })
  }

  pub fn into_transaction(self) -> Result<Transaction> {
    Ok(Transaction {
      tuid:        self.tuid,
      name:        self.name,
      created_at:  decode_dt(&self.created_at)?,
      closed_at:   decode_opt_dt(self.closed_at)?,
      is_closed:   self.is_closed,
      authored_by: self.authored_by,
      tenant:      self.tenant,
    })
  }
}

/// Raw values read directly from an `operations` row.
pub struct RawOperation {
  pub ouid:        String,
  pub op_type:     String,
  pub entity_type: String,
  pub target:      String,
  pub timestamp:   String,
  pub args:        String,
  pub tuid:        String,
}

impl RawOperation {
  pub const COLUMNS: &'static str = "ouid, op_type, entity_type, target, timestamp, args, tuid";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ouid:        row.get(0)?,
      op_type:     row.get(1)?,
      entity_type: row.get(2)?,
      target:      row.get(3)?,
      timestamp:   row.get(4)?,
      args:        row.get(5)?,
      tuid:        row.get(6)?,
    })
  }

  pub fn into_operation(self) -> Result<Operation> {
    Ok(Operation {
      ouid:        self.ouid,
      op_type:     decode_op_type(&self.op_type)?,
      entity_type: decode_entity_type(&self.entity_type)?,
      target:      self.target,
      timestamp:   decode_dt(&self.timestamp)?,
      args:        serde_json::from_str(&self.args)?,
      tuid:        self.tuid,
    })
  }
}
