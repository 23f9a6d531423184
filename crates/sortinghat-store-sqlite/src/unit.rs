//! [`SqliteUnit`]: one open SQLite transaction seen through [`UnitOfWork`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, types::Value};
use tokio_util::sync::CancellationToken;

use sortinghat_core::{
  self as core,
  journal::{Operation, Transaction},
  model::{Alias, Country, Domain, Enrollment, Group, GroupKind, Identity, Individual, Profile},
  period::Period,
  store::{
    CountryFilter, IndividualFilter, OrganizationFilter, PageRequest, TransactionFilter,
    UnitOfWork,
  },
};

use crate::{
  Error,
  encode::{
    RawEnrollment, RawGroup, RawIdentity, RawIndividual, RawOperation, RawProfile,
    RawTransaction, alias_from_row, country_from_row, domain_from_row, encode_dt,
    encode_group_kind,
  },
};

fn db(e: rusqlite::Error) -> core::Error { Error::Sqlite(e).into() }

/// `%term%` with LIKE wildcards in `term` escaped (use with `ESCAPE '\'`).
fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

/// Accumulates `AND`-joined SQL conditions with their positional parameters.
#[derive(Default)]
struct Where {
  clauses: Vec<String>,
  params:  Vec<Value>,
}

impl Where {
  fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
    self.clauses.push(clause.into());
    self.params.extend(params);
  }

  fn sql(&self) -> String {
    if self.clauses.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.clauses.join(" AND "))
    }
  }

  /// Count matching rows of `from`, then fetch one page of `select`.
  fn paged<T>(
    &self,
    conn: &Connection,
    from: &str,
    select: &str,
    order: &str,
    page: PageRequest,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> core::Result<(Vec<T>, u64)> {
    let where_sql = self.sql();

    let total: i64 = conn
      .query_row(
        &format!("SELECT COUNT(*) FROM {from}{where_sql}"),
        rusqlite::params_from_iter(self.params.iter()),
        |r| r.get(0),
      )
      .map_err(db)?;

    let mut params = self.params.clone();
    params.push(Value::Integer(page.limit()));
    params.push(Value::Integer(page.offset()));

    let mut stmt = conn
      .prepare(&format!("SELECT {select} FROM {from}{where_sql} ORDER BY {order} LIMIT ? OFFSET ?"))
      .map_err(db)?;
    let rows = stmt
      .query_map(rusqlite::params_from_iter(params.iter()), map)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;

    Ok((rows, total.max(0) as u64))
  }
}

const PROFILE_SELECT: &str = "SELECT p.individual, p.name, p.email, p.gender, p.gender_acc,
    p.is_bot, c.code, c.alpha3, c.name
  FROM profiles p LEFT JOIN countries c ON c.code = p.country_code";

const DOMAIN_SELECT: &str = "SELECT d.domain, d.is_top_domain, g.name
  FROM domains d JOIN org_groups g ON g.id = d.organization";

const ALIAS_SELECT: &str =
  "SELECT a.alias, g.name FROM aliases a JOIN org_groups g ON g.id = a.organization";

// ─── Unit ────────────────────────────────────────────────────────────────────

/// Borrowed view of an open `BEGIN IMMEDIATE` transaction.
pub struct SqliteUnit<'a> {
  conn:   &'a Connection,
  cancel: CancellationToken,
}

impl<'a> SqliteUnit<'a> {
  pub fn new(conn: &'a Connection, cancel: CancellationToken) -> Self { Self { conn, cancel } }

  /// The connection, unless the request has been cancelled.
  fn tx(&self) -> core::Result<&'a Connection> {
    if self.cancel.is_cancelled() {
      return Err(core::Error::Cancelled);
    }
    Ok(self.conn)
  }

  fn execute(&self, sql: &str, params: impl rusqlite::Params) -> core::Result<usize> {
    self.tx()?.execute(sql, params).map_err(db)
  }

  fn group_name(&self, id: i64) -> core::Result<String> {
    self
      .tx()?
      .query_row("SELECT name FROM org_groups WHERE id = ?1", [id], |r| r.get(0))
      .optional()
      .map_err(db)?
      .ok_or_else(|| core::Error::not_found("group", id.to_string()))
  }

  fn query_groups(
    &self,
    sql: &str,
    params: impl rusqlite::Params,
  ) -> core::Result<Vec<Group>> {
    let mut stmt = self.tx()?.prepare(sql).map_err(db)?;
    let raws = stmt
      .query_map(params, RawGroup::from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;
    Ok(raws.into_iter().map(RawGroup::into_group).collect::<Result<_, Error>>()?)
  }

  fn query_group(&self, sql: &str, params: impl rusqlite::Params) -> core::Result<Option<Group>> {
    let raw = self
      .tx()?
      .query_row(sql, params, RawGroup::from_row)
      .optional()
      .map_err(db)?;
    Ok(raw.map(RawGroup::into_group).transpose()?)
  }
}

impl UnitOfWork for SqliteUnit<'_> {
  // ── Individuals ───────────────────────────────────────────────────────────

  fn individual(&self, mk: &str) -> core::Result<Option<Individual>> {
    let raw = self
      .tx()?
      .query_row(
        &format!("SELECT {} FROM individuals WHERE mk = ?1", RawIndividual::COLUMNS),
        [mk],
        RawIndividual::from_row,
      )
      .optional()
      .map_err(db)?;
    Ok(raw.map(RawIndividual::into_individual).transpose()?)
  }

  fn insert_individual(&mut self, individual: &Individual) -> core::Result<()> {
    self.execute(
      "INSERT INTO individuals (mk, is_locked, created_at, last_modified)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![
        individual.mk,
        individual.is_locked,
        encode_dt(individual.created_at),
        encode_dt(individual.last_modified),
      ],
    )?;
    Ok(())
  }

  fn set_locked(&mut self, mk: &str, locked: bool, at: DateTime<Utc>) -> core::Result<()> {
    self.execute(
      "UPDATE individuals SET is_locked = ?2, last_modified = ?3 WHERE mk = ?1",
      rusqlite::params![mk, locked, encode_dt(at)],
    )?;
    Ok(())
  }

  fn touch_individual(&mut self, mk: &str, at: DateTime<Utc>) -> core::Result<()> {
    self.execute(
      "UPDATE individuals SET last_modified = ?2 WHERE mk = ?1",
      rusqlite::params![mk, encode_dt(at)],
    )?;
    Ok(())
  }

  fn delete_individual(&mut self, mk: &str) -> core::Result<()> {
    self.execute("DELETE FROM individuals WHERE mk = ?1", [mk])?;
    Ok(())
  }

  // ── Identities ────────────────────────────────────────────────────────────

  fn identity(&self, uuid: &str) -> core::Result<Option<Identity>> {
    let raw = self
      .tx()?
      .query_row(
        &format!("SELECT {} FROM identities WHERE uuid = ?1", RawIdentity::COLUMNS),
        [uuid],
        RawIdentity::from_row,
      )
      .optional()
      .map_err(db)?;
    Ok(raw.map(RawIdentity::into_identity).transpose()?)
  }

  fn identities_of(&self, mk: &str) -> core::Result<Vec<Identity>> {
    let mut stmt = self
      .tx()?
      .prepare(&format!(
        "SELECT {} FROM identities WHERE individual = ?1 ORDER BY uuid",
        RawIdentity::COLUMNS
      ))
      .map_err(db)?;
    let raws = stmt
      .query_map([mk], RawIdentity::from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;
    Ok(raws.into_iter().map(RawIdentity::into_identity).collect::<Result<_, Error>>()?)
  }

  fn insert_identity(&mut self, identity: &Identity) -> core::Result<()> {
    self.execute(
      "INSERT INTO identities (
         uuid, source, name, email, username, individual, created_at, last_modified
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      rusqlite::params![
        identity.uuid,
        identity.source,
        identity.name,
        identity.email,
        identity.username,
        identity.individual,
        encode_dt(identity.created_at),
        encode_dt(identity.last_modified),
      ],
    )?;
    Ok(())
  }

  fn reassign_identity(&mut self, uuid: &str, mk: &str, at: DateTime<Utc>) -> core::Result<()> {
    self.execute(
      "UPDATE identities SET individual = ?2, last_modified = ?3 WHERE uuid = ?1",
      rusqlite::params![uuid, mk, encode_dt(at)],
    )?;
    Ok(())
  }

  fn delete_identity(&mut self, uuid: &str) -> core::Result<()> {
    self.execute("DELETE FROM identities WHERE uuid = ?1", [uuid])?;
    Ok(())
  }

  // ── Profiles & countries ──────────────────────────────────────────────────

  fn profile(&self, mk: &str) -> core::Result<Option<Profile>> {
    let raw = self
      .tx()?
      .query_row(&format!("{PROFILE_SELECT} WHERE p.individual = ?1"), [mk], RawProfile::from_row)
      .optional()
      .map_err(db)?;
    Ok(raw.map(RawProfile::into_profile))
  }

  fn save_profile(&mut self, profile: &Profile) -> core::Result<()> {
    let country = profile.country.as_ref().map(|c| c.code.clone());
    self.execute(
      "INSERT INTO profiles (individual, name, email, gender, gender_acc, is_bot, country_code)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT (individual) DO UPDATE SET
         name = excluded.name,
         email = excluded.email,
         gender = excluded.gender,
         gender_acc = excluded.gender_acc,
         is_bot = excluded.is_bot,
         country_code = excluded.country_code",
      rusqlite::params![
        profile.individual,
        profile.name,
        profile.email,
        profile.gender,
        profile.gender_acc,
        profile.is_bot,
        country,
      ],
    )?;
    Ok(())
  }

  fn country(&self, code: &str) -> core::Result<Option<Country>> {
    self
      .tx()?
      .query_row(
        "SELECT code, alpha3, name FROM countries WHERE code = ?1",
        [code],
        country_from_row,
      )
      .optional()
      .map_err(db)
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  fn group(&self, id: i64) -> core::Result<Option<Group>> {
    self.query_group(&format!("SELECT {} FROM org_groups WHERE id = ?1", RawGroup::COLUMNS), [id])
  }

  fn organization(&self, name: &str) -> core::Result<Option<Group>> {
    self.query_group(
      &format!(
        "SELECT {} FROM org_groups WHERE kind = 'organization' AND name = ?1",
        RawGroup::COLUMNS
      ),
      [name],
    )
  }

  fn team(&self, org: i64, name: &str) -> core::Result<Option<Group>> {
    self.query_group(
      &format!(
        "SELECT {} FROM org_groups WHERE kind = 'team' AND parent_org = ?1 AND name = ?2",
        RawGroup::COLUMNS
      ),
      rusqlite::params![org, name],
    )
  }

  fn teams_of(&self, org: i64) -> core::Result<Vec<Group>> {
    self.query_groups(
      &format!("SELECT {} FROM org_groups WHERE parent_org = ?1 ORDER BY id", RawGroup::COLUMNS),
      [org],
    )
  }

  fn insert_group(
    &mut self,
    name: &str,
    kind: GroupKind,
    parent_org: Option<i64>,
    parent: Option<i64>,
  ) -> core::Result<Group> {
    let created_at = Utc::now();
    let conn = self.tx()?;
    conn
      .execute(
        "INSERT INTO org_groups (name, kind, parent_org, parent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![name, encode_group_kind(kind), parent_org, parent, encode_dt(created_at)],
      )
      .map_err(db)?;
    Ok(Group {
      id: conn.last_insert_rowid(),
      name: name.to_owned(),
      kind,
      parent_org,
      parent,
      created_at,
    })
  }

  fn delete_group(&mut self, id: i64) -> core::Result<()> {
    self.execute("DELETE FROM org_groups WHERE id = ?1", [id])?;
    Ok(())
  }

  // ── Domains & aliases ─────────────────────────────────────────────────────

  fn domain(&self, domain: &str) -> core::Result<Option<Domain>> {
    self
      .tx()?
      .query_row(&format!("{DOMAIN_SELECT} WHERE d.domain = ?1"), [domain], domain_from_row)
      .optional()
      .map_err(db)
  }

  fn domains_of(&self, org: i64) -> core::Result<Vec<Domain>> {
    let mut stmt = self
      .tx()?
      .prepare(&format!("{DOMAIN_SELECT} WHERE d.organization = ?1 ORDER BY d.domain"))
      .map_err(db)?;
    stmt
      .query_map([org], domain_from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)
  }

  fn insert_domain(&mut self, domain: &str, is_top_domain: bool, org: i64) -> core::Result<Domain> {
    self.execute(
      "INSERT INTO domains (domain, is_top_domain, organization) VALUES (?1, ?2, ?3)",
      rusqlite::params![domain, is_top_domain, org],
    )?;
    Ok(Domain {
      domain: domain.to_owned(),
      is_top_domain,
      organization: self.group_name(org)?,
    })
  }

  fn delete_domain(&mut self, domain: &str) -> core::Result<()> {
    self.execute("DELETE FROM domains WHERE domain = ?1", [domain])?;
    Ok(())
  }

  fn alias(&self, alias: &str) -> core::Result<Option<Alias>> {
    self
      .tx()?
      .query_row(&format!("{ALIAS_SELECT} WHERE a.alias = ?1"), [alias], alias_from_row)
      .optional()
      .map_err(db)
  }

  fn aliases_of(&self, org: i64) -> core::Result<Vec<Alias>> {
    let mut stmt = self
      .tx()?
      .prepare(&format!("{ALIAS_SELECT} WHERE a.organization = ?1 ORDER BY a.alias"))
      .map_err(db)?;
    stmt
      .query_map([org], alias_from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)
  }

  fn insert_alias(&mut self, alias: &str, org: i64) -> core::Result<Alias> {
    self.execute(
      "INSERT INTO aliases (alias, organization) VALUES (?1, ?2)",
      rusqlite::params![alias, org],
    )?;
    Ok(Alias { alias: alias.to_owned(), organization: self.group_name(org)? })
  }

  fn delete_alias(&mut self, alias: &str) -> core::Result<()> {
    self.execute("DELETE FROM aliases WHERE alias = ?1", [alias])?;
    Ok(())
  }

  // ── Enrollments ───────────────────────────────────────────────────────────

  fn enrollments(&self, mk: &str, group: Option<i64>) -> core::Result<Vec<Enrollment>> {
    let mut stmt = self
      .tx()?
      .prepare(&format!(
        "SELECT {} FROM enrollments
         WHERE individual = ?1 AND (?2 IS NULL OR group_id = ?2)
         ORDER BY start_at, end_at, id",
        RawEnrollment::COLUMNS
      ))
      .map_err(db)?;
    let raws = stmt
      .query_map(rusqlite::params![mk, group], RawEnrollment::from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;
    Ok(raws.into_iter().map(RawEnrollment::into_enrollment).collect::<Result<_, Error>>()?)
  }

  fn insert_enrollment(&mut self, mk: &str, group: i64, period: Period) -> core::Result<Enrollment> {
    let conn = self.tx()?;
    conn
      .execute(
        "INSERT INTO enrollments (individual, group_id, start_at, end_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![mk, group, encode_dt(period.start), encode_dt(period.end)],
      )
      .map_err(db)?;
    Ok(Enrollment {
      id: conn.last_insert_rowid(),
      individual: mk.to_owned(),
      group,
      period,
    })
  }

  fn delete_enrollment(&mut self, id: i64) -> core::Result<()> {
    self.execute("DELETE FROM enrollments WHERE id = ?1", [id])?;
    Ok(())
  }

  // ── Journal ───────────────────────────────────────────────────────────────

  fn insert_transaction(&mut self, trx: &Transaction) -> core::Result<()> {
    self.execute(
      "INSERT INTO transactions (
         tuid, name, created_at, closed_at, is_closed, authored_by, tenant
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        trx.tuid,
        trx.name,
        encode_dt(trx.created_at),
        trx.closed_at.map(encode_dt),
        trx.is_closed,
        trx.authored_by,
        trx.tenant,
      ],
    )?;
    Ok(())
  }

  fn close_transaction(&mut self, tuid: &str, at: DateTime<Utc>) -> core::Result<()> {
    self.execute(
      "UPDATE transactions SET closed_at = ?2, is_closed = 1 WHERE tuid = ?1 AND is_closed = 0",
      rusqlite::params![tuid, encode_dt(at)],
    )?;
    Ok(())
  }

  fn insert_operation(&mut self, op: &Operation) -> core::Result<()> {
    let args = serde_json::to_string(&op.args)?;
    self.execute(
      "INSERT INTO operations (ouid, op_type, entity_type, target, timestamp, args, tuid)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        op.ouid,
        op.op_type.as_str(),
        op.entity_type.as_str(),
        op.target,
        encode_dt(op.timestamp),
        args,
        op.tuid,
      ],
    )?;
    Ok(())
  }

  // ── Paginated reads ───────────────────────────────────────────────────────

  fn search_individuals(
    &self,
    filter: &IndividualFilter,
    page: PageRequest,
  ) -> core::Result<(Vec<String>, u64)> {
    let mut w = Where::default();

    if let Some(uuid) = &filter.uuid {
      w.push(
        "(i.mk = ? OR i.mk IN (SELECT individual FROM identities WHERE uuid = ?))",
        [Value::Text(uuid.clone()), Value::Text(uuid.clone())],
      );
    }
    if let Some(term) = &filter.term {
      let pat = like_pattern(term);
      w.push(
        "(i.mk IN (SELECT individual FROM identities
                    WHERE name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\'
                       OR username LIKE ? ESCAPE '\\')
          OR i.mk IN (SELECT individual FROM profiles
                       WHERE name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\'))",
        std::iter::repeat_n(Value::Text(pat), 5),
      );
    }
    if let Some(locked) = filter.is_locked {
      w.push("i.is_locked = ?", [Value::Integer(i64::from(locked))]);
    }
    if let Some(org) = &filter.enrolled_in {
      w.push(
        "i.mk IN (SELECT e.individual FROM enrollments e
                    JOIN org_groups g ON g.id = e.group_id
                    LEFT JOIN org_groups o ON o.id = g.parent_org
                   WHERE (g.kind = 'organization' AND g.name = ?) OR o.name = ?)",
        [Value::Text(org.clone()), Value::Text(org.clone())],
      );
    }

    w.paged(self.tx()?, "individuals i", "i.mk", "i.mk", page, |r| r.get(0))
  }

  fn search_organizations(
    &self,
    filter: &OrganizationFilter,
    page: PageRequest,
  ) -> core::Result<(Vec<Group>, u64)> {
    let mut w = Where::default();
    w.push("g.kind = 'organization'", []);

    if let Some(term) = &filter.term {
      let pat = like_pattern(term);
      w.push(
        "(g.name LIKE ? ESCAPE '\\'
          OR g.id IN (SELECT organization FROM domains WHERE domain LIKE ? ESCAPE '\\')
          OR g.id IN (SELECT organization FROM aliases WHERE alias LIKE ? ESCAPE '\\'))",
        std::iter::repeat_n(Value::Text(pat), 3),
      );
    }

    let select = "g.id, g.name, g.kind, g.parent_org, g.parent, g.created_at";
    let (raws, total) =
      w.paged(self.tx()?, "org_groups g", select, "g.name", page, RawGroup::from_row)?;
    let groups = raws.into_iter().map(RawGroup::into_group).collect::<Result<_, Error>>()?;
    Ok((groups, total))
  }

  fn search_countries(
    &self,
    filter: &CountryFilter,
    page: PageRequest,
  ) -> core::Result<(Vec<Country>, u64)> {
    let mut w = Where::default();

    if let Some(code) = &filter.code {
      w.push("code = ?", [Value::Text(code.to_uppercase())]);
    }
    if let Some(term) = &filter.term {
      w.push(
        "(name LIKE ? ESCAPE '\\' OR code = ? OR alpha3 = ?)",
        [
          Value::Text(like_pattern(term)),
          Value::Text(term.to_uppercase()),
          Value::Text(term.to_uppercase()),
        ],
      );
    }

    w.paged(self.tx()?, "countries", "code, alpha3, name", "code", page, country_from_row)
  }

  fn search_transactions(
    &self,
    filter: &TransactionFilter,
    page: PageRequest,
  ) -> core::Result<(Vec<Transaction>, u64)> {
    let mut w = Where::default();

    if let Some(name) = &filter.name {
      w.push("name = ?", [Value::Text(name.clone())]);
    }
    if let Some(author) = &filter.authored_by {
      w.push("authored_by = ?", [Value::Text(author.clone())]);
    }
    if let Some(from) = filter.from_date {
      w.push("created_at >= ?", [Value::Text(encode_dt(from))]);
    }

    let (raws, total) = w.paged(
      self.tx()?,
      "transactions",
      RawTransaction::COLUMNS,
      "created_at DESC, tuid DESC",
      page,
      RawTransaction::from_row,
    )?;
    let trxs = raws
      .into_iter()
      .map(RawTransaction::into_transaction)
      .collect::<Result<_, Error>>()?;
    Ok((trxs, total))
  }

  fn operations(&self, tuid: &str) -> core::Result<Vec<Operation>> {
    let mut stmt = self
      .tx()?
      .prepare(&format!(
        "SELECT {} FROM operations WHERE tuid = ?1 ORDER BY timestamp, ouid",
        RawOperation::COLUMNS
      ))
      .map_err(db)?;
    let raws = stmt
      .query_map([tuid], RawOperation::from_row)
      .map_err(db)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db)?;
    Ok(raws.into_iter().map(RawOperation::into_operation).collect::<Result<_, Error>>()?)
  }
}
