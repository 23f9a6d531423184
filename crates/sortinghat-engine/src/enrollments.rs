//! Enrollments: `enroll`, `withdraw` and `update_enrollment`, plus the union
//! helpers merges and moves use to re-parent enrollments.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use sortinghat_core::{
  Ctx, Error, Result,
  journal::{EntityType, OperationType},
  model::{Enrollment, Group, Individual},
  period::{self, Period},
  store::Store,
};

use crate::{
  resolve,
  txn::{Txn, run},
};

fn fmt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Secs, true) }

fn enrollment_args(mk: &str, group: &Group, period: &Period) -> serde_json::Value {
  json!({
    "individual": mk,
    "group": group.name,
    "start": fmt(period.start),
    "end": fmt(period.end),
  })
}

fn remove(txn: &mut Txn<'_>, enrollment: &Enrollment, group: &Group) -> Result<()> {
  txn.uow.delete_enrollment(enrollment.id)?;
  txn.record(
    OperationType::Delete,
    EntityType::Enrollment,
    &enrollment.individual,
    enrollment_args(&enrollment.individual, group, &enrollment.period),
  )
}

/// Add `period` to the enrollments of `mk` in `group`, fusing it with every
/// existing period it touches.
pub(crate) fn union_into(txn: &mut Txn<'_>, mk: &str, group: &Group, period: Period) -> Result<()> {
  let touching: Vec<Enrollment> = txn
    .uow
    .enrollments(mk, Some(group.id))?
    .into_iter()
    .filter(|e| e.period.touches(&period))
    .collect();

  if let [single] = touching.as_slice() {
    if single.period.contains(&period) {
      return Ok(());
    }
  }

  let merged = period::merge(touching.iter().map(|e| e.period).chain([period]));
  for enrollment in &touching {
    remove(txn, enrollment, group)?;
  }
  for p in merged {
    txn.uow.insert_enrollment(mk, group.id, p)?;
    txn.record(OperationType::Add, EntityType::Enrollment, mk, enrollment_args(mk, group, &p))?;
  }
  Ok(())
}

/// Move every enrollment of `from` onto `to` under the union rule.
pub(crate) fn reparent(txn: &mut Txn<'_>, from: &str, to: &str) -> Result<()> {
  for enrollment in txn.uow.enrollments(from, None)? {
    let group = txn
      .uow
      .group(enrollment.group)?
      .ok_or_else(|| Error::not_found("group", enrollment.group.to_string()))?;
    remove(txn, &enrollment, &group)?;
    union_into(txn, to, &group, enrollment.period)?;
  }
  Ok(())
}

/// Enrollment with the enclosure rule: a period already covered by an
/// existing one is a `DuplicateRange` unless `force` replaces the enclosing
/// enrollment by the narrower one.
fn enroll_period(
  txn: &mut Txn<'_>,
  individual: &Individual,
  group: &Group,
  period: Period,
  force: bool,
) -> Result<()> {
  let enclosing: Vec<Enrollment> = txn
    .uow
    .enrollments(&individual.mk, Some(group.id))?
    .into_iter()
    .filter(|e| e.period.contains(&period))
    .collect();

  if !enclosing.is_empty() {
    if !force {
      return Err(Error::DuplicateRange {
        group: group.name.clone(),
        start: fmt(period.start),
        end:   fmt(period.end),
      });
    }
    for enrollment in &enclosing {
      remove(txn, enrollment, group)?;
    }
  }

  union_into(txn, &individual.mk, group, period)?;
  txn.uow.touch_individual(&individual.mk, Utc::now())
}

// ─── Enroll ──────────────────────────────────────────────────────────────────

/// Arguments of [`enroll`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enroll {
  /// Organization name, or team name when `parent_org` is set.
  pub group:      String,
  #[serde(default)]
  pub parent_org: Option<String>,
  #[serde(default)]
  pub from_date:  Option<DateTime<Utc>>,
  #[serde(default)]
  pub to_date:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub force:      bool,
}

impl Enroll {
  pub fn new(group: impl Into<String>) -> Self {
    Self { group: group.into(), ..Default::default() }
  }

  pub fn team_of(mut self, org: impl Into<String>) -> Self {
    self.parent_org = Some(org.into());
    self
  }

  pub fn from(mut self, date: DateTime<Utc>) -> Self {
    self.from_date = Some(date);
    self
  }

  pub fn to(mut self, date: DateTime<Utc>) -> Self {
    self.to_date = Some(date);
    self
  }

  pub fn force(mut self) -> Self {
    self.force = true;
    self
  }
}

/// Enroll the individual identified by `uuid` in a group. Returns its `mk`.
pub async fn enroll<S: Store>(ctx: &Ctx<S>, uuid: &str, req: Enroll) -> Result<String> {
  let uuid = uuid.to_owned();
  run(ctx, "enroll", move |txn| {
    let period = Period::new(req.from_date, req.to_date)?;
    let individual = resolve::individual(txn.uow, &uuid)?;
    let group = resolve::group(txn.uow, &req.group, req.parent_org.as_deref())?;
    resolve::ensure_unlocked(&individual)?;

    enroll_period(txn, &individual, &group, period, req.force)?;
    Ok(individual.mk)
  })
  .await
}

// ─── Withdraw ────────────────────────────────────────────────────────────────

/// Arguments of [`withdraw`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Withdraw {
  pub group:      String,
  #[serde(default)]
  pub parent_org: Option<String>,
  #[serde(default)]
  pub from_date:  Option<DateTime<Utc>>,
  #[serde(default)]
  pub to_date:    Option<DateTime<Utc>>,
}

impl Withdraw {
  pub fn new(group: impl Into<String>) -> Self {
    Self { group: group.into(), ..Default::default() }
  }

  pub fn team_of(mut self, org: impl Into<String>) -> Self {
    self.parent_org = Some(org.into());
    self
  }

  pub fn from(mut self, date: DateTime<Utc>) -> Self {
    self.from_date = Some(date);
    self
  }

  pub fn to(mut self, date: DateTime<Utc>) -> Self {
    self.to_date = Some(date);
    self
  }
}

/// Remove a period from the enrollments of an individual in a group. Each
/// enrollment the cut changes is replaced by what survives of it; one that
/// the cut only meets at an endpoint is left alone.
pub async fn withdraw<S: Store>(ctx: &Ctx<S>, uuid: &str, req: Withdraw) -> Result<String> {
  let uuid = uuid.to_owned();
  run(ctx, "withdraw", move |txn| {
    let cut = Period::new(req.from_date, req.to_date)?;
    let individual = resolve::individual(txn.uow, &uuid)?;
    let group = resolve::group(txn.uow, &req.group, req.parent_org.as_deref())?;
    resolve::ensure_unlocked(&individual)?;

    let overlapping: Vec<Enrollment> = txn
      .uow
      .enrollments(&individual.mk, Some(group.id))?
      .into_iter()
      .filter(|e| e.period.is_cut_by(&cut))
      .collect();
    if overlapping.is_empty() {
      return Err(Error::not_found(
        "enrollment",
        format!("{}@{} {}..{}", individual.mk, group.name, fmt(cut.start), fmt(cut.end)),
      ));
    }

    for enrollment in &overlapping {
      remove(txn, enrollment, &group)?;
      for rest in enrollment.period.subtract(&cut) {
        txn.uow.insert_enrollment(&individual.mk, group.id, rest)?;
        txn.record(
          OperationType::Add,
          EntityType::Enrollment,
          &individual.mk,
          enrollment_args(&individual.mk, &group, &rest),
        )?;
      }
    }
    txn.uow.touch_individual(&individual.mk, Utc::now())?;
    Ok(individual.mk)
  })
  .await
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// Arguments of [`update_enrollment`]: the exact period to replace and the
/// new bounds (absent bounds keep the old ones).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnrollment {
  pub group:         String,
  #[serde(default)]
  pub parent_org:    Option<String>,
  pub from_date:     DateTime<Utc>,
  pub to_date:       DateTime<Utc>,
  #[serde(default)]
  pub new_from_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub new_to_date:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub force:         bool,
}

/// Replace one existing enrollment by a new range in a single transaction.
pub async fn update_enrollment<S: Store>(
  ctx: &Ctx<S>,
  uuid: &str,
  req: UpdateEnrollment,
) -> Result<String> {
  let uuid = uuid.to_owned();
  run(ctx, "update_enrollment", move |txn| {
    let old = Period::new(Some(req.from_date), Some(req.to_date))?;
    let new = Period::new(
      Some(req.new_from_date.unwrap_or(old.start)),
      Some(req.new_to_date.unwrap_or(old.end)),
    )?;
    let individual = resolve::individual(txn.uow, &uuid)?;
    let group = resolve::group(txn.uow, &req.group, req.parent_org.as_deref())?;
    resolve::ensure_unlocked(&individual)?;

    let current = txn
      .uow
      .enrollments(&individual.mk, Some(group.id))?
      .into_iter()
      .find(|e| e.period == old)
      .ok_or_else(|| {
        Error::not_found(
          "enrollment",
          format!("{}@{} {}..{}", individual.mk, group.name, fmt(old.start), fmt(old.end)),
        )
      })?;

    remove(txn, &current, &group)?;
    enroll_period(txn, &individual, &group, new, req.force)?;
    Ok(individual.mk)
  })
  .await
}
