//! The identity engine: adding, deleting and moving identities, merging and
//! unmerging individuals, locks and profiles.

use chrono::Utc;
use serde_json::json;

use sortinghat_core::{
  Ctx, Error, Result,
  hash::generate_uuid,
  journal::{EntityType, OperationType},
  model::{Identity, Individual, IndividualView, NewIdentity, Profile, ProfileUpdate},
  store::Store,
};

use crate::{
  enrollments, queries, resolve,
  txn::{Txn, run},
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Create an individual keyed by `mk` with a profile seeded from `name` and
/// `email`.
fn found_individual(
  txn: &mut Txn<'_>,
  mk: &str,
  name: Option<String>,
  email: Option<String>,
) -> Result<Individual> {
  let now = Utc::now();
  let individual = Individual {
    mk:            mk.to_owned(),
    is_locked:     false,
    created_at:    now,
    last_modified: now,
  };
  txn.uow.insert_individual(&individual)?;
  txn.record(OperationType::Add, EntityType::Individual, mk, json!({ "mk": mk }))?;

  let profile = Profile::seeded(mk, name, email);
  txn.uow.save_profile(&profile)?;
  txn.record(
    OperationType::Add,
    EntityType::Profile,
    mk,
    json!({ "individual": mk, "name": profile.name, "email": profile.email }),
  )?;
  Ok(individual)
}

fn delete_individual(txn: &mut Txn<'_>, mk: &str) -> Result<()> {
  txn.uow.delete_individual(mk)?;
  txn.record(OperationType::Delete, EntityType::Individual, mk, json!({ "mk": mk }))
}

fn reassign(txn: &mut Txn<'_>, identity: &Identity, to: &str) -> Result<()> {
  txn.uow.reassign_identity(&identity.uuid, to, Utc::now())?;
  txn.record(
    OperationType::Update,
    EntityType::Identity,
    &identity.uuid,
    json!({ "uuid": identity.uuid, "individual": to }),
  )
}

fn blank_to_none(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Identity fields hash verbatim; only all-blank values count as absent.
fn present(value: Option<String>) -> Option<String> { value.filter(|v| !v.trim().is_empty()) }

// ─── Add ─────────────────────────────────────────────────────────────────────

/// Register a new identity and return its uuid.
///
/// Without `uuid` the identity founds a new individual (with a profile copied
/// from its name and email); with it, the identity joins the individual that
/// `uuid` identifies. A duplicate tuple fails with `AlreadyExists` carrying
/// the stored uuid.
pub async fn add_identity<S: Store>(
  ctx: &Ctx<S>,
  new: NewIdentity,
  uuid: Option<&str>,
) -> Result<String> {
  let uuid = uuid.map(str::to_owned);
  run(ctx, "add_identity", move |txn| {
    let source = resolve::non_empty("source", &new.source)?.to_owned();
    let name = present(new.name);
    let email = present(new.email);
    let username = present(new.username);

    let id = generate_uuid(&source, email.as_deref(), name.as_deref(), username.as_deref())?;
    if let Some(existing) = txn.uow.identity(&id)? {
      return Err(Error::already_exists("identity", existing.uuid));
    }

    let individual = match &uuid {
      Some(uuid) => {
        let individual = resolve::unlocked_individual(txn.uow, uuid)?;
        txn.uow.touch_individual(&individual.mk, Utc::now())?;
        individual
      }
      None => found_individual(txn, &id, name.clone(), email.clone())?,
    };

    let now = Utc::now();
    let identity = Identity {
      uuid: id.clone(),
      source,
      name,
      email,
      username,
      individual: individual.mk.clone(),
      created_at: now,
      last_modified: now,
    };
    txn.uow.insert_identity(&identity)?;
    txn.record(
      OperationType::Add,
      EntityType::Identity,
      &id,
      json!({
        "uuid": id,
        "source": identity.source,
        "name": identity.name,
        "email": identity.email,
        "username": identity.username,
        "individual": identity.individual,
      }),
    )?;
    Ok(id)
  })
  .await
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// Delete an identity. When `uuid` is the `mk` of its individual, the whole
/// individual goes with it; the return value says whether that happened.
pub async fn delete_identity<S: Store>(ctx: &Ctx<S>, uuid: &str) -> Result<bool> {
  let uuid = uuid.to_owned();
  run(ctx, "delete_identity", move |txn| {
    let identity = resolve::identity(txn.uow, &uuid)?;
    let individual = resolve::unlocked_individual(txn.uow, &identity.individual)?;

    if individual.mk == identity.uuid {
      delete_individual(txn, &individual.mk)?;
      return Ok(true);
    }

    txn.uow.delete_identity(&identity.uuid)?;
    txn.record(OperationType::Delete, EntityType::Identity, &uuid, json!({ "uuid": uuid }))?;
    txn.uow.touch_individual(&individual.mk, Utc::now())?;
    Ok(false)
  })
  .await
}

// ─── Move ────────────────────────────────────────────────────────────────────

/// Move identity `from_uuid` into the individual identified by `to_uuid` and
/// return that individual's `mk`.
///
/// With `from_uuid == to_uuid` and no individual keyed by it, the identity is
/// split off into a new individual of its own. An individual emptied by the
/// move is deleted after its enrollments have been folded into the target.
pub async fn move_identity<S: Store>(ctx: &Ctx<S>, from_uuid: &str, to_uuid: &str) -> Result<String> {
  let (from_uuid, to_uuid) = (from_uuid.to_owned(), to_uuid.to_owned());
  run(ctx, "move_identity", move |txn| {
    let identity = resolve::identity(txn.uow, &from_uuid)?;
    let source = resolve::unlocked_individual(txn.uow, &identity.individual)?;
    let siblings = txn.uow.identities_of(&source.mk)?.len();

    if source.mk == identity.uuid && siblings > 1 {
      return Err(Error::invalid(format!(
        "identity {from_uuid} is the main key of its individual and cannot be moved"
      )));
    }

    let target = if from_uuid == to_uuid {
      match txn.uow.individual(&to_uuid)? {
        Some(target) => target,
        None => found_individual(txn, &to_uuid, identity.name.clone(), identity.email.clone())?,
      }
    } else {
      resolve::individual(txn.uow, &to_uuid)?
    };
    resolve::ensure_unlocked(&target)?;

    if target.mk == source.mk {
      return Ok(target.mk);
    }

    reassign(txn, &identity, &target.mk)?;
    if siblings == 1 {
      enrollments::reparent(txn, &source.mk, &target.mk)?;
      delete_individual(txn, &source.mk)?;
    } else {
      txn.uow.touch_individual(&source.mk, Utc::now())?;
    }
    txn.uow.touch_individual(&target.mk, Utc::now())?;
    Ok(target.mk)
  })
  .await
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Fill the empty fields of `to` from `from`. `gender` travels with its
/// accuracy; `is_bot` is sticky.
fn fill_profile(to: &mut Profile, from: &Profile) {
  if to.name.is_none() {
    to.name.clone_from(&from.name);
  }
  if to.email.is_none() {
    to.email.clone_from(&from.email);
  }
  if to.gender.is_none() && from.gender.is_some() {
    to.gender.clone_from(&from.gender);
    to.gender_acc = from.gender_acc;
  }
  if to.country.is_none() {
    to.country.clone_from(&from.country);
  }
  to.is_bot |= from.is_bot;
}

/// Merge the individuals identified by `from_uuids` into the one identified
/// by `to_uuid`, returning the surviving `mk`.
pub async fn merge<S: Store>(ctx: &Ctx<S>, from_uuids: &[String], to_uuid: &str) -> Result<String> {
  let (from_uuids, to_uuid) = (from_uuids.to_vec(), to_uuid.to_owned());
  run(ctx, "merge", move |txn| {
    if from_uuids.is_empty() {
      return Err(Error::invalid("'from_uuids' cannot be empty"));
    }
    let target = resolve::unlocked_individual(txn.uow, &to_uuid)?;

    let mut sources: Vec<Individual> = Vec::with_capacity(from_uuids.len());
    for uuid in &from_uuids {
      let source = resolve::unlocked_individual(txn.uow, uuid)?;
      if source.mk == target.mk {
        return Err(Error::invalid(format!(
          "'from_uuid' {uuid} and 'to_uuid' {to_uuid} cannot be the same individual"
        )));
      }
      if !sources.iter().any(|s| s.mk == source.mk) {
        sources.push(source);
      }
    }

    let mut profile = txn
      .uow
      .profile(&target.mk)?
      .unwrap_or_else(|| Profile::seeded(&target.mk, None, None));
    let before = profile.clone();

    for source in &sources {
      for identity in txn.uow.identities_of(&source.mk)? {
        reassign(txn, &identity, &target.mk)?;
      }
      enrollments::reparent(txn, &source.mk, &target.mk)?;
      if let Some(from) = txn.uow.profile(&source.mk)? {
        fill_profile(&mut profile, &from);
      }
      delete_individual(txn, &source.mk)?;
    }

    if profile != before {
      txn.uow.save_profile(&profile)?;
      txn.record(
        OperationType::Update,
        EntityType::Profile,
        &target.mk,
        json!({
          "individual": target.mk,
          "name": profile.name,
          "email": profile.email,
          "gender": profile.gender,
          "gender_acc": profile.gender_acc,
          "is_bot": profile.is_bot,
          "country_code": profile.country.as_ref().map(|c| &c.code),
        }),
      )?;
    }
    txn.uow.touch_individual(&target.mk, Utc::now())?;
    Ok(target.mk)
  })
  .await
}

// ─── Unmerge ─────────────────────────────────────────────────────────────────

/// Split each identity in `uuids` off into an individual of its own. Returns
/// the new `mk`s; identities already anchoring their individual are skipped.
pub async fn unmerge<S: Store>(ctx: &Ctx<S>, uuids: &[String]) -> Result<Vec<String>> {
  let mut uuids = uuids.to_vec();
  uuids.sort();
  uuids.dedup();

  run(ctx, "unmerge", move |txn| {
    let mut created = Vec::new();
    for uuid in &uuids {
      let identity = resolve::identity(txn.uow, uuid)?;
      let source = resolve::unlocked_individual(txn.uow, &identity.individual)?;
      if source.mk == identity.uuid {
        continue;
      }

      found_individual(txn, &identity.uuid, identity.name.clone(), identity.email.clone())?;
      reassign(txn, &identity, &identity.uuid)?;
      txn.uow.touch_individual(&source.mk, Utc::now())?;
      created.push(identity.uuid);
    }
    Ok(created)
  })
  .await
}

// ─── Locks ───────────────────────────────────────────────────────────────────

fn set_locked(txn: &mut Txn<'_>, uuid: &str, locked: bool) -> Result<String> {
  let individual = resolve::individual(txn.uow, uuid)?;
  txn.uow.set_locked(&individual.mk, locked, Utc::now())?;
  txn.record(
    OperationType::Update,
    EntityType::Individual,
    &individual.mk,
    json!({ "mk": individual.mk, "is_locked": locked }),
  )?;
  Ok(individual.mk)
}

/// Freeze an individual against every mutation but [`unlock`].
pub async fn lock<S: Store>(ctx: &Ctx<S>, uuid: &str) -> Result<String> {
  let uuid = uuid.to_owned();
  run(ctx, "lock", move |txn| set_locked(txn, &uuid, true)).await
}

pub async fn unlock<S: Store>(ctx: &Ctx<S>, uuid: &str) -> Result<String> {
  let uuid = uuid.to_owned();
  run(ctx, "unlock", move |txn| set_locked(txn, &uuid, false)).await
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// Apply `update` to `profile`. Blank strings and explicit nulls clear a field.
fn apply_update(txn: &Txn<'_>, profile: &mut Profile, update: ProfileUpdate) -> Result<()> {
  if let Some(name) = update.name {
    profile.name = blank_to_none(name);
  }
  if let Some(email) = update.email {
    profile.email = blank_to_none(email);
  }
  if let Some(is_bot) = update.is_bot {
    profile.is_bot = is_bot.unwrap_or(false);
  }

  let gender_acc = match update.gender_acc {
    Some(Some(acc)) if !(1..=100).contains(&acc) => {
      return Err(Error::invalid(format!("'gender_acc' {acc} is not in the range (1, 100)")));
    }
    Some(Some(acc)) => Some(Some(acc as u8)),
    Some(None) => Some(None),
    None => None,
  };

  match update.gender.map(blank_to_none) {
    Some(Some(gender)) => {
      profile.gender = Some(gender);
      profile.gender_acc = gender_acc.flatten().or(Some(100));
    }
    Some(None) => {
      profile.gender = None;
      profile.gender_acc = None;
    }
    None => {
      if let Some(acc) = gender_acc {
        if acc.is_some() && profile.gender.is_none() {
          return Err(Error::invalid("'gender_acc' can only be set together with 'gender'"));
        }
        profile.gender_acc = acc;
      }
    }
  }

  if let Some(code) = update.country_code {
    profile.country = match blank_to_none(code) {
      Some(code) => {
        let code = code.to_uppercase();
        Some(
          txn
            .uow
            .country(&code)?
            .ok_or_else(|| Error::invalid(format!("country code {code} is not valid")))?,
        )
      }
      None => None,
    };
  }
  Ok(())
}

/// Update the profile of the individual identified by `uuid` and return the
/// refreshed view of that individual.
pub async fn update_profile<S: Store>(
  ctx: &Ctx<S>,
  uuid: &str,
  update: ProfileUpdate,
) -> Result<IndividualView> {
  let uuid = uuid.to_owned();
  run(ctx, "update_profile", move |txn| {
    let individual = resolve::unlocked_individual(txn.uow, &uuid)?;
    let args = serde_json::to_value(&update)?;

    let mut profile = txn
      .uow
      .profile(&individual.mk)?
      .unwrap_or_else(|| Profile::seeded(&individual.mk, None, None));
    apply_update(txn, &mut profile, update)?;

    txn.uow.save_profile(&profile)?;
    txn.record(OperationType::Update, EntityType::Profile, &individual.mk, args)?;
    txn.uow.touch_individual(&individual.mk, Utc::now())?;

    queries::view(txn.uow, &individual.mk)
  })
  .await
}
