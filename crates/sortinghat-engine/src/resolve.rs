//! Lookups shared by the engines: uuid-to-individual resolution, lock guards,
//! and group resolution.

use sortinghat_core::{
  Error, Result,
  model::{Group, Identity, Individual},
  store::UnitOfWork,
};

/// The identity `uuid`, or `NotFound`.
pub fn identity(uow: &dyn UnitOfWork, uuid: &str) -> Result<Identity> {
  uow.identity(uuid)?.ok_or_else(|| Error::not_found("identity", uuid))
}

/// The individual whose `mk` is `uuid`, or that owns the identity `uuid`.
pub fn individual(uow: &dyn UnitOfWork, uuid: &str) -> Result<Individual> {
  if let Some(individual) = uow.individual(uuid)? {
    return Ok(individual);
  }
  let owner = match uow.identity(uuid)? {
    Some(identity) => uow.individual(&identity.individual)?,
    None => None,
  };
  owner.ok_or_else(|| Error::not_found("individual", uuid))
}

pub fn ensure_unlocked(individual: &Individual) -> Result<()> {
  if individual.is_locked {
    return Err(Error::Locked(individual.mk.clone()));
  }
  Ok(())
}

/// Like [`individual`], rejecting locked individuals.
pub fn unlocked_individual(uow: &dyn UnitOfWork, uuid: &str) -> Result<Individual> {
  let individual = individual(uow, uuid)?;
  ensure_unlocked(&individual)?;
  Ok(individual)
}

pub fn organization(uow: &dyn UnitOfWork, name: &str) -> Result<Group> {
  uow.organization(name)?.ok_or_else(|| Error::not_found("organization", name))
}

/// The organization `group`, or with `parent_org` set, the team `group` of
/// that organization.
pub fn group(uow: &dyn UnitOfWork, group: &str, parent_org: Option<&str>) -> Result<Group> {
  match parent_org {
    None => organization(uow, group),
    Some(org) => {
      let org = organization(uow, org)?;
      uow.team(org.id, group)?.ok_or_else(|| Error::not_found("team", group))
    }
  }
}

/// Trimmed `value`, or `InvalidValue` when nothing is left.
pub fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str> {
  let value = value.trim();
  if value.is_empty() {
    return Err(Error::invalid(format!("'{field}' cannot be an empty string")));
  }
  Ok(value)
}
