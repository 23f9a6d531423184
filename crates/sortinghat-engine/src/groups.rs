//! Organizations, teams, domains and aliases.

use serde_json::json;

use sortinghat_core::{
  Ctx, Error, Result,
  journal::{EntityType, OperationType},
  model::GroupKind,
  store::Store,
};

use crate::{resolve, txn::run};

// ─── Organizations ───────────────────────────────────────────────────────────

pub async fn add_organization<S: Store>(ctx: &Ctx<S>, name: &str) -> Result<String> {
  let name = name.to_owned();
  run(ctx, "add_organization", move |txn| {
    let name = resolve::non_empty("name", &name)?;
    if txn.uow.organization(name)?.is_some() {
      return Err(Error::already_exists("organization", name));
    }
    txn.uow.insert_group(name, GroupKind::Organization, None, None)?;
    txn.record(OperationType::Add, EntityType::Organization, name, json!({ "name": name }))?;
    Ok(name.to_owned())
  })
  .await
}

/// Delete an organization together with its teams, domains, aliases and
/// every enrollment in any of them.
pub async fn delete_organization<S: Store>(ctx: &Ctx<S>, name: &str) -> Result<String> {
  let name = name.to_owned();
  run(ctx, "delete_organization", move |txn| {
    let org = resolve::organization(txn.uow, &name)?;
    txn.uow.delete_group(org.id)?;
    txn.record(OperationType::Delete, EntityType::Organization, &name, json!({ "name": name }))?;
    Ok(name)
  })
  .await
}

// ─── Domains ─────────────────────────────────────────────────────────────────

/// Attach `domain` (lowercased) to an organization.
pub async fn add_domain<S: Store>(
  ctx: &Ctx<S>,
  org: &str,
  domain: &str,
  is_top_domain: bool,
) -> Result<String> {
  let (org, domain) = (org.to_owned(), domain.to_owned());
  run(ctx, "add_domain", move |txn| {
    let domain = resolve::non_empty("domain", &domain)?.to_lowercase();
    let group = resolve::organization(txn.uow, &org)?;
    if let Some(existing) = txn.uow.domain(&domain)? {
      return Err(Error::already_exists("domain", existing.domain));
    }
    txn.uow.insert_domain(&domain, is_top_domain, group.id)?;
    txn.record(
      OperationType::Add,
      EntityType::Domain,
      &domain,
      json!({ "organization": group.name, "domain": domain, "is_top_domain": is_top_domain }),
    )?;
    Ok(domain)
  })
  .await
}

pub async fn delete_domain<S: Store>(ctx: &Ctx<S>, domain: &str) -> Result<String> {
  let domain = domain.trim().to_lowercase();
  run(ctx, "delete_domain", move |txn| {
    if txn.uow.domain(&domain)?.is_none() {
      return Err(Error::not_found("domain", domain));
    }
    txn.uow.delete_domain(&domain)?;
    txn.record(OperationType::Delete, EntityType::Domain, &domain, json!({ "domain": domain }))?;
    Ok(domain)
  })
  .await
}

// ─── Aliases ─────────────────────────────────────────────────────────────────

pub async fn add_alias<S: Store>(ctx: &Ctx<S>, org: &str, alias: &str) -> Result<String> {
  let (org, alias) = (org.to_owned(), alias.to_owned());
  run(ctx, "add_alias", move |txn| {
    let alias = resolve::non_empty("alias", &alias)?;
    let group = resolve::organization(txn.uow, &org)?;
    if txn.uow.alias(alias)?.is_some() {
      return Err(Error::already_exists("alias", alias));
    }
    txn.uow.insert_alias(alias, group.id)?;
    txn.record(
      OperationType::Add,
      EntityType::Alias,
      alias,
      json!({ "organization": group.name, "alias": alias }),
    )?;
    Ok(alias.to_owned())
  })
  .await
}

pub async fn delete_alias<S: Store>(ctx: &Ctx<S>, alias: &str) -> Result<String> {
  let alias = alias.to_owned();
  run(ctx, "delete_alias", move |txn| {
    if txn.uow.alias(&alias)?.is_none() {
      return Err(Error::not_found("alias", alias));
    }
    txn.uow.delete_alias(&alias)?;
    txn.record(OperationType::Delete, EntityType::Alias, &alias, json!({ "alias": alias }))?;
    Ok(alias)
  })
  .await
}

// ─── Teams ───────────────────────────────────────────────────────────────────

/// Add a team to `org`, optionally below another team of the same
/// organization.
pub async fn add_team<S: Store>(
  ctx: &Ctx<S>,
  org: &str,
  name: &str,
  parent_team: Option<&str>,
) -> Result<String> {
  let (org, name) = (org.to_owned(), name.to_owned());
  let parent_team = parent_team.map(str::to_owned);
  run(ctx, "add_team", move |txn| {
    let name = resolve::non_empty("name", &name)?;
    let group = resolve::organization(txn.uow, &org)?;
    let parent = match &parent_team {
      Some(parent) => Some(
        txn
          .uow
          .team(group.id, parent)?
          .ok_or_else(|| Error::not_found("team", parent.as_str()))?,
      ),
      None => None,
    };
    if txn.uow.team(group.id, name)?.is_some() {
      return Err(Error::already_exists("team", name));
    }

    txn.uow.insert_group(name, GroupKind::Team, Some(group.id), parent.as_ref().map(|p| p.id))?;
    txn.record(
      OperationType::Add,
      EntityType::Team,
      name,
      json!({ "organization": group.name, "name": name, "parent": parent_team }),
    )?;
    Ok(name.to_owned())
  })
  .await
}

/// Delete a team and its whole subtree.
pub async fn delete_team<S: Store>(ctx: &Ctx<S>, org: &str, name: &str) -> Result<String> {
  let (org, name) = (org.to_owned(), name.to_owned());
  run(ctx, "delete_team", move |txn| {
    let team = resolve::group(txn.uow, &name, Some(&org))?;
    txn.uow.delete_group(team.id)?;
    txn.record(
      OperationType::Delete,
      EntityType::Team,
      &name,
      json!({ "organization": org, "name": name }),
    )?;
    Ok(name)
  })
  .await
}
