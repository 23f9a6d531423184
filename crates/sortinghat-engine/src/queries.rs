//! Read-side queries. None of these journal anything.

use std::collections::HashMap;

use sortinghat_core::{
  Ctx, Result,
  journal::{Operation, Transaction},
  model::{Country, EnrollmentView, Group, IndividualView, OrganizationView},
  store::{
    CountryFilter, IndividualFilter, OrganizationFilter, Page, PageRequest, Store,
    TransactionFilter, UnitOfWork,
  },
};

use crate::{resolve, txn::read};

/// Assemble the read model of the individual keyed by `mk`.
pub(crate) fn view(uow: &dyn UnitOfWork, mk: &str) -> Result<IndividualView> {
  let individual = resolve::individual(uow, mk)?;
  let identities = uow.identities_of(&individual.mk)?;
  let profile = uow.profile(&individual.mk)?;

  let mut groups: HashMap<i64, Option<Group>> = HashMap::new();
  let mut lookup = |id: i64| -> Result<Option<Group>> {
    if let Some(group) = groups.get(&id) {
      return Ok(group.clone());
    }
    let group = uow.group(id)?;
    groups.insert(id, group.clone());
    Ok(group)
  };

  let mut enrollments = Vec::new();
  for enrollment in uow.enrollments(&individual.mk, None)? {
    let Some(group) = lookup(enrollment.group)? else { continue };
    let parent_org = match group.parent_org {
      Some(org) => lookup(org)?.map(|g| g.name),
      None => None,
    };
    enrollments.push(EnrollmentView {
      group: group.name,
      kind: group.kind,
      parent_org,
      start: enrollment.period.start,
      end: enrollment.period.end,
    });
  }

  Ok(IndividualView {
    mk: individual.mk,
    is_locked: individual.is_locked,
    created_at: individual.created_at,
    last_modified: individual.last_modified,
    identities,
    profile,
    enrollments,
  })
}

fn organization_view(uow: &dyn UnitOfWork, org: Group) -> Result<OrganizationView> {
  Ok(OrganizationView {
    domains: uow.domains_of(org.id)?,
    aliases: uow.aliases_of(org.id)?.into_iter().map(|a| a.alias).collect(),
    teams:   uow.teams_of(org.id)?.into_iter().map(|t| t.name).collect(),
    name:    org.name,
  })
}

/// The individual identified by `uuid` (its `mk` or any identity uuid).
pub async fn individual<S: Store>(ctx: &Ctx<S>, uuid: &str) -> Result<IndividualView> {
  let uuid = uuid.to_owned();
  read(ctx, move |uow| view(uow, &uuid)).await
}

pub async fn individuals<S: Store>(
  ctx: &Ctx<S>,
  filter: IndividualFilter,
  page: PageRequest,
) -> Result<Page<IndividualView>> {
  read(ctx, move |uow| {
    let (mks, total) = uow.search_individuals(&filter, page)?;
    let views = mks.iter().map(|mk| view(uow, mk)).collect::<Result<Vec<_>>>()?;
    Ok(Page::new(views, page, total))
  })
  .await
}

pub async fn organization<S: Store>(ctx: &Ctx<S>, name: &str) -> Result<OrganizationView> {
  let name = name.to_owned();
  read(ctx, move |uow| {
    let org = resolve::organization(uow, &name)?;
    organization_view(uow, org)
  })
  .await
}

pub async fn organizations<S: Store>(
  ctx: &Ctx<S>,
  filter: OrganizationFilter,
  page: PageRequest,
) -> Result<Page<OrganizationView>> {
  read(ctx, move |uow| {
    let (orgs, total) = uow.search_organizations(&filter, page)?;
    let views = orgs
      .into_iter()
      .map(|org| organization_view(uow, org))
      .collect::<Result<Vec<_>>>()?;
    Ok(Page::new(views, page, total))
  })
  .await
}

pub async fn countries<S: Store>(
  ctx: &Ctx<S>,
  filter: CountryFilter,
  page: PageRequest,
) -> Result<Page<Country>> {
  read(ctx, move |uow| {
    let (countries, total) = uow.search_countries(&filter, page)?;
    Ok(Page::new(countries, page, total))
  })
  .await
}

/// Journal transactions, newest first.
pub async fn transactions<S: Store>(
  ctx: &Ctx<S>,
  filter: TransactionFilter,
  page: PageRequest,
) -> Result<Page<Transaction>> {
  read(ctx, move |uow| {
    let (trxs, total) = uow.search_transactions(&filter, page)?;
    Ok(Page::new(trxs, page, total))
  })
  .await
}

/// Operations of one transaction in journal order.
pub async fn operations<S: Store>(ctx: &Ctx<S>, tuid: &str) -> Result<Vec<Operation>> {
  let tuid = tuid.to_owned();
  read(ctx, move |uow| uow.operations(&tuid)).await
}
