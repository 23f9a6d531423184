//! Affiliation recommendations.
//!
//! A [`Recommender`] proposes organizations for an individual; [`affiliate`]
//! turns those proposals into full-range enrollments. The built-in
//! [`DomainRecommender`] only looks at identity email domains.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use sortinghat_core::{
  Ctx, Result,
  period::Period,
  store::{IndividualFilter, MAX_PAGE_SIZE, PageRequest, Store, UnitOfWork},
};

use crate::{enrollments, resolve, txn::run};

/// Pluggable source of affiliation proposals.
pub trait Recommender: Send + Sync + 'static {
  /// Organization names `mk` should be affiliated with, best first.
  fn recommend(&self, uow: &dyn UnitOfWork, mk: &str) -> Result<Vec<String>>;
}

/// Recommends the organizations owning the email domains of an individual's
/// identities.
///
/// A domain matches its own entry; failing that, the nearest parent domain
/// matches only when it is flagged as a top domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainRecommender;

impl DomainRecommender {
  fn lookup(uow: &dyn UnitOfWork, domain: &str) -> Result<Option<String>> {
    let mut candidate = domain;
    let mut exact = true;
    loop {
      if let Some(found) = uow.domain(candidate)? {
        if exact || found.is_top_domain {
          return Ok(Some(found.organization));
        }
      }
      match candidate.split_once('.') {
        Some((_, parent)) => {
          candidate = parent;
          exact = false;
        }
        None => return Ok(None),
      }
    }
  }
}

impl Recommender for DomainRecommender {
  fn recommend(&self, uow: &dyn UnitOfWork, mk: &str) -> Result<Vec<String>> {
    let mut orgs: Vec<String> = Vec::new();
    for identity in uow.identities_of(mk)? {
      let Some(email) = identity.email else { continue };
      let Some((_, domain)) = email.rsplit_once('@') else { continue };
      if let Some(org) = Self::lookup(uow, &domain.trim().to_lowercase())? {
        if !orgs.contains(&org) {
          orgs.push(org);
        }
      }
    }
    Ok(orgs)
  }
}

/// Outcome of [`affiliate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationResult {
  /// Organizations each individual was newly enrolled in.
  pub affiliated: BTreeMap<String, Vec<String>>,
  /// Locked individuals left untouched.
  pub locked:     Vec<String>,
}

fn all_individuals(uow: &dyn UnitOfWork) -> Result<Vec<String>> {
  let filter = IndividualFilter::default();
  let mut mks = Vec::new();
  let mut page = PageRequest::new(Some(1), Some(MAX_PAGE_SIZE));
  loop {
    let (batch, total) = uow.search_individuals(&filter, page)?;
    let done = batch.is_empty() || mks.len() as u64 + batch.len() as u64 >= total;
    mks.extend(batch);
    if done {
      return Ok(mks);
    }
    page.page += 1;
  }
}

/// Enroll individuals in the organizations `recommender` proposes, over the
/// full period, skipping organizations they are already enrolled in. An
/// empty `uuids` affiliates every individual.
pub async fn affiliate<S, R>(ctx: &Ctx<S>, uuids: &[String], recommender: R) -> Result<AffiliationResult>
where
  S: Store,
  R: Recommender,
{
  let uuids = uuids.to_vec();
  run(ctx, "affiliate", move |txn| {
    let mks = if uuids.is_empty() {
      all_individuals(txn.uow)?
    } else {
      let mut mks = Vec::with_capacity(uuids.len());
      for uuid in &uuids {
        let mk = resolve::individual(txn.uow, uuid)?.mk;
        if !mks.contains(&mk) {
          mks.push(mk);
        }
      }
      mks
    };

    let mut result = AffiliationResult::default();
    for mk in mks {
      let individual = resolve::individual(txn.uow, &mk)?;
      if individual.is_locked {
        result.locked.push(mk);
        continue;
      }

      let enrolled: HashSet<i64> =
        txn.uow.enrollments(&mk, None)?.into_iter().map(|e| e.group).collect();
      let mut added = Vec::new();
      for name in recommender.recommend(txn.uow, &mk)? {
        let org = resolve::organization(txn.uow, &name)?;
        if enrolled.contains(&org.id) {
          continue;
        }
        enrollments::union_into(txn, &mk, &org, Period::full())?;
        added.push(org.name);
      }

      if !added.is_empty() {
        txn.uow.touch_individual(&mk, Utc::now())?;
        result.affiliated.insert(mk, added);
      }
    }
    Ok(result)
  })
  .await
}
