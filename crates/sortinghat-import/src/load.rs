//! Reconciliation of imported records against the registry.
//!
//! Every step is a regular engine call, so each one commits (and journals)
//! on its own. Record-level problems are logged and skipped; only failures
//! that leave a record half loaded abort the import.

use sortinghat_core::{Ctx, Error, Result, period::Period, store::Store};
use sortinghat_engine::{
  Enroll, add_domain, add_identity, add_organization, enroll, individual, merge, update_profile,
};
use tracing::{debug, info, warn};

use crate::model::{ImportData, ImportEnrollment, ImportIndividual, ImportReport};

/// Load `data` into the database behind `ctx`.
pub async fn load<S: Store>(ctx: &Ctx<S>, data: ImportData) -> Result<ImportReport> {
  let mut report = ImportReport { skipped: data.rejected.len(), ..Default::default() };

  for org in data.organizations {
    ensure_organization(ctx, &org.name).await?;
    for domain in org.domains {
      match add_domain(ctx, &org.name, &domain.domain, domain.is_top_domain).await {
        Ok(_) | Err(Error::AlreadyExists { .. }) => {}
        Err(e) => return Err(e),
      }
    }
  }

  for record in data.individuals {
    report.individuals += 1;
    load_individual(ctx, record, &mut report).await?;
  }

  info!(
    individuals = report.individuals,
    identities = report.identities_added,
    merges = report.merges,
    enrollments = report.enrollments_added,
    skipped = report.skipped,
    "import finished"
  );
  Ok(report)
}

async fn ensure_organization<S: Store>(ctx: &Ctx<S>, name: &str) -> Result<()> {
  match add_organization(ctx, name).await {
    Ok(_) | Err(Error::AlreadyExists { .. }) => Ok(()),
    Err(e) => Err(e),
  }
}

async fn load_individual<S: Store>(
  ctx: &Ctx<S>,
  record: ImportIndividual,
  report: &mut ImportReport,
) -> Result<()> {
  let mut uuid: Option<String> = None;

  for identity in record.identities {
    match add_identity(ctx, identity.clone(), uuid.as_deref()).await {
      Ok(id) => {
        report.identities_added += 1;
        uuid.get_or_insert(id);
      }
      Err(Error::AlreadyExists { existing, .. }) => {
        let found = individual(ctx, &existing).await?;
        match uuid.as_deref() {
          Some(current) if current != found.mk => {
            let current_view = individual(ctx, current).await?;
            if current_view.is_locked || found.is_locked {
              warn!(from = current, to = %found.mk, "individual locked; not merging");
              report.skipped += 1;
            } else {
              merge(ctx, &[current.to_owned()], &found.mk).await?;
              report.merges += 1;
            }
          }
          _ => {}
        }
        uuid = Some(found.mk);
      }
      Err(e @ (Error::InvalidValue(_) | Error::Locked(_))) => {
        warn!(?identity, error = %e, "skipping identity");
        report.skipped += 1;
      }
      Err(e) => return Err(e),
    }
  }

  let Some(uuid) = uuid else {
    debug!("record produced no identity");
    return Ok(());
  };

  for enrollment in record.enrollments {
    load_enrollment(ctx, &uuid, enrollment, report).await?;
  }

  if let Some(profile) = record.profile
    && !profile.is_empty()
  {
    match update_profile(ctx, &uuid, profile).await {
      Ok(_) => {}
      Err(e @ (Error::InvalidValue(_) | Error::Locked(_))) => {
        warn!(%uuid, error = %e, "skipping profile");
        report.skipped += 1;
      }
      Err(e) => return Err(e),
    }
  }
  Ok(())
}

async fn load_enrollment<S: Store>(
  ctx: &Ctx<S>,
  uuid: &str,
  enrollment: ImportEnrollment,
  report: &mut ImportReport,
) -> Result<()> {
  ensure_organization(ctx, &enrollment.organization).await?;

  let full = Period::full();
  let period = Period::bounded(
    enrollment.start.unwrap_or(full.start),
    enrollment.end.unwrap_or(full.end),
  );
  let req = Enroll::new(&enrollment.organization).from(period.start).to(period.end);
  match enroll(ctx, uuid, req).await {
    Ok(_) => report.enrollments_added += 1,
    Err(Error::AlreadyExists { .. } | Error::DuplicateRange { .. }) => {
      debug!(%uuid, organization = %enrollment.organization, "enrollment already present");
    }
    Err(e @ Error::Locked(_)) => {
      warn!(%uuid, error = %e, "skipping enrollment");
      report.skipped += 1;
    }
    Err(e @ (Error::NotFound { .. } | Error::InvalidValue(_))) => {
      return Err(Error::LoadError { record: uuid.to_owned(), cause: e.to_string() });
    }
    Err(e) => return Err(e),
  }
  Ok(())
}
