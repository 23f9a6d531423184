//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeZone, Utc};
use sortinghat_core::{
  Error as CoreError,
  journal::{EntityType, Operation, OperationType, Transaction, new_key},
  model::{GroupKind, Identity, Individual, Profile},
  period::Period,
  store::{
    CountryFilter, IndividualFilter, OrganizationFilter, PageRequest, Store, TransactionFilter,
    UnitOfWork,
  },
  tenancy::{Tenancy, Tenant},
};
use tokio_util::sync::CancellationToken;

use crate::{SqliteStore, TenantRouter};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn individual(mk: &str) -> Individual {
  let now = Utc::now();
  Individual {
    mk:            mk.to_owned(),
    is_locked:     false,
    created_at:    now,
    last_modified: now,
  }
}

fn identity(uuid: &str, mk: &str, email: &str) -> Identity {
  let now = Utc::now();
  Identity {
    uuid:          uuid.to_owned(),
    source:        "scm".to_owned(),
    name:          None,
    email:         Some(email.to_owned()),
    username:      None,
    individual:    mk.to_owned(),
    created_at:    now,
    last_modified: now,
  }
}

/// Insert an individual with a single identity whose uuid is `mk`.
fn seed(uow: &mut dyn UnitOfWork, mk: &str, email: &str) -> sortinghat_core::Result<()> {
  uow.insert_individual(&individual(mk))?;
  uow.insert_identity(&identity(mk, mk, email))
}

fn ymd(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

// ─── Units of work ───────────────────────────────────────────────────────────

#[tokio::test]
async fn committed_unit_is_visible() {
  let s = store().await;
  s.transact(CancellationToken::new(), |uow| seed(uow, "aaa", "a@example.com"))
    .await
    .unwrap();

  let (ind, ids) = s
    .transact(CancellationToken::new(), |uow| {
      Ok((uow.individual("aaa")?, uow.identities_of("aaa")?))
    })
    .await
    .unwrap();
  assert_eq!(ind.unwrap().mk, "aaa");
  assert_eq!(ids.len(), 1);
  assert_eq!(ids[0].email.as_deref(), Some("a@example.com"));
}

#[tokio::test]
async fn failed_unit_rolls_back() {
  let s = store().await;
  let err = s
    .transact(CancellationToken::new(), |uow| {
      seed(uow, "aaa", "a@example.com")?;
      Err::<(), _>(CoreError::invalid("boom"))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidValue(_)));

  let found = s
    .transact(CancellationToken::new(), |uow| uow.individual("aaa"))
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn cancelled_unit_rolls_back() {
  let s = store().await;
  let cancel = CancellationToken::new();
  let inner = cancel.clone();
  let err = s
    .transact(cancel, move |uow| {
      seed(uow, "aaa", "a@example.com")?;
      inner.cancel();
      uow.individual("aaa")
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Cancelled));

  let found = s
    .transact(CancellationToken::new(), |uow| uow.individual("aaa"))
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn cancellation_before_commit_discards_writes() {
  let s = store().await;
  let cancel = CancellationToken::new();
  let inner = cancel.clone();
  let err = s
    .transact(cancel, move |uow| {
      seed(uow, "aaa", "a@example.com")?;
      inner.cancel();
      Ok(())
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Cancelled));
}

#[tokio::test]
async fn duplicate_key_maps_to_conflict() {
  let s = store().await;
  s.transact(CancellationToken::new(), |uow| seed(uow, "aaa", "a@example.com"))
    .await
    .unwrap();
  let err = s
    .transact(CancellationToken::new(), |uow| seed(uow, "aaa", "a@example.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");
}

// ─── Individuals, identities, profiles ───────────────────────────────────────

#[tokio::test]
async fn deleting_individual_cascades() {
  let s = store().await;
  s.transact(CancellationToken::new(), |uow| {
    seed(uow, "aaa", "a@example.com")?;
    uow.insert_identity(&identity("bbb", "aaa", "b@example.com"))?;
    uow.save_profile(&Profile::seeded("aaa", Some("A".into()), None))?;
    let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
    uow.insert_enrollment("aaa", org.id, Period::full())?;
    uow.delete_individual("aaa")
  })
  .await
  .unwrap();

  let (ids, profile, enrollments) = s
    .transact(CancellationToken::new(), |uow| {
      Ok((uow.identity("bbb")?, uow.profile("aaa")?, uow.enrollments("aaa", None)?))
    })
    .await
    .unwrap();
  assert!(ids.is_none());
  assert!(profile.is_none());
  assert!(enrollments.is_empty());
}

#[tokio::test]
async fn profile_upsert_resolves_country() {
  let s = store().await;
  let profile = s
    .transact(CancellationToken::new(), |uow| {
      seed(uow, "aaa", "a@example.com")?;
      uow.save_profile(&Profile::seeded("aaa", Some("A".into()), None))?;

      let mut profile = uow.profile("aaa")?.expect("profile");
      profile.gender = Some("female".into());
      profile.gender_acc = Some(100);
      profile.country = uow.country("ES")?;
      uow.save_profile(&profile)?;
      uow.profile("aaa")
    })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(profile.name.as_deref(), Some("A"));
  assert_eq!(profile.gender_acc, Some(100));
  let country = profile.country.expect("country");
  assert_eq!(country.alpha3, "ESP");
}

#[tokio::test]
async fn reassign_identity_moves_it() {
  let s = store().await;
  let (a, b) = s
    .transact(CancellationToken::new(), |uow| {
      seed(uow, "aaa", "a@example.com")?;
      seed(uow, "bbb", "b@example.com")?;
      uow.reassign_identity("bbb", "aaa", Utc::now())?;
      Ok((uow.identities_of("aaa")?, uow.identities_of("bbb")?))
    })
    .await
    .unwrap();
  assert_eq!(a.iter().map(|i| i.uuid.as_str()).collect::<Vec<_>>(), ["aaa", "bbb"]);
  assert!(b.is_empty());
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_organization_cascades_to_teams_and_keys() {
  let s = store().await;
  s.transact(CancellationToken::new(), |uow| {
    seed(uow, "aaa", "a@example.com")?;
    let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
    let team = uow.insert_group("Core", GroupKind::Team, Some(org.id), None)?;
    uow.insert_group("Storage", GroupKind::Team, Some(org.id), Some(team.id))?;
    uow.insert_domain("example.com", true, org.id)?;
    uow.insert_alias("Example Inc.", org.id)?;
    uow.insert_enrollment("aaa", team.id, Period::full())?;
    uow.delete_group(org.id)
  })
  .await
  .unwrap();

  let (org, domain, alias, enrollments) = s
    .transact(CancellationToken::new(), |uow| {
      Ok((
        uow.organization("Example")?,
        uow.domain("example.com")?,
        uow.alias("Example Inc.")?,
        uow.enrollments("aaa", None)?,
      ))
    })
    .await
    .unwrap();
  assert!(org.is_none() && domain.is_none() && alias.is_none());
  assert!(enrollments.is_empty());
}

#[tokio::test]
async fn teams_listed_in_tree_order() {
  let s = store().await;
  let names = s
    .transact(CancellationToken::new(), |uow| {
      let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
      let core = uow.insert_group("Core", GroupKind::Team, Some(org.id), None)?;
      uow.insert_group("Storage", GroupKind::Team, Some(org.id), Some(core.id))?;
      uow.insert_group("Apps", GroupKind::Team, Some(org.id), None)?;
      let team = uow.team(org.id, "Storage")?.expect("team");
      assert_eq!(team.parent, Some(core.id));
      Ok(uow.teams_of(org.id)?.into_iter().map(|g| g.name).collect::<Vec<_>>())
    })
    .await
    .unwrap();
  assert_eq!(names, ["Core", "Storage", "Apps"]);
}

#[tokio::test]
async fn domain_lookup_reports_organization_name() {
  let s = store().await;
  let domain = s
    .transact(CancellationToken::new(), |uow| {
      let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
      uow.insert_domain("example.com", false, org.id)?;
      uow.domain("example.com")
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(domain.organization, "Example");
  assert!(!domain.is_top_domain);
}

// ─── Enrollments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrollments_ordered_by_period() {
  let s = store().await;
  let periods = s
    .transact(CancellationToken::new(), |uow| {
      seed(uow, "aaa", "a@example.com")?;
      let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
      uow.insert_enrollment("aaa", org.id, Period::bounded(ymd(2016, 1, 1), ymd(2018, 1, 1)))?;
      uow.insert_enrollment("aaa", org.id, Period::bounded(ymd(2010, 1, 1), ymd(2012, 1, 1)))?;
      Ok(uow.enrollments("aaa", Some(org.id))?.into_iter().map(|e| e.period).collect::<Vec<_>>())
    })
    .await
    .unwrap();
  assert_eq!(periods[0].start, ymd(2010, 1, 1));
  assert_eq!(periods[1].end, ymd(2018, 1, 1));
}

// ─── Searches ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_individuals_by_term_and_identity() {
  let s = store().await;
  let (by_term, by_uuid, locked) = s
    .transact(CancellationToken::new(), |uow| {
      seed(uow, "aaa", "jsmith@example.com")?;
      uow.insert_identity(&identity("ccc", "aaa", "john@other.org"))?;
      seed(uow, "bbb", "jroe@example.com")?;
      uow.set_locked("bbb", true, Utc::now())?;

      Ok((
        uow.search_individuals(
          &IndividualFilter { term: Some("example".into()), ..Default::default() },
          PageRequest::default(),
        )?,
        uow.search_individuals(
          &IndividualFilter { uuid: Some("ccc".into()), ..Default::default() },
          PageRequest::default(),
        )?,
        uow.search_individuals(
          &IndividualFilter { is_locked: Some(true), ..Default::default() },
          PageRequest::default(),
        )?,
      ))
    })
    .await
    .unwrap();

  assert_eq!(by_term, (vec!["aaa".to_owned(), "bbb".to_owned()], 2));
  assert_eq!(by_uuid, (vec!["aaa".to_owned()], 1));
  assert_eq!(locked, (vec!["bbb".to_owned()], 1));
}

#[tokio::test]
async fn search_pages_through_countries() {
  let s = store().await;
  let (first, second, spain) = s
    .transact(CancellationToken::new(), |uow| {
      Ok((
        uow.search_countries(&CountryFilter::default(), PageRequest::new(Some(1), Some(10)))?,
        uow.search_countries(&CountryFilter::default(), PageRequest::new(Some(2), Some(10)))?,
        uow.search_countries(
          &CountryFilter { term: Some("spain".into()), ..Default::default() },
          PageRequest::default(),
        )?,
      ))
    })
    .await
    .unwrap();

  assert_eq!(first.0.len(), 10);
  assert!(first.1 > 200);
  assert_ne!(first.0[0].code, second.0[0].code);
  assert_eq!(spain.0.len(), 1);
  assert_eq!(spain.0[0].code, "ES");
}

#[tokio::test]
async fn search_organizations_matches_domains() {
  let s = store().await;
  let (hits, total) = s
    .transact(CancellationToken::new(), |uow| {
      let org = uow.insert_group("Example", GroupKind::Organization, None, None)?;
      uow.insert_domain("example.com", true, org.id)?;
      uow.insert_group("Bitergia", GroupKind::Organization, None, None)?;
      uow.search_organizations(
        &OrganizationFilter { term: Some("example.c".into()) },
        PageRequest::default(),
      )
    })
    .await
    .unwrap();
  assert_eq!(total, 1);
  assert_eq!(hits[0].name, "Example");
}

// ─── Journal ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn journal_round_trip() {
  let s = store().await;
  let tuid = new_key();
  let t = tuid.clone();
  s.transact(CancellationToken::new(), move |uow| {
    let now = Utc::now();
    uow.insert_transaction(&Transaction {
      tuid:        t.clone(),
      name:        "add_identity".into(),
      created_at:  now,
      closed_at:   None,
      is_closed:   false,
      authored_by: Some("admin".into()),
      tenant:      None,
    })?;
    uow.insert_operation(&Operation {
      ouid:        new_key(),
      op_type:     OperationType::Add,
      entity_type: EntityType::Identity,
      target:      "aaa".into(),
      timestamp:   now,
      args:        serde_json::json!({ "source": "scm" }),
      tuid:        t.clone(),
    })?;
    uow.close_transaction(&t, Utc::now())
  })
  .await
  .unwrap();

  let t = tuid.clone();
  let ((trxs, total), ops) = s
    .transact(CancellationToken::new(), move |uow| {
      Ok((
        uow.search_transactions(
          &TransactionFilter { authored_by: Some("admin".into()), ..Default::default() },
          PageRequest::default(),
        )?,
        uow.operations(&t)?,
      ))
    })
    .await
    .unwrap();

  assert_eq!(total, 1);
  assert!(trxs[0].is_closed);
  assert!(trxs[0].closed_at.is_some());
  assert_eq!(ops.len(), 1);
  assert_eq!(ops[0].args["source"], "scm");
  assert_eq!(ops[0].op_type, OperationType::Add);
}

// ─── Tenancy ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tenant_admin() {
  let s = store().await;
  let tenant = Tenant {
    user:     "alice".into(),
    header:   "t1".into(),
    database: "t1db".into(),
  };
  s.add_tenant(tenant.clone()).await.unwrap();
  let err = s.add_tenant(tenant.clone()).await.unwrap_err();
  assert_eq!(err.existing_key(), Some("t1db"));

  assert_eq!(s.find_tenant("alice", "t1").await.unwrap().as_deref(), Some("t1db"));
  assert_eq!(s.list_tenants().await.unwrap(), vec![tenant]);

  s.remove_tenant("alice", "t1").await.unwrap();
  assert!(matches!(
    s.remove_tenant("alice", "t1").await,
    Err(CoreError::NotFound { .. })
  ));
}

#[tokio::test]
async fn router_isolates_tenants() {
  let default = store().await;
  default
    .add_tenant(Tenant { user: "alice".into(), header: "t1".into(), database: "t1".into() })
    .await
    .unwrap();
  default
    .add_tenant(Tenant { user: "alice".into(), header: "t2".into(), database: "t2".into() })
    .await
    .unwrap();

  let router = TenantRouter::new("default", default);
  router.register("t1", store().await).await;
  router.register("t2", store().await).await;

  let t1 = router.route(Some("alice"), Some("t1")).await.unwrap();
  assert_eq!(t1.database, "t1");
  t1.store
    .transact(CancellationToken::new(), |uow| {
      uow.insert_group("Example", GroupKind::Organization, None, None).map(drop)
    })
    .await
    .unwrap();

  let t2 = router.route(Some("alice"), Some("t2")).await.unwrap();
  let seen = t2
    .store
    .transact(CancellationToken::new(), |uow| uow.organization("Example"))
    .await
    .unwrap();
  assert!(seen.is_none());

  let fallback = router.route(Some("bob"), Some("t1")).await.unwrap();
  assert_eq!(fallback.database, "default");
  let anonymous = router.route(None, None).await.unwrap();
  assert_eq!(anonymous.database, "default");
}

#[tokio::test]
async fn router_without_data_dir_rejects_unknown_database() {
  let default = store().await;
  default
    .add_tenant(Tenant { user: "alice".into(), header: "h".into(), database: "missing".into() })
    .await
    .unwrap();
  let router = TenantRouter::new("default", default);
  let err = router.route(Some("alice"), Some("h")).await.err().unwrap();
  assert!(matches!(err, CoreError::NotFound { .. }));
}
