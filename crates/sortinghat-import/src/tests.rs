//! Import tests against an in-memory SQLite store.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use sortinghat_core::{
  Ctx,
  model::NewIdentity,
  period::{t_max, t_min},
  store::{IndividualFilter, OrganizationFilter, PageRequest},
};
use sortinghat_engine::{add_identity, individual, individuals, lock, organization, organizations};
use sortinghat_store_sqlite::SqliteStore;
use tempfile::TempDir;

use crate::*;

async fn ctx() -> Ctx<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  Ctx::new(store).with_principal("importer")
}

fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap() }

/// Write `content` to `name` inside `dir`.
async fn document(dir: &TempDir, name: &str, content: &str) -> PathBuf {
  let path = dir.path().join(name);
  tokio::fs::write(&path, content).await.unwrap();
  path
}

fn parse_gitdm(employers: &str) -> ImportData { gitdm::GitdmParser::new().parse(Some(employers), None, None) }

async fn individual_count(ctx: &Ctx<SqliteStore>) -> u64 {
  individuals(ctx, IndividualFilter::default(), PageRequest::default())
    .await
    .unwrap()
    .total
}

const EMPLOYERS: &str = "jsmith@example.com\tBitergia < 2015-01-01\n\
                         jsmith@example.com\tExample Company\n";

#[tokio::test]
async fn gitdm_import_chains_enrollments() {
  let ctx = ctx().await;
  let report = load(&ctx, parse_gitdm(EMPLOYERS)).await.unwrap();
  assert_eq!(
    report,
    ImportReport {
      individuals:       1,
      identities_added:  1,
      merges:            0,
      enrollments_added: 2,
      skipped:           0,
    }
  );

  let page = individuals(&ctx, IndividualFilter::default(), PageRequest::default())
    .await
    .unwrap();
  let view = &page.entities[0];
  assert_eq!(view.identities[0].source, "gitdm");
  assert_eq!(view.identities[0].email.as_deref(), Some("jsmith@example.com"));
  let spans: Vec<_> = view
    .enrollments
    .iter()
    .map(|e| (e.group.as_str(), e.start, e.end))
    .collect();
  assert_eq!(
    spans,
    vec![
      ("Bitergia", t_min(), ymd(2015, 1, 1)),
      ("Example Company", ymd(2015, 1, 1), t_max()),
    ]
  );
}

#[tokio::test]
async fn importing_twice_changes_nothing() {
  let ctx = ctx().await;
  load(&ctx, parse_gitdm(EMPLOYERS)).await.unwrap();
  let before = individuals(&ctx, IndividualFilter::default(), PageRequest::default())
    .await
    .unwrap();

  let report = load(&ctx, parse_gitdm(EMPLOYERS)).await.unwrap();
  assert_eq!(report.identities_added, 0);
  assert_eq!(report.enrollments_added, 0);
  assert_eq!(report.merges, 0);

  let after = individuals(&ctx, IndividualFilter::default(), PageRequest::default())
    .await
    .unwrap();
  assert_eq!(before.total, after.total);
  assert_eq!(before.entities[0].identities, after.entities[0].identities);
  assert_eq!(before.entities[0].enrollments, after.entities[0].enrollments);
}

#[tokio::test]
async fn known_identity_pivots_into_a_merge() {
  let ctx = ctx().await;
  let existing = add_identity(&ctx, NewIdentity::new("gitdm").email("jsmith@example.com"), None)
    .await
    .unwrap();

  let data = ImportData {
    individuals: vec![ImportIndividual {
      identities: vec![
        NewIdentity::new("gitdm").email("john@users.example.org"),
        NewIdentity::new("gitdm").email("jsmith@example.com"),
      ],
      ..Default::default()
    }],
    ..Default::default()
  };
  let report = load(&ctx, data).await.unwrap();
  assert_eq!(report.identities_added, 1);
  assert_eq!(report.merges, 1);

  assert_eq!(individual_count(&ctx).await, 1);
  let view = individual(&ctx, &existing).await.unwrap();
  assert_eq!(view.mk, existing);
  assert_eq!(view.identities.len(), 2);
}

#[tokio::test]
async fn locked_individuals_are_not_merged() {
  let ctx = ctx().await;
  let existing = add_identity(&ctx, NewIdentity::new("gitdm").email("jsmith@example.com"), None)
    .await
    .unwrap();
  lock(&ctx, &existing).await.unwrap();

  let data = ImportData {
    individuals: vec![ImportIndividual {
      identities: vec![
        NewIdentity::new("gitdm").email("john@users.example.org"),
        NewIdentity::new("gitdm").email("jsmith@example.com"),
      ],
      enrollments: vec![model::ImportEnrollment::new("Example")],
      ..Default::default()
    }],
    ..Default::default()
  };
  let report = load(&ctx, data).await.unwrap();
  assert_eq!(report.merges, 0);
  // One for the refused merge, one for the enrollment on the locked target.
  assert_eq!(report.skipped, 2);
  assert_eq!(individual_count(&ctx).await, 2);
  assert!(individual(&ctx, &existing).await.unwrap().enrollments.is_empty());
}

#[tokio::test]
async fn rejected_lines_and_invalid_identities_count_as_skipped() {
  let ctx = ctx().await;
  let mut data = parse_gitdm("not-a-line\njdoe@example.com\tExample\n");
  data.individuals.push(ImportIndividual {
    identities: vec![NewIdentity::new("gitdm")],
    ..Default::default()
  });

  let report = load(&ctx, data).await.unwrap();
  assert_eq!(report.individuals, 2);
  assert_eq!(report.identities_added, 1);
  assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn imports_documents_from_disk() {
  let ctx = ctx().await;
  let dir = tempfile::tempdir().unwrap();
  let employers = document(&dir, "employers.txt", EMPLOYERS).await;
  let aliases = document(&dir, "aliases.txt", "john!users.example.org\tjsmith@example.com\n").await;
  let domains = document(&dir, "domains.txt", "example.com\tExample Company\n").await;

  let params = BTreeMap::from([
    ("aliases_url".to_owned(), format!("file://{}", aliases.display())),
    ("domains_url".to_owned(), domains.display().to_string()),
  ]);
  let report = import(&ctx, "gitdm", employers.to_str().unwrap(), &params).await.unwrap();
  assert_eq!(report.identities_added, 2);

  let org = organization(&ctx, "Example Company").await.unwrap();
  assert_eq!(org.domains.len(), 1);
  assert_eq!(org.domains[0].domain, "example.com");

  let page = individuals(&ctx, IndividualFilter::default(), PageRequest::default())
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  let mut emails: Vec<_> = page.entities[0]
    .identities
    .iter()
    .filter_map(|i| i.email.clone())
    .collect();
  emails.sort();
  assert_eq!(emails, vec!["john@users.example.org", "jsmith@example.com"]);
}

#[tokio::test]
async fn mailmap_with_organizations() {
  let ctx = ctx().await;
  let dir = tempfile::tempdir().unwrap();
  let mailmap = document(
    &dir,
    ".mailmap",
    "Example <> Jane Doe <jane@example.com>\nUnaffiliated <> John Smith <jsmith@example.com>\n",
  )
  .await;

  let params = BTreeMap::from([("has_orgs".to_owned(), "true".to_owned())]);
  let report = import(&ctx, "mailmap", mailmap.to_str().unwrap(), &params).await.unwrap();
  assert_eq!(report.individuals, 2);
  assert_eq!(report.enrollments_added, 1);

  let orgs = organizations(&ctx, OrganizationFilter::default(), PageRequest::default())
    .await
    .unwrap();
  assert_eq!(orgs.entities.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(), vec!["Example"]);
}

#[tokio::test]
async fn import_journals_every_step() {
  let ctx = ctx().await;
  load(&ctx, parse_gitdm(EMPLOYERS)).await.unwrap();

  let trxs = sortinghat_engine::transactions(
    &ctx,
    Default::default(),
    PageRequest::default(),
  )
  .await
  .unwrap();
  let mut names: Vec<_> = trxs.entities.iter().map(|t| t.name.as_str()).collect();
  names.sort();
  assert_eq!(
    names,
    vec!["add_identity", "add_organization", "add_organization", "enroll", "enroll"]
  );
  assert!(trxs.entities.iter().all(|t| t.authored_by.as_deref() == Some("importer")));
}
