//! Router tests over in-memory SQLite databases.

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use serde_json::{Value, json};
use sortinghat_core::tenancy::Tenant;
use sortinghat_store_sqlite::{SqliteStore, TenantRouter};
use tower::ServiceExt as _;

use crate::*;

async fn open_state() -> AppState<TenantRouter> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(TenantRouter::new("default", store), AuthConfig::new(vec![], "sortinghat-tenant"))
}

async fn call(state: &AppState<TenantRouter>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  call_with(state, method, uri, body, vec![]).await
}

async fn call_with(
  state:   &AppState<TenantRouter>,
  method:  &str,
  uri:     &str,
  body:    Option<Value>,
  headers: Vec<(&str, String)>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn jsmith(state: &AppState<TenantRouter>) -> String {
  let (status, body) = call(
    state,
    "POST",
    "/identities",
    Some(json!({
      "source": "scm",
      "email": "jsmith@example.com",
      "name": "John Smith",
      "username": "jsmith",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  body["uuid"].as_str().unwrap().to_owned()
}

// ── Identities ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_identity_returns_the_hash() {
  let state = open_state().await;
  let (status, body) = call(
    &state,
    "POST",
    "/identities",
    Some(json!({ "source": "scm", "email": "jroe@example.com", "name": "Jane Roe", "username": "jrae" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["uuid"], "eda9f62ad321b1fbe5f283cc05e2484516203117");
}

#[tokio::test]
async fn duplicate_identity_reports_the_existing_key() {
  let state = open_state().await;
  let uuid = jsmith(&state).await;
  let (status, body) = call(
    &state,
    "POST",
    "/identities",
    Some(json!({ "source": "scm", "email": "jsmith@example.com", "name": "John Smith", "username": "jsmith" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], 1003);
  assert_eq!(body["existing"], uuid.as_str());
}

#[tokio::test]
async fn empty_identity_is_a_bad_request() {
  let state = open_state().await;
  let (status, body) = call(&state, "POST", "/identities", Some(json!({ "source": "scm" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], 1001);
  assert!(body.get("existing").is_none());
}

#[tokio::test]
async fn move_and_delete_identity() {
  let state = open_state().await;
  let jsmith = jsmith(&state).await;
  let (_, body) = call(
    &state,
    "POST",
    "/identities",
    Some(json!({ "source": "git", "email": "jdoe@example.com" })),
  )
  .await;
  let jdoe = body["uuid"].as_str().unwrap().to_owned();

  let (status, body) = call(
    &state,
    "POST",
    &format!("/identities/{jdoe}/move"),
    Some(json!({ "to": jsmith })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["uuid"], jsmith.as_str());

  let (_, view) = call(&state, "GET", &format!("/individuals/{jsmith}"), None).await;
  assert_eq!(view["identities"].as_array().unwrap().len(), 2);

  let (status, body) = call(&state, "DELETE", &format!("/identities/{jdoe}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["individual_deleted"], false);
}

// ── Individuals ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_individual_is_404() {
  let state = open_state().await;
  let (status, body) = call(&state, "GET", "/individuals/nope", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn lock_blocks_profile_updates() {
  let state = open_state().await;
  let uuid = jsmith(&state).await;

  let (status, _) = call(&state, "POST", &format!("/individuals/{uuid}/lock"), None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, body) = call(
    &state,
    "PATCH",
    &format!("/individuals/{uuid}/profile"),
    Some(json!({ "gender": "male" })),
  )
  .await;
  assert_eq!(status, StatusCode::LOCKED);
  assert_eq!(body["code"], 1004);

  call(&state, "POST", &format!("/individuals/{uuid}/unlock"), None).await;
  let (status, view) = call(
    &state,
    "PATCH",
    &format!("/individuals/{uuid}/profile"),
    Some(json!({ "gender": "male", "country_code": "US" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["profile"]["gender_acc"], 100);
  assert_eq!(view["profile"]["country"]["alpha3"], "USA");
}

#[tokio::test]
async fn enroll_withdraw_and_list() {
  let state = open_state().await;
  let uuid = jsmith(&state).await;
  let (status, _) = call(&state, "POST", "/organizations", Some(json!({ "name": "Example" }))).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) = call(
    &state,
    "POST",
    &format!("/individuals/{uuid}/enroll"),
    Some(json!({ "group": "Example", "from_date": "2010-01-01T00:00:00Z", "to_date": "2020-01-01T00:00:00Z" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = call(
    &state,
    "POST",
    &format!("/individuals/{uuid}/enroll"),
    Some(json!({ "group": "Example", "from_date": "2012-01-01T00:00:00Z", "to_date": "2014-01-01T00:00:00Z" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], 1005);

  let (_, page) = call(&state, "GET", "/individuals?enrolled_in=Example&page_size=10", None).await;
  assert_eq!(page["total"], 1);
  assert_eq!(page["page_size"], 10);
  assert_eq!(page["entities"][0]["mk"], uuid.as_str());

  let (status, _) = call(
    &state,
    "POST",
    &format!("/individuals/{uuid}/withdraw"),
    Some(json!({ "group": "Example" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let (_, page) = call(&state, "GET", "/individuals?enrolled_in=Example", None).await;
  assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn merge_then_unmerge() {
  let state = open_state().await;
  let jsmith = jsmith(&state).await;
  let (_, body) = call(
    &state,
    "POST",
    "/identities",
    Some(json!({ "source": "git", "email": "jsmith@example.org" })),
  )
  .await;
  let other = body["uuid"].as_str().unwrap().to_owned();

  let (status, body) = call(
    &state,
    "POST",
    "/individuals/merge",
    Some(json!({ "from_uuids": [other], "to_uuid": jsmith })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["uuid"], jsmith.as_str());

  let (status, body) = call(&state, "POST", "/individuals/unmerge", Some(json!({ "uuids": [other] }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["uuids"], json!([other]));
}

#[tokio::test]
async fn affiliate_uses_email_domains() {
  let state = open_state().await;
  let uuid = jsmith(&state).await;
  call(&state, "POST", "/organizations", Some(json!({ "name": "Example" }))).await;
  let (status, _) = call(
    &state,
    "POST",
    "/organizations/Example/domains",
    Some(json!({ "domain": "example.com" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) = call(&state, "POST", "/individuals/affiliate", Some(json!({}))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["affiliated"][&uuid], json!(["Example"]));
}

// ── Organizations ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn organization_lifecycle() {
  let state = open_state().await;
  call(&state, "POST", "/organizations", Some(json!({ "name": "Example" }))).await;
  call(&state, "POST", "/organizations/Example/aliases", Some(json!({ "alias": "Example Inc." }))).await;
  call(&state, "POST", "/organizations/Example/teams", Some(json!({ "name": "Core" }))).await;
  let (status, _) = call(
    &state,
    "POST",
    "/organizations/Example/teams",
    Some(json!({ "name": "Storage", "parent": "Core" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, org) = call(&state, "GET", "/organizations/Example", None).await;
  assert_eq!(org["aliases"], json!(["Example Inc."]));
  assert_eq!(org["teams"], json!(["Core", "Storage"]));

  let (_, page) = call(&state, "GET", "/organizations?term=Inc", None).await;
  assert_eq!(page["total"], 1);

  let (status, _) = call(&state, "DELETE", "/organizations/Example/teams/Core", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = call(&state, "DELETE", "/aliases/Example%20Inc.", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = call(&state, "DELETE", "/organizations/Example", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = call(&state, "GET", "/organizations/Example", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn countries_are_seeded() {
  let state = open_state().await;
  let (status, page) = call(&state, "GET", "/countries?code=es", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["entities"][0]["name"], "Spain");
}

// ── Journal ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn journal_lists_transactions_and_operations() {
  let state = open_state().await;
  jsmith(&state).await;

  let (_, page) = call(&state, "GET", "/transactions?name=add_identity", None).await;
  assert_eq!(page["total"], 1);
  let tuid = page["entities"][0]["tuid"].as_str().unwrap().to_owned();

  let (status, ops) = call(&state, "GET", &format!("/transactions/{tuid}/operations"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(ops.as_array().unwrap().len(), 3);
}

// ── Auth & tenancy ────────────────────────────────────────────────────────────

fn basic(user: &str, pass: &str) -> String { format!("Basic {}", B64.encode(format!("{user}:{pass}"))) }

async fn secured_state() -> AppState<TenantRouter> {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(b"secret", &salt)
    .unwrap()
    .to_string();
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(
    TenantRouter::new("default", store),
    AuthConfig::new(
      vec![Credential { username: "user".to_string(), password_hash: hash }],
      "sortinghat-tenant",
    ),
  )
}

#[tokio::test]
async fn credentials_are_required_when_configured() {
  let state = secured_state().await;
  let (status, body) = call(&state, "GET", "/individuals", None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "unauthorized");

  let (status, _) = call_with(
    &state,
    "GET",
    "/individuals",
    None,
    vec![("authorization", basic("user", "secret"))],
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_selects_the_database() {
  let state = secured_state().await;
  state.tenancy.register("acme", SqliteStore::open_in_memory().await.unwrap()).await;
  state
    .tenancy
    .default_store()
    .add_tenant(Tenant { user: "user".into(), header: "acme".into(), database: "acme".into() })
    .await
    .unwrap();

  let auth = ("authorization", basic("user", "secret"));
  let acme = ("sortinghat-tenant", "acme".to_owned());
  let (status, _) = call_with(
    &state,
    "POST",
    "/organizations",
    Some(json!({ "name": "Acme" })),
    vec![auth.clone(), acme.clone()],
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, in_acme) = call_with(&state, "GET", "/organizations", None, vec![auth.clone(), acme]).await;
  assert_eq!(in_acme["total"], 1);
  let (_, in_default) = call_with(&state, "GET", "/organizations", None, vec![auth.clone()]).await;
  assert_eq!(in_default["total"], 0);

  // Unmapped header values fall back to the default database.
  let other = ("sortinghat-tenant", "other".to_owned());
  let (_, fallback) = call_with(&state, "GET", "/organizations", None, vec![auth, other]).await;
  assert_eq!(fallback["total"], 0);

  let (_, trxs) = call_with(
    &state,
    "GET",
    "/transactions",
    None,
    vec![("authorization", basic("user", "secret")), ("sortinghat-tenant", "acme".to_owned())],
  )
  .await;
  assert_eq!(trxs["entities"][0]["authored_by"], "user");
  assert_eq!(trxs["entities"][0]["tenant"], "acme");
}
