//! SortingHat server binary.
//!
//! Reads `sortinghat.toml` (or the path given with `--config`) and
//! `SORTINGHAT_*` environment variables, opens the SQLite databases under
//! `data_dir` and either serves the JSON API or runs a maintenance command.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for a `[[users]]` entry:
//!
//! ```
//! cargo run -p sortinghat-server -- hash-password
//! ```

mod config;

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context as _, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use sortinghat_api::{AppState, AuthConfig, api_router};
use sortinghat_core::{Ctx, tenancy::Tenant};
use sortinghat_store_sqlite::{SqliteStore, TenantRouter};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "SortingHat identity registry")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sortinghat.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Load identities and affiliations from a gitdm or mailmap source.
  Import {
    /// Backend name (`gitdm`, `mailmap`).
    backend:   String,
    /// Path, `file://` or `http(s)://` URL of the main document.
    location:  String,
    /// Extra backend parameter, `key=value`; repeatable.
    #[arg(short, long = "param", value_parser = parse_param)]
    params:    Vec<(String, String)>,
    /// Logical database to import into; the default database otherwise.
    #[arg(long)]
    tenant:    Option<String>,
    /// Principal recorded in the journal.
    #[arg(long, default_value = "sortinghat-cli")]
    principal: String,
  },
  /// Manage the tenant table.
  Tenant {
    #[command(subcommand)]
    action: TenantAction,
  },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[derive(Subcommand)]
enum TenantAction {
  /// Route `header` requests by `user` to `database`.
  Add { user: String, header: String, database: String },
  Remove { user: String, header: String },
  List,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
  Ok((key.trim().to_owned(), value.to_owned()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if let Command::HashPassword = cli.command {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;
  let router = open_router(&cfg).await?;

  match cli.command {
    Command::Serve => serve(cfg, router).await,
    Command::Import { backend, location, params, tenant, principal } => {
      let database = tenant.unwrap_or_else(|| cfg.default_database.clone());
      let store = router
        .store(&database)
        .await
        .with_context(|| format!("failed to open database {database}"))?;
      let ctx = Ctx::new(store).with_principal(principal).with_tenant(database);
      let params: BTreeMap<String, String> = params.into_iter().collect();

      let report = sortinghat_import::import(&ctx, &backend, &location, &params)
        .await
        .with_context(|| format!("import of {location} failed"))?;
      println!(
        "individuals: {}, identities added: {}, merges: {}, enrollments added: {}, skipped: {}",
        report.individuals,
        report.identities_added,
        report.merges,
        report.enrollments_added,
        report.skipped,
      );
      Ok(())
    }
    Command::Tenant { action } => tenant(router.default_store(), action).await,
    Command::HashPassword => Ok(()),
  }
}

/// Open the default database and a router that lazily opens the others.
async fn open_router(cfg: &ServerConfig) -> anyhow::Result<TenantRouter> {
  tokio::fs::create_dir_all(&cfg.data_dir)
    .await
    .with_context(|| format!("failed to create {}", cfg.data_dir.display()))?;

  let path = cfg.database_path(&cfg.default_database);
  let store = SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))?;
  Ok(TenantRouter::new(cfg.default_database.clone(), store).with_data_dir(&cfg.data_dir))
}

async fn serve(cfg: ServerConfig, router: TenantRouter) -> anyhow::Result<()> {
  if cfg.users.is_empty() {
    tracing::warn!("no users configured; the API is open");
  }
  let state = AppState::new(router, AuthConfig::new(cfg.users.clone(), cfg.tenant_header.clone()));
  let app = api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      tracing::info!("shutting down");
    })
    .await
    .context("server error")?;

  Ok(())
}

async fn tenant(store: &SqliteStore, action: TenantAction) -> anyhow::Result<()> {
  match action {
    TenantAction::Add { user, header, database } => {
      store
        .add_tenant(Tenant { user, header, database })
        .await
        .context("failed to add tenant")?;
    }
    TenantAction::Remove { user, header } => {
      store
        .remove_tenant(&user, &header)
        .await
        .context("failed to remove tenant")?;
    }
    TenantAction::List => {
      for t in store.list_tenants().await.context("failed to list tenants")? {
        println!("{}\t{}\t{}", t.user, t.header, t.database);
      }
    }
  }
  Ok(())
}

/// Read a password from stdin (no echo).
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn params_split_on_the_first_equals() {
    assert_eq!(
      parse_param("aliases_url=https://example.com/a?x=1").unwrap(),
      ("aliases_url".to_owned(), "https://example.com/a?x=1".to_owned())
    );
    assert!(parse_param("has_orgs").is_err());
  }

  #[test]
  fn cli_parses_import() {
    let cli = Cli::try_parse_from([
      "sortinghat",
      "import",
      "gitdm",
      "email-map.txt",
      "--param",
      "domains_url=domains.txt",
      "--tenant",
      "acme",
    ])
    .unwrap();
    match cli.command {
      Command::Import { backend, params, tenant, .. } => {
        assert_eq!(backend, "gitdm");
        assert_eq!(params, vec![("domains_url".to_owned(), "domains.txt".to_owned())]);
        assert_eq!(tenant.as_deref(), Some("acme"));
      }
      _ => panic!("expected import"),
    }
  }
}
