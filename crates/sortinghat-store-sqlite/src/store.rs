//! [`SqliteStore`] is the SQLite implementation of [`Store`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tokio_util::sync::CancellationToken;

use sortinghat_core::{
  self as core,
  store::{Store, UnitOfWork},
  tenancy::Tenant,
};

use crate::{
  Error, Result,
  schema::{COUNTRIES, SCHEMA},
  unit::SqliteUnit,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// One SortingHat database backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All units of
/// work are serialised on the connection thread and open with `BEGIN
/// IMMEDIATE`, so two units never interleave.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let seeded = self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM countries", [], |r| r.get(0))?;
        if count > 0 {
          return Ok(0);
        }

        let tx = conn.transaction()?;
        let mut seeded = 0;
        {
          let mut stmt =
            tx.prepare("INSERT INTO countries (code, alpha3, name) VALUES (?1, ?2, ?3)")?;
          for line in COUNTRIES.lines().filter(|l| !l.trim().is_empty()) {
            let mut cols = line.splitn(3, '\t');
            if let (Some(code), Some(alpha3), Some(name)) = (cols.next(), cols.next(), cols.next())
            {
              stmt.execute(rusqlite::params![code, alpha3, name])?;
              seeded += 1;
            }
          }
        }
        tx.commit()?;
        Ok(seeded)
      })
      .await?;

    if seeded > 0 {
      tracing::debug!(countries = seeded, "seeded country table");
    }
    Ok(())
  }

  // ── Tenant administration ─────────────────────────────────────────────────
  //
  // Only meaningful on the default database, which owns the `tenants` table.

  /// Map `(user, header)` onto `database`.
  pub async fn add_tenant(&self, tenant: Tenant) -> core::Result<()> {
    let Tenant { user, header, database } = tenant;
    let existing = self.find_tenant(&user, &header).await?;
    if let Some(existing) = existing {
      return Err(core::Error::already_exists("tenant", existing));
    }

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tenants (user_name, header, db_name) VALUES (?1, ?2, ?3)",
          rusqlite::params![user, header, database],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;
    Ok(())
  }

  /// The database mapped to `(user, header)`, if any.
  pub async fn find_tenant(&self, user: &str, header: &str) -> core::Result<Option<String>> {
    let (user, header) = (user.to_owned(), header.to_owned());
    let database = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT db_name FROM tenants WHERE user_name = ?1 AND header = ?2",
              rusqlite::params![user, header],
              |r| r.get::<_, String>(0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::from)?;
    Ok(database)
  }

  pub async fn remove_tenant(&self, user: &str, header: &str) -> core::Result<()> {
    let (user, header) = (user.to_owned(), header.to_owned());
    let key = format!("{user}/{header}");
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM tenants WHERE user_name = ?1 AND header = ?2",
          rusqlite::params![user, header],
        )?)
      })
      .await
      .map_err(Error::from)?;
    if removed == 0 {
      return Err(core::Error::not_found("tenant", key));
    }
    Ok(())
  }

  pub async fn list_tenants(&self) -> core::Result<Vec<Tenant>> {
    let tenants = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT user_name, header, db_name FROM tenants ORDER BY user_name, header")?;
        let rows = stmt
          .query_map([], |r| {
            Ok(Tenant {
              user:     r.get(0)?,
              header:   r.get(1)?,
              database: r.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from)?;
    Ok(tenants)
  }
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  async fn transact<F, R>(&self, cancel: CancellationToken, f: F) -> core::Result<R>
  where
    F: FnOnce(&mut dyn UnitOfWork) -> core::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    if cancel.is_cancelled() {
      return Err(core::Error::Cancelled);
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = {
          let mut unit = SqliteUnit::new(&tx, cancel.clone());
          f(&mut unit)
        };

        match result {
          Ok(_) if cancel.is_cancelled() => {
            tx.rollback()?;
            Ok(Err(core::Error::Cancelled))
          }
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => {
            tx.rollback()?;
            Ok(Err(e))
          }
        }
      })
      .await
      .map_err(Error::from)?;

    outcome
  }
}
