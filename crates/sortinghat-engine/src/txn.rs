//! Journaled units of work.
//!
//! [`run`] wraps a store unit of work with the journal. Every mutation appends
//! an operation through [`Txn::record`]; the transaction row, stamped when the
//! unit opened, is written along with the first operation and closed just
//! before commit. A unit that records nothing leaves no journal rows, and a
//! failing closure rolls all of it back together.

use chrono::Utc;
use serde_json::Value;

use sortinghat_core::{
  Ctx, Result,
  journal::{EntityType, Operation, OperationType, Transaction, new_key},
  store::{Store, UnitOfWork},
};

/// A unit of work with an open journal transaction.
pub(crate) struct Txn<'u> {
  pub uow:     &'u mut dyn UnitOfWork,
  transaction: Transaction,
  recorded:    usize,
}

impl Txn<'_> {
  /// Append an operation to the journal.
  pub fn record(
    &mut self,
    op_type: OperationType,
    entity_type: EntityType,
    target: &str,
    args: Value,
  ) -> Result<()> {
    if self.recorded == 0 {
      self.uow.insert_transaction(&self.transaction)?;
    }
    self.uow.insert_operation(&Operation {
      ouid: new_key(),
      op_type,
      entity_type,
      target: target.to_owned(),
      timestamp: Utc::now(),
      args,
      tuid: self.transaction.tuid.clone(),
    })?;
    self.recorded += 1;
    Ok(())
  }
}

/// Run a mutation named `name` as one journaled transaction.
pub(crate) async fn run<S, F, R>(ctx: &Ctx<S>, name: &'static str, f: F) -> Result<R>
where
  S: Store,
  F: FnOnce(&mut Txn<'_>) -> Result<R> + Send + 'static,
  R: Send + 'static,
{
  let authored_by = ctx.principal.clone();
  let tenant = ctx.tenant.clone();

  let outcome = ctx
    .store
    .transact(ctx.cancel.clone(), move |uow| {
      let transaction = Transaction {
        tuid: new_key(),
        name: name.to_owned(),
        created_at: Utc::now(),
        closed_at: None,
        is_closed: false,
        authored_by,
        tenant,
      };
      let tuid = transaction.tuid.clone();

      let mut txn = Txn { uow, transaction, recorded: 0 };
      let value = f(&mut txn)?;
      let recorded = txn.recorded;
      if recorded > 0 {
        txn.uow.close_transaction(&tuid, Utc::now())?;
      }
      Ok((value, tuid, recorded))
    })
    .await;

  match outcome {
    Ok((value, _, 0)) => {
      tracing::debug!(transaction = name, "nothing changed; not journaled");
      Ok(value)
    }
    Ok((value, tuid, operations)) => {
      tracing::info!(transaction = name, %tuid, operations, "transaction committed");
      Ok(value)
    }
    Err(e) => {
      tracing::debug!(transaction = name, error = %e, "transaction rolled back");
      Err(e)
    }
  }
}

/// Run a read-only closure; nothing is journaled.
pub(crate) async fn read<S, F, R>(ctx: &Ctx<S>, f: F) -> Result<R>
where
  S: Store,
  F: FnOnce(&dyn UnitOfWork) -> Result<R> + Send + 'static,
  R: Send + 'static,
{
  ctx.store.transact(ctx.cancel.clone(), move |uow| f(uow)).await
}
