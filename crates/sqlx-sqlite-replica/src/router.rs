//! Statement interception on the primary connection.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::connection::{
   BoundaryOperation, DatabaseConnection, ReadEntryPoint, Selected, Statement, WriteQueryResult,
};
use crate::decision::{BoundaryDecision, ReadTarget, evaluate_mutation_boundary, resolve_read_target};
use crate::provider::ReplicaProvider;
use crate::state::RoutingConfig;
use crate::{Error, Result};

/// Diagnostic label for a read served by the replica.
pub fn replica_label(name: Option<&str>) -> String {
   format!("Replica: {}", name.unwrap_or("SQL"))
}

/// A primary connection whose reads may be served by a replica.
///
/// Every read entry point asks the replica provider for a connection and runs
/// the identical statement there unless an open transaction, a forced-primary
/// scope, or an unavailable replica requires the primary. Transaction
/// boundaries are checked against the routing flags and only ever reach the
/// primary. Writes always go to the primary.
///
/// Errors from whichever connection executes a statement are returned
/// unchanged; a failed replica read is not retried on the primary.
///
/// Boundaries skipped by `skip_transactions` still count towards
/// [`open_transactions`](DatabaseConnection::open_transactions), so reads
/// inside a skipped transaction see the caller's own writes.
#[derive(Debug)]
pub struct RoutedConnection<C, P> {
   primary: C,
   provider: Arc<P>,
   routing: Arc<RoutingConfig>,
   /// Levels opened by skipped boundaries, on top of the primary's own
   skipped_transactions: u32,
}

impl<C, P> RoutedConnection<C, P>
where
   C: DatabaseConnection,
   P: ReplicaProvider,
{
   pub fn new(primary: C, provider: Arc<P>, routing: Arc<RoutingConfig>) -> Self {
      Self {
         primary,
         provider,
         routing,
         skipped_transactions: 0,
      }
   }

   pub fn primary(&self) -> &C {
      &self.primary
   }

   /// Direct access to the primary, bypassing all routing.
   pub fn primary_mut(&mut self) -> &mut C {
      &mut self.primary
   }

   pub fn into_primary(self) -> C {
      self.primary
   }

   pub fn provider(&self) -> &Arc<P> {
      &self.provider
   }

   pub fn routing(&self) -> &Arc<RoutingConfig> {
      &self.routing
   }
}

impl<C, P> DatabaseConnection for RoutedConnection<C, P>
where
   C: DatabaseConnection,
   P: ReplicaProvider,
{
   async fn select(
      &mut self,
      entry_point: ReadEntryPoint,
      statement: &Statement,
      name: Option<&str>,
   ) -> Result<Selected> {
      let open_transactions = self.open_transactions();

      match resolve_read_target(&*self.provider, &self.routing, open_transactions).await {
         ReadTarget::Primary => {
            trace!(entry_point = entry_point.name(), open_transactions, "read routed to primary");
            self.primary.select(entry_point, statement, name).await
         }
         ReadTarget::Replica(mut replica) => {
            trace!(entry_point = entry_point.name(), "read routed to replica");
            let label = replica_label(name);
            replica.select(entry_point, statement, Some(&label)).await
         }
      }
   }

   async fn execute(&mut self, statement: &Statement, name: Option<&str>) -> Result<WriteQueryResult> {
      self.primary.execute(statement, name).await
   }

   async fn transaction_boundary(
      &mut self,
      operation: BoundaryOperation,
      savepoint: Option<&str>,
   ) -> Result<()> {
      match evaluate_mutation_boundary(operation, &self.routing) {
         BoundaryDecision::Execute => self.primary.transaction_boundary(operation, savepoint).await,
         BoundaryDecision::Noop => {
            self.skipped_transactions = skipped_depth(operation, self.skipped_transactions);
            debug!(
               operation = operation.name(),
               skipped_transactions = self.skipped_transactions,
               "transactions skipped"
            );
            Ok(())
         }
         BoundaryDecision::Reject(operation) => {
            warn!(operation = operation.name(), "transactions blocked");
            Err(Error::TransactionAttempted { operation })
         }
      }
   }

   async fn rollback_db_transaction(&mut self) -> Result<()> {
      let skipped = std::mem::take(&mut self.skipped_transactions);

      // Only skipped levels are open; the primary has nothing to roll back
      if skipped > 0 && self.primary.open_transactions() == 0 {
         debug!(skipped_transactions = skipped, "rollback of skipped transaction");
         return Ok(());
      }

      self.primary.rollback_db_transaction().await
   }

   fn open_transactions(&self) -> u32 {
      self.primary.open_transactions() + self.skipped_transactions
   }
}

/// Nesting after a skipped boundary, as the caller sees it.
fn skipped_depth(operation: BoundaryOperation, depth: u32) -> u32 {
   match operation {
      BoundaryOperation::BeginTransaction | BoundaryOperation::CreateSavepoint => depth + 1,
      BoundaryOperation::CommitTransaction => 0,
      BoundaryOperation::RollbackToSavepoint | BoundaryOperation::ReleaseSavepoint => {
         depth.saturating_sub(1)
      }
   }
}
