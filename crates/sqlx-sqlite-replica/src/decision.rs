//! Routing decisions for reads and transaction boundaries.
//!
//! Both decisions are pure functions of the [`RoutingConfig`], the task's
//! forced-primary depth, and inputs supplied by the caller.

use tracing::debug;

use crate::connection::BoundaryOperation;
use crate::provider::ReplicaProvider;
use crate::state::RoutingConfig;

/// Whether a read must go to the primary.
///
/// An unavailable replica always means primary. Otherwise the primary is used
/// inside a forced-primary scope, or while a transaction is open unless
/// `ignore_transactions` is set.
pub fn should_read_from_primary(
   replica_available: bool,
   open_transactions: u32,
   config: &RoutingConfig,
) -> bool {
   if !replica_available {
      return true;
   }

   config.forced_primary() || (open_transactions > 0 && !config.ignore_transactions())
}

/// Outcome of a transaction-boundary check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDecision {
   /// Delegate to the primary's native implementation.
   Execute,
   /// Report success without touching the primary.
   Noop,
   /// Fail with `TransactionAttempted` for this operation.
   Reject(BoundaryOperation),
}

/// Decide what a transaction boundary does.
///
/// `skip_transactions` is checked before `block_transactions`.
pub fn evaluate_mutation_boundary(
   operation: BoundaryOperation,
   config: &RoutingConfig,
) -> BoundaryDecision {
   if config.skip_transactions() {
      BoundaryDecision::Noop
   } else if config.block_transactions() {
      BoundaryDecision::Reject(operation)
   } else {
      BoundaryDecision::Execute
   }
}

/// Where a read will run.
#[derive(Debug)]
pub enum ReadTarget<C> {
   Primary,
   Replica(C),
}

impl<C> ReadTarget<C> {
   pub fn is_primary(&self) -> bool {
      matches!(self, ReadTarget::Primary)
   }
}

/// Ask `provider` for a replica connection and decide where a read runs.
///
/// The provider is queried on every call, even when the result is the primary,
/// so a replica that goes away or appears is noticed on the next read. Any
/// provider error is treated as "replica unavailable" and never returned.
pub async fn resolve_read_target<P>(
   provider: &P,
   config: &RoutingConfig,
   open_transactions: u32,
) -> ReadTarget<P::Connection>
where
   P: ReplicaProvider,
{
   let replica = match provider.connection().await {
      Ok(conn) => Some(conn),
      Err(e) => {
         debug!(error = %e, "replica unavailable, reading from primary");
         None
      }
   };

   match replica {
      Some(conn) if !should_read_from_primary(true, open_transactions, config) => {
         ReadTarget::Replica(conn)
      }
      _ => ReadTarget::Primary,
   }
}
