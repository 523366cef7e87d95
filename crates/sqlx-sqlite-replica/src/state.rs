//! Routing state: process-wide flags and the call-scoped forced-primary counter.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

tokio::task_local! {
   static FORCED_PRIMARY_DEPTH: usize;
}

/// Current nesting depth of forced-primary scopes for this task.
///
/// Zero outside any [`with_forced_primary`] / [`with_forced_primary_sync`] scope.
pub fn forced_primary_depth() -> usize {
   FORCED_PRIMARY_DEPTH.try_with(|depth| *depth).unwrap_or(0)
}

/// Whether reads in the current task must go to the primary regardless of
/// transaction state.
pub fn forced_primary() -> bool {
   forced_primary_depth() > 0
}

/// Run `body` with reads forced to the primary.
///
/// Scopes nest: the depth is one more than the enclosing scope's while `body`
/// runs and reverts when `body` completes, returns an error, panics, or is
/// dropped before completion.
///
/// The depth is task-local. Tasks spawned from inside `body` start outside any
/// scope.
///
/// # Example
///
/// ```
/// use sqlx_sqlite_replica::{forced_primary, with_forced_primary};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// assert!(!forced_primary());
/// with_forced_primary(async {
///    assert!(forced_primary());
/// })
/// .await;
/// assert!(!forced_primary());
/// # }
/// ```
pub async fn with_forced_primary<F>(body: F) -> F::Output
where
   F: Future,
{
   let depth = forced_primary_depth() + 1;
   trace!(depth, "entering forced-primary scope");
   FORCED_PRIMARY_DEPTH.scope(depth, body).await
}

/// Synchronous form of [`with_forced_primary`].
pub fn with_forced_primary_sync<R>(body: impl FnOnce() -> R) -> R {
   let depth = forced_primary_depth() + 1;
   trace!(depth, "entering forced-primary scope");
   FORCED_PRIMARY_DEPTH.sync_scope(depth, body)
}

/// Plain snapshot of the routing flags.
///
/// Used to seed a [`RoutingConfig`] from configuration. Missing fields
/// deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingFlags {
   /// Open transactions do not force reads to the primary.
   pub ignore_transactions: bool,
   /// Transaction boundaries fail with `TransactionAttempted`.
   pub block_transactions: bool,
   /// Transaction boundaries silently succeed without running. Wins over `block_transactions`.
   pub skip_transactions: bool,
}

/// Process-wide routing flags shared by every routed connection.
///
/// Flags are atomic; they are expected to be set rarely (startup, tests) and
/// read on every routed call.
#[derive(Debug, Default)]
pub struct RoutingConfig {
   ignore_transactions: AtomicBool,
   block_transactions: AtomicBool,
   skip_transactions: AtomicBool,
}

impl RoutingConfig {
   /// All flags off.
   pub fn new() -> Self {
      Self::default()
   }

   pub fn from_flags(flags: RoutingFlags) -> Self {
      Self {
         ignore_transactions: AtomicBool::new(flags.ignore_transactions),
         block_transactions: AtomicBool::new(flags.block_transactions),
         skip_transactions: AtomicBool::new(flags.skip_transactions),
      }
   }

   /// Snapshot of the current flag values.
   pub fn flags(&self) -> RoutingFlags {
      RoutingFlags {
         ignore_transactions: self.ignore_transactions(),
         block_transactions: self.block_transactions(),
         skip_transactions: self.skip_transactions(),
      }
   }

   /// Replace all flags at once.
   pub fn apply(&self, flags: RoutingFlags) {
      self.set_ignore_transactions(flags.ignore_transactions);
      self.set_block_transactions(flags.block_transactions);
      self.set_skip_transactions(flags.skip_transactions);
   }

   /// See [`forced_primary`].
   pub fn forced_primary(&self) -> bool {
      forced_primary()
   }

   pub fn ignore_transactions(&self) -> bool {
      self.ignore_transactions.load(Ordering::SeqCst)
   }

   pub fn set_ignore_transactions(&self, ignore: bool) {
      self.ignore_transactions.store(ignore, Ordering::SeqCst);
   }

   pub fn block_transactions(&self) -> bool {
      self.block_transactions.load(Ordering::SeqCst)
   }

   pub fn set_block_transactions(&self, block: bool) {
      self.block_transactions.store(block, Ordering::SeqCst);
   }

   pub fn skip_transactions(&self) -> bool {
      self.skip_transactions.load(Ordering::SeqCst)
   }

   pub fn set_skip_transactions(&self, skip: bool) {
      self.skip_transactions.store(skip, Ordering::SeqCst);
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_flags_default_off() {
      let config = RoutingConfig::new();
      assert_eq!(config.flags(), RoutingFlags::default());
      assert!(!config.ignore_transactions());
      assert!(!config.block_transactions());
      assert!(!config.skip_transactions());
   }

   #[test]
   fn test_setters_are_independent() {
      let config = RoutingConfig::new();
      config.set_block_transactions(true);
      assert!(config.block_transactions());
      assert!(!config.skip_transactions());
      assert!(!config.ignore_transactions());

      config.set_skip_transactions(true);
      config.set_block_transactions(false);
      assert!(config.skip_transactions());
      assert!(!config.block_transactions());
   }

   #[test]
   fn test_from_flags_and_apply() {
      let flags = RoutingFlags {
         ignore_transactions: true,
         block_transactions: false,
         skip_transactions: true,
      };
      let config = RoutingConfig::from_flags(flags);
      assert_eq!(config.flags(), flags);

      config.apply(RoutingFlags::default());
      assert_eq!(config.flags(), RoutingFlags::default());
   }

   #[test]
   fn test_flags_deserialize_partial() {
      let flags: RoutingFlags = serde_json::from_str(r#"{ "block_transactions": true }"#).unwrap();
      assert!(flags.block_transactions);
      assert!(!flags.skip_transactions);
      assert!(!flags.ignore_transactions);
   }

   #[test]
   fn test_sync_scopes_nest() {
      assert_eq!(forced_primary_depth(), 0);

      with_forced_primary_sync(|| {
         assert_eq!(forced_primary_depth(), 1);
         with_forced_primary_sync(|| {
            assert_eq!(forced_primary_depth(), 2);
         });
         // Leaving the inner scope still forces primary
         assert_eq!(forced_primary_depth(), 1);
         assert!(forced_primary());
      });

      assert!(!forced_primary());
   }

   #[test]
   fn test_sync_scope_restored_after_panic() {
      let result = std::panic::catch_unwind(|| {
         with_forced_primary_sync(|| panic!("boom"));
      });

      assert!(result.is_err());
      assert_eq!(forced_primary_depth(), 0);
   }

   #[tokio::test]
   async fn test_async_scopes_nest() {
      with_forced_primary(async {
         assert_eq!(forced_primary_depth(), 1);
         with_forced_primary(async {
            assert_eq!(forced_primary_depth(), 2);
         })
         .await;
         assert_eq!(forced_primary_depth(), 1);
      })
      .await;

      assert_eq!(forced_primary_depth(), 0);
   }

   #[tokio::test]
   async fn test_async_scope_restored_after_error() {
      let result: Result<(), &str> = with_forced_primary(async {
         assert!(forced_primary());
         Err("failed inside scope")
      })
      .await;

      assert_eq!(result, Err("failed inside scope"));
      assert!(!forced_primary());
   }

   #[tokio::test]
   async fn test_scope_does_not_leak_into_other_tasks() {
      let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
      let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

      let forced = tokio::spawn(with_forced_primary(async move {
         entered_tx.send(forced_primary()).unwrap();
         release_rx.await.unwrap();
      }));

      assert!(entered_rx.await.unwrap());
      // Another task observes no forced scope while the first is still inside one
      let other = tokio::spawn(async { forced_primary() }).await.unwrap();
      assert!(!other);
      assert!(!forced_primary());

      release_tx.send(()).unwrap();
      forced.await.unwrap();
   }
}
