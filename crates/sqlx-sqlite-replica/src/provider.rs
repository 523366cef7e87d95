//! Sources of replica connections.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::connection::DatabaseConnection;
use crate::session::SqliteSession;
use crate::{Error, Result};

/// Produces a read-only connection on demand.
///
/// The router calls [`connection`](ReplicaProvider::connection) on every routed
/// read and does not keep the result beyond that read. Any error means "no
/// replica right now"; the router does not look at the error kind.
pub trait ReplicaProvider: Send + Sync {
   type Connection: DatabaseConnection;

   fn connection(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Where the replica lives and how its pool is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaTarget {
   pub path: PathBuf,
   pub config: SqliteDatabaseConfig,
}

impl ReplicaTarget {
   /// Target with the default pool configuration.
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self {
         path: path.into(),
         config: SqliteDatabaseConfig::read_only(),
      }
   }

   /// Use `config` for the replica pool. The pool is always opened read-only.
   pub fn with_config(mut self, config: SqliteDatabaseConfig) -> Self {
      self.config = config.with_read_only(true);
      self
   }
}

/// Shared, swappable replica settings.
///
/// Clones share the same slot, so the host can enable, move or disable the
/// replica at runtime and every provider built from these settings sees the
/// change on its next call.
#[derive(Debug, Clone, Default)]
pub struct ReplicaSettings {
   target: Arc<RwLock<Option<ReplicaTarget>>>,
}

impl ReplicaSettings {
   /// No replica configured.
   pub fn new() -> Self {
      Self::default()
   }

   pub fn with_target(target: ReplicaTarget) -> Self {
      Self {
         target: Arc::new(RwLock::new(Some(target))),
      }
   }

   pub fn with_path(path: impl Into<PathBuf>) -> Self {
      Self::with_target(ReplicaTarget::new(path))
   }

   pub async fn current(&self) -> Option<ReplicaTarget> {
      self.target.read().await.clone()
   }

   /// Replace the replica target; `None` disables the replica.
   pub async fn set(&self, target: Option<ReplicaTarget>) {
      *self.target.write().await = target;
   }
}

/// Replica provider backed by a read-only SQLite pool.
///
/// The settings are read on every call. The pool for the current target is
/// opened lazily and reused until the target changes.
#[derive(Debug)]
pub struct SqliteReplicaProvider {
   settings: ReplicaSettings,
   cached: Mutex<Option<(ReplicaTarget, Arc<SqliteDatabase>)>>,
}

impl SqliteReplicaProvider {
   pub fn new(settings: ReplicaSettings) -> Self {
      Self {
         settings,
         cached: Mutex::new(None),
      }
   }

   pub fn settings(&self) -> &ReplicaSettings {
      &self.settings
   }

   /// The replica database for the current settings.
   pub async fn database(&self) -> Result<Arc<SqliteDatabase>> {
      // Settings are read under the cache lock so a concurrent `close` cannot
      // be followed by re-caching a target that was already replaced
      let mut cached = self.cached.lock().await;
      let Some(target) = self.settings.current().await else {
         return Err(Error::ReplicaUnavailable("no replica configured".into()));
      };

      if let Some((cached_target, db)) = cached.as_ref()
         && *cached_target == target
      {
         return Ok(Arc::clone(db));
      }

      if let Some((stale, _)) = cached.take() {
         debug!(path = %stale.path.display(), "replica target changed, dropping old pool");
      }

      let db = SqliteDatabase::connect(&target.path, Some(target.config.clone()))
         .await
         .map_err(|e| Error::ReplicaUnavailable(e.to_string()))?;

      *cached = Some((target, Arc::clone(&db)));
      Ok(db)
   }

   /// Close the cached replica pool, if any.
   pub async fn close(&self) -> Result<()> {
      if let Some((_, db)) = self.cached.lock().await.take() {
         db.close().await?;
      }
      Ok(())
   }
}

impl ReplicaProvider for SqliteReplicaProvider {
   type Connection = SqliteSession;

   async fn connection(&self) -> Result<SqliteSession> {
      let db = self.database().await?;
      SqliteSession::acquire(&db)
         .await
         .map_err(|e| Error::ReplicaUnavailable(e.to_string()))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_target_is_always_read_only() {
      let target = ReplicaTarget::new("replica.db").with_config(SqliteDatabaseConfig::default());
      assert!(target.config.read_only);
   }

   #[tokio::test]
   async fn test_unconfigured_provider_is_unavailable() {
      let provider = SqliteReplicaProvider::new(ReplicaSettings::new());
      let err = provider.connection().await.unwrap_err();
      assert_eq!(err.error_code(), "REPLICA_UNAVAILABLE");
   }

   #[tokio::test]
   async fn test_settings_clones_share_target() {
      let settings = ReplicaSettings::new();
      let shared = settings.clone();

      settings.set(Some(ReplicaTarget::new("replica.db"))).await;
      assert_eq!(
         shared.current().await.map(|t| t.path),
         Some(PathBuf::from("replica.db"))
      );

      shared.set(None).await;
      assert!(settings.current().await.is_none());
   }

   #[tokio::test]
   async fn test_missing_replica_file_is_unavailable() {
      let temp_dir = tempfile::TempDir::new().unwrap();
      let provider =
         SqliteReplicaProvider::new(ReplicaSettings::with_path(temp_dir.path().join("nope.db")));

      let err = provider.connection().await.unwrap_err();
      assert!(matches!(err, Error::ReplicaUnavailable(_)));
   }

   #[tokio::test(flavor = "multi_thread")]
   async fn test_disabled_replica_is_not_recached_after_close() {
      let temp_dir = tempfile::TempDir::new().unwrap();
      let path = temp_dir.path().join("replica.db");
      let seed = SqliteDatabase::connect(&path, None).await.unwrap();
      seed.acquire().await.unwrap();

      let provider = Arc::new(SqliteReplicaProvider::new(ReplicaSettings::with_path(&path)));
      provider.database().await.unwrap();

      // A read arrives while the cache is busy, then the replica is disabled
      let busy = provider.cached.lock().await;
      let read = tokio::spawn({
         let provider = Arc::clone(&provider);
         async move { provider.database().await }
      });
      tokio::task::yield_now().await;
      provider.settings().set(None).await;
      drop(busy);
      provider.close().await.unwrap();

      let err = read.await.unwrap().unwrap_err();
      assert_eq!(err.error_code(), "REPLICA_UNAVAILABLE");
      assert!(provider.cached.lock().await.is_none());

      seed.close().await.unwrap();
   }
}
