//! Installed environments and the routed connections they hand out.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use sqlx_sqlite_conn_mgr::SqliteDatabase;
use sqlx_sqlite_replica::{
   ReplicaSettings, RoutedConnection, RoutingConfig, SqliteReplicaProvider, SqliteSession,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{DatabaseConfigurations, DatabaseSettings, EnvironmentConfig};
use crate::{Error, Result};

/// Connection handed out by a [`ReplicaRouter`].
pub type RoutedSqliteConnection = RoutedConnection<SqliteSession, SqliteReplicaProvider>;

/// Primary database, replica provider and routing flags for one environment.
#[derive(Debug)]
pub struct ReplicaRouter {
   environment: String,
   primary: Arc<SqliteDatabase>,
   provider: Arc<SqliteReplicaProvider>,
   routing: Arc<RoutingConfig>,
}

impl ReplicaRouter {
   /// Open the primary for `config` and prepare the replica provider.
   ///
   /// The replica is opened lazily on the first routed read, so a replica
   /// that does not exist yet is not an error here.
   pub async fn open(environment: impl Into<String>, config: &EnvironmentConfig) -> Result<Self> {
      let environment = environment.into();

      // The primary is always writable regardless of what the settings say
      let pool = config.primary.pool.clone().with_read_only(false);
      let primary = SqliteDatabase::connect(&config.primary.path, Some(pool)).await?;

      let settings = match &config.replica {
         Some(replica) => ReplicaSettings::with_target(replica.replica_target()),
         None => ReplicaSettings::new(),
      };

      debug!(
         environment = %environment,
         primary = %config.primary.path.display(),
         replica = config.replica.is_some(),
         "opened replica router"
      );

      Ok(Self {
         environment,
         primary,
         provider: Arc::new(SqliteReplicaProvider::new(settings)),
         routing: Arc::new(RoutingConfig::from_flags(config.routing)),
      })
   }

   pub fn environment(&self) -> &str {
      &self.environment
   }

   pub fn primary(&self) -> &Arc<SqliteDatabase> {
      &self.primary
   }

   /// Flags shared by every connection from this router. Changes apply to
   /// connections already handed out.
   pub fn routing(&self) -> &Arc<RoutingConfig> {
      &self.routing
   }

   pub fn replica_settings(&self) -> &ReplicaSettings {
      self.provider.settings()
   }

   /// Acquire a primary connection with read routing installed.
   pub async fn connection(&self) -> Result<RoutedSqliteConnection> {
      let session = SqliteSession::acquire(&self.primary).await?;
      Ok(RoutedConnection::new(
         session,
         Arc::clone(&self.provider),
         Arc::clone(&self.routing),
      ))
   }

   /// Enable, move or disable the replica at runtime.
   ///
   /// The next routed read on any connection sees the new settings.
   pub async fn reconfigure_replica(&self, replica: Option<DatabaseSettings>) -> Result<()> {
      info!(
         environment = %self.environment,
         replica = ?replica.as_ref().map(|r| r.path.display().to_string()),
         "reconfiguring replica"
      );

      let disabled = replica.is_none();
      self
         .provider
         .settings()
         .set(replica.as_ref().map(DatabaseSettings::replica_target))
         .await;

      if disabled {
         self.provider.close().await?;
      }
      Ok(())
   }

   /// Close the replica pool and the primary.
   ///
   /// Waits for outstanding connections to be returned.
   pub async fn close(&self) -> Result<()> {
      if let Err(e) = self.provider.close().await {
         warn!(environment = %self.environment, "error closing replica: {}", e);
      }
      Arc::clone(&self.primary).close().await?;
      debug!(environment = %self.environment, "closed replica router");
      Ok(())
   }
}

/// Routers keyed by environment name.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct Installer(Arc<RwLock<HashMap<String, Arc<ReplicaRouter>>>>);

impl Installer {
   pub fn new() -> Self {
      Self::default()
   }

   /// Process-wide installer used by [`install`](crate::install).
   pub fn global() -> &'static Installer {
      static GLOBAL: OnceLock<Installer> = OnceLock::new();
      GLOBAL.get_or_init(Installer::new)
   }

   /// Install routing for `environment`.
   ///
   /// If the environment is already installed the existing router is
   /// returned and `configs` is not consulted again.
   pub async fn install(
      &self,
      environment: &str,
      configs: &DatabaseConfigurations,
   ) -> Result<Arc<ReplicaRouter>> {
      let routers = self.0.read().await;

      // Return cached if already installed
      if let Some(router) = routers.get(environment) {
         return Ok(Arc::clone(router));
      }

      drop(routers); // Release read lock before acquiring write lock

      let mut routers = self.0.write().await;

      // Double-check in case another task installed it while we waited for write lock
      if let Some(router) = routers.get(environment) {
         return Ok(Arc::clone(router));
      }

      let config = configs
         .get(environment)
         .ok_or_else(|| Error::EnvironmentNotConfigured(environment.to_string()))?;

      let router = Arc::new(ReplicaRouter::open(environment, config).await?);
      routers.insert(environment.to_string(), Arc::clone(&router));

      info!(environment, "installed replica router");
      Ok(router)
   }

   pub async fn get(&self, environment: &str) -> Result<Arc<ReplicaRouter>> {
      self
         .0
         .read()
         .await
         .get(environment)
         .cloned()
         .ok_or_else(|| Error::EnvironmentNotInstalled(environment.to_string()))
   }

   /// Remove an environment and close its databases.
   pub async fn uninstall(&self, environment: &str) -> Result<()> {
      let router = self
         .0
         .write()
         .await
         .remove(environment)
         .ok_or_else(|| Error::EnvironmentNotInstalled(environment.to_string()))?;

      router.close().await
   }

   /// Remove and close every installed environment.
   ///
   /// All routers are closed even if some fail; the first error is returned.
   pub async fn uninstall_all(&self) -> Result<()> {
      let routers: Vec<Arc<ReplicaRouter>> = self.0.write().await.drain().map(|(_, v)| v).collect();

      let mut first_error = None;
      for router in routers {
         if let Err(e) = router.close().await {
            warn!(environment = router.environment(), "error closing router: {}", e);
            first_error.get_or_insert(e);
         }
      }

      match first_error {
         Some(e) => Err(e),
         None => Ok(()),
      }
   }

   pub async fn installed(&self) -> Vec<String> {
      let mut names: Vec<String> = self.0.read().await.keys().cloned().collect();
      names.sort();
      names
   }
}
