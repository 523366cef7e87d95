//! Database configurations per environment

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
use sqlx_sqlite_replica::{ReplicaTarget, RoutingFlags};

use crate::Result;

/// Database settings keyed by environment name.
///
/// # Example
///
/// ```
/// use sqlite_replica_router::DatabaseConfigurations;
///
/// let configs = DatabaseConfigurations::from_json_str(
///    r#"{
///       "production": {
///          "primary": { "path": "primary.db" },
///          "replica": { "path": "replica.db", "pool": { "max_connections": 2 } }
///       }
///    }"#,
/// )
/// .unwrap();
///
/// let production = configs.get("production").unwrap();
/// assert_eq!(production.replica.as_ref().unwrap().pool.max_connections, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseConfigurations(HashMap<String, EnvironmentConfig>);

impl DatabaseConfigurations {
   pub fn new() -> Self {
      Self::default()
   }

   /// Parse configurations from JSON text.
   pub fn from_json_str(json: &str) -> Result<Self> {
      Ok(serde_json::from_str(json)?)
   }

   /// Read and parse a JSON configuration file.
   pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
      let json = std::fs::read_to_string(path)?;
      Self::from_json_str(&json)
   }

   pub fn with_environment(mut self, environment: impl Into<String>, config: EnvironmentConfig) -> Self {
      self.0.insert(environment.into(), config);
      self
   }

   pub fn get(&self, environment: &str) -> Option<&EnvironmentConfig> {
      self.0.get(environment)
   }

   pub fn environments(&self) -> impl Iterator<Item = &str> {
      self.0.keys().map(String::as_str)
   }
}

/// Primary, optional replica and routing flags for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
   pub primary: DatabaseSettings,

   /// Without a replica every read goes to the primary
   #[serde(default)]
   pub replica: Option<DatabaseSettings>,

   #[serde(default)]
   pub routing: RoutingFlags,
}

impl EnvironmentConfig {
   pub fn new(primary: DatabaseSettings) -> Self {
      Self {
         primary,
         replica: None,
         routing: RoutingFlags::default(),
      }
   }

   pub fn with_replica(mut self, replica: DatabaseSettings) -> Self {
      self.replica = Some(replica);
      self
   }

   pub fn with_routing(mut self, routing: RoutingFlags) -> Self {
      self.routing = routing;
      self
   }
}

/// Location and pool configuration of one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
   pub path: PathBuf,

   #[serde(default)]
   pub pool: SqliteDatabaseConfig,
}

impl DatabaseSettings {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self {
         path: path.into(),
         pool: SqliteDatabaseConfig::default(),
      }
   }

   pub fn with_pool(mut self, pool: SqliteDatabaseConfig) -> Self {
      self.pool = pool;
      self
   }

   /// These settings as a replica target; the pool is opened read-only.
   pub fn replica_target(&self) -> ReplicaTarget {
      ReplicaTarget::new(&self.path).with_config(self.pool.clone())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_missing_fields_use_defaults() {
      let configs = DatabaseConfigurations::from_json_str(
         r#"{ "development": { "primary": { "path": "dev.db" } } }"#,
      )
      .unwrap();

      let dev = configs.get("development").unwrap();
      assert_eq!(dev.primary.path, PathBuf::from("dev.db"));
      assert_eq!(dev.primary.pool, SqliteDatabaseConfig::default());
      assert!(dev.replica.is_none());
      assert_eq!(dev.routing, RoutingFlags::default());
   }

   #[test]
   fn test_routing_flags_parsed() {
      let configs = DatabaseConfigurations::from_json_str(
         r#"{
            "test": {
               "primary": { "path": "test.db" },
               "routing": { "block_transactions": true }
            }
         }"#,
      )
      .unwrap();

      let routing = configs.get("test").unwrap().routing;
      assert!(routing.block_transactions);
      assert!(!routing.skip_transactions);
      assert!(!routing.ignore_transactions);
   }

   #[test]
   fn test_missing_primary_rejected() {
      let err = DatabaseConfigurations::from_json_str(r#"{ "test": {} }"#).unwrap_err();
      assert_eq!(err.error_code(), "INVALID_CONFIGURATION");
   }

   #[test]
   fn test_replica_target_is_read_only() {
      let settings = DatabaseSettings::new("replica.db").with_pool(SqliteDatabaseConfig {
         max_connections: 2,
         ..Default::default()
      });

      let target = settings.replica_target();
      assert_eq!(target.path, PathBuf::from("replica.db"));
      assert_eq!(target.config.max_connections, 2);
      assert!(target.config.read_only);
   }

   #[test]
   fn test_builder_matches_parsed() {
      let built = DatabaseConfigurations::new().with_environment(
         "production",
         EnvironmentConfig::new(DatabaseSettings::new("primary.db"))
            .with_replica(DatabaseSettings::new("replica.db")),
      );
      let parsed = DatabaseConfigurations::from_json_str(
         r#"{
            "production": {
               "primary": { "path": "primary.db" },
               "replica": { "path": "replica.db" }
            }
         }"#,
      )
      .unwrap();

      assert_eq!(built, parsed);
      assert_eq!(built.environments().collect::<Vec<_>>(), vec!["production"]);
   }
}
