//! Configuration for SQLite database connection pools

use serde::{Deserialize, Serialize};

/// Configuration for a SqliteDatabase connection pool
///
/// Missing fields fall back to their defaults when deserialized, so a
/// configuration file only needs to name what it changes.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
///
/// // Use defaults (read-write)
/// let config = SqliteDatabaseConfig::default();
/// assert!(!config.read_only);
///
/// // Replica pool
/// let config = SqliteDatabaseConfig::read_only();
/// assert!(config.read_only);
///
/// // Override just one field
/// let config = SqliteDatabaseConfig {
///     max_connections: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteDatabaseConfig {
   /// Maximum number of pooled connections
   ///
   /// Default: 6
   pub max_connections: u32,

   /// Idle timeout for pooled connections (in seconds)
   ///
   /// Connections that remain idle for this duration will be closed automatically.
   ///
   /// Default: 30
   pub idle_timeout_secs: u64,

   /// How long `acquire()` waits for a connection before failing (in seconds)
   ///
   /// For replicas this bounds how long a read waits before it is routed to
   /// the primary instead.
   ///
   /// Default: 5
   pub acquire_timeout_secs: u64,

   /// Open the database read-only
   ///
   /// Read-only databases are never created on connect; connecting to a missing
   /// file fails.
   ///
   /// Default: false
   pub read_only: bool,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_connections: 6,
         idle_timeout_secs: 30,
         acquire_timeout_secs: 5,
         read_only: false,
      }
   }
}

impl SqliteDatabaseConfig {
   /// Default configuration with `read_only` set, suitable for replicas.
   pub fn read_only() -> Self {
      Self {
         read_only: true,
         ..Default::default()
      }
   }

   /// Returns this configuration with the access mode replaced.
   pub fn with_read_only(mut self, read_only: bool) -> Self {
      self.read_only = read_only;
      self
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_defaults() {
      let config = SqliteDatabaseConfig::default();
      assert_eq!(config.max_connections, 6);
      assert_eq!(config.idle_timeout_secs, 30);
      assert_eq!(config.acquire_timeout_secs, 5);
      assert!(!config.read_only);
   }

   #[test]
   fn test_partial_deserialize_uses_defaults() {
      let config: SqliteDatabaseConfig =
         serde_json::from_str(r#"{ "max_connections": 2 }"#).unwrap();
      assert_eq!(config.max_connections, 2);
      assert_eq!(config.idle_timeout_secs, 30);
      assert!(!config.read_only);
   }

   #[test]
   fn test_with_read_only() {
      let config = SqliteDatabaseConfig::default().with_read_only(true);
      assert_eq!(config, SqliteDatabaseConfig::read_only());
   }
}
