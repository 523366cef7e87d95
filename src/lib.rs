//! Named SQLite environments with read/write routing between a primary and a
//! read-only replica.
//!
//! [`install`] wires routing onto an environment described by
//! [`DatabaseConfigurations`]. Connections from the returned [`ReplicaRouter`]
//! execute writes and transactions on the primary and serve reads from the
//! replica whenever no transaction is open and no forced-primary scope is
//! active.
//!
//! # Example
//!
//! ```no_run
//! use sqlite_replica_router::{
//!    DatabaseConfigurations, DatabaseConnection, DatabaseConnectionExt, Statement, install,
//!    with_forced_primary,
//! };
//!
//! # async fn example() -> sqlite_replica_router::Result<()> {
//! let configs = DatabaseConfigurations::from_path("databases.json")?;
//! let router = install("production", &configs).await?;
//!
//! let mut conn = router.connection().await?;
//! conn.execute(&Statement::new("INSERT INTO users (name) VALUES (?)").bind("Alice"), None)
//!    .await?;
//!
//! // Replica, which may not have the new row yet
//! let users = conn.select_all(&Statement::new("SELECT * FROM users"), None).await?;
//!
//! // Primary
//! let users = with_forced_primary(conn.select_all(&Statement::new("SELECT * FROM users"), None))
//!    .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

mod config;
mod error;
mod router;

pub use config::{DatabaseConfigurations, DatabaseSettings, EnvironmentConfig};
pub use error::{Error, Result};
pub use router::{Installer, ReplicaRouter, RoutedSqliteConnection};

pub use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
pub use sqlx_sqlite_replica::{
   BoundaryOperation, DatabaseConnection, DatabaseConnectionExt, ReadEntryPoint, Row, RoutingConfig,
   RoutingFlags, Statement, WriteQueryResult, forced_primary, with_forced_primary,
   with_forced_primary_sync,
};

/// Install routing for `environment` on the process-wide [`Installer`].
///
/// Idempotent: later calls for the same environment return the router created
/// by the first one.
pub async fn install(environment: &str, configs: &DatabaseConfigurations) -> Result<Arc<ReplicaRouter>> {
   Installer::global().install(environment, configs).await
}
