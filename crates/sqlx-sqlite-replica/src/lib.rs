//! Read/write routing between a primary SQLite database and a read-only replica.
//!
//! This crate sits between the connection manager (`sqlx-sqlite-conn-mgr`) and
//! application code. It provides:
//!
//! - [`RoutingConfig`] and [`with_forced_primary`]: the flags and the call-scoped
//!   override that parameterize every routing decision
//! - [`should_read_from_primary`] and [`evaluate_mutation_boundary`]: the decision engine
//! - [`ReplicaProvider`]: source of replica connections, with [`SqliteReplicaProvider`]
//!   as the SQLite implementation
//! - [`RoutedConnection`]: a [`DatabaseConnection`] decorator that sends reads to the
//!   replica when that is safe and guards transaction boundaries on the primary
//! - [`SqliteSession`]: a pooled SQLite connection with JSON binds and rows
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlx_sqlite_replica::{
//!    DatabaseConnectionExt, ReplicaSettings, RoutedConnection, RoutingConfig, SqliteDatabase,
//!    SqliteReplicaProvider, SqliteSession, Statement, with_forced_primary,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let primary = SqliteDatabase::connect("primary.db", None).await?;
//! let settings = ReplicaSettings::with_path("replica.db");
//! let provider = Arc::new(SqliteReplicaProvider::new(settings));
//! let routing = Arc::new(RoutingConfig::default());
//!
//! let mut conn = RoutedConnection::new(SqliteSession::acquire(&primary).await?, provider, routing);
//!
//! // Served by the replica
//! let rows = conn.select_all(&Statement::new("SELECT * FROM users"), None).await?;
//!
//! // Served by the primary
//! let fresh = with_forced_primary(conn.select_all(&Statement::new("SELECT * FROM users"), None)).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod decision;
pub mod decode;
pub mod error;
pub mod provider;
pub mod router;
pub mod session;
pub mod state;

pub use connection::{
   BoundaryOperation, DatabaseConnection, DatabaseConnectionExt, ReadEntryPoint, Row, Selected,
   Statement, WriteQueryResult,
};
pub use decision::{
   BoundaryDecision, ReadTarget, evaluate_mutation_boundary, resolve_read_target,
   should_read_from_primary,
};
pub use error::{Error, Result};
pub use provider::{ReplicaProvider, ReplicaSettings, ReplicaTarget, SqliteReplicaProvider};
pub use router::{RoutedConnection, replica_label};
pub use session::{SqliteSession, bind_value};
pub use state::{
   RoutingConfig, RoutingFlags, forced_primary, forced_primary_depth, with_forced_primary,
   with_forced_primary_sync,
};

// Re-export commonly used types from dependencies
pub use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
