//! # sqlx-sqlite-conn-mgr
//!
//! A minimal wrapper around SQLx that opens SQLite databases either as a writable
//! primary or as a read-only replica.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: A pooled SQLite database opened read-write or read-only
//! - **[`SqliteDatabaseConfig`]**: Configuration for the connection pool and access mode
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **One pool per database**: the access mode is fixed when the pool is opened
//! - **Read-only replicas**: `read_only` pools never create the database file and
//!   reject writes at the SQLite level
//! - **Lazy WAL mode**: read-write databases enable Write-Ahead Logging on first acquire
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_conn_mgr::Result<()> {
//!     let primary = SqliteDatabase::connect("primary.db", None).await?;
//!     let replica =
//!         SqliteDatabase::connect("replica.db", Some(SqliteDatabaseConfig::read_only())).await?;
//!
//!     let mut conn = primary.acquire().await?;
//!     sqlx::query("INSERT INTO users (name) VALUES (?)")
//!         .bind("Alice")
//!         .execute(&mut *conn)
//!         .await?;
//!     drop(conn);
//!
//!     let rows = sqlx::query("SELECT * FROM users")
//!         .fetch_all(replica.pool()?)
//!         .await?;
//!
//!     primary.close().await?;
//!     replica.close().await?;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod database;
mod error;

// Re-export public types
pub use config::SqliteDatabaseConfig;
pub use database::SqliteDatabase;
pub use error::Error;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
