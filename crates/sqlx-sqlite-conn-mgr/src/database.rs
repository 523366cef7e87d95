//! SQLite database with a connection pool opened read-write or read-only

use crate::Result;
use crate::config::SqliteDatabaseConfig;
use crate::error::Error;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// SQLite database backed by a single SQLx connection pool.
///
/// The access mode is chosen at connect time through
/// [`SqliteDatabaseConfig::read_only`]. A read-write database plays the role of a
/// primary; a read-only database plays the role of a replica and can never be
/// written through this handle.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
/// let db = SqliteDatabase::connect("test.db", None).await?;
///
/// let mut conn = db.acquire().await?;
/// sqlx::query("INSERT INTO users (name) VALUES (?)")
///     .bind("Alice")
///     .execute(&mut *conn)
///     .await?;
/// drop(conn);
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   pool: Pool<Sqlite>,

   /// Access mode the pool was opened with
   read_only: bool,

   /// Tracks if WAL mode has been initialized (set on first read-write acquire)
   wal_initialized: AtomicBool,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Path to database file (used for cleanup)
   path: PathBuf,
}

impl SqliteDatabase {
   /// Connect to a SQLite database
   ///
   /// Read-write databases are created if they don't exist. Read-only databases
   /// must already exist; connecting to a missing file fails with a sqlx error.
   ///
   /// # Arguments
   ///
   /// * `path` - Path to the SQLite database file
   /// * `custom_config` - Optional pool configuration. Pass `None` for a read-write
   ///   pool with the defaults (6 connections, 30 second idle timeout).
   ///
   /// # Examples
   ///
   /// ```no_run
   /// use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
   ///
   /// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
   /// let primary = SqliteDatabase::connect("test.db", None).await?;
   /// let replica = SqliteDatabase::connect("test.db", Some(SqliteDatabaseConfig::read_only())).await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref();

      // Validate path is not empty
      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      let path = path.to_path_buf();

      let options = SqliteConnectOptions::new()
         .filename(&path)
         .read_only(config.read_only)
         .create_if_missing(!config.read_only && !is_memory_database(&path));

      // Opens one connection up front, so a missing or unreadable file fails here
      let pool = SqlitePoolOptions::new()
         .max_connections(config.max_connections)
         .min_connections(0)
         .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
         .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
         .connect_with(options)
         .await?;

      debug!(
         path = %path.display(),
         read_only = config.read_only,
         "opened sqlite database"
      );

      Ok(Arc::new(Self {
         pool,
         read_only: config.read_only,
         wal_initialized: AtomicBool::new(false),
         closed: AtomicBool::new(false),
         path,
      }))
   }

   /// Get a reference to the connection pool
   ///
   /// # Example
   ///
   /// ```no_run
   /// use sqlx_sqlite_conn_mgr::SqliteDatabase;
   ///
   /// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
   /// let db = SqliteDatabase::connect("test.db", None).await?;
   /// let result = sqlx::query("SELECT * FROM users")
   ///     .fetch_all(db.pool()?)
   ///     .await?;
   /// # Ok(())
   /// # }
   /// ```
   pub fn pool(&self) -> Result<&Pool<Sqlite>> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }
      Ok(&self.pool)
   }

   /// Acquire a pooled connection
   ///
   /// For read-write databases the first call enables WAL mode, so readers on
   /// other connections are not blocked by an open write transaction. The
   /// connection returns to the pool when dropped.
   pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }

      let mut conn = self.pool.acquire().await?;

      // Initialize WAL mode on first use (idempotent and safe)
      if !self.read_only && !self.wal_initialized.load(Ordering::SeqCst) {
         sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;

         // https://www.sqlite.org/wal.html#performance_considerations
         sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&mut *conn)
            .await?;

         self.wal_initialized.store(true, Ordering::SeqCst);
      }

      Ok(conn)
   }

   /// Whether this database was opened read-only
   pub fn is_read_only(&self) -> bool {
      self.read_only
   }

   /// Path of the underlying database file
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Close the database and clean up resources
   ///
   /// Waits for all connections to be returned, checkpoints the WAL if it was
   /// initialized, then closes the pool. After calling close, any operations on
   /// this database will return `Error::DatabaseClosed`.
   ///
   /// Note: Takes `Arc<Self>` to consume ownership, preventing use-after-close at compile time.
   pub async fn close(self: Arc<Self>) -> Result<()> {
      self.closed.store(true, Ordering::SeqCst);

      // Checkpoint WAL before closing to flush changes and truncate the WAL file
      if self.wal_initialized.load(Ordering::SeqCst) {
         match self.pool.acquire().await {
            Ok(mut conn) => {
               if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                  .execute(&mut *conn)
                  .await
               {
                  error!("WAL checkpoint failed on close: {}", e);
               }
            }
            Err(e) => error!("Failed to acquire connection for WAL checkpoint: {}", e),
         }
      }

      self.pool.close().await;

      Ok(())
   }

   /// Close the database and delete all database files
   ///
   /// This closes all connections and then deletes the database file,
   /// WAL file, and SHM file from disk. Use with caution!
   pub async fn remove(self: Arc<Self>) -> Result<()> {
      // Clone path before closing (since close consumes self)
      let path = self.path.clone();

      self.close().await?;

      // Remove main database file - propagate errors (file should exist)
      std::fs::remove_file(&path).map_err(Error::Io)?;

      // Remove WAL and SHM files - ignore "not found" but propagate other errors
      // (these files may not exist if WAL was never initialized)
      for sidecar in [path.with_extension("db-wal"), path.with_extension("db-shm")] {
         if let Err(e) = std::fs::remove_file(&sidecar)
            && e.kind() != std::io::ErrorKind::NotFound
         {
            return Err(Error::Io(e));
         }
      }

      Ok(())
   }
}

/// `:memory:` and `file::memory:` style paths have no backing file
pub(crate) fn is_memory_database(path: &Path) -> bool {
   let path = path.to_string_lossy();
   path == ":memory:" || path.contains("mode=memory") || path.starts_with("file::memory:")
}
