use sqlx_sqlite_conn_mgr::{Error, SqliteDatabase, SqliteDatabaseConfig};
use std::sync::Arc;
use tempfile::TempDir;

async fn create_primary(temp_dir: &TempDir, name: &str) -> Arc<SqliteDatabase> {
   SqliteDatabase::connect(temp_dir.path().join(name), None)
      .await
      .expect("Failed to connect to test database")
}

#[tokio::test]
async fn test_read_write_database_is_created() {
   let temp_dir = TempDir::new().unwrap();
   let path = temp_dir.path().join("created.db");
   assert!(!path.exists());

   let db = SqliteDatabase::connect(&path, None).await.unwrap();

   assert!(path.exists(), "Read-write connect should create the file");
   assert!(!db.is_read_only());
   assert_eq!(db.path(), path.as_path());

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_read_only_database_must_exist() {
   let temp_dir = TempDir::new().unwrap();
   let path = temp_dir.path().join("missing.db");

   let result = SqliteDatabase::connect(&path, Some(SqliteDatabaseConfig::read_only())).await;

   assert!(matches!(result, Err(Error::Sqlx(_))));
   assert!(!path.exists(), "Read-only connect must not create the file");
}

#[tokio::test]
async fn test_read_only_database_rejects_writes() {
   let temp_dir = TempDir::new().unwrap();
   let primary = create_primary(&temp_dir, "replica.db").await;

   let mut conn = primary.acquire().await.unwrap();
   sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
      .execute(&mut *conn)
      .await
      .unwrap();
   drop(conn);

   let replica = SqliteDatabase::connect(
      temp_dir.path().join("replica.db"),
      Some(SqliteDatabaseConfig::read_only()),
   )
   .await
   .unwrap();
   assert!(replica.is_read_only());

   let write = sqlx::query("INSERT INTO users (name) VALUES ('Alice')")
      .execute(replica.pool().unwrap())
      .await;
   assert!(write.is_err(), "Writes through a read-only pool must fail");

   let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
      .fetch_one(replica.pool().unwrap())
      .await
      .unwrap();
   assert_eq!(count, 0);

   replica.close().await.unwrap();
   primary.close().await.unwrap();
}

#[tokio::test]
async fn test_wal_mode_initialized_on_first_acquire() {
   let temp_dir = TempDir::new().unwrap();
   let db = create_primary(&temp_dir, "wal.db").await;

   let mut conn = db.acquire().await.unwrap();
   let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
      .fetch_one(&mut *conn)
      .await
      .unwrap();

   assert_eq!(mode.to_lowercase(), "wal");
   drop(conn);

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_database_closed_error() {
   let temp_dir = TempDir::new().unwrap();
   let db = create_primary(&temp_dir, "closed.db").await;

   // Clone db so we can use it after close
   let db_ref = Arc::clone(&db);
   db.close().await.unwrap();

   assert!(matches!(db_ref.pool(), Err(Error::DatabaseClosed)));
   assert!(matches!(db_ref.acquire().await, Err(Error::DatabaseClosed)));
}

#[tokio::test]
async fn test_remove() {
   let temp_dir = TempDir::new().unwrap();
   let path = temp_dir.path().join("remove.db");
   let db = SqliteDatabase::connect(&path, None).await.unwrap();

   // Perform write to create WAL and SHM files
   let mut conn = db.acquire().await.unwrap();
   sqlx::query("CREATE TABLE test (id INTEGER)")
      .execute(&mut *conn)
      .await
      .unwrap();
   drop(conn);

   db.remove().await.unwrap();

   assert!(!path.exists(), "Database file should be removed");
   assert!(!path.with_extension("db-wal").exists(), "WAL file should be removed");
   assert!(!path.with_extension("db-shm").exists(), "SHM file should be removed");
}

#[tokio::test]
async fn test_custom_config() {
   let temp_dir = TempDir::new().unwrap();
   let custom_config = SqliteDatabaseConfig {
      max_connections: 2,
      idle_timeout_secs: 60,
      acquire_timeout_secs: 1,
      read_only: false,
   };

   let db = SqliteDatabase::connect(temp_dir.path().join("custom.db"), Some(custom_config))
      .await
      .unwrap();

   let (one,): (i64,) = sqlx::query_as("SELECT 1")
      .fetch_one(db.pool().unwrap())
      .await
      .unwrap();
   assert_eq!(one, 1);

   db.remove().await.unwrap();
}
