//! A pooled SQLite connection exposing the [`DatabaseConnection`] entry points.

use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx_sqlite_conn_mgr::SqliteDatabase;
use tracing::{debug, trace, warn};

use crate::connection::{
   BoundaryOperation, DatabaseConnection, ReadEntryPoint, Selected, Statement, WriteQueryResult,
};
use crate::decode::decode_row;
use crate::{Error, Result};

/// A pooled connection that tracks its own transaction nesting.
///
/// `BEGIN` opens one level and each savepoint adds one more. Releasing or
/// rolling back to a savepoint also closes every savepoint nested inside it,
/// as SQLite does. Commit and rollback close everything. A session dropped with
/// a transaction still open is closed instead of being returned to the pool,
/// which makes SQLite roll it back.
#[derive(Debug)]
pub struct SqliteSession {
   conn: PoolConnection<Sqlite>,
   in_transaction: bool,
   /// Open savepoint names, innermost last
   savepoints: Vec<String>,
}

impl SqliteSession {
   pub fn new(conn: PoolConnection<Sqlite>) -> Self {
      Self {
         conn,
         in_transaction: false,
         savepoints: Vec::new(),
      }
   }

   /// Acquire a session from `db`'s pool.
   pub async fn acquire(db: &SqliteDatabase) -> Result<Self> {
      Ok(Self::new(db.acquire().await?))
   }

   /// Default savepoint name for a nesting level.
   pub fn savepoint_name(level: u32) -> String {
      format!("active_record_{}", level)
   }

   async fn fetch_rows(&mut self, statement: &Statement) -> Result<Vec<crate::Row>> {
      let mut query = sqlx::query(&statement.query);
      for value in &statement.values {
         query = bind_value(query, value.clone());
      }

      let rows = query.fetch_all(&mut *self.conn).await?;
      rows.iter().map(decode_row).collect()
   }

   async fn run(&mut self, sql: &str) -> Result<()> {
      trace!(sql, "transaction boundary");
      sqlx::query(sql).execute(&mut *self.conn).await?;
      Ok(())
   }

   /// Name of the innermost savepoint when the caller didn't give one.
   fn innermost_savepoint(&self, operation: BoundaryOperation, name: Option<&str>) -> Result<String> {
      if let Some(name) = name {
         return Ok(name.to_string());
      }
      match self.savepoints.last() {
         Some(innermost) => Ok(innermost.clone()),
         None if self.in_transaction => Ok(Self::savepoint_name(0)),
         None => Err(Error::NoOpenTransaction(operation)),
      }
   }

   /// Drop `name` and everything nested inside it from the savepoint stack.
   fn close_savepoint(&mut self, name: &str) {
      match self.savepoints.iter().rposition(|open| open == name) {
         Some(position) => self.savepoints.truncate(position),
         // Created outside this session; SQLite accepted it, so one level closed
         None => {
            self.savepoints.pop();
         }
      }
   }
}

impl DatabaseConnection for SqliteSession {
   async fn select(
      &mut self,
      entry_point: ReadEntryPoint,
      statement: &Statement,
      name: Option<&str>,
   ) -> Result<Selected> {
      trace!(
         name = name.unwrap_or("SQL"),
         entry_point = entry_point.name(),
         sql = %statement.query,
         "select"
      );
      let rows = self.fetch_rows(statement).await?;
      Ok(Selected::project(entry_point, rows))
   }

   async fn execute(&mut self, statement: &Statement, name: Option<&str>) -> Result<WriteQueryResult> {
      trace!(name = name.unwrap_or("SQL"), sql = %statement.query, "execute");

      let mut query = sqlx::query(&statement.query);
      for value in &statement.values {
         query = bind_value(query, value.clone());
      }

      let result = query.execute(&mut *self.conn).await?;
      Ok(WriteQueryResult {
         rows_affected: result.rows_affected(),
         last_insert_id: result.last_insert_rowid(),
      })
   }

   async fn transaction_boundary(
      &mut self,
      operation: BoundaryOperation,
      savepoint: Option<&str>,
   ) -> Result<()> {
      match operation {
         BoundaryOperation::BeginTransaction => {
            self.run("BEGIN").await?;
            self.in_transaction = true;
         }
         BoundaryOperation::CommitTransaction => {
            self.run("COMMIT").await?;
            self.in_transaction = false;
            self.savepoints.clear();
         }
         BoundaryOperation::CreateSavepoint => {
            let name = match savepoint {
               Some(name) => name.to_string(),
               None => Self::savepoint_name(self.open_transactions()),
            };
            self
               .run(&format!("SAVEPOINT {}", quote_identifier(&name)))
               .await?;
            self.savepoints.push(name);
         }
         BoundaryOperation::RollbackToSavepoint => {
            let name = self.innermost_savepoint(operation, savepoint)?;
            let quoted = quote_identifier(&name);
            // ROLLBACK TO keeps the savepoint open; release it so the level is gone
            self.run(&format!("ROLLBACK TO SAVEPOINT {}", quoted)).await?;
            self.run(&format!("RELEASE SAVEPOINT {}", quoted)).await?;
            self.close_savepoint(&name);
         }
         BoundaryOperation::ReleaseSavepoint => {
            let name = self.innermost_savepoint(operation, savepoint)?;
            self
               .run(&format!("RELEASE SAVEPOINT {}", quote_identifier(&name)))
               .await?;
            self.close_savepoint(&name);
         }
      }

      debug!(
         operation = operation.name(),
         open_transactions = self.open_transactions(),
         "transaction boundary executed"
      );
      Ok(())
   }

   async fn rollback_db_transaction(&mut self) -> Result<()> {
      self.run("ROLLBACK").await?;
      self.in_transaction = false;
      self.savepoints.clear();
      Ok(())
   }

   fn open_transactions(&self) -> u32 {
      u32::from(self.in_transaction) + self.savepoints.len() as u32
   }
}

impl Drop for SqliteSession {
   fn drop(&mut self) {
      let open_transactions = self.open_transactions();
      if open_transactions > 0 {
         warn!(
            open_transactions,
            "session dropped with an open transaction; closing connection"
         );
         self.conn.close_on_drop();
      }
   }
}

fn quote_identifier(name: &str) -> String {
   format!("\"{}\"", name.replace('"', "\"\""))
}

/// Bind a JSON value to a SQLx query.
///
/// Integers bind as `i64` when they fit, other numbers as `f64`, booleans as
/// integers, and arrays/objects as JSON text.
pub fn bind_value<'a>(
   query: sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>>,
   value: JsonValue,
) -> sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(number) => {
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Too large for i64 (SQLite's INTEGER); f64 loses precision
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}
