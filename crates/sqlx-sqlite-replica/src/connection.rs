//! The connection surface the router intercepts.
//!
//! Reads and transaction boundaries are explicit enumerations
//! ([`ReadEntryPoint`], [`BoundaryOperation`]) so every supported entry point is
//! dispatched through the same two routing decisions.

use std::fmt;
use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// A decoded row: column name to JSON value, in column order.
pub type Row = IndexMap<String, JsonValue>;

/// SQL text with positional bind values.
///
/// Statements are passed unchanged to whichever connection executes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
   pub query: String,
   #[serde(default)]
   pub values: Vec<JsonValue>,
}

impl Statement {
   pub fn new(query: impl Into<String>) -> Self {
      Self {
         query: query.into(),
         values: Vec::new(),
      }
   }

   /// Append a positional bind value.
   pub fn bind(mut self, value: impl Into<JsonValue>) -> Self {
      self.values.push(value.into());
      self
   }
}

impl From<&str> for Statement {
   fn from(query: &str) -> Self {
      Self::new(query)
   }
}

impl From<String> for Statement {
   fn from(query: String) -> Self {
      Self::new(query)
   }
}

impl From<(&str, Vec<JsonValue>)> for Statement {
   fn from((query, values): (&str, Vec<JsonValue>)) -> Self {
      Self {
         query: query.to_string(),
         values,
      }
   }
}

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT operations on tables with a ROWID.
   pub last_insert_id: i64,
}

/// Read-only query entry points that may be served by a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadEntryPoint {
   Select,
   SelectAll,
   SelectOne,
   SelectValue,
   SelectValues,
   SelectRows,
}

impl ReadEntryPoint {
   pub const ALL: [ReadEntryPoint; 6] = [
      ReadEntryPoint::Select,
      ReadEntryPoint::SelectAll,
      ReadEntryPoint::SelectOne,
      ReadEntryPoint::SelectValue,
      ReadEntryPoint::SelectValues,
      ReadEntryPoint::SelectRows,
   ];

   pub fn name(&self) -> &'static str {
      match self {
         ReadEntryPoint::Select => "select",
         ReadEntryPoint::SelectAll => "select_all",
         ReadEntryPoint::SelectOne => "select_one",
         ReadEntryPoint::SelectValue => "select_value",
         ReadEntryPoint::SelectValues => "select_values",
         ReadEntryPoint::SelectRows => "select_rows",
      }
   }
}

/// Result of a read, shaped by its [`ReadEntryPoint`].
#[derive(Debug, Clone, PartialEq)]
pub enum Selected {
   /// `select` / `select_all`
   Rows(Vec<Row>),
   /// `select_one`
   Row(Option<Row>),
   /// `select_value`
   Value(Option<JsonValue>),
   /// `select_values`
   Values(Vec<JsonValue>),
   /// `select_rows`
   Tuples(Vec<Vec<JsonValue>>),
}

impl Selected {
   /// Shape fully decoded rows for `entry_point`.
   pub fn project(entry_point: ReadEntryPoint, rows: Vec<Row>) -> Self {
      match entry_point {
         ReadEntryPoint::Select | ReadEntryPoint::SelectAll => Selected::Rows(rows),
         ReadEntryPoint::SelectOne => Selected::Row(rows.into_iter().next()),
         ReadEntryPoint::SelectValue => Selected::Value(
            rows
               .into_iter()
               .next()
               .and_then(|row| row.into_values().next()),
         ),
         ReadEntryPoint::SelectValues => Selected::Values(
            rows
               .into_iter()
               .filter_map(|row| row.into_values().next())
               .collect(),
         ),
         ReadEntryPoint::SelectRows => Selected::Tuples(
            rows
               .into_iter()
               .map(|row| row.into_values().collect())
               .collect(),
         ),
      }
   }
}

/// Operations that open, close, or nest a transaction.
///
/// These never reach a replica and are gated by the routing flags on the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryOperation {
   BeginTransaction,
   CommitTransaction,
   CreateSavepoint,
   RollbackToSavepoint,
   ReleaseSavepoint,
}

impl BoundaryOperation {
   pub const ALL: [BoundaryOperation; 5] = [
      BoundaryOperation::BeginTransaction,
      BoundaryOperation::CommitTransaction,
      BoundaryOperation::CreateSavepoint,
      BoundaryOperation::RollbackToSavepoint,
      BoundaryOperation::ReleaseSavepoint,
   ];

   /// Entry point name.
   pub fn name(&self) -> &'static str {
      match self {
         BoundaryOperation::BeginTransaction => "begin_db_transaction",
         BoundaryOperation::CommitTransaction => "commit_db_transaction",
         BoundaryOperation::CreateSavepoint => "create_savepoint",
         BoundaryOperation::RollbackToSavepoint => "rollback_to_savepoint",
         BoundaryOperation::ReleaseSavepoint => "release_savepoint",
      }
   }

   /// Human-readable description used in error messages.
   pub fn description(&self) -> &'static str {
      match self {
         BoundaryOperation::BeginTransaction => "begin a transaction",
         BoundaryOperation::CommitTransaction => "commit a transaction",
         BoundaryOperation::CreateSavepoint => "create a savepoint",
         BoundaryOperation::RollbackToSavepoint => "rollback a savepoint",
         BoundaryOperation::ReleaseSavepoint => "release a savepoint",
      }
   }

   pub fn is_savepoint(&self) -> bool {
      matches!(
         self,
         BoundaryOperation::CreateSavepoint
            | BoundaryOperation::RollbackToSavepoint
            | BoundaryOperation::ReleaseSavepoint
      )
   }
}

impl fmt::Display for BoundaryOperation {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.description())
   }
}

/// A database connection's native entry points.
///
/// Implemented by [`SqliteSession`](crate::SqliteSession) for real connections and
/// by [`RoutedConnection`](crate::RoutedConnection), which wraps a primary and
/// decides per call where the work goes.
///
/// `name` is an optional diagnostic label; it never affects what runs.
pub trait DatabaseConnection: Send {
   /// Run a read through one of the read entry points.
   fn select(
      &mut self,
      entry_point: ReadEntryPoint,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Selected>> + Send;

   /// Run a write statement.
   fn execute(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<WriteQueryResult>> + Send;

   /// Run a transaction boundary. `savepoint` is ignored by the two
   /// transaction operations.
   fn transaction_boundary(
      &mut self,
      operation: BoundaryOperation,
      savepoint: Option<&str>,
   ) -> impl Future<Output = Result<()>> + Send;

   /// Roll back the whole transaction.
   fn rollback_db_transaction(&mut self) -> impl Future<Output = Result<()>> + Send;

   /// Number of currently nested open transactions (transaction plus savepoints).
   fn open_transactions(&self) -> u32;
}

/// Typed helpers over [`DatabaseConnection`], one per entry point.
pub trait DatabaseConnectionExt: DatabaseConnection {
   fn select_all(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Vec<Row>>> + Send {
      async move {
         match self
            .select(ReadEntryPoint::SelectAll, statement, name)
            .await?
         {
            Selected::Rows(rows) => Ok(rows),
            _ => Err(Error::MismatchedResult(ReadEntryPoint::SelectAll)),
         }
      }
   }

   fn select_one(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Option<Row>>> + Send {
      async move {
         match self
            .select(ReadEntryPoint::SelectOne, statement, name)
            .await?
         {
            Selected::Row(row) => Ok(row),
            _ => Err(Error::MismatchedResult(ReadEntryPoint::SelectOne)),
         }
      }
   }

   fn select_value(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Option<JsonValue>>> + Send {
      async move {
         match self
            .select(ReadEntryPoint::SelectValue, statement, name)
            .await?
         {
            Selected::Value(value) => Ok(value),
            _ => Err(Error::MismatchedResult(ReadEntryPoint::SelectValue)),
         }
      }
   }

   fn select_values(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Vec<JsonValue>>> + Send {
      async move {
         match self
            .select(ReadEntryPoint::SelectValues, statement, name)
            .await?
         {
            Selected::Values(values) => Ok(values),
            _ => Err(Error::MismatchedResult(ReadEntryPoint::SelectValues)),
         }
      }
   }

   fn select_rows(
      &mut self,
      statement: &Statement,
      name: Option<&str>,
   ) -> impl Future<Output = Result<Vec<Vec<JsonValue>>>> + Send {
      async move {
         match self
            .select(ReadEntryPoint::SelectRows, statement, name)
            .await?
         {
            Selected::Tuples(rows) => Ok(rows),
            _ => Err(Error::MismatchedResult(ReadEntryPoint::SelectRows)),
         }
      }
   }

   fn begin_db_transaction(&mut self) -> impl Future<Output = Result<()>> + Send {
      self.transaction_boundary(BoundaryOperation::BeginTransaction, None)
   }

   fn commit_db_transaction(&mut self) -> impl Future<Output = Result<()>> + Send {
      self.transaction_boundary(BoundaryOperation::CommitTransaction, None)
   }

   /// `None` uses the connection's default name for the next savepoint.
   fn create_savepoint(&mut self, name: Option<&str>) -> impl Future<Output = Result<()>> + Send {
      self.transaction_boundary(BoundaryOperation::CreateSavepoint, name)
   }

   /// `None` uses the connection's default name for the innermost savepoint.
   fn rollback_to_savepoint(
      &mut self,
      name: Option<&str>,
   ) -> impl Future<Output = Result<()>> + Send {
      self.transaction_boundary(BoundaryOperation::RollbackToSavepoint, name)
   }

   /// `None` uses the connection's default name for the innermost savepoint.
   fn release_savepoint(&mut self, name: Option<&str>) -> impl Future<Output = Result<()>> + Send {
      self.transaction_boundary(BoundaryOperation::ReleaseSavepoint, name)
   }
}

impl<T: DatabaseConnection> DatabaseConnectionExt for T {}
