use crate::connection::{BoundaryOperation, ReadEntryPoint};

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for replica routing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations, passed through from whichever connection ran the statement.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// A transaction boundary was attempted while transactions are blocked.
   #[error("Attempting to {operation} during a read-only database connection.")]
   TransactionAttempted { operation: BoundaryOperation },

   /// A replica connection could not be obtained.
   ///
   /// Providers return this; the router turns it into a primary read and never
   /// hands it to the caller of a read.
   #[error("replica unavailable: {0}")]
   ReplicaUnavailable(String),

   /// A savepoint operation needed a default savepoint name but no transaction is open.
   #[error("cannot {0}: no open transaction")]
   NoOpenTransaction(BoundaryOperation),

   /// A connection answered a read with a result of the wrong shape.
   #[error("{} returned a result of the wrong shape", .0.name())]
   MismatchedResult(ReadEntryPoint),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Generic error for operations that don't fit other categories.
   #[error("{0}")]
   Other(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::TransactionAttempted { .. } => "TRANSACTION_ATTEMPTED".to_string(),
         Error::ReplicaUnavailable(_) => "REPLICA_UNAVAILABLE".to_string(),
         Error::NoOpenTransaction(_) => "NO_OPEN_TRANSACTION".to_string(),
         Error::MismatchedResult(_) => "MISMATCHED_RESULT".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Other(_) => "ERROR".to_string(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_transaction_attempted_messages() {
      let expected = [
         (
            BoundaryOperation::BeginTransaction,
            "Attempting to begin a transaction during a read-only database connection.",
         ),
         (
            BoundaryOperation::CommitTransaction,
            "Attempting to commit a transaction during a read-only database connection.",
         ),
         (
            BoundaryOperation::CreateSavepoint,
            "Attempting to create a savepoint during a read-only database connection.",
         ),
         (
            BoundaryOperation::RollbackToSavepoint,
            "Attempting to rollback a savepoint during a read-only database connection.",
         ),
         (
            BoundaryOperation::ReleaseSavepoint,
            "Attempting to release a savepoint during a read-only database connection.",
         ),
      ];

      for (operation, message) in expected {
         let err = Error::TransactionAttempted { operation };
         assert_eq!(err.to_string(), message);
         assert_eq!(err.error_code(), "TRANSACTION_ATTEMPTED");
      }
   }

   #[test]
   fn test_error_code_replica_unavailable() {
      let err = Error::ReplicaUnavailable("no replica configured".into());
      assert_eq!(err.error_code(), "REPLICA_UNAVAILABLE");
      assert!(err.to_string().contains("no replica configured"));
   }

   #[test]
   fn test_error_code_no_open_transaction() {
      let err = Error::NoOpenTransaction(BoundaryOperation::ReleaseSavepoint);
      assert_eq!(err.error_code(), "NO_OPEN_TRANSACTION");
      assert_eq!(err.to_string(), "cannot release a savepoint: no open transaction");
   }

   #[test]
   fn test_error_code_mismatched_result() {
      let err = Error::MismatchedResult(ReadEntryPoint::SelectValue);
      assert_eq!(err.error_code(), "MISMATCHED_RESULT");
      assert!(err.to_string().starts_with("select_value"));
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }

   #[test]
   fn test_error_code_other() {
      let err = Error::Other("something went wrong".into());
      assert_eq!(err.error_code(), "ERROR");
      assert_eq!(err.to_string(), "something went wrong");
   }
}
