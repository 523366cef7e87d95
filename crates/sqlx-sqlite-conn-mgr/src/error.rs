//! Errors from opening and using primary and replica databases

use thiserror::Error;

/// Errors returned by [`SqliteDatabase`](crate::SqliteDatabase)
#[derive(Error, Debug)]
pub enum Error {
   /// Invalid path, or a database or sidecar file could not be removed
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Connecting or querying failed. Read-only pools report a missing file and
   /// any attempted write here.
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// The database was closed; its pool hands out no more connections
   #[error("Database has been closed")]
   DatabaseClosed,
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_messages() {
      assert_eq!(Error::DatabaseClosed.to_string(), "Database has been closed");

      let err = Error::from(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty path"));
      assert_eq!(err.to_string(), "IO error: empty path");
   }
}
