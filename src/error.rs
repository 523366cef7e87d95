use serde::{Serialize, Serializer};

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers that serialize errors.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the replica router.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from the routing core, including errors from statements it ran.
   #[error(transparent)]
   Replica(#[from] sqlx_sqlite_replica::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// Database configuration could not be parsed.
   #[error("invalid database configuration: {0}")]
   Json(#[from] serde_json::Error),

   /// I/O error when reading configuration files.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),

   /// No configuration exists for the requested environment.
   #[error("no database configuration for environment {0}")]
   EnvironmentNotConfigured(String),

   /// Attempted to use an environment that hasn't been installed.
   #[error("environment {0} not installed")]
   EnvironmentNotInstalled(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// Errors from the routing core keep their own codes.
   pub fn error_code(&self) -> String {
      match self {
         Error::Replica(e) => e.error_code(),
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Json(_) => "INVALID_CONFIGURATION".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::EnvironmentNotConfigured(_) => "ENVIRONMENT_NOT_CONFIGURED".to_string(),
         Error::EnvironmentNotInstalled(_) => "ENVIRONMENT_NOT_INSTALLED".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}
