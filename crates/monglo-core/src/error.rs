//! Error types for collection administration

use monglo_db::DbError;
use thiserror::Error;

/// Administrative error type
///
/// Detection and resolution of relationships never produce errors: unresolved
/// guesses and missing targets degrade to "no relationship".
#[derive(Debug, Error)]
pub enum AdminError {
	/// Malformed document identifier
	#[error("Invalid document id: {0}")]
	InvalidId(String),

	/// No document matched the identifier
	#[error("Document '{id}' not found in collection '{collection}'")]
	NotFound { collection: String, id: String },

	/// Empty or malformed input payload, rejected before any write
	#[error("Validation error: {0}")]
	Validation(String),

	/// Collection registered twice
	#[error("Collection '{0}' is already registered")]
	AlreadyRegistered(String),

	/// Collection not present in the registry
	#[error("Collection '{0}' is not registered")]
	NotRegistered(String),

	/// Out-of-range configuration value
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	/// Export serialization failure
	#[error("Export error: {0}")]
	Export(String),

	/// Credentials rejected by an auth provider
	#[error("Authentication failed: {0}")]
	Authentication(String),

	/// Store failure
	#[error("Database error: {0}")]
	Database(#[from] DbError),
}

impl AdminError {
	/// Whether the error is a missing document
	pub fn is_not_found(&self) -> bool {
		matches!(self, AdminError::NotFound { .. })
	}

	/// Whether the underlying store failure is worth retrying
	pub fn is_transient(&self) -> bool {
		self.as_db_error().is_some_and(DbError::is_transient)
	}

	/// The underlying store error, if any
	pub fn as_db_error(&self) -> Option<&DbError> {
		match self {
			AdminError::Database(err) => Some(err),
			_ => None,
		}
	}
}

impl From<bson::error::Error> for AdminError {
	fn from(err: bson::error::Error) -> Self {
		AdminError::Database(DbError::from(err))
	}
}

/// Result type for administrative operations
pub type AdminResult<T> = Result<T, AdminError>;
