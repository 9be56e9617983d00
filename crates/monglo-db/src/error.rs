//! Document store error types
//!
//! This module provides a unified error type for every store round-trip,
//! regardless of which backend served it.

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Unified error type for document store operations
#[derive(Debug, Error)]
pub enum DbError {
	/// Connection error
	#[error("Connection error: {0}")]
	Connection(String),

	/// Query/operation execution error
	#[error("Execution error: {0}")]
	Execution(String),

	/// Server-side command failure carrying the server error code
	#[error("Command error {code}: {message}")]
	Command { code: i32, message: String },

	/// Failure the server labelled as safe to retry
	#[error("Transient error: {0}")]
	Transient(String),

	/// Unique index violation (including a duplicate `_id`)
	#[error("Duplicate key: {0}")]
	DuplicateKey(String),

	/// Serialization/deserialization error
	#[error("Serialization error: {0}")]
	Serialization(String),

	/// Malformed filter, update or pipeline document
	#[error("Invalid operation: {0}")]
	InvalidOperation(String),

	/// Feature not supported by this backend
	#[error("Unsupported feature: {0}")]
	Unsupported(String),
}

impl DbError {
	/// Server error code, when the failure came from a server command.
	pub fn code(&self) -> Option<i32> {
		match self {
			DbError::Command { code, .. } => Some(*code),
			DbError::DuplicateKey(_) => Some(11000),
			_ => None,
		}
	}

	/// Whether retrying the operation may succeed.
	///
	/// Matches the transient label, a small allowlist of server codes
	/// (interrupts, write conflicts, stepdowns) and, as a fallback, common
	/// wording in the message.
	pub fn is_transient(&self) -> bool {
		if matches!(self, DbError::Transient(_)) {
			return true;
		}
		if let Some(code) = self.code()
			&& TRANSIENT_CODES.contains(&code)
		{
			return true;
		}
		let message = self.to_string().to_lowercase();
		TRANSIENT_KEYWORDS
			.iter()
			.any(|keyword| message.contains(keyword))
	}
}

/// Server codes worth retrying
pub const TRANSIENT_CODES: [i32; 5] = [112, 117, 262, 11600, 11602];

const TRANSIENT_KEYWORDS: [&str; 4] = ["transient", "temporary", "timeout", "interrupted"];

impl From<serde_json::Error> for DbError {
	fn from(err: serde_json::Error) -> Self {
		DbError::Serialization(err.to_string())
	}
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for DbError {
	fn from(err: mongodb::error::Error) -> Self {
		use mongodb::error::{ErrorKind, TRANSIENT_TRANSACTION_ERROR, WriteFailure};

		if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
			return DbError::Transient(err.to_string());
		}

		match *err.kind {
			ErrorKind::Authentication { .. } => DbError::Connection(err.to_string()),
			ErrorKind::InvalidArgument { .. } => DbError::InvalidOperation(err.to_string()),
			ErrorKind::Io(_) => DbError::Connection(err.to_string()),
			ErrorKind::Command(ref command) => DbError::Command {
				code: command.code,
				message: command.message.clone(),
			},
			ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11000 => {
				DbError::DuplicateKey(write.message.clone())
			}
			ErrorKind::Write(WriteFailure::WriteError(ref write)) => DbError::Command {
				code: write.code,
				message: write.message.clone(),
			},
			_ => DbError::Execution(err.to_string()),
		}
	}
}

// In bson v3.x, both ser::Error and de::Error are type aliases for bson::error::Error
impl From<bson::error::Error> for DbError {
	fn from(err: bson::error::Error) -> Self {
		DbError::Serialization(err.to_string())
	}
}
