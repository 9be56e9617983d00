//! Field-level validation of incoming document data
//!
//! Collections carry no schema, so validation is opt-in: a
//! [`DataValidator`] checks only the required fields, rules and unique
//! constraints it was built with.

use std::sync::{Arc, LazyLock};

use bson::{Bson, Document, doc, oid::ObjectId};
use indexmap::IndexMap;
use monglo_core::error::AdminResult;
use monglo_core::query_builder::ID_FIELD;
use monglo_db::DocumentBackend;
use monglo_db::value::{as_f64, get_path};
use regex::Regex;
use serde::Serialize;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
		.unwrap_or_else(|e| panic!("email pattern must compile: {e}"))
});

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^https?://[^\s/$.?#].[^\s]*$")
		.unwrap_or_else(|e| panic!("url pattern must compile: {e}"))
});

pub fn is_valid_email(value: &str) -> bool {
	EMAIL_PATTERN.is_match(value)
}

pub fn is_valid_url(value: &str) -> bool {
	URL_PATTERN.is_match(value)
}

/// 24 hexadecimal characters
pub fn is_valid_objectid(value: &str) -> bool {
	value.len() == 24 && ObjectId::parse_str(value).is_ok()
}

/// Constraint on one field's value
#[derive(Debug, Clone)]
pub enum FieldRule {
	Email,
	Url,
	/// Object id, native or as a hex string
	ObjectId,
	/// Minimum length of a string or array
	MinLength(usize),
	/// Maximum length of a string or array
	MaxLength(usize),
	Min(f64),
	Max(f64),
	/// String matching the pattern
	Pattern(Regex),
}

impl FieldRule {
	/// Compiles a pattern rule
	pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
		Ok(FieldRule::Pattern(Regex::new(pattern)?))
	}

	/// Failure message, or `None` when `value` satisfies the rule
	fn check(&self, value: &Bson) -> Option<String> {
		match self {
			FieldRule::Email => match value {
				Bson::String(text) if is_valid_email(text) => None,
				_ => Some("must be a valid email address".to_string()),
			},
			FieldRule::Url => match value {
				Bson::String(text) if is_valid_url(text) => None,
				_ => Some("must be a valid http(s) URL".to_string()),
			},
			FieldRule::ObjectId => match value {
				Bson::ObjectId(_) => None,
				Bson::String(text) if is_valid_objectid(text) => None,
				_ => Some("must be a valid object id".to_string()),
			},
			FieldRule::MinLength(min) => match length_of(value) {
				Some(len) if len < *min => Some(format!("must have at least {min} items or characters")),
				Some(_) => None,
				None => Some("must be a string or an array".to_string()),
			},
			FieldRule::MaxLength(max) => match length_of(value) {
				Some(len) if len > *max => Some(format!("must have at most {max} items or characters")),
				Some(_) => None,
				None => Some("must be a string or an array".to_string()),
			},
			FieldRule::Min(min) => match as_f64(value) {
				Some(n) if n < *min => Some(format!("must be at least {min}")),
				Some(_) => None,
				None => Some("must be a number".to_string()),
			},
			FieldRule::Max(max) => match as_f64(value) {
				Some(n) if n > *max => Some(format!("must be at most {max}")),
				Some(_) => None,
				None => Some("must be a number".to_string()),
			},
			FieldRule::Pattern(regex) => match value {
				Bson::String(text) if regex.is_match(text) => None,
				_ => Some(format!("must match pattern {}", regex.as_str())),
			},
		}
	}
}

fn length_of(value: &Bson) -> Option<usize> {
	match value {
		Bson::String(text) => Some(text.chars().count()),
		Bson::Array(items) => Some(items.len()),
		_ => None,
	}
}

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
	Required,
	InvalidValue,
	Duplicate,
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
	pub field: String,
	pub error: FieldErrorKind,
	pub message: String,
}

impl FieldError {
	fn new(field: &str, error: FieldErrorKind, message: impl Into<String>) -> Self {
		Self {
			field: field.to_string(),
			error,
			message: message.into(),
		}
	}
}

/// Validates document data against configured constraints
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use monglo_db::backends::MemoryBackend;
/// use monglo_ops::validation::{DataValidator, FieldErrorKind, FieldRule};
/// use bson::doc;
///
/// let validator = DataValidator::new(Arc::new(MemoryBackend::new()), "users")
///     .require("email")
///     .rule("email", FieldRule::Email)
///     .rule("age", FieldRule::Min(0.0));
///
/// let errors = validator.validate_sync(&doc! { "email": "nope", "age": -1 }, false);
/// assert_eq!(errors.len(), 2);
/// assert!(errors.iter().all(|e| e.error == FieldErrorKind::InvalidValue));
/// ```
#[derive(Clone)]
pub struct DataValidator {
	database: Arc<dyn DocumentBackend>,
	collection: String,
	required: Vec<String>,
	rules: IndexMap<String, Vec<FieldRule>>,
	unique: Vec<String>,
}

impl DataValidator {
	pub fn new(database: Arc<dyn DocumentBackend>, collection: impl Into<String>) -> Self {
		Self {
			database,
			collection: collection.into(),
			required: Vec::new(),
			rules: IndexMap::new(),
			unique: Vec::new(),
		}
	}

	/// Field that must be present and non-null on create
	pub fn require(mut self, field: impl Into<String>) -> Self {
		self.required.push(field.into());
		self
	}

	pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
		self.rules.entry(field.into()).or_default().push(rule);
		self
	}

	/// Field whose value no other document may share
	pub fn unique(mut self, field: impl Into<String>) -> Self {
		self.unique.push(field.into());
		self
	}

	/// Required-field and rule checks without store access.
	///
	/// Required fields are skipped for updates; rules only apply to fields
	/// present with a non-null value.
	pub fn validate_sync(&self, data: &Document, is_update: bool) -> Vec<FieldError> {
		let mut errors = Vec::new();
		if !is_update {
			for field in &self.required {
				if matches!(get_path(data, field), None | Some(Bson::Null)) {
					errors.push(FieldError::new(
						field,
						FieldErrorKind::Required,
						format!("{field} is required"),
					));
				}
			}
		}
		for (field, rules) in &self.rules {
			let Some(value) = get_path(data, field).filter(|v| !matches!(v, Bson::Null)) else {
				continue;
			};
			errors.extend(
				rules
					.iter()
					.filter_map(|rule| rule.check(value))
					.map(|message| FieldError::new(field, FieldErrorKind::InvalidValue, message)),
			);
		}
		errors
	}

	/// [`validate_sync`](Self::validate_sync) plus unique checks against
	/// the store.
	///
	/// When `data` carries an `_id`, that document is excluded from the
	/// uniqueness lookup so an update may keep its own value.
	pub async fn validate(&self, data: &Document, is_update: bool) -> AdminResult<Vec<FieldError>> {
		let mut errors = self.validate_sync(data, is_update);
		for field in &self.unique {
			let Some(value) = get_path(data, field).filter(|v| !matches!(v, Bson::Null)) else {
				continue;
			};
			let mut filter = Document::new();
			filter.insert(field.clone(), value.clone());
			if let Some(id) = data.get(ID_FIELD) {
				filter.insert(ID_FIELD, doc! { "$ne": id.clone() });
			}
			let clashes = self
				.database
				.count_documents(&self.collection, filter)
				.await?;
			if clashes > 0 {
				errors.push(FieldError::new(
					field,
					FieldErrorKind::Duplicate,
					format!("{field} must be unique"),
				));
			}
		}
		Ok(errors)
	}
}
