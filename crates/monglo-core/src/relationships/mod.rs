//! Cross-collection relationships
//!
//! A [`Relationship`] records that a field of one collection references the
//! identity field of another. Relationships are inferred by the
//! [`RelationshipDetector`] or supplied through collection configuration,
//! and the [`RelationshipResolver`] attaches the referenced documents.

mod detector;
mod naming;
mod resolver;

pub use detector::RelationshipDetector;
pub use naming::{guess_collection_from_field, pluralize};
pub use resolver::{RELATIONSHIPS_KEY, RelationshipResolver};

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::query_builder::ID_FIELD;

/// Shape of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
	/// The field holds one reference
	OneToOne,
	/// The field holds an array of references
	OneToMany,
	/// Declared only; never inferred
	ManyToMany,
	/// The related data is stored inline
	Embedded,
}

impl RelationshipType {
	pub fn as_str(self) -> &'static str {
		match self {
			RelationshipType::OneToOne => "one_to_one",
			RelationshipType::OneToMany => "one_to_many",
			RelationshipType::ManyToMany => "many_to_many",
			RelationshipType::Embedded => "embedded",
		}
	}
}

impl std::fmt::Display for RelationshipType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

fn default_target_field() -> String {
	ID_FIELD.to_string()
}

/// A reference from `source_collection.source_field` to
/// `target_collection.target_field`
///
/// Two relationships are equal when their four endpoint names match; the
/// type and reverse name do not take part in identity.
///
/// # Examples
///
/// ```rust
/// use monglo_core::relationships::{Relationship, RelationshipType};
///
/// let a = Relationship::new("orders", "user_id", "users", RelationshipType::OneToOne);
/// let b = Relationship::new("orders", "user_id", "users", RelationshipType::OneToMany)
///     .with_reverse_name("orders");
/// assert_eq!(a, b);
/// assert_eq!(a.target_field, "_id");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
	pub source_collection: String,
	pub source_field: String,
	pub target_collection: String,
	#[serde(default = "default_target_field")]
	pub target_field: String,
	#[serde(rename = "type")]
	pub relationship_type: RelationshipType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reverse_name: Option<String>,
}

impl Relationship {
	/// Creates a relationship targeting the identity field
	pub fn new(
		source_collection: impl Into<String>,
		source_field: impl Into<String>,
		target_collection: impl Into<String>,
		relationship_type: RelationshipType,
	) -> Self {
		Self {
			source_collection: source_collection.into(),
			source_field: source_field.into(),
			target_collection: target_collection.into(),
			target_field: default_target_field(),
			relationship_type,
			reverse_name: None,
		}
	}

	pub fn with_target_field(mut self, target_field: impl Into<String>) -> Self {
		self.target_field = target_field.into();
		self
	}

	pub fn with_reverse_name(mut self, reverse_name: impl Into<String>) -> Self {
		self.reverse_name = Some(reverse_name.into());
		self
	}

	fn identity(&self) -> (&str, &str, &str, &str) {
		(
			&self.source_collection,
			&self.source_field,
			&self.target_collection,
			&self.target_field,
		)
	}
}

impl PartialEq for Relationship {
	fn eq(&self, other: &Self) -> bool {
		self.identity() == other.identity()
	}
}

impl Eq for Relationship {}

impl Hash for Relationship {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.identity().hash(state);
	}
}
