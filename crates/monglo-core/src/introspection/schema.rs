//! Inferred schema types

use bson::{Bson, Document};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use monglo_db::value::is_dbref;

/// Closed set of value type tags observed during introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
	Null,
	Boolean,
	Integer,
	/// Floating point or decimal
	Number,
	String,
	DateTime,
	/// Calendar date without time; BSON has no such type, so it only comes
	/// from user configuration
	Date,
	ObjectId,
	/// Self-describing cross-collection reference (`{$ref, $id}`)
	DbRef,
	Embedded,
	Array,
	Binary,
	Unknown,
}

impl FieldType {
	/// Classifies a value.
	///
	/// Checks run in a fixed order: null, boolean, integer, float, string,
	/// then temporal, identifier and structured types.
	///
	/// ```rust
	/// use monglo_core::introspection::FieldType;
	/// use bson::{Bson, doc};
	///
	/// assert_eq!(FieldType::detect(&Bson::Int64(3)), FieldType::Integer);
	/// assert_eq!(FieldType::detect(&Bson::Document(doc! { "$ref": "users", "$id": 1 })), FieldType::DbRef);
	/// ```
	pub fn detect(value: &Bson) -> FieldType {
		match value {
			Bson::Null | Bson::Undefined => FieldType::Null,
			Bson::Boolean(_) => FieldType::Boolean,
			Bson::Int32(_) | Bson::Int64(_) => FieldType::Integer,
			Bson::Double(_) | Bson::Decimal128(_) => FieldType::Number,
			Bson::String(_) | Bson::Symbol(_) => FieldType::String,
			Bson::DateTime(_) | Bson::Timestamp(_) => FieldType::DateTime,
			Bson::ObjectId(_) => FieldType::ObjectId,
			Bson::Document(inner) if is_dbref(inner) => FieldType::DbRef,
			Bson::DbPointer(_) => FieldType::DbRef,
			Bson::Document(_) => FieldType::Embedded,
			Bson::Array(_) => FieldType::Array,
			Bson::Binary(_) => FieldType::Binary,
			_ => FieldType::Unknown,
		}
	}

	/// Lowercase tag name (`"objectid"`, `"embedded"`, ...)
	pub fn as_str(self) -> &'static str {
		match self {
			FieldType::Null => "null",
			FieldType::Boolean => "boolean",
			FieldType::Integer => "integer",
			FieldType::Number => "number",
			FieldType::String => "string",
			FieldType::DateTime => "datetime",
			FieldType::Date => "date",
			FieldType::ObjectId => "objectid",
			FieldType::DbRef => "dbref",
			FieldType::Embedded => "embedded",
			FieldType::Array => "array",
			FieldType::Binary => "binary",
			FieldType::Unknown => "unknown",
		}
	}

	/// Whether values of this type have a natural ordering worth sorting on
	pub fn is_sortable(self) -> bool {
		matches!(
			self,
			FieldType::String
				| FieldType::Integer
				| FieldType::Number
				| FieldType::DateTime
				| FieldType::Date
		)
	}
}

impl std::fmt::Display for FieldType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Statistics inferred for one field path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
	/// Most frequent type; ties go to the type observed first
	#[serde(rename = "type")]
	pub primary_type: FieldType,
	/// Fraction of sampled documents containing the field, in `[0, 1]`
	pub frequency: f64,
	/// Whether at least one sampled document held an explicit null
	pub nullable: bool,
	/// Up to five observed values
	pub sample_values: Vec<Bson>,
	/// Every observed type, when more than one was seen
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alternative_types: Option<Vec<FieldType>>,
	/// Type of the first element of non-empty arrays
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub array_item_type: Option<FieldType>,
}

/// Field path → statistics, in order of first observation
///
/// Nested paths use dot notation (`address.city`); fields inside array
/// elements use the `[]` marker (`items.[].sku`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
	fields: IndexMap<String, FieldSchema>,
}

impl Schema {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, path: impl Into<String>, field: FieldSchema) {
		self.fields.insert(path.into(), field);
	}

	pub fn get(&self, path: &str) -> Option<&FieldSchema> {
		self.fields.get(path)
	}

	pub fn contains(&self, path: &str) -> bool {
		self.fields.contains_key(path)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSchema)> {
		self.fields.iter()
	}

	/// Field paths in observation order
	pub fn paths(&self) -> impl Iterator<Item = &str> {
		self.fields.keys().map(String::as_str)
	}

	/// Primary type of a path, `None` when never observed
	pub fn type_of(&self, path: &str) -> Option<FieldType> {
		self.fields.get(path).map(|f| f.primary_type)
	}
}

/// Result of [`SchemaIntrospector::analyze_field_cardinality`](super::SchemaIntrospector::analyze_field_cardinality)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardinalityReport {
	pub field: String,
	pub total_documents: u64,
	pub distinct_count: u64,
	/// `distinct / total`, `0` for an empty collection
	pub cardinality_ratio: f64,
	pub is_unique: bool,
	/// Fewer than 50 distinct values
	pub is_low_cardinality: bool,
	/// Up to ten distinct values, empty when there are more than 100
	pub sample_values: Vec<Bson>,
}

#[derive(Debug, Default)]
struct FieldStats {
	count: usize,
	types: IndexMap<FieldType, usize>,
	null_count: usize,
	samples: Vec<Bson>,
	array_item_type: Option<FieldType>,
}

impl FieldStats {
	fn bump(&mut self, field_type: FieldType) {
		*self.types.entry(field_type).or_insert(0) += 1;
	}
}

/// Infers a schema from already-fetched documents.
///
/// Embedded documents count once for their own type and once more as
/// structure before recursing; non-empty arrays likewise. Only the first
/// element of an array is inspected.
pub fn infer_schema(documents: &[Document]) -> Schema {
	if documents.is_empty() {
		return Schema::new();
	}

	let mut stats: IndexMap<String, FieldStats> = IndexMap::new();
	for document in documents {
		analyze_document(document, &mut stats, "");
	}

	let total = documents.len() as f64;
	let mut schema = Schema::new();
	for (path, info) in stats {
		let mut primary = FieldType::Unknown;
		let mut best = 0;
		for (field_type, count) in &info.types {
			if *count > best {
				primary = *field_type;
				best = *count;
			}
		}
		let alternative_types =
			(info.types.len() > 1).then(|| info.types.keys().copied().collect());
		schema.insert(
			path,
			FieldSchema {
				primary_type: primary,
				frequency: (info.count as f64 / total).min(1.0),
				nullable: info.null_count > 0,
				sample_values: info.samples,
				alternative_types,
				array_item_type: info.array_item_type,
			},
		);
	}
	schema
}

fn analyze_document(document: &Document, stats: &mut IndexMap<String, FieldStats>, prefix: &str) {
	for (key, value) in document {
		let path = format!("{prefix}{key}");
		let entry = stats.entry(path.clone()).or_default();
		entry.count += 1;
		entry.bump(FieldType::detect(value));
		if matches!(value, Bson::Null) {
			entry.null_count += 1;
		}
		if entry.samples.len() < 5 {
			entry.samples.push(value.clone());
		}

		match value {
			Bson::Document(inner) if !is_dbref(inner) => {
				entry.bump(FieldType::Embedded);
				analyze_document(inner, stats, &format!("{path}."));
			}
			Bson::Array(items) if !items.is_empty() => {
				entry.bump(FieldType::Array);
				match &items[0] {
					Bson::Document(first) => {
						entry.array_item_type = Some(FieldType::Embedded);
						analyze_document(first, stats, &format!("{path}.[]."));
					}
					first => entry.array_item_type = Some(FieldType::detect(first)),
				}
			}
			_ => {}
		}
	}
}
