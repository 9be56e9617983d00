//! Document serializers for display and editing
//!
//! - [`JsonSerializer`]: plain JSON, ids and dates as strings
//! - [`DocumentSerializer`]: extended JSON that survives a round trip,
//!   optionally annotated with inferred types
//! - [`TableSerializer`]: one display string per table column

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document, oid::ObjectId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use monglo_core::error::{AdminError, AdminResult};
use monglo_core::introspection::{FieldType, Schema};
use monglo_core::query_builder::ID_FIELD;
use monglo_db::value::get_path;
use monglo_ops::export::{export_document, export_value, format_datetime};
use serde_json::{Map, Value, json};

const OID_KEY: &str = "$oid";
const DATE_KEY: &str = "$date";
const BINARY_KEY: &str = "$binary";

/// Plain JSON rendering, identical to the JSON export format
pub struct JsonSerializer;

impl JsonSerializer {
	pub fn serialize(doc: &Document) -> Value {
		export_document(doc)
	}

	pub fn serialize_many(docs: &[Document]) -> Vec<Value> {
		docs.iter().map(export_document).collect()
	}
}

/// Extended JSON for the document editor.
///
/// Object ids, datetimes and binary data are wrapped in single-key objects
/// (`{"$oid": hex}`, `{"$date": rfc3339}`, `{"$binary": hex}`) so that
/// [`DocumentSerializer::deserialize`] restores their native types.
///
/// # Examples
///
/// ```
/// use monglo_views::serializers::DocumentSerializer;
/// use bson::{doc, oid::ObjectId};
///
/// let original = doc! { "_id": ObjectId::new(), "title": "Draft" };
/// let json = DocumentSerializer::serialize(&original, None, false);
///
/// assert!(json["_id"]["$oid"].is_string());
/// assert_eq!(DocumentSerializer::deserialize(&json).unwrap(), original);
/// ```
pub struct DocumentSerializer;

impl DocumentSerializer {
	/// Serializes `doc`.
	///
	/// With `include_types` and a schema, every top-level field becomes
	/// `{value, type, metadata: {nullable, frequency}}`. A field the schema
	/// has never seen gets its type from the value and `null` metadata.
	pub fn serialize(doc: &Document, schema: Option<&Schema>, include_types: bool) -> Value {
		let Some(schema) = schema.filter(|_| include_types) else {
			return extended_document(doc);
		};
		let fields = doc
			.iter()
			.map(|(key, value)| {
				let (field_type, metadata) = match schema.get(key) {
					Some(field) => (
						field.primary_type,
						json!({ "nullable": field.nullable, "frequency": field.frequency }),
					),
					None => (FieldType::detect(value), Value::Null),
				};
				let annotated = json!({
					"value": extended_value(value),
					"type": field_type.as_str(),
					"metadata": metadata,
				});
				(key.clone(), annotated)
			})
			.collect();
		Value::Object(fields)
	}

	/// Converts extended JSON back into a document.
	///
	/// Fails with `Validation` when `value` is not an object or a wrapped
	/// date is malformed, and with `InvalidId` for a malformed `$oid`.
	pub fn deserialize(value: &Value) -> AdminResult<Document> {
		match value {
			Value::Object(map) => map
				.iter()
				.map(|(key, value)| Ok((key.clone(), from_extended(value)?)))
				.collect(),
			other => Err(AdminError::Validation(format!(
				"expected a JSON object, found {other}"
			))),
		}
	}
}

fn extended_document(doc: &Document) -> Value {
	Value::Object(
		doc.iter()
			.map(|(key, value)| (key.clone(), extended_value(value)))
			.collect(),
	)
}

fn extended_value(value: &Bson) -> Value {
	match value {
		Bson::ObjectId(oid) => json!({ OID_KEY: oid.to_hex() }),
		Bson::DateTime(dt) => json!({ DATE_KEY: format_datetime(dt) }),
		Bson::Binary(binary) => json!({ BINARY_KEY: hex::encode(&binary.bytes) }),
		Bson::Document(doc) => extended_document(doc),
		Bson::Array(items) => Value::Array(items.iter().map(extended_value).collect()),
		other => export_value(other),
	}
}

/// The single string of a one-key wrapper object
fn wrapped<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
	if map.len() != 1 {
		return None;
	}
	map.get(key).and_then(Value::as_str)
}

fn from_extended(value: &Value) -> AdminResult<Bson> {
	Ok(match value {
		Value::Null => Bson::Null,
		Value::Bool(flag) => Bson::Boolean(*flag),
		Value::Number(n) => match n.as_i64() {
			Some(i) => i32::try_from(i).map(Bson::Int32).unwrap_or(Bson::Int64(i)),
			None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
		},
		Value::String(text) => Bson::String(text.clone()),
		Value::Array(items) => Bson::Array(
			items
				.iter()
				.map(from_extended)
				.collect::<AdminResult<Vec<_>>>()?,
		),
		Value::Object(map) => {
			if let Some(text) = wrapped(map, OID_KEY) {
				let oid = ObjectId::parse_str(text).map_err(|_| AdminError::InvalidId(text.to_string()))?;
				return Ok(Bson::ObjectId(oid));
			}
			if let Some(text) = wrapped(map, DATE_KEY) {
				let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
					AdminError::Validation(format!("invalid $date value '{text}': {e}"))
				})?;
				return Ok(Bson::DateTime(bson::DateTime::from_millis(
					parsed.with_timezone(&Utc).timestamp_millis(),
				)));
			}
			if let Some(text) = wrapped(map, BINARY_KEY) {
				let bytes = hex::decode(text).map_err(|e| {
					AdminError::Validation(format!("invalid $binary value: {e}"))
				})?;
				return Ok(Bson::Binary(Binary {
					subtype: BinarySubtype::Generic,
					bytes,
				}));
			}
			Bson::Document(DocumentSerializer::deserialize(value)?)
		}
	})
}

/// Display strings for table cells
pub struct TableSerializer;

impl TableSerializer {
	/// One cell per column, looked up by dot path.
	///
	/// The row always starts with the hex `_id` (when the document has one)
	/// so rows can link to their document.
	///
	/// ```
	/// use monglo_views::serializers::TableSerializer;
	/// use bson::doc;
	///
	/// let columns = vec!["name".to_string(), "address.city".to_string(), "active".to_string()];
	/// let row = TableSerializer::serialize_row(
	///     &doc! { "name": "Ada", "address": { "city": "London" }, "active": true },
	///     &columns,
	/// );
	///
	/// assert_eq!(row["address.city"], "London");
	/// assert_eq!(row["active"], "Yes");
	/// ```
	pub fn serialize_row(doc: &Document, columns: &[String]) -> IndexMap<String, String> {
		let mut row = IndexMap::with_capacity(columns.len() + 1);
		if let Some(id) = doc.get(ID_FIELD) {
			row.insert(ID_FIELD.to_string(), Self::format_cell(Some(id)));
		}
		for column in columns {
			row.insert(column.clone(), Self::format_cell(get_path(doc, column)));
		}
		row
	}

	pub fn serialize_rows(docs: &[Document], columns: &[String]) -> Vec<IndexMap<String, String>> {
		docs.iter()
			.map(|doc| Self::serialize_row(doc, columns))
			.collect()
	}

	/// Display string of one value; missing and null are empty
	pub fn format_cell(value: Option<&Bson>) -> String {
		match value {
			None | Some(Bson::Null) | Some(Bson::Undefined) => String::new(),
			Some(Bson::String(text)) => text.clone(),
			Some(Bson::Boolean(true)) => "Yes".to_string(),
			Some(Bson::Boolean(false)) => "No".to_string(),
			Some(Bson::ObjectId(oid)) => oid.to_hex(),
			Some(Bson::DateTime(dt)) => {
				match DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()) {
					Some(utc) => utc.format("%Y-%m-%d %H:%M:%S").to_string(),
					None => dt.timestamp_millis().to_string(),
				}
			}
			Some(Bson::Int32(n)) => n.to_string(),
			Some(Bson::Int64(n)) => n.to_string(),
			Some(Bson::Double(n)) => n.to_string(),
			Some(Bson::Decimal128(n)) => n.to_string(),
			Some(other) => export_value(other).to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use monglo_core::introspection::infer_schema;
	use rstest::*;

	#[fixture]
	fn article() -> Document {
		let cover = Binary {
			subtype: BinarySubtype::Generic,
			bytes: vec![0xca, 0xfe],
		};
		doc! {
			"_id": ObjectId::parse_str("65f1c2a9e4b0a1b2c3d4e5f6").expect("valid hex"),
			"title": "Schema-less",
			"published_at": bson::DateTime::from_millis(1_704_067_200_000),
			"cover": cover,
			"tags": ["db", "admin"],
			"stats": { "views": 12, "ratio": 0.5 },
			"draft": false,
		}
	}

	#[rstest]
	fn test_json_serializer_flattens_native_types(article: Document) {
		let json = JsonSerializer::serialize(&article);

		assert_eq!(json["_id"], "65f1c2a9e4b0a1b2c3d4e5f6");
		assert_eq!(json["published_at"], "2024-01-01T00:00:00.000Z");
		assert_eq!(json["cover"], "cafe");
		assert_eq!(json["stats"]["views"], 12);
		let keys: Vec<&str> = json
			.as_object()
			.map(|object| object.keys().map(String::as_str).collect())
			.unwrap_or_default();
		let expected: Vec<&str> = article.keys().map(String::as_str).collect();
		assert_eq!(keys, expected, "document field order is kept");
	}

	#[rstest]
	fn test_extended_json_round_trip(article: Document) {
		// Act
		let json = DocumentSerializer::serialize(&article, None, false);
		let restored = DocumentSerializer::deserialize(&json).expect("extended JSON should parse");

		// Assert
		assert_eq!(json["_id"], json!({ "$oid": "65f1c2a9e4b0a1b2c3d4e5f6" }));
		assert_eq!(json["published_at"], json!({ "$date": "2024-01-01T00:00:00.000Z" }));
		assert_eq!(json["cover"], json!({ "$binary": "cafe" }));
		assert_eq!(restored, article, "native types must be restored");
	}

	#[rstest]
	fn test_types_need_a_schema(article: Document) {
		let without_schema = DocumentSerializer::serialize(&article, None, true);

		assert_eq!(without_schema["title"], "Schema-less");
	}

	#[rstest]
	fn test_typed_serialization(article: Document) {
		// Arrange
		let schema = infer_schema(&[article.clone(), doc! { "title": Bson::Null }]);
		let mut extended = article.clone();
		extended.insert("unseen", 3_i64);

		// Act
		let json = DocumentSerializer::serialize(&extended, Some(&schema), true);

		// Assert
		assert_eq!(json["title"]["value"], "Schema-less");
		assert_eq!(json["title"]["type"], "string");
		assert_eq!(json["title"]["metadata"]["nullable"], true);
		assert_eq!(json["title"]["metadata"]["frequency"], 1.0);
		assert_eq!(json["_id"]["metadata"]["frequency"], 0.5);
		assert_eq!(json["_id"]["value"]["$oid"], "65f1c2a9e4b0a1b2c3d4e5f6");
		assert_eq!(json["unseen"]["type"], "integer");
		assert!(json["unseen"]["metadata"].is_null());
	}

	#[rstest]
	#[case(json!([1, 2]))]
	#[case(json!({ "_id": { "$oid": "not-hex" } }))]
	#[case(json!({ "at": { "$date": "yesterday" } }))]
	fn test_deserialize_rejects_malformed_input(#[case] value: Value) {
		assert!(DocumentSerializer::deserialize(&value).is_err());
	}

	#[rstest]
	fn test_wrapper_keys_only_apply_to_single_key_objects() {
		let value = json!({ "meta": { "$oid": "65f1c2a9e4b0a1b2c3d4e5f6", "note": "kept" } });

		let restored = DocumentSerializer::deserialize(&value).expect("object should parse");

		assert_eq!(
			restored.get_document("meta").ok(),
			Some(&doc! { "$oid": "65f1c2a9e4b0a1b2c3d4e5f6", "note": "kept" })
		);
	}

	#[rstest]
	fn test_table_row_formatting(article: Document) {
		// Arrange
		let columns: Vec<String> = ["title", "published_at", "draft", "tags", "stats.views", "missing"]
			.iter()
			.map(|c| c.to_string())
			.collect();

		// Act
		let row = TableSerializer::serialize_row(&article, &columns);

		// Assert
		let cells: Vec<(&str, &str)> = row.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
		assert_eq!(
			cells,
			vec![
				("_id", "65f1c2a9e4b0a1b2c3d4e5f6"),
				("title", "Schema-less"),
				("published_at", "2024-01-01 00:00:00"),
				("draft", "No"),
				("tags", r#"["db","admin"]"#),
				("stats.views", "12"),
				("missing", ""),
			]
		);
	}

	#[rstest]
	#[case(Bson::Null, "")]
	#[case(Bson::Int64(9_000_000_000), "9000000000")]
	#[case(Bson::Double(2.5), "2.5")]
	#[case(Bson::Boolean(true), "Yes")]
	fn test_format_cell(#[case] value: Bson, #[case] expected: &str) {
		assert_eq!(TableSerializer::format_cell(Some(&value)), expected);
	}
}
