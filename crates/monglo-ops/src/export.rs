//! Collection export to JSON, CSV and NDJSON
//!
//! Store-native values are converted to plain JSON on the way out: object
//! ids become hex strings, datetimes RFC 3339 strings and binary data
//! lowercase hex. The conversion is one-way; [`from_json`] reads an export
//! back with those values still as strings.

use std::str::FromStr;
use std::sync::Arc;

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;
use monglo_core::error::{AdminError, AdminResult};
use monglo_db::value::{get_path, is_dbref};
use monglo_db::{DocumentBackend, FindOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::info;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
	/// One JSON array
	Json,
	/// Comma-separated values
	Csv,
	/// One JSON object per line
	Ndjson,
}

impl ExportFormat {
	/// File extension for this format
	pub fn extension(&self) -> &'static str {
		match self {
			ExportFormat::Json => "json",
			ExportFormat::Csv => "csv",
			ExportFormat::Ndjson => "ndjson",
		}
	}

	/// MIME type for this format
	pub fn mime_type(&self) -> &'static str {
		match self {
			ExportFormat::Json => "application/json",
			ExportFormat::Csv => "text/csv",
			ExportFormat::Ndjson => "application/x-ndjson",
		}
	}
}

impl FromStr for ExportFormat {
	type Err = AdminError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" => Ok(ExportFormat::Json),
			"csv" => Ok(ExportFormat::Csv),
			"ndjson" | "jsonl" => Ok(ExportFormat::Ndjson),
			other => Err(AdminError::Export(format!("unsupported export format '{other}'"))),
		}
	}
}

/// Converts a store value to plain JSON.
///
/// # Examples
///
/// ```rust
/// use monglo_ops::export::export_value;
/// use bson::{Bson, oid::ObjectId};
///
/// let oid = ObjectId::parse_str("65f1c2a9e4b0a1b2c3d4e5f6").unwrap();
/// assert_eq!(export_value(&Bson::ObjectId(oid)), "65f1c2a9e4b0a1b2c3d4e5f6");
///
/// let when = Bson::DateTime(bson::DateTime::from_millis(0));
/// assert_eq!(export_value(&when), "1970-01-01T00:00:00.000Z");
/// ```
pub fn export_value(value: &Bson) -> Value {
	match value {
		Bson::Null | Bson::Undefined => Value::Null,
		Bson::Boolean(flag) => Value::Bool(*flag),
		Bson::Int32(n) => Value::from(*n),
		Bson::Int64(n) => Value::from(*n),
		Bson::Double(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
		Bson::String(text) | Bson::Symbol(text) => Value::String(text.clone()),
		Bson::ObjectId(oid) => Value::String(oid.to_hex()),
		Bson::DateTime(dt) => Value::String(format_datetime(dt)),
		Bson::Binary(binary) => Value::String(hex::encode(&binary.bytes)),
		Bson::Array(items) => Value::Array(items.iter().map(export_value).collect()),
		Bson::Document(doc) if is_dbref(doc) => {
			let mut reference = Map::new();
			reference.insert(
				"$ref".to_string(),
				doc.get("$ref").map(export_value).unwrap_or(Value::Null),
			);
			reference.insert(
				"$id".to_string(),
				doc.get("$id").map(export_value).unwrap_or(Value::Null),
			);
			Value::Object(reference)
		}
		Bson::Document(doc) => export_document(doc),
		Bson::RegularExpression(regex) => {
			Value::String(format!("/{}/{}", regex.pattern, regex.options))
		}
		other => Value::String(other.to_string()),
	}
}

/// [`export_value`] over every field of a document
pub fn export_document(doc: &Document) -> Value {
	Value::Object(
		doc.iter()
			.map(|(key, value)| (key.clone(), export_value(value)))
			.collect(),
	)
}

/// RFC 3339 with millisecond precision in UTC
pub fn format_datetime(dt: &bson::DateTime) -> String {
	match DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()) {
		Some(utc) => utc.to_rfc3339_opts(SecondsFormat::Millis, true),
		None => dt.timestamp_millis().to_string(),
	}
}

/// Documents as one JSON array
pub fn to_json(documents: &[Document], pretty: bool) -> AdminResult<String> {
	let array = Value::Array(documents.iter().map(export_document).collect());
	let rendered = if pretty {
		serde_json::to_string_pretty(&array)
	} else {
		serde_json::to_string(&array)
	};
	rendered.map_err(|e| AdminError::Export(format!("Failed to render JSON: {e}")))
}

/// Documents as newline-delimited JSON, one object per line
pub fn to_ndjson(documents: &[Document]) -> AdminResult<String> {
	let mut output = String::new();
	for document in documents {
		let line = serde_json::to_string(&export_document(document))
			.map_err(|e| AdminError::Export(format!("Failed to render JSON line: {e}")))?;
		output.push_str(&line);
		output.push('\n');
	}
	Ok(output)
}

/// Documents as CSV.
///
/// Columns default to the keys of the first document. Fields are dotted
/// paths; a missing field yields an empty cell and nested values are
/// written as JSON text.
///
/// # Examples
///
/// ```rust
/// use monglo_ops::export::to_csv;
/// use bson::doc;
///
/// let rows = vec![doc! { "name": "Ada", "address": { "city": "London" } }];
/// let fields = vec!["name".to_string(), "address.city".to_string(), "age".to_string()];
/// let csv = to_csv(&rows, Some(&fields), true).unwrap();
///
/// assert_eq!(csv, "name,address.city,age\nAda,London,\n");
/// ```
pub fn to_csv(
	documents: &[Document],
	fields: Option<&[String]>,
	include_headers: bool,
) -> AdminResult<String> {
	let fields: Vec<String> = match fields {
		Some(fields) => fields.to_vec(),
		None => documents
			.first()
			.map(|first| first.keys().cloned().collect())
			.unwrap_or_default(),
	};

	let mut writer = Writer::from_writer(Vec::new());
	if include_headers && !fields.is_empty() {
		writer
			.write_record(&fields)
			.map_err(|e| AdminError::Export(format!("Failed to write CSV headers: {e}")))?;
	}
	for document in documents {
		let cells: Vec<String> = fields
			.iter()
			.map(|field| csv_cell(get_path(document, field)))
			.collect();
		writer
			.write_record(&cells)
			.map_err(|e| AdminError::Export(format!("Failed to write CSV row: {e}")))?;
	}
	writer
		.flush()
		.map_err(|e| AdminError::Export(format!("Failed to flush CSV writer: {e}")))?;
	let bytes = writer
		.into_inner()
		.map_err(|e| AdminError::Export(format!("Failed to get CSV output: {e}")))?;
	String::from_utf8(bytes).map_err(|e| AdminError::Export(format!("CSV output is not UTF-8: {e}")))
}

fn csv_cell(value: Option<&Bson>) -> String {
	match value.map(export_value) {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(text)) => text,
		Some(Value::Bool(flag)) => flag.to_string(),
		Some(Value::Number(n)) => n.to_string(),
		Some(nested) => nested.to_string(),
	}
}

/// Reads an exported JSON array back into documents.
///
/// Integers that fit 32 bits become `Int32`, larger ones `Int64`; converted
/// ids and dates stay strings.
pub fn from_json(text: &str) -> AdminResult<Vec<Document>> {
	let parsed: Value = serde_json::from_str(text)
		.map_err(|e| AdminError::Export(format!("Invalid JSON export: {e}")))?;
	let Value::Array(items) = parsed else {
		return Err(AdminError::Export(
			"JSON export must be an array of objects".to_string(),
		));
	};
	items
		.into_iter()
		.map(|item| match json_to_bson(item) {
			Bson::Document(doc) => Ok(doc),
			other => Err(AdminError::Export(format!(
				"expected an object in JSON export, found {other}"
			))),
		})
		.collect()
}

fn json_to_bson(value: Value) -> Bson {
	match value {
		Value::Null => Bson::Null,
		Value::Bool(flag) => Bson::Boolean(flag),
		Value::Number(n) => match n.as_i64() {
			Some(i) => match i32::try_from(i) {
				Ok(small) => Bson::Int32(small),
				Err(_) => Bson::Int64(i),
			},
			None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
		},
		Value::String(text) => Bson::String(text),
		Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
		Value::Object(map) => {
			let mut doc = Document::new();
			for (key, value) in map {
				doc.insert(key, json_to_bson(value));
			}
			Bson::Document(doc)
		}
	}
}

/// Options of [`ExportOperations::export_collection`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
	pub query: Option<Document>,
	/// Projection and CSV columns; all fields when `None`
	pub fields: Option<Vec<String>>,
	pub limit: Option<i64>,
	/// Indent JSON output
	pub pretty: bool,
	pub include_headers: bool,
}

impl Default for ExportOptions {
	fn default() -> Self {
		Self {
			query: None,
			fields: None,
			limit: None,
			pretty: true,
			include_headers: true,
		}
	}
}

/// Rendered export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportResult {
	pub content: String,
	pub format: ExportFormat,
	pub document_count: usize,
	/// `<collection>_<YYYYmmdd_HHMMSS>.<extension>`
	pub filename: String,
}

impl ExportResult {
	pub fn mime_type(&self) -> &'static str {
		self.format.mime_type()
	}
}

/// Exports one collection
#[derive(Clone)]
pub struct ExportOperations {
	database: Arc<dyn DocumentBackend>,
	collection: String,
}

impl ExportOperations {
	pub fn new(database: Arc<dyn DocumentBackend>, collection: impl Into<String>) -> Self {
		Self {
			database,
			collection: collection.into(),
		}
	}

	/// Fetches the matching documents and renders them in `format`
	pub async fn export_collection(
		&self,
		format: ExportFormat,
		options: ExportOptions,
	) -> AdminResult<ExportResult> {
		let projection = options.fields.as_ref().map(|fields| {
			let mut projection = Document::new();
			for field in fields {
				projection.insert(field.clone(), 1);
			}
			projection
		});
		let mut find = FindOptions::new().projection(projection);
		if let Some(limit) = options.limit {
			find = find.limit(limit);
		}
		let documents = self
			.database
			.find_many(&self.collection, options.query.unwrap_or_default(), find)
			.await?;

		let content = match format {
			ExportFormat::Json => to_json(&documents, options.pretty)?,
			ExportFormat::Csv => {
				to_csv(&documents, options.fields.as_deref(), options.include_headers)?
			}
			ExportFormat::Ndjson => to_ndjson(&documents)?,
		};
		let filename = format!(
			"{}_{}.{}",
			self.collection,
			Utc::now().format("%Y%m%d_%H%M%S"),
			format.extension()
		);
		info!(
			collection = %self.collection,
			format = format.extension(),
			documents = documents.len(),
			"Exported collection"
		);

		Ok(ExportResult {
			content,
			format,
			document_count: documents.len(),
			filename,
		})
	}
}
