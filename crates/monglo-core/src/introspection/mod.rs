//! Schema inference over sampled documents
//!
//! Collections carry no declared schema; the introspector samples documents
//! and reports, per field path, how often the field appears, which types it
//! holds and a handful of example values.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::introspection::{FieldType, SchemaIntrospector};
//! use monglo_db::backends::MemoryBackend;
//! use bson::doc;
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let backend = MemoryBackend::new();
//! backend.seed("users", vec![doc! { "name": "Alice", "age": 30 }])?;
//!
//! let introspector = SchemaIntrospector::new(Arc::new(backend));
//! let schema = introspector.introspect("users", 100).await?;
//! assert_eq!(schema.type_of("age"), Some(FieldType::Integer));
//! # Ok(())
//! # }
//! ```

mod schema;

pub use schema::{CardinalityReport, FieldSchema, FieldType, Schema, infer_schema};

use std::sync::Arc;

use bson::{Bson, Document};
use monglo_db::{DocumentBackend, FindOptions};

use crate::error::AdminResult;

/// Distinct-value count under which a field is considered low cardinality
const LOW_CARDINALITY_THRESHOLD: u64 = 50;

/// Above this many distinct values no samples are reported
const CARDINALITY_SAMPLE_CEILING: u64 = 100;

/// Samples collections through a [`DocumentBackend`] and infers their schema
#[derive(Clone)]
pub struct SchemaIntrospector {
	database: Arc<dyn DocumentBackend>,
}

impl SchemaIntrospector {
	pub fn new(database: Arc<dyn DocumentBackend>) -> Self {
		Self { database }
	}

	/// Infers a schema from the first `sample_size` documents.
	///
	/// An empty collection yields an empty schema.
	pub async fn introspect(&self, collection: &str, sample_size: usize) -> AdminResult<Schema> {
		let documents = self
			.database
			.find_many(
				collection,
				Document::new(),
				FindOptions::new().limit(sample_size as i64),
			)
			.await?;

		let schema = infer_schema(&documents);
		tracing::debug!(
			collection,
			sampled = documents.len(),
			fields = schema.len(),
			"Introspected collection schema"
		);
		Ok(schema)
	}

	/// Index definitions exactly as the store reports them
	pub async fn get_indexes(&self, collection: &str) -> AdminResult<Vec<Document>> {
		Ok(self.database.list_indexes(collection).await?)
	}

	/// Distinct-value statistics for one field
	pub async fn analyze_field_cardinality(
		&self,
		collection: &str,
		field: &str,
	) -> AdminResult<CardinalityReport> {
		let distinct = self
			.database
			.distinct(collection, field, Document::new())
			.await?;
		let total_documents = self
			.database
			.count_documents(collection, Document::new())
			.await?;

		let distinct_count = distinct.len() as u64;
		let cardinality_ratio = if total_documents > 0 {
			distinct_count as f64 / total_documents as f64
		} else {
			0.0
		};
		let sample_values: Vec<Bson> = if distinct_count <= CARDINALITY_SAMPLE_CEILING {
			distinct.into_iter().take(10).collect()
		} else {
			Vec::new()
		};

		Ok(CardinalityReport {
			field: field.to_string(),
			total_documents,
			distinct_count,
			cardinality_ratio,
			is_unique: distinct_count == total_documents,
			is_low_cardinality: distinct_count < LOW_CARDINALITY_THRESHOLD,
			sample_values,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use monglo_db::backends::MemoryBackend;
	use rstest::*;

	#[fixture]
	fn backend() -> MemoryBackend {
		let backend = MemoryBackend::new();
		let docs: Vec<Document> = (0..12)
			.map(|i| doc! { "sku": format!("SKU-{i}"), "color": if i % 2 == 0 { "red" } else { "blue" } })
			.collect();
		backend.seed("items", docs).expect("seeding should succeed");
		backend
	}

	#[rstest]
	#[tokio::test]
	async fn test_introspect_respects_sample_size(backend: MemoryBackend) {
		// Arrange
		let store = backend.clone();
		let introspector = SchemaIntrospector::new(Arc::new(backend));

		// Act
		store.reset_query_count();
		let schema = introspector
			.introspect("items", 3)
			.await
			.expect("introspection should succeed");

		// Assert
		assert_eq!(store.query_count(), 1);
		let sku = schema.get("sku").expect("sku should be observed");
		assert_eq!(sku.sample_values.len(), 3);
		assert_eq!(sku.frequency, 1.0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_introspect_empty_collection() {
		let introspector = SchemaIntrospector::new(Arc::new(MemoryBackend::new()));

		let schema = introspector
			.introspect("nothing", 100)
			.await
			.expect("introspection should succeed");

		assert!(schema.is_empty());
	}

	#[rstest]
	#[case("sku", 12, true, true, 10)]
	#[case("color", 2, false, true, 2)]
	#[tokio::test]
	async fn test_field_cardinality(
		backend: MemoryBackend,
		#[case] field: &str,
		#[case] distinct: u64,
		#[case] unique: bool,
		#[case] low: bool,
		#[case] samples: usize,
	) {
		let introspector = SchemaIntrospector::new(Arc::new(backend));

		let report = introspector
			.analyze_field_cardinality("items", field)
			.await
			.expect("analysis should succeed");

		assert_eq!(report.total_documents, 12);
		assert_eq!(report.distinct_count, distinct);
		assert_eq!(report.is_unique, unique);
		assert_eq!(report.is_low_cardinality, low);
		assert_eq!(report.sample_values.len(), samples);
		assert_eq!(report.cardinality_ratio, distinct as f64 / 12.0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cardinality_of_empty_collection_has_zero_ratio() {
		let introspector = SchemaIntrospector::new(Arc::new(MemoryBackend::new()));

		let report = introspector
			.analyze_field_cardinality("nothing", "x")
			.await
			.expect("analysis should succeed");

		assert_eq!(report.cardinality_ratio, 0.0);
		assert_eq!(report.total_documents, 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_get_indexes_passes_through(backend: MemoryBackend) {
		backend.create_index("items", doc! { "sku": 1 }, true);
		let introspector = SchemaIntrospector::new(Arc::new(backend));

		let indexes = introspector
			.get_indexes("items")
			.await
			.expect("listing should succeed");

		assert_eq!(indexes.len(), 2);
		assert_eq!(indexes[0].get_str("name").ok(), Some("_id_"));
	}
}
