//! Schema inference properties over sampled collections

use std::sync::Arc;

use bson::{Bson, Document, doc};
use monglo_core::introspection::{FieldType, SchemaIntrospector};
use monglo_core::CollectionConfig;
use monglo_db::backends::MemoryBackend;
use rstest::*;

#[fixture]
fn people() -> MemoryBackend {
	let backend = MemoryBackend::new();
	let mut documents: Vec<Document> = (0..20)
		.map(|i| {
			doc! {
				"name": format!("person-{i}"),
				"age": i + 18,
				"address": { "city": if i % 2 == 0 { "Lyon" } else { "Oslo" } },
				"pets": [{ "kind": "cat" }],
			}
		})
		.collect();
	documents[3].insert("nickname", Bson::Null);
	documents[4].insert("nickname", "Four");
	documents[5].insert("age", "unknown");
	backend.seed("people", documents).expect("seeding should succeed");
	backend
}

#[rstest]
#[tokio::test]
async fn test_frequency_is_a_fraction_of_sampled_documents(people: MemoryBackend) {
	// Arrange
	let introspector = SchemaIntrospector::new(Arc::new(people));

	// Act
	let schema = introspector
		.introspect("people", 100)
		.await
		.expect("introspection should succeed");

	// Assert
	for (path, field) in schema.iter() {
		assert!(
			(0.0..=1.0).contains(&field.frequency),
			"frequency of {path} out of range: {}",
			field.frequency
		);
	}
	assert_eq!(schema.get("name").map(|f| f.frequency), Some(1.0));
	assert_eq!(schema.get("nickname").map(|f| f.frequency), Some(0.1));
	assert!(schema.contains("address.city"));
	assert!(schema.contains("pets.[].kind"));
}

#[rstest]
#[tokio::test]
async fn test_nullable_only_with_explicit_null(people: MemoryBackend) {
	let introspector = SchemaIntrospector::new(Arc::new(people));

	let schema = introspector
		.introspect("people", 100)
		.await
		.expect("introspection should succeed");

	assert!(schema.get("nickname").is_some_and(|f| f.nullable));
	assert!(
		schema.get("address").is_some_and(|f| !f.nullable),
		"absence is not nullability"
	);
}

#[rstest]
#[tokio::test]
async fn test_mixed_types_keep_majority_and_alternatives(people: MemoryBackend) {
	let introspector = SchemaIntrospector::new(Arc::new(people));

	let schema = introspector
		.introspect("people", 100)
		.await
		.expect("introspection should succeed");

	let age = schema.get("age").expect("age should be inferred");
	assert_eq!(age.primary_type, FieldType::Integer);
	assert_eq!(
		age.alternative_types,
		Some(vec![FieldType::Integer, FieldType::String])
	);
	assert_eq!(schema.type_of("pets"), Some(FieldType::Array));
	assert_eq!(schema.get("pets").and_then(|f| f.array_item_type), Some(FieldType::Embedded));
	assert!(schema.get("name").is_some_and(|f| f.sample_values.len() == 5));
}

#[rstest]
#[tokio::test]
async fn test_empty_collection_yields_empty_schema() {
	let backend = MemoryBackend::new();
	backend.create_collection("empty");
	let introspector = SchemaIntrospector::new(Arc::new(backend));

	let schema = introspector
		.introspect("empty", 100)
		.await
		.expect("introspection should succeed");

	assert!(schema.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_config_derived_from_schema(people: MemoryBackend) {
	// Arrange
	let introspector = SchemaIntrospector::new(Arc::new(people));
	let schema = introspector
		.introspect("people", 100)
		.await
		.expect("introspection should succeed");

	// Act
	let config = CollectionConfig::from_schema(&schema);

	// Assert
	assert!(config.search_fields().contains(&"name".to_string()));
	assert!(config.is_sortable("age"));
	assert!(!config.is_sortable("pets"));
	assert!(config.list_fields().len() <= 10);
}
