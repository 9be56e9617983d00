//! Relationship detection and batch resolution against a seeded store

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use monglo_core::config::CollectionConfig;
use monglo_core::relationships::{
	RELATIONSHIPS_KEY, Relationship, RelationshipDetector, RelationshipResolver, RelationshipType,
};
use monglo_db::backends::MemoryBackend;
use rstest::*;

struct Blog {
	backend: MemoryBackend,
	users: Vec<Bson>,
	tags: Vec<Bson>,
}

#[fixture]
fn blog() -> Blog {
	let backend = MemoryBackend::new();
	let users = backend
		.seed(
			"users",
			(0..10).map(|i| doc! { "name": format!("user-{i}") }).collect(),
		)
		.expect("seeding should succeed");
	let tags = backend
		.seed(
			"tags",
			["rust", "mongodb", "admin"]
				.iter()
				.map(|label| doc! { "label": *label })
				.collect(),
		)
		.expect("seeding should succeed");
	backend
		.seed("authors", vec![doc! { "_id": ObjectId::new(), "pen_name": "Q" }])
		.expect("seeding should succeed");
	Blog {
		backend,
		users,
		tags,
	}
}

fn posts(blog: &Blog, count: usize) -> Vec<Document> {
	(0..count)
		.map(|i| {
			doc! {
				"title": format!("post-{i}"),
				"user_id": blog.users[i % blog.users.len()].clone(),
				"tag_ids": [blog.tags[i % blog.tags.len()].clone(), blog.tags[(i + 1) % blog.tags.len()].clone()],
			}
		})
		.collect()
}

fn post_relationships() -> Vec<Relationship> {
	vec![
		Relationship::new("posts", "user_id", "users", RelationshipType::OneToOne),
		Relationship::new("posts", "tag_ids", "tags", RelationshipType::OneToMany),
	]
}

#[rstest]
#[tokio::test]
async fn test_detects_naming_and_shape_references(blog: Blog) {
	// Arrange
	let author = blog
		.backend
		.seed("authors", vec![doc! { "pen_name": "R" }])
		.expect("seeding should succeed");
	let mut documents = posts(&blog, 3);
	documents[0].insert("author", author[0].clone());
	blog.backend
		.seed("posts", documents)
		.expect("seeding should succeed");
	let detector = RelationshipDetector::new(Arc::new(blog.backend.clone()));

	// Act
	let found = detector
		.detect("posts", &CollectionConfig::default(), 100)
		.await
		.expect("detection should succeed");

	// Assert
	let summary: Vec<(&str, &str, RelationshipType)> = found
		.iter()
		.map(|r| {
			(
				r.source_field.as_str(),
				r.target_collection.as_str(),
				r.relationship_type,
			)
		})
		.collect();
	assert_eq!(
		summary,
		vec![
			("user_id", "users", RelationshipType::OneToOne),
			("tag_ids", "tags", RelationshipType::OneToMany),
			("author", "authors", RelationshipType::OneToOne),
		]
	);
	assert!(found.iter().all(|r| r.target_field == "_id"));
}

#[rstest]
#[tokio::test]
async fn test_configured_relationship_suppresses_detection(blog: Blog) {
	// Arrange
	blog.backend
		.seed("posts", posts(&blog, 2))
		.expect("seeding should succeed");
	let config = CollectionConfig {
		relationships: vec![
			Relationship::new("posts", "user_id", "users", RelationshipType::OneToOne)
				.with_target_field("legacy_id"),
		],
		..Default::default()
	};
	let detector = RelationshipDetector::new(Arc::new(blog.backend.clone()));

	// Act
	let found = detector
		.detect("posts", &config, 100)
		.await
		.expect("detection should succeed");

	// Assert
	assert_eq!(found.len(), 2);
	assert_eq!(found[0].target_field, "legacy_id", "configured entry comes first and wins");
	assert_eq!(found[1].source_field, "tag_ids");
}

#[rstest]
#[case(1)]
#[case(10_000)]
#[tokio::test]
async fn test_batch_resolution_issues_one_query_per_relationship(
	blog: Blog,
	#[case] count: usize,
) {
	// Arrange
	let documents = posts(&blog, count);
	let relationships = post_relationships();
	let resolver = RelationshipResolver::new(Arc::new(blog.backend.clone()));
	blog.backend.reset_query_count();

	// Act
	let resolved = resolver
		.resolve_batch(&documents, &relationships, 1)
		.await
		.expect("batch resolution should succeed");

	// Assert
	assert_eq!(
		blog.backend.query_count(),
		relationships.len() as u64,
		"query count must not grow with the number of documents"
	);
	assert_eq!(resolved.len(), count);
	let last = &resolved[count - 1];
	let attached = last
		.get_document(RELATIONSHIPS_KEY)
		.expect("relationships should be attached");
	let user = attached.get_document("user_id").expect("user should resolve");
	assert_eq!(user.get("_id"), last.get("user_id"));
	let tags = attached.get_array("tag_ids").expect("tags should resolve");
	assert_eq!(tags.len(), 2);
}

#[rstest]
#[tokio::test]
async fn test_batch_resolution_skips_missing_targets(blog: Blog) {
	// Arrange
	let documents = vec![
		doc! { "user_id": ObjectId::new(), "tag_ids": [ObjectId::new(), blog.tags[0].clone()] },
		doc! { "title": "no references" },
	];
	let resolver = RelationshipResolver::new(Arc::new(blog.backend.clone()));

	// Act
	let resolved = resolver
		.resolve_batch(&documents, &post_relationships(), 1)
		.await
		.expect("batch resolution should succeed");

	// Assert
	let attached = resolved[0]
		.get_document(RELATIONSHIPS_KEY)
		.expect("relationships should be attached");
	assert!(!attached.contains_key("user_id"), "missing one-to-one target is left out");
	assert_eq!(attached.get_array("tag_ids").map(Vec::len).ok(), Some(1));
	assert_eq!(resolved[1].get("title"), documents[1].get("title"));
}

#[rstest]
#[tokio::test]
async fn test_single_resolution_matches_batch(blog: Blog) {
	// Arrange
	let documents = posts(&blog, 4);
	let resolver = RelationshipResolver::new(Arc::new(blog.backend.clone()));

	// Act
	let single = resolver
		.resolve(&documents[0], &post_relationships(), 1)
		.await
		.expect("resolution should succeed");
	let batch = resolver
		.resolve_batch(&documents, &post_relationships(), 1)
		.await
		.expect("batch resolution should succeed");

	// Assert
	assert_eq!(
		single.get_document(RELATIONSHIPS_KEY).ok(),
		batch[0].get_document(RELATIONSHIPS_KEY).ok()
	);
}
