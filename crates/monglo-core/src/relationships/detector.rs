//! Relationship detection over sampled documents

use std::collections::HashSet;
use std::sync::Arc;

use bson::{Bson, Document};
use monglo_db::value::is_dbref;
use monglo_db::{DocumentBackend, FindOptions};
use parking_lot::RwLock;

use super::naming::{guess_collection_from_field, pluralize};
use super::{Relationship, RelationshipType};
use crate::config::CollectionConfig;
use crate::error::AdminResult;
use crate::query_builder::ID_FIELD;

/// Infers relationships from field names and value shapes
///
/// Strategies, tried per field in order until one yields a relationship:
///
/// 1. Naming convention: `user_id` → `users` (one-to-one), `tag_ids` →
///    `tags` (one-to-many).
/// 2. A bare `ObjectId` under a field without the `_id` suffix: `author` →
///    `authors`.
/// 3. An array whose first element is an `ObjectId`.
/// 4. A DBRef, which names its target collection itself.
///
/// Guesses naming a collection that does not exist are dropped silently.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use monglo_core::config::CollectionConfig;
/// use monglo_core::relationships::{RelationshipDetector, RelationshipType};
/// use monglo_db::backends::MemoryBackend;
/// use bson::{doc, oid::ObjectId};
///
/// # async fn example() -> monglo_core::AdminResult<()> {
/// let backend = MemoryBackend::new();
/// backend.create_collection("users");
/// backend.seed("orders", vec![doc! { "user_id": ObjectId::new() }])?;
///
/// let detector = RelationshipDetector::new(Arc::new(backend));
/// let found = detector.detect("orders", &CollectionConfig::default(), 100).await?;
/// assert_eq!(found[0].target_collection, "users");
/// assert_eq!(found[0].relationship_type, RelationshipType::OneToOne);
/// # Ok(())
/// # }
/// ```
pub struct RelationshipDetector {
	database: Arc<dyn DocumentBackend>,
	collection_cache: RwLock<Option<Arc<HashSet<String>>>>,
}

impl RelationshipDetector {
	pub fn new(database: Arc<dyn DocumentBackend>) -> Self {
		Self {
			database,
			collection_cache: RwLock::new(None),
		}
	}

	/// Detects the relationships of `collection`.
	///
	/// The result starts with the relationships declared in `config`,
	/// followed by at most one inferred relationship per remaining source
	/// field.
	pub async fn detect(
		&self,
		collection: &str,
		config: &CollectionConfig,
		sample_size: usize,
	) -> AdminResult<Vec<Relationship>> {
		let known = self.known_collections().await?;
		let mut relationships = config.relationships.clone();

		let sample = self
			.database
			.find_many(
				collection,
				Document::new(),
				FindOptions::new().limit(sample_size as i64),
			)
			.await?;

		let mut detected_fields: HashSet<String> = relationships
			.iter()
			.map(|r| r.source_field.clone())
			.collect();
		for document in &sample {
			for relationship in detect_in_document(collection, document, &known) {
				if detected_fields.insert(relationship.source_field.clone()) {
					tracing::debug!(
						collection,
						field = %relationship.source_field,
						target = %relationship.target_collection,
						kind = %relationship.relationship_type,
						"Detected relationship"
					);
					relationships.push(relationship);
				}
			}
		}

		Ok(relationships)
	}

	/// Forgets the cached collection names so the next detection re-lists them
	pub fn invalidate_cache(&self) {
		*self.collection_cache.write() = None;
	}

	async fn known_collections(&self) -> AdminResult<Arc<HashSet<String>>> {
		let cached = self.collection_cache.read().clone();
		if let Some(names) = cached {
			return Ok(names);
		}

		let names: Arc<HashSet<String>> =
			Arc::new(self.database.list_collection_names().await?.into_iter().collect());
		// An empty database is re-listed next time.
		if !names.is_empty() {
			*self.collection_cache.write() = Some(Arc::clone(&names));
		}
		Ok(names)
	}
}

fn detect_in_document(
	collection: &str,
	document: &Document,
	known: &HashSet<String>,
) -> Vec<Relationship> {
	let mut found = Vec::new();

	for (field, value) in document {
		if field == ID_FIELD {
			continue;
		}

		if field.ends_with("_id") || field.ends_with("_ids") {
			let target = guess_collection_from_field(field);
			if known.contains(&target) {
				let kind = if field.ends_with("_ids") {
					RelationshipType::OneToMany
				} else {
					RelationshipType::OneToOne
				};
				found.push(Relationship::new(collection, field, target, kind));
				continue;
			}
			tracing::debug!(collection, field, target = %target, "No collection for naming guess");
		}

		match value {
			Bson::ObjectId(_) => {
				if !field.ends_with("_id") {
					let target = pluralize(field);
					if known.contains(&target) {
						found.push(Relationship::new(
							collection,
							field,
							target,
							RelationshipType::OneToOne,
						));
					}
				}
			}
			Bson::Array(items) if matches!(items.first(), Some(Bson::ObjectId(_))) => {
				let target = guess_collection_from_field(field);
				if known.contains(&target) {
					found.push(Relationship::new(
						collection,
						field,
						target,
						RelationshipType::OneToMany,
					));
				}
			}
			Bson::Document(reference) if is_dbref(reference) => {
				if let Ok(target) = reference.get_str("$ref") {
					found.push(Relationship::new(
						collection,
						field,
						target,
						RelationshipType::OneToOne,
					));
				}
			}
			_ => {}
		}
	}

	found
}
