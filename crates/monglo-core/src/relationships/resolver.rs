//! Attaching related documents

use std::collections::HashMap;
use std::sync::Arc;

use bson::{Bson, Document, doc};
use futures::future::try_join_all;
use monglo_db::value::{get_path, is_dbref};
use monglo_db::{DocumentBackend, FindOptions};

use super::{Relationship, RelationshipType};
use crate::error::{AdminError, AdminResult};

/// Key under which resolved documents are attached
pub const RELATIONSHIPS_KEY: &str = "_relationships";

/// Cap on targets fetched for one array reference of a single document
const SINGLE_FETCH_LIMIT: i64 = 100;

/// Cap on targets fetched per relationship in batch mode
const BATCH_FETCH_LIMIT: i64 = 1000;

/// Deepest level resolved; larger depths are clamped
const MAX_DEPTH: i32 = 1;

/// Resolves relationships by fetching referenced documents
///
/// The resolved copy of a document carries a `_relationships` sub-document
/// keyed by source field. Missing targets are never an error: a one-to-one
/// slot stays empty and array results simply omit them.
#[derive(Clone)]
pub struct RelationshipResolver {
	database: Arc<dyn DocumentBackend>,
}

impl RelationshipResolver {
	pub fn new(database: Arc<dyn DocumentBackend>) -> Self {
		Self { database }
	}

	/// Resolves the relationships of one document.
	///
	/// Array values are fetched with one `$in` query (at most 100 targets),
	/// scalar values with one equality lookup. A depth of zero or less
	/// returns the document unchanged.
	pub async fn resolve(
		&self,
		document: &Document,
		relationships: &[Relationship],
		depth: i32,
	) -> AdminResult<Document> {
		if effective_depth(depth) == 0 {
			return Ok(document.clone());
		}

		let mut resolved_map = Document::new();
		for relationship in relationships {
			let Some(value) = document.get(&relationship.source_field) else {
				continue;
			};

			let resolved = match relationship.relationship_type {
				RelationshipType::Embedded => value.clone(),
				_ => match value {
					Bson::Array(items) => {
						let targets = self
							.database
							.find_many(
								&relationship.target_collection,
								membership_filter(relationship, items.iter()),
								FindOptions::new().limit(SINGLE_FETCH_LIMIT),
							)
							.await?;
						Bson::Array(targets.into_iter().map(Bson::Document).collect())
					}
					scalar => {
						let mut filter = Document::new();
						filter.insert(relationship.target_field.clone(), reference_key(scalar));
						self.database
							.find_one(&relationship.target_collection, filter)
							.await?
							.map_or(Bson::Null, Bson::Document)
					}
				},
			};
			resolved_map.insert(relationship.source_field.clone(), resolved);
		}

		let mut resolved = document.clone();
		resolved.insert(RELATIONSHIPS_KEY, resolved_map);
		Ok(resolved)
	}

	/// Resolves the relationships of many documents with one query per
	/// relationship.
	///
	/// Reference values are gathered across every input document (arrays
	/// flattened) and fetched with a single `$in` query capped at 1000
	/// targets. The per-relationship queries run concurrently; results are
	/// assigned only after all of them complete.
	///
	/// # Example
	///
	/// ```rust
	/// use std::sync::Arc;
	/// use monglo_core::relationships::{Relationship, RelationshipResolver, RelationshipType};
	/// use monglo_db::backends::MemoryBackend;
	/// use bson::doc;
	///
	/// # async fn example() -> monglo_core::AdminResult<()> {
	/// let backend = MemoryBackend::new();
	/// backend.seed("users", vec![doc! { "_id": 1, "name": "Ada" }, doc! { "_id": 2, "name": "Bob" }])?;
	/// let orders = vec![doc! { "user_id": 1 }, doc! { "user_id": 2 }, doc! { "user_id": 1 }];
	/// let user = Relationship::new("orders", "user_id", "users", RelationshipType::OneToOne);
	///
	/// let resolver = RelationshipResolver::new(Arc::new(backend.clone()));
	/// backend.reset_query_count();
	/// let resolved = resolver.resolve_batch(&orders, &[user], 1).await?;
	///
	/// assert_eq!(backend.query_count(), 1);
	/// let first = resolved[0]
	///     .get_document("_relationships")
	///     .and_then(|map| map.get_document("user_id"))
	///     .ok();
	/// assert_eq!(first.and_then(|user| user.get_str("name").ok()), Some("Ada"));
	/// # Ok(())
	/// # }
	/// ```
	pub async fn resolve_batch(
		&self,
		documents: &[Document],
		relationships: &[Relationship],
		depth: i32,
	) -> AdminResult<Vec<Document>> {
		if effective_depth(depth) == 0 || documents.is_empty() {
			return Ok(documents.to_vec());
		}

		let lookups = relationships.iter().map(|relationship| async move {
			if relationship.relationship_type == RelationshipType::Embedded {
				return Ok(None);
			}
			let values: Vec<&Bson> = documents
				.iter()
				.filter_map(|document| document.get(&relationship.source_field))
				.flat_map(|value| match value {
					Bson::Array(items) => items.iter().collect::<Vec<_>>(),
					other => vec![other],
				})
				.collect();
			if values.is_empty() {
				return Ok(None);
			}

			tracing::debug!(
				target_collection = %relationship.target_collection,
				field = %relationship.source_field,
				values = values.len(),
				"Batch resolving relationship"
			);
			let targets = self
				.database
				.find_many(
					&relationship.target_collection,
					membership_filter(relationship, values.into_iter()),
					FindOptions::new().limit(BATCH_FETCH_LIMIT),
				)
				.await?;

			let mut by_key: HashMap<String, Document> = HashMap::new();
			for target in targets {
				if let Some(key) = get_path(&target, &relationship.target_field).map(lookup_key) {
					by_key.entry(key).or_insert(target);
				}
			}
			Ok::<_, AdminError>(Some(by_key))
		});
		let lookups = try_join_all(lookups).await?;

		let mut resolved: Vec<Document> = documents.to_vec();
		let mut maps: Vec<Document> = vec![Document::new(); documents.len()];
		for (relationship, lookup) in relationships.iter().zip(lookups) {
			for (index, document) in documents.iter().enumerate() {
				let Some(value) = document.get(&relationship.source_field) else {
					continue;
				};
				let field = relationship.source_field.clone();
				match (&lookup, value) {
					(None, value) => {
						if relationship.relationship_type == RelationshipType::Embedded {
							maps[index].insert(field, value.clone());
						}
					}
					(Some(by_key), Bson::Array(items)) => {
						let found: Vec<Bson> = items
							.iter()
							.filter_map(|item| by_key.get(&lookup_key(item)))
							.cloned()
							.map(Bson::Document)
							.collect();
						maps[index].insert(field, found);
					}
					(Some(by_key), scalar) => {
						if let Some(target) = by_key.get(&lookup_key(scalar)) {
							maps[index].insert(field, target.clone());
						}
					}
				}
			}
		}

		for (document, map) in resolved.iter_mut().zip(maps) {
			document.insert(RELATIONSHIPS_KEY, map);
		}
		Ok(resolved)
	}
}

fn effective_depth(depth: i32) -> i32 {
	if depth <= 0 {
		return 0;
	}
	if depth > MAX_DEPTH {
		tracing::debug!(requested = depth, max = MAX_DEPTH, "Clamping relationship depth");
	}
	depth.min(MAX_DEPTH)
}

/// DBRef values are looked up by their embedded `$id`
fn reference_key(value: &Bson) -> Bson {
	match value {
		Bson::Document(reference) if is_dbref(reference) => {
			reference.get("$id").cloned().unwrap_or(Bson::Null)
		}
		other => other.clone(),
	}
}

/// Numbers share one key form, as `$in` matches across numeric types
fn lookup_key(value: &Bson) -> String {
	let key = reference_key(value);
	match monglo_db::value::as_f64(&key) {
		Some(number) => format!("number:{number}"),
		None => format!("{key:?}"),
	}
}

fn membership_filter<'a>(
	relationship: &Relationship,
	values: impl Iterator<Item = &'a Bson>,
) -> Document {
	let values: Vec<Bson> = values.map(reference_key).collect();
	let mut filter = Document::new();
	filter.insert(relationship.target_field.clone(), doc! { "$in": values });
	filter
}
