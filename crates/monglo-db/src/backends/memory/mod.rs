//! In-memory document backend
//!
//! Keeps every collection in process memory and evaluates the same query,
//! update and pipeline documents the MongoDB backend sends to the server.
//! It backs the test suite and embedded use where no server is available.
//!
//! # Example
//!
//! ```rust
//! use monglo_db::backends::memory::MemoryBackend;
//! use monglo_db::DocumentBackend;
//! use bson::doc;
//!
//! # async fn example() -> monglo_db::Result<()> {
//! let backend = MemoryBackend::new();
//! backend.seed("users", vec![doc! { "name": "Alice" }])?;
//!
//! let alice = backend.find_one("users", doc! { "name": "Alice" }).await?;
//! assert!(alice.is_some());
//! # Ok(())
//! # }
//! ```

mod filter;
mod pipeline;
mod query;

pub use filter::matches;
pub use pipeline::{evaluate, run_pipeline};
pub use query::{apply_projection, apply_update, sort_documents};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::backend::DocumentBackend;
use crate::error::{DbError, Result};
use crate::types::{FindOptions, UpdateResult};
use crate::value::{bson_eq, get_path, values_at_path};

#[derive(Debug, Clone)]
struct IndexSpec {
	name: String,
	keys: Document,
	unique: bool,
}

#[derive(Debug, Default)]
struct Collection {
	documents: Vec<Document>,
	indexes: Vec<IndexSpec>,
}

#[derive(Debug, Default)]
struct MemoryState {
	collections: RwLock<IndexMap<String, Collection>>,
	reads: AtomicU64,
}

/// In-memory implementation of [`DocumentBackend`]
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	state: Arc<MemoryState>,
}

impl MemoryBackend {
	/// Create an empty backend
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts documents synchronously, creating the collection if needed.
	///
	/// Returns the stored `_id` values in input order.
	pub fn seed(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<Bson>> {
		let mut collections = self.state.collections.write();
		let target = collections.entry(collection.to_string()).or_default();
		documents
			.into_iter()
			.map(|document| insert_into(target, collection, document))
			.collect()
	}

	/// Creates an empty collection; no-op when it already exists.
	pub fn create_collection(&self, collection: &str) {
		self.state
			.collections
			.write()
			.entry(collection.to_string())
			.or_default();
	}

	/// Drops a collection, returning whether it existed.
	pub fn drop_collection(&self, collection: &str) -> bool {
		self.state.collections.write().shift_remove(collection).is_some()
	}

	/// Declares an index; unique indexes are enforced on insert.
	///
	/// Returns the generated index name (`field_1_other_-1`).
	pub fn create_index(&self, collection: &str, keys: Document, unique: bool) -> String {
		let name = keys
			.iter()
			.map(|(field, direction)| format!("{field}_{direction}"))
			.collect::<Vec<_>>()
			.join("_");
		let mut collections = self.state.collections.write();
		let target = collections.entry(collection.to_string()).or_default();
		target.indexes.retain(|index| index.name != name);
		target.indexes.push(IndexSpec {
			name: name.clone(),
			keys,
			unique,
		});
		name
	}

	/// Number of read round-trips served since creation or the last reset
	///
	/// Counts `find_one`, `find_many`, `count_documents`, `distinct` and
	/// `aggregate` calls.
	pub fn query_count(&self) -> u64 {
		self.state.reads.load(Ordering::SeqCst)
	}

	/// Resets the read counter
	pub fn reset_query_count(&self) {
		self.state.reads.store(0, Ordering::SeqCst);
	}

	fn record_read(&self) {
		self.state.reads.fetch_add(1, Ordering::SeqCst);
	}

	fn matching(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
		let collections = self.state.collections.read();
		let Some(target) = collections.get(collection) else {
			return Ok(Vec::new());
		};
		let mut out = Vec::new();
		for document in &target.documents {
			if matches(document, filter)? {
				out.push(document.clone());
			}
		}
		Ok(out)
	}

	fn modify_first(
		&self,
		collection: &str,
		filter: &Document,
		apply: impl FnOnce(&mut Document) -> Result<bool>,
	) -> Result<UpdateResult> {
		let mut collections = self.state.collections.write();
		let Some(target) = collections.get_mut(collection) else {
			return Ok(UpdateResult::default());
		};
		for document in target.documents.iter_mut() {
			if matches(document, filter)? {
				let mut candidate = document.clone();
				let modified = apply(&mut candidate)?;
				*document = candidate;
				return Ok(UpdateResult::new(1, u64::from(modified)));
			}
		}
		Ok(UpdateResult::default())
	}
}

fn insert_into(target: &mut Collection, name: &str, mut document: Document) -> Result<Bson> {
	let id = match document.get("_id") {
		Some(id) => id.clone(),
		None => {
			let id = Bson::ObjectId(ObjectId::new());
			let mut with_id = doc! { "_id": id.clone() };
			with_id.extend(document);
			document = with_id;
			id
		}
	};

	if target
		.documents
		.iter()
		.any(|existing| existing.get("_id").is_some_and(|other| bson_eq(other, &id)))
	{
		return Err(DbError::DuplicateKey(format!(
			"{name} already contains a document with _id {id}"
		)));
	}

	for index in target.indexes.iter().filter(|index| index.unique) {
		let key: Vec<Option<&Bson>> = index.keys.keys().map(|k| get_path(&document, k)).collect();
		let clash = target.documents.iter().any(|existing| {
			index
				.keys
				.keys()
				.zip(&key)
				.all(|(field, value)| match (get_path(existing, field), value) {
					(Some(a), Some(b)) => bson_eq(a, b),
					(None, None) => true,
					_ => false,
				})
		});
		if clash {
			return Err(DbError::DuplicateKey(format!(
				"{name} violates unique index {}",
				index.name
			)));
		}
	}

	target.documents.push(document);
	Ok(id)
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
	fn backend_name(&self) -> &'static str {
		"memory"
	}

	async fn health_check(&self) -> Result<()> {
		Ok(())
	}

	async fn list_collection_names(&self) -> Result<Vec<String>> {
		Ok(self.state.collections.read().keys().cloned().collect())
	}

	async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
		self.record_read();
		let collections = self.state.collections.read();
		let Some(target) = collections.get(collection) else {
			return Ok(None);
		};
		for document in &target.documents {
			if matches(document, &filter)? {
				return Ok(Some(document.clone()));
			}
		}
		Ok(None)
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> Result<Vec<Document>> {
		self.record_read();
		let mut documents = self.matching(collection, &filter)?;
		if let Some(sort) = &options.sort {
			sort_documents(&mut documents, sort);
		}
		let skip = options.skip.unwrap_or(0) as usize;
		// A negative limit means "single batch" in the driver; treat it as its magnitude.
		let limit = match options.limit {
			Some(0) | None => usize::MAX,
			Some(n) => n.unsigned_abs() as usize,
		};
		documents
			.into_iter()
			.skip(skip)
			.take(limit)
			.map(|document| match &options.projection {
				Some(projection) => apply_projection(&document, projection),
				None => Ok(document),
			})
			.collect()
	}

	async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
		self.record_read();
		Ok(self.matching(collection, &filter)?.len() as u64)
	}

	async fn distinct(&self, collection: &str, field: &str, filter: Document) -> Result<Vec<Bson>> {
		self.record_read();
		let mut seen: Vec<Bson> = Vec::new();
		for document in self.matching(collection, &filter)? {
			for value in values_at_path(&document, field) {
				let items = match value {
					Bson::Array(items) => items.clone(),
					other => vec![other.clone()],
				};
				for item in items {
					if !seen.iter().any(|existing| bson_eq(existing, &item)) {
						seen.push(item);
					}
				}
			}
		}
		Ok(seen)
	}

	async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
		let mut collections = self.state.collections.write();
		let target = collections.entry(collection.to_string()).or_default();
		insert_into(target, collection, document)
	}

	async fn update_one(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult> {
		self.modify_first(collection, &filter, |document| {
			apply_update(document, &update)
		})
	}

	async fn replace_one(
		&self,
		collection: &str,
		filter: Document,
		replacement: Document,
	) -> Result<UpdateResult> {
		self.modify_first(collection, &filter, |document| {
			query::apply_replacement(document, &replacement)
		})
	}

	async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
		let mut collections = self.state.collections.write();
		let Some(target) = collections.get_mut(collection) else {
			return Ok(0);
		};
		let mut position = None;
		for (index, document) in target.documents.iter().enumerate() {
			if matches(document, &filter)? {
				position = Some(index);
				break;
			}
		}
		Ok(match position {
			Some(index) => {
				target.documents.remove(index);
				1
			}
			None => 0,
		})
	}

	async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
		let mut collections = self.state.collections.write();
		let Some(target) = collections.get_mut(collection) else {
			return Ok(0);
		};
		let doomed = target
			.documents
			.iter()
			.map(|document| matches(document, &filter))
			.collect::<Result<Vec<bool>>>()?;
		let before = target.documents.len();
		let mut flags = doomed.into_iter();
		target
			.documents
			.retain(|_| !flags.next().unwrap_or(false));
		Ok((before - target.documents.len()) as u64)
	}

	async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
		self.record_read();
		let documents = self.matching(collection, &Document::new())?;
		run_pipeline(documents, &pipeline)
	}

	async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>> {
		let collections = self.state.collections.read();
		let Some(target) = collections.get(collection) else {
			return Err(DbError::Execution(format!("ns does not exist: {collection}")));
		};
		let mut indexes = vec![doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" }];
		indexes.extend(target.indexes.iter().map(|index| {
			let mut spec = doc! { "v": 2, "key": index.keys.clone(), "name": index.name.clone() };
			if index.unique {
				spec.insert("unique", true);
			}
			spec
		}));
		Ok(indexes)
	}
}
