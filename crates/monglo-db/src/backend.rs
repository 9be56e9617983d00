//! Document-oriented store trait
//!
//! Every administrative operation talks to the database exclusively through
//! [`DocumentBackend`], so the same code runs against a live MongoDB
//! deployment or the in-memory backend.

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::error::Result;
use crate::types::{FindOptions, UpdateResult};

/// Trait for document-oriented stores
///
/// # Example
///
/// ```rust,ignore
/// use monglo_db::DocumentBackend;
/// use bson::doc;
///
/// async fn find_user(db: &dyn DocumentBackend, email: &str) -> Result<Option<Document>> {
///     db.find_one("users", doc! { "email": email }).await
/// }
/// ```
#[async_trait]
pub trait DocumentBackend: Send + Sync {
	/// Short backend identifier (`"mongodb"`, `"memory"`)
	fn backend_name(&self) -> &'static str;

	/// Checks that the store is reachable
	async fn health_check(&self) -> Result<()>;

	/// Lists every collection in the database
	async fn list_collection_names(&self) -> Result<Vec<String>>;

	/// Finds a single document matching the filter
	///
	/// # Returns
	///
	/// Returns `Some(Document)` if a matching document is found, `None` otherwise.
	async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

	/// Finds multiple documents matching the filter
	///
	/// # Arguments
	///
	/// * `collection` - The name of the collection to search
	/// * `filter` - The filter criteria as a document
	/// * `options` - Query options (limit, skip, sort, projection)
	///
	/// # Example
	///
	/// ```rust,ignore
	/// let options = FindOptions::new().limit(10).sort(doc! { "created_at": -1 });
	/// let users = db.find_many("users", doc! { "active": true }, options).await?;
	/// ```
	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> Result<Vec<Document>>;

	/// Counts documents matching the filter
	async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64>;

	/// Distinct values of `field` among documents matching the filter
	///
	/// Array values are flattened into their elements.
	async fn distinct(&self, collection: &str, field: &str, filter: Document) -> Result<Vec<Bson>>;

	/// Inserts a single document into the collection
	///
	/// # Returns
	///
	/// Returns the `_id` of the stored document, server-assigned when the
	/// input carried none.
	async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

	/// Applies an update document (`$set`, `$unset`, ...) to the first match
	async fn update_one(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult>;

	/// Replaces the body of the first match, keeping its `_id`
	async fn replace_one(
		&self,
		collection: &str,
		filter: Document,
		replacement: Document,
	) -> Result<UpdateResult>;

	/// Deletes a single document matching the filter
	///
	/// # Returns
	///
	/// Returns the number of documents deleted (0 or 1).
	async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;

	/// Deletes every document matching the filter
	async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64>;

	/// Runs an aggregation pipeline
	///
	/// # Example
	///
	/// ```rust,ignore
	/// let rows = db.aggregate("orders", vec![
	///     doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
	/// ]).await?;
	/// ```
	async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>>;

	/// Lists index specifications (`{name, key, unique?}`) of a collection
	async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>>;
}
