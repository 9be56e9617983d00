//! MongoDB connection and backend implementation
//!
//! # Example
//!
//! ```rust,no_run
//! use monglo_db::backends::mongodb::MongoDBBackend;
//! use monglo_db::DocumentBackend;
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MongoDBBackend::connect("mongodb://localhost:27017")
//!     .await?
//!     .with_database("shop");
//!
//! let names = backend.list_collection_names().await?;
//! let first_order = backend.find_one("orders", doc! {}).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::stream::TryStreamExt;
use mongodb::{Client, ClientSession, Database};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::DocumentBackend;
use crate::error::{DbError, Result};
use crate::types::{FindOptions, UpdateResult};

/// MongoDB backend implementation
///
/// Holds a pooled driver client; clones share the pool.
///
/// # Example
///
/// ```rust,no_run
/// use monglo_db::backends::mongodb::MongoDBBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MongoDBBackend::builder()
///     .url("mongodb://localhost:27017")
///     .database("shop")
///     .max_pool_size(50)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MongoDBBackend {
	client: Arc<Client>,
	database_name: String,
}

/// A server-side transaction bound to one driver session
///
/// Transactions require a replica set or sharded cluster.
pub struct MongoDBTransaction {
	session: Option<ClientSession>,
}

impl MongoDBTransaction {
	/// The session to pass to driver calls that should join the transaction
	pub fn session(&mut self) -> Result<&mut ClientSession> {
		self.session
			.as_mut()
			.ok_or_else(|| DbError::InvalidOperation("Transaction already consumed".to_string()))
	}

	/// Commit the transaction
	pub async fn commit(mut self) -> Result<()> {
		let mut session = self
			.session
			.take()
			.ok_or_else(|| DbError::InvalidOperation("Transaction already consumed".to_string()))?;
		session.commit_transaction().await.map_err(DbError::from)
	}

	/// Abort the transaction
	pub async fn rollback(mut self) -> Result<()> {
		let mut session = self
			.session
			.take()
			.ok_or_else(|| DbError::InvalidOperation("Transaction already consumed".to_string()))?;
		session.abort_transaction().await.map_err(DbError::from)
	}
}

/// Builder for configuring MongoDB connections
pub struct MongoDBBackendBuilder {
	url: String,
	database: String,
	max_pool_size: Option<u32>,
	min_pool_size: Option<u32>,
	max_idle_time_secs: Option<u64>,
}

impl Default for MongoDBBackendBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl MongoDBBackendBuilder {
	/// Create a builder pointing at `mongodb://localhost:27017`, database `test`
	pub fn new() -> Self {
		Self {
			url: "mongodb://localhost:27017".to_string(),
			database: "test".to_string(),
			max_pool_size: None,
			min_pool_size: None,
			max_idle_time_secs: None,
		}
	}

	/// Set the connection string
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	/// Set the database name
	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = database.into();
		self
	}

	/// Set the maximum connection pool size
	pub fn max_pool_size(mut self, size: u32) -> Self {
		self.max_pool_size = Some(size);
		self
	}

	/// Set the minimum connection pool size
	pub fn min_pool_size(mut self, size: u32) -> Self {
		self.min_pool_size = Some(size);
		self
	}

	/// Set the maximum idle time for pooled connections in seconds
	pub fn max_idle_time_secs(mut self, secs: u64) -> Self {
		self.max_idle_time_secs = Some(secs);
		self
	}

	/// Build the backend
	///
	/// The driver connects lazily; use [`DocumentBackend::health_check`] to
	/// verify reachability.
	pub async fn build(self) -> Result<MongoDBBackend> {
		use mongodb::options::ClientOptions;

		let mut options = ClientOptions::parse(&self.url)
			.await
			.map_err(|e| DbError::Connection(e.to_string()))?;

		if let Some(max_size) = self.max_pool_size {
			options.max_pool_size = Some(max_size);
		}
		if let Some(min_size) = self.min_pool_size {
			options.min_pool_size = Some(min_size);
		}
		if let Some(idle_time) = self.max_idle_time_secs {
			options.max_idle_time = Some(Duration::from_secs(idle_time));
		}

		let client =
			Client::with_options(options).map_err(|e| DbError::Connection(e.to_string()))?;

		tracing::debug!(database = %self.database, "MongoDB client created");

		Ok(MongoDBBackend {
			client: Arc::new(client),
			database_name: self.database,
		})
	}
}

impl MongoDBBackend {
	/// Connect using a connection string, database `test`
	pub async fn connect(url: &str) -> Result<Self> {
		let client = Client::with_uri_str(url)
			.await
			.map_err(|e| DbError::Connection(e.to_string()))?;

		Ok(Self {
			client: Arc::new(client),
			database_name: "test".to_string(),
		})
	}

	/// Create a builder for configuring the connection
	pub fn builder() -> MongoDBBackendBuilder {
		MongoDBBackendBuilder::new()
	}

	/// Switch to another database on the same client
	pub fn with_database(mut self, database_name: &str) -> Self {
		self.database_name = database_name.to_string();
		self
	}

	/// Name of the database this backend operates on
	pub fn database_name(&self) -> &str {
		&self.database_name
	}

	/// The driver database handle
	pub fn database(&self) -> Database {
		self.client.database(&self.database_name)
	}

	fn collection(&self, name: &str) -> mongodb::Collection<Document> {
		self.database().collection::<Document>(name)
	}

	/// Begin a transaction on a fresh session
	pub async fn begin_transaction(&self) -> Result<MongoDBTransaction> {
		let mut session = self.client.start_session().await.map_err(|e| {
			DbError::Connection(format!("Failed to start MongoDB session: {}", e))
		})?;

		session.start_transaction().await.map_err(DbError::from)?;

		Ok(MongoDBTransaction {
			session: Some(session),
		})
	}
}

#[async_trait]
impl DocumentBackend for MongoDBBackend {
	fn backend_name(&self) -> &'static str {
		"mongodb"
	}

	async fn health_check(&self) -> Result<()> {
		self.database()
			.run_command(doc! { "ping": 1 })
			.await
			.map_err(|e| DbError::Connection(format!("Health check failed: {}", e)))?;
		Ok(())
	}

	async fn list_collection_names(&self) -> Result<Vec<String>> {
		Ok(self.database().list_collection_names().await?)
	}

	async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
		Ok(self.collection(collection).find_one(filter).await?)
	}

	async fn find_many(
		&self,
		collection: &str,
		filter: Document,
		options: FindOptions,
	) -> Result<Vec<Document>> {
		let mut mongo_options = mongodb::options::FindOptions::default();
		mongo_options.limit = options.limit;
		mongo_options.skip = options.skip;
		mongo_options.sort = options.sort;
		mongo_options.projection = options.projection;
		mongo_options.batch_size = options.batch_size;

		let cursor = self
			.collection(collection)
			.find(filter)
			.with_options(mongo_options)
			.await?;

		Ok(cursor.try_collect().await?)
	}

	async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
		Ok(self.collection(collection).count_documents(filter).await?)
	}

	async fn distinct(&self, collection: &str, field: &str, filter: Document) -> Result<Vec<Bson>> {
		Ok(self.collection(collection).distinct(field, filter).await?)
	}

	async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
		let result = self.collection(collection).insert_one(document).await?;
		Ok(result.inserted_id)
	}

	async fn update_one(
		&self,
		collection: &str,
		filter: Document,
		update: Document,
	) -> Result<UpdateResult> {
		let result = self.collection(collection).update_one(filter, update).await?;
		Ok(UpdateResult::new(result.matched_count, result.modified_count))
	}

	async fn replace_one(
		&self,
		collection: &str,
		filter: Document,
		replacement: Document,
	) -> Result<UpdateResult> {
		let result = self
			.collection(collection)
			.replace_one(filter, replacement)
			.await?;
		Ok(UpdateResult::new(result.matched_count, result.modified_count))
	}

	async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
		Ok(self.collection(collection).delete_one(filter).await?.deleted_count)
	}

	async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64> {
		Ok(self.collection(collection).delete_many(filter).await?.deleted_count)
	}

	async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
		let cursor = self.collection(collection).aggregate(pipeline).await?;
		Ok(cursor.try_collect().await?)
	}

	async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>> {
		let cursor = self.collection(collection).list_indexes().await?;
		let models: Vec<mongodb::IndexModel> = cursor.try_collect().await?;
		models
			.into_iter()
			.map(|model| {
				let mut spec = doc! { "key": model.keys };
				if let Some(options) = model.options {
					if let Some(name) = options.name {
						spec.insert("name", name);
					}
					if let Some(unique) = options.unique {
						spec.insert("unique", unique);
					}
				}
				Ok(spec)
			})
			.collect()
	}
}
