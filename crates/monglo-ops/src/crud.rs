//! Create, read, update and delete on one registered collection
//!
//! Identifiers arrive as hex strings and are converted to native object ids
//! before any store round-trip; a malformed identifier fails with
//! [`AdminError::InvalidId`] and never reaches the store.

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use monglo_core::error::{AdminError, AdminResult};
use monglo_core::query_builder::{ID_FIELD, QueryBuilder, SortOrder, SortSpec};
use monglo_core::registry::CollectionAdmin;
use monglo_core::relationships::RelationshipResolver;
use monglo_db::{DocumentBackend, FindOptions};
use serde::Serialize;
use tracing::debug;

use crate::pagination::PageResult;

/// Parameters of [`CrudOperations::list`]
///
/// # Examples
///
/// ```rust
/// use monglo_ops::crud::ListQuery;
/// use monglo_core::SortOrder;
/// use bson::doc;
///
/// let query = ListQuery::new()
///     .page(2)
///     .per_page(50)
///     .filters(doc! { "status": "active", "age__gte": 18 })
///     .sort(vec![("created_at".to_string(), SortOrder::Descending)])
///     .search("smith");
/// assert_eq!(query.page, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
	pub page: i64,
	pub per_page: i64,
	/// `field` / `field__operator` filter spec, see [`QueryBuilder::build_filter`]
	pub filters: Option<Document>,
	pub sort: Option<SortSpec>,
	pub search: Option<String>,
	pub projection: Option<Document>,
}

impl Default for ListQuery {
	fn default() -> Self {
		Self {
			page: 1,
			per_page: 20,
			filters: None,
			sort: None,
			search: None,
			projection: None,
		}
	}
}

impl ListQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn page(mut self, page: i64) -> Self {
		self.page = page;
		self
	}

	pub fn per_page(mut self, per_page: i64) -> Self {
		self.per_page = per_page;
		self
	}

	pub fn filters(mut self, filters: Document) -> Self {
		self.filters = Some(filters);
		self
	}

	pub fn sort(mut self, sort: SortSpec) -> Self {
		self.sort = Some(sort);
		self
	}

	pub fn search(mut self, term: impl Into<String>) -> Self {
		self.search = Some(term.into());
		self
	}

	pub fn projection(mut self, projection: Document) -> Self {
		self.projection = Some(projection);
		self
	}
}

/// Outcome of [`CrudOperations::bulk_delete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
	/// Identifiers passed in, including malformed ones
	pub requested_count: usize,
	pub deleted_count: u64,
}

/// Converts a hex identifier to a native object id
pub fn parse_id(id: &str) -> AdminResult<ObjectId> {
	ObjectId::parse_str(id).map_err(|_| AdminError::InvalidId(id.to_string()))
}

/// CRUD handle bound to one registered collection
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use monglo_core::{CollectionAdmin, CollectionConfig};
/// use monglo_db::backends::MemoryBackend;
/// use monglo_ops::crud::CrudOperations;
/// use bson::doc;
///
/// # async fn example() -> monglo_core::AdminResult<()> {
/// let admin = CollectionAdmin::new("users", Arc::new(MemoryBackend::new()), CollectionConfig::default());
/// let crud = CrudOperations::new(Arc::new(admin));
///
/// let created = crud.create(doc! { "name": "Alice" }).await?;
/// let id = created.get_object_id("_id").map(|oid| oid.to_hex()).unwrap_or_default();
/// assert!(crud.exists(&id).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CrudOperations {
	admin: Arc<CollectionAdmin>,
}

impl CrudOperations {
	pub fn new(admin: Arc<CollectionAdmin>) -> Self {
		Self { admin }
	}

	pub fn admin(&self) -> &Arc<CollectionAdmin> {
		&self.admin
	}

	fn database(&self) -> &Arc<dyn DocumentBackend> {
		self.admin.database()
	}

	fn collection(&self) -> &str {
		self.admin.name()
	}

	/// Filter and search combined with AND
	fn build_query(&self, filters: Option<&Document>, search: Option<&str>) -> Document {
		let filter_query = filters.map(QueryBuilder::build_filter).unwrap_or_default();
		let search_fields = self.admin.config().search_fields();
		let search_query = match search {
			Some(term) if !term.is_empty() && !search_fields.is_empty() => {
				QueryBuilder::build_search_query(term, search_fields)
			}
			_ => Document::new(),
		};
		QueryBuilder::combine_queries([filter_query, search_query])
	}

	/// Requested sort, else the configured default sort, else `_id` ascending
	fn resolve_sort(&self, requested: Option<&[(String, SortOrder)]>) -> SortSpec {
		match requested.filter(|s| !s.is_empty()) {
			Some(sort) => sort.to_vec(),
			None => {
				let default_sort = &self.admin.config().table_view.default_sort;
				QueryBuilder::build_sort((!default_sort.is_empty()).then_some(default_sort.as_slice()))
			}
		}
	}

	/// One page of documents with the full count of the combined query.
	pub async fn list(&self, query: &ListQuery) -> AdminResult<PageResult> {
		let combined = self.build_query(query.filters.as_ref(), query.search.as_deref());
		let sort = self.resolve_sort(query.sort.as_deref());
		let max_per_page = u64::from(self.admin.config().pagination.max_per_page);
		let window = QueryBuilder::build_pagination_query(query.page, query.per_page, max_per_page);

		let total = self
			.database()
			.count_documents(self.collection(), combined.clone())
			.await?;
		let items = self
			.database()
			.find_many(
				self.collection(),
				combined,
				FindOptions::new()
					.sort(QueryBuilder::sort_document(&sort))
					.skip(window.skip)
					.limit(window.limit)
					.projection(query.projection.clone()),
			)
			.await?;

		debug!(
			collection = self.collection(),
			page = window.page,
			returned = items.len(),
			total,
			"Listed documents"
		);
		Ok(PageResult::new(items, total, window.page, window.per_page))
	}

	/// Fetches one document by identifier
	pub async fn get(&self, id: &str) -> AdminResult<Document> {
		let oid = parse_id(id)?;
		self.fetch(oid).await
	}

	async fn fetch(&self, id: impl Into<Bson>) -> AdminResult<Document> {
		let id = id.into();
		let mut filter = Document::new();
		filter.insert(ID_FIELD, id.clone());
		self.database()
			.find_one(self.collection(), filter)
			.await?
			.ok_or_else(|| AdminError::NotFound {
				collection: self.collection().to_string(),
				id: display_id(&id),
			})
	}

	/// Inserts `data` and returns the stored document as read back.
	///
	/// A string `_id` in `data` must be a valid object id; other `_id`
	/// values are stored as given.
	pub async fn create(&self, mut data: Document) -> AdminResult<Document> {
		if data.is_empty() {
			return Err(AdminError::Validation(
				"cannot create a document from empty data".to_string(),
			));
		}
		if let Some(Bson::String(raw)) = data.get(ID_FIELD) {
			let oid = parse_id(raw)?;
			data.insert(ID_FIELD, oid);
		}

		let inserted_id = self.database().insert_one(self.collection(), data).await?;
		debug!(collection = self.collection(), id = %inserted_id, "Created document");
		self.fetch(inserted_id).await
	}

	/// Applies `data` to the document and returns it as read back.
	///
	/// With `partial`, only the named fields are set; otherwise the body is
	/// replaced and the identity kept. The identity field in `data` is
	/// ignored. Empty data fails before any write.
	pub async fn update(&self, id: &str, mut data: Document, partial: bool) -> AdminResult<Document> {
		if data.is_empty() {
			return Err(AdminError::Validation(
				"cannot update a document with empty data".to_string(),
			));
		}
		let oid = parse_id(id)?;
		data.remove(ID_FIELD);
		if data.is_empty() {
			return Err(AdminError::Validation(
				"update data contains only the identity field".to_string(),
			));
		}

		let filter = doc! { ID_FIELD: oid };
		let result = if partial {
			self.database()
				.update_one(self.collection(), filter, doc! { "$set": data })
				.await?
		} else {
			self.database()
				.replace_one(self.collection(), filter, data)
				.await?
		};

		if result.matched_count == 0 {
			return Err(AdminError::NotFound {
				collection: self.collection().to_string(),
				id: id.to_string(),
			});
		}
		debug!(
			collection = self.collection(),
			id,
			partial,
			modified = result.modified_count,
			"Updated document"
		);
		self.fetch(oid).await
	}

	/// Deletes one document, returning whether it existed
	pub async fn delete(&self, id: &str) -> AdminResult<bool> {
		let oid = parse_id(id)?;
		let deleted = self
			.database()
			.delete_one(self.collection(), doc! { ID_FIELD: oid })
			.await?;
		Ok(deleted > 0)
	}

	/// Deletes every document whose identifier parses; malformed ones are
	/// skipped.
	pub async fn bulk_delete(&self, ids: &[String]) -> AdminResult<BulkDeleteResult> {
		let oids: Vec<Bson> = ids
			.iter()
			.filter_map(|id| parse_id(id).ok())
			.map(Bson::ObjectId)
			.collect();
		let skipped = ids.len() - oids.len();
		if skipped > 0 {
			debug!(collection = self.collection(), skipped, "Skipped malformed ids in bulk delete");
		}

		let deleted_count = if oids.is_empty() {
			0
		} else {
			self.database()
				.delete_many(self.collection(), doc! { ID_FIELD: { "$in": oids } })
				.await?
		};
		Ok(BulkDeleteResult {
			requested_count: ids.len(),
			deleted_count,
		})
	}

	/// Documents matching the filter spec, or all documents
	pub async fn count(&self, filters: Option<&Document>) -> AdminResult<u64> {
		let query = self.build_query(filters, None);
		Ok(self
			.database()
			.count_documents(self.collection(), query)
			.await?)
	}

	/// Whether a document with this identifier exists; a malformed
	/// identifier counts as absent.
	pub async fn exists(&self, id: &str) -> AdminResult<bool> {
		match self.get(id).await {
			Ok(_) => Ok(true),
			Err(AdminError::NotFound { .. } | AdminError::InvalidId(_)) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Fetches one document with its related documents attached
	pub async fn get_with_relationships(&self, id: &str) -> AdminResult<Document> {
		let document = self.get(id).await?;
		let depth = self.admin.config().document_view.relationship_depth as i32;
		RelationshipResolver::new(Arc::clone(self.database()))
			.resolve(&document, self.admin.relationships(), depth)
			.await
	}

	/// [`list`](Self::list) with related documents attached in one query
	/// per relationship
	pub async fn list_with_relationships(&self, query: &ListQuery) -> AdminResult<PageResult> {
		let mut page = self.list(query).await?;
		let depth = self.admin.config().document_view.relationship_depth as i32;
		page.items = RelationshipResolver::new(Arc::clone(self.database()))
			.resolve_batch(&page.items, self.admin.relationships(), depth)
			.await?;
		Ok(page)
	}
}

fn display_id(id: &Bson) -> String {
	match id {
		Bson::ObjectId(oid) => oid.to_hex(),
		Bson::String(text) => text.clone(),
		other => other.to_string(),
	}
}
