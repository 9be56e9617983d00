//! Option and result types shared by every backend

use bson::Document;

/// Options for `find_many`
///
/// # Example
///
/// ```rust
/// use monglo_db::FindOptions;
/// use bson::doc;
///
/// let options = FindOptions::new()
///     .sort(doc! { "created_at": -1 })
///     .skip(20)
///     .limit(10);
/// assert_eq!(options.limit, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
	/// Maximum number of documents to return
	pub limit: Option<i64>,
	/// Number of documents to skip
	pub skip: Option<u64>,
	/// Sort specification (`{field: 1 | -1}`), applied in key order
	pub sort: Option<Document>,
	/// Projection specification
	pub projection: Option<Document>,
	/// Cursor batch size hint
	pub batch_size: Option<u32>,
}

impl FindOptions {
	/// Create empty options
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the result limit
	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Set the number of documents to skip
	pub fn skip(mut self, skip: u64) -> Self {
		self.skip = Some(skip);
		self
	}

	/// Set the sort specification
	pub fn sort(mut self, sort: Document) -> Self {
		self.sort = Some(sort);
		self
	}

	/// Set the projection, `None` keeps every field
	pub fn projection(mut self, projection: Option<Document>) -> Self {
		self.projection = projection;
		self
	}

	/// Set the cursor batch size
	pub fn batch_size(mut self, size: u32) -> Self {
		self.batch_size = Some(size);
		self
	}
}

/// Outcome of an update or replace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
	/// Number of documents matched by the filter
	pub matched_count: u64,
	/// Number of documents actually modified
	pub modified_count: u64,
}

impl UpdateResult {
	pub fn new(matched_count: u64, modified_count: u64) -> Self {
		Self {
			matched_count,
			modified_count,
		}
	}
}
