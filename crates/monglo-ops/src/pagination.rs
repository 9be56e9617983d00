//! Offset and cursor pagination
//!
//! Offset pagination counts the matching documents and slices with
//! skip/limit, which allows jumping to any page. Cursor pagination continues
//! after the last sort value of the previous page, fetching one extra
//! document to learn whether another page exists; it never counts.
//!
//! Cursor pages neither overlap nor skip documents as long as the sort field
//! totally orders the matching documents. Documents sharing a sort value at
//! a page boundary may be skipped.

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use monglo_core::error::{AdminError, AdminResult};
use monglo_core::query_builder::{ID_FIELD, QueryBuilder, SortOrder};
use monglo_db::value::get_path;
use monglo_db::{DocumentBackend, FindOptions};
use serde::Serialize;

/// Page size ceiling applied when none is configured
pub const DEFAULT_MAX_PER_PAGE: u64 = 100;

/// One page of an offset-paginated listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
	pub items: Vec<Document>,
	/// Documents matching the query across all pages
	pub total: u64,
	pub page: u64,
	pub per_page: u64,
	pub pages: u64,
	pub has_next: bool,
	pub has_prev: bool,
}

impl PageResult {
	/// Assembles the page metadata from a clamped page window.
	pub fn new(items: Vec<Document>, total: u64, page: u64, per_page: u64) -> Self {
		let pages = total.div_ceil(per_page.max(1));
		Self {
			items,
			total,
			page,
			per_page,
			pages,
			has_next: page < pages,
			has_prev: page > 1,
		}
	}
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorPage {
	pub items: Vec<Document>,
	pub per_page: u64,
	pub has_next: bool,
	/// Token for the following page, present only when `has_next`
	pub next_cursor: Option<String>,
	pub sort_field: String,
}

/// Counts without items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
	pub total: u64,
	pub per_page: u64,
	pub total_pages: u64,
}

/// Paginates raw queries against one collection
#[derive(Clone)]
pub struct PaginationHandler {
	database: Arc<dyn DocumentBackend>,
	collection: String,
	max_per_page: u64,
}

impl PaginationHandler {
	pub fn new(database: Arc<dyn DocumentBackend>, collection: impl Into<String>) -> Self {
		Self {
			database,
			collection: collection.into(),
			max_per_page: DEFAULT_MAX_PER_PAGE,
		}
	}

	pub fn with_max_per_page(mut self, max_per_page: u64) -> Self {
		self.max_per_page = max_per_page.max(1);
		self
	}

	/// Offset strategy: skip/limit with a full count of `query`.
	///
	/// `page` is clamped to at least 1 and `per_page` to `[1, max_per_page]`.
	/// A page past the end has no items but keeps the real `total`.
	///
	/// # Examples
	///
	/// ```rust
	/// use std::sync::Arc;
	/// use monglo_ops::pagination::PaginationHandler;
	/// use monglo_db::backends::MemoryBackend;
	/// use bson::{doc, Document};
	///
	/// # async fn example() -> monglo_core::AdminResult<()> {
	/// let backend = MemoryBackend::new();
	/// backend.seed("events", (0..47).map(|i| doc! { "n": i }).collect())?;
	///
	/// let handler = PaginationHandler::new(Arc::new(backend), "events");
	/// let last = handler.paginate_offset(Document::new(), 5, 10, None, None).await?;
	///
	/// assert_eq!(last.items.len(), 7);
	/// assert_eq!(last.pages, 5);
	/// assert!(!last.has_next);
	/// # Ok(())
	/// # }
	/// ```
	pub async fn paginate_offset(
		&self,
		query: Document,
		page: i64,
		per_page: i64,
		sort: Option<&[(String, SortOrder)]>,
		projection: Option<Document>,
	) -> AdminResult<PageResult> {
		let window = QueryBuilder::build_pagination_query(page, per_page, self.max_per_page);
		let total = self
			.database
			.count_documents(&self.collection, query.clone())
			.await?;

		let mut options = FindOptions::new()
			.skip(window.skip)
			.limit(window.limit)
			.projection(projection);
		if let Some(sort) = sort.filter(|s| !s.is_empty()) {
			options = options.sort(QueryBuilder::sort_document(sort));
		}
		let items = self
			.database
			.find_many(&self.collection, query, options)
			.await?;

		Ok(PageResult::new(items, total, window.page, window.per_page))
	}

	/// Cursor strategy: documents strictly after `cursor` in sort order.
	///
	/// `cursor` is the `next_cursor` of the previous page, or `None` for the
	/// first page. Fetches `per_page + 1` documents and never counts.
	pub async fn paginate_cursor(
		&self,
		query: Document,
		cursor: Option<&str>,
		per_page: i64,
		sort_field: &str,
		direction: SortOrder,
		projection: Option<Document>,
	) -> AdminResult<CursorPage> {
		let per_page = (per_page.max(1) as u64).min(self.max_per_page);

		let query = match cursor {
			Some(token) => {
				let value = decode_cursor(token)?;
				let operator = match direction {
					SortOrder::Ascending => "$gt",
					SortOrder::Descending => "$lt",
				};
				let mut continuation = Document::new();
				continuation.insert(sort_field, doc! { operator: value });
				QueryBuilder::combine_queries([query, continuation])
			}
			None => query,
		};

		let mut sort = Document::new();
		sort.insert(sort_field, direction.as_i32());
		let mut items = self
			.database
			.find_many(
				&self.collection,
				query,
				FindOptions::new()
					.sort(sort)
					.limit(per_page as i64 + 1)
					.projection(projection),
			)
			.await?;

		let has_next = items.len() as u64 > per_page;
		items.truncate(per_page as usize);
		let next_cursor = if has_next {
			match items.last().and_then(|last| get_path(last, sort_field)) {
				Some(value) => Some(encode_cursor(value)?),
				None => None,
			}
		} else {
			None
		};

		Ok(CursorPage {
			items,
			per_page,
			has_next,
			next_cursor,
			sort_field: sort_field.to_string(),
		})
	}

	/// Cursor pagination over the identity field, ascending
	pub async fn paginate_by_id(
		&self,
		query: Document,
		cursor: Option<&str>,
		per_page: i64,
	) -> AdminResult<CursorPage> {
		self.paginate_cursor(query, cursor, per_page, ID_FIELD, SortOrder::Ascending, None)
			.await
	}

	/// Total and page count for `query` without fetching items
	pub async fn get_page_info(&self, query: Document, per_page: i64) -> AdminResult<PageInfo> {
		let per_page = per_page.max(1) as u64;
		let total = self
			.database
			.count_documents(&self.collection, query)
			.await?;
		Ok(PageInfo {
			total,
			per_page,
			total_pages: total.div_ceil(per_page),
		})
	}
}

/// Encodes a sort value as an opaque cursor token.
///
/// The token is the hex form of a type tag and the value's text, so the
/// value comes back with its original type. Only scalar sort values can be
/// encoded.
pub fn encode_cursor(value: &Bson) -> AdminResult<String> {
	let plain = match value {
		Bson::ObjectId(oid) => format!("o:{}", oid.to_hex()),
		Bson::String(text) => format!("s:{text}"),
		Bson::Int32(n) => format!("i:{n}"),
		Bson::Int64(n) => format!("l:{n}"),
		Bson::Double(n) => format!("f:{n}"),
		Bson::DateTime(dt) => format!("d:{}", dt.timestamp_millis()),
		Bson::Boolean(flag) => format!("b:{flag}"),
		other => {
			return Err(AdminError::Validation(format!(
				"cannot paginate on a {:?} sort value",
				other.element_type()
			)));
		}
	};
	Ok(hex::encode(plain))
}

/// Decodes a token produced by [`encode_cursor`]
pub fn decode_cursor(token: &str) -> AdminResult<Bson> {
	let malformed = || AdminError::Validation(format!("malformed cursor '{token}'"));
	let bytes = hex::decode(token).map_err(|_| malformed())?;
	let plain = String::from_utf8(bytes).map_err(|_| malformed())?;
	let (tag, raw) = plain.split_once(':').ok_or_else(malformed)?;

	let value = match tag {
		"o" => Bson::ObjectId(ObjectId::parse_str(raw).map_err(|_| malformed())?),
		"s" => Bson::String(raw.to_string()),
		"i" => Bson::Int32(raw.parse().map_err(|_| malformed())?),
		"l" => Bson::Int64(raw.parse().map_err(|_| malformed())?),
		"f" => Bson::Double(raw.parse().map_err(|_| malformed())?),
		"d" => Bson::DateTime(bson::DateTime::from_millis(
			raw.parse().map_err(|_| malformed())?,
		)),
		"b" => Bson::Boolean(raw.parse().map_err(|_| malformed())?),
		_ => return Err(malformed()),
	};
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;
	use monglo_db::backends::MemoryBackend;
	use rstest::*;

	#[fixture]
	fn events() -> MemoryBackend {
		let backend = MemoryBackend::new();
		let docs: Vec<Document> = (0..47)
			.map(|i| doc! { "seq": i, "kind": if i % 2 == 0 { "even" } else { "odd" } })
			.collect();
		backend.seed("events", docs).expect("seeding should succeed");
		backend
	}

	#[rstest]
	#[case(Bson::ObjectId(ObjectId::new()))]
	#[case(Bson::String("b:tricky:value".to_string()))]
	#[case(Bson::Int32(-7))]
	#[case(Bson::Int64(1 << 40))]
	#[case(Bson::Double(2.5))]
	#[case(Bson::DateTime(bson::DateTime::from_millis(1_700_000_000_000)))]
	fn test_cursor_tokens_keep_type(#[case] value: Bson) {
		let token = encode_cursor(&value).expect("scalar should encode");

		assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(decode_cursor(&token).expect("token should decode"), value);
	}

	#[rstest]
	#[case("zz")]
	#[case("")]
	#[case("783a31")]
	fn test_malformed_cursor(#[case] token: &str) {
		assert!(matches!(decode_cursor(token), Err(AdminError::Validation(_))));
	}

	#[rstest]
	fn test_unsupported_cursor_value() {
		assert!(encode_cursor(&Bson::Array(vec![])).is_err());
	}

	#[rstest]
	#[case(1, 10, 10, true, false)]
	#[case(5, 10, 7, false, true)]
	#[case(10, 10, 0, false, true)]
	#[tokio::test]
	async fn test_offset_pages(
		events: MemoryBackend,
		#[case] page: i64,
		#[case] per_page: i64,
		#[case] expected_items: usize,
		#[case] has_next: bool,
		#[case] has_prev: bool,
	) {
		let handler = PaginationHandler::new(Arc::new(events), "events");

		let result = handler
			.paginate_offset(Document::new(), page, per_page, None, None)
			.await
			.expect("pagination should succeed");

		assert_eq!(result.items.len(), expected_items);
		assert_eq!(result.total, 47, "total is independent of the page");
		assert_eq!(result.pages, 5);
		assert_eq!(result.has_next, has_next);
		assert_eq!(result.has_prev, has_prev);
	}

	#[rstest]
	#[tokio::test]
	async fn test_offset_clamps_per_page(events: MemoryBackend) {
		let handler = PaginationHandler::new(Arc::new(events), "events").with_max_per_page(20);

		let result = handler
			.paginate_offset(doc! { "kind": "odd" }, 0, 500, None, None)
			.await
			.expect("pagination should succeed");

		assert_eq!(result.page, 1);
		assert_eq!(result.per_page, 20);
		assert_eq!(result.total, 23);
		assert_eq!(result.pages, 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cursor_walk_visits_every_document_once(events: MemoryBackend) {
		// Arrange
		let handler = PaginationHandler::new(Arc::new(events.clone()), "events");
		let mut seen: Vec<i32> = Vec::new();
		let mut cursor: Option<String> = None;

		// Act
		loop {
			let page = handler
				.paginate_cursor(
					Document::new(),
					cursor.as_deref(),
					10,
					"seq",
					SortOrder::Descending,
					None,
				)
				.await
				.expect("cursor page should load");
			seen.extend(page.items.iter().filter_map(|d| d.get_i32("seq").ok()));
			if !page.has_next {
				assert!(page.next_cursor.is_none());
				break;
			}
			cursor = page.next_cursor;
		}

		// Assert
		let expected: Vec<i32> = (0..47).rev().collect();
		assert_eq!(seen, expected, "pages must neither overlap nor skip");
	}

	#[rstest]
	#[tokio::test]
	async fn test_cursor_does_not_count(events: MemoryBackend) {
		let handler = PaginationHandler::new(Arc::new(events.clone()), "events");
		events.reset_query_count();

		let page = handler
			.paginate_by_id(Document::new(), None, 47)
			.await
			.expect("cursor page should load");

		assert_eq!(events.query_count(), 1, "one find, no count");
		assert_eq!(page.items.len(), 47);
		assert!(!page.has_next);
	}

	#[rstest]
	#[tokio::test]
	async fn test_page_info(events: MemoryBackend) {
		let handler = PaginationHandler::new(Arc::new(events), "events");

		let info = handler
			.get_page_info(doc! { "kind": "even" }, 5)
			.await
			.expect("page info should load");

		assert_eq!(info, PageInfo { total: 24, per_page: 5, total_pages: 5 });
	}
}
