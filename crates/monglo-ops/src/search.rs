//! Text search across string fields

use std::sync::Arc;

use bson::{Bson, Document};
use monglo_core::error::AdminResult;
use monglo_core::query_builder::QueryBuilder;
use monglo_db::value::get_path;
use monglo_db::{DocumentBackend, FindOptions};

use crate::pagination::{DEFAULT_MAX_PER_PAGE, PageResult};

/// Field recording which fields matched in [`SearchOperations::search_with_highlight`]
pub const MATCHED_FIELDS_KEY: &str = "_matched_fields";

/// Options of [`SearchOperations::search`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
	/// Fields to search, defaulting to the collection's search fields
	pub fields: Option<Vec<String>>,
	pub case_sensitive: bool,
	pub limit: i64,
	pub skip: u64,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			fields: None,
			case_sensitive: false,
			limit: 100,
			skip: 0,
		}
	}
}

/// Substring search over one collection
#[derive(Clone)]
pub struct SearchOperations {
	database: Arc<dyn DocumentBackend>,
	collection: String,
	search_fields: Vec<String>,
}

impl SearchOperations {
	pub fn new(
		database: Arc<dyn DocumentBackend>,
		collection: impl Into<String>,
		search_fields: Vec<String>,
	) -> Self {
		Self {
			database,
			collection: collection.into(),
			search_fields,
		}
	}

	fn fields<'a>(&'a self, requested: Option<&'a [String]>) -> &'a [String] {
		requested.unwrap_or(&self.search_fields)
	}

	/// Query for `term`, or `None` when nothing can match.
	///
	/// An empty term matches everything; a term with no fields to search
	/// matches nothing.
	fn query_for(&self, term: &str, fields: &[String], case_sensitive: bool) -> Option<Document> {
		if term.is_empty() {
			return Some(Document::new());
		}
		if fields.is_empty() {
			return None;
		}
		Some(QueryBuilder::build_text_match(term, fields, case_sensitive))
	}

	/// Documents where any searched field contains `term`
	///
	/// # Examples
	///
	/// ```rust
	/// use std::sync::Arc;
	/// use monglo_db::backends::MemoryBackend;
	/// use monglo_ops::search::{SearchOperations, SearchOptions};
	/// use bson::doc;
	///
	/// # async fn example() -> monglo_core::AdminResult<()> {
	/// let backend = MemoryBackend::new();
	/// backend.seed("users", vec![doc! { "name": "Ada (admin)" }, doc! { "name": "Bob" }])?;
	///
	/// let search = SearchOperations::new(Arc::new(backend), "users", vec!["name".into()]);
	/// let hits = search.search("(ADMIN)", SearchOptions::default()).await?;
	/// assert_eq!(hits.len(), 1);
	/// # Ok(())
	/// # }
	/// ```
	pub async fn search(&self, term: &str, options: SearchOptions) -> AdminResult<Vec<Document>> {
		let fields = self.fields(options.fields.as_deref());
		let Some(query) = self.query_for(term, fields, options.case_sensitive) else {
			return Ok(Vec::new());
		};
		Ok(self
			.database
			.find_many(
				&self.collection,
				query,
				FindOptions::new().skip(options.skip).limit(options.limit),
			)
			.await?)
	}

	/// [`search`](Self::search) with a `_matched_fields` array on every hit
	pub async fn search_with_highlight(
		&self,
		term: &str,
		options: SearchOptions,
	) -> AdminResult<Vec<Document>> {
		let fields = self.fields(options.fields.as_deref()).to_vec();
		let case_sensitive = options.case_sensitive;
		let hits = self.search(term, options).await?;

		let needle = fold_case(term, case_sensitive);
		Ok(hits
			.into_iter()
			.map(|mut hit| {
				let matched: Vec<Bson> = fields
					.iter()
					.filter(|field| match get_path(&hit, field) {
						Some(Bson::String(value)) => {
							fold_case(value, case_sensitive).contains(&needle)
						}
						_ => false,
					})
					.map(|field| Bson::String(field.clone()))
					.collect();
				hit.insert(MATCHED_FIELDS_KEY, matched);
				hit
			})
			.collect())
	}

	/// Number of documents [`search`](Self::search) would match without a limit
	pub async fn search_count(&self, term: &str, fields: Option<&[String]>) -> AdminResult<u64> {
		let fields = self.fields(fields);
		let Some(query) = self.query_for(term, fields, false) else {
			return Ok(0);
		};
		Ok(self.database.count_documents(&self.collection, query).await?)
	}

	/// Search results in the listing envelope
	pub async fn search_paginated(
		&self,
		term: &str,
		page: i64,
		per_page: i64,
		case_sensitive: bool,
	) -> AdminResult<PageResult> {
		let window = QueryBuilder::build_pagination_query(page, per_page, DEFAULT_MAX_PER_PAGE);
		let Some(query) = self.query_for(term, &self.search_fields, case_sensitive) else {
			return Ok(PageResult::new(Vec::new(), 0, window.page, window.per_page));
		};

		let total = self
			.database
			.count_documents(&self.collection, query.clone())
			.await?;
		let items = self
			.database
			.find_many(
				&self.collection,
				query,
				FindOptions::new().skip(window.skip).limit(window.limit),
			)
			.await?;
		Ok(PageResult::new(items, total, window.page, window.per_page))
	}
}

fn fold_case(text: &str, case_sensitive: bool) -> String {
	if case_sensitive {
		text.to_string()
	} else {
		text.to_lowercase()
	}
}
