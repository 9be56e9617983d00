//! Query document builder
//!
//! Translates the generic filter/search/sort/pagination vocabulary used by the
//! administrative operations into native MongoDB query, sort and projection
//! documents. Every function here is pure; nothing touches the store.
//!
//! # Filter syntax
//!
//! Filter specs are documents whose keys are either a plain field name
//! (equality) or `field__operator`:
//!
//! | Suffix | Query |
//! |---|---|
//! | `eq` (default) | `{field: value}` |
//! | `ne`, `gt`, `gte`, `lt`, `lte` | `{field: {$op: value}}` |
//! | `in`, `nin` | `{field: {$in / $nin: [values]}}` |
//! | `regex` | `{field: {$regex: value, $options: "i"}}` |
//! | `range` | `{field: {$gte: lo, $lte: hi}}` (two-element arrays only) |
//! | `exists` | `{field: {$exists: bool}}` |
//!
//! # Example
//!
//! ```rust
//! use monglo_core::query_builder::QueryBuilder;
//! use bson::doc;
//!
//! let query = QueryBuilder::build_filter(&doc! {
//!     "status": "active",
//!     "age__gte": 18,
//!     "tags__in": ["rust", "mongodb"],
//! });
//! assert_eq!(query, doc! {
//!     "status": "active",
//!     "age": { "$gte": 18 },
//!     "tags": { "$in": ["rust", "mongodb"] },
//! });
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Identity field of every document
pub const ID_FIELD: &str = "_id";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	Ascending,
	Descending,
}

impl SortOrder {
	/// Native direction value (`1` / `-1`)
	pub fn as_i32(self) -> i32 {
		match self {
			SortOrder::Ascending => 1,
			SortOrder::Descending => -1,
		}
	}

	/// Direction from a signed number; negative means descending
	pub fn from_sign(direction: i64) -> Self {
		if direction < 0 {
			SortOrder::Descending
		} else {
			SortOrder::Ascending
		}
	}
}

/// Ordered sort specification
pub type SortSpec = Vec<(String, SortOrder)>;

/// Clamped pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
	/// 1-based page number after clamping
	pub page: u64,
	/// Page size after clamping
	pub per_page: u64,
	/// Documents to skip
	pub skip: u64,
	/// Documents to return
	pub limit: i64,
}

/// Stateless query translation functions
pub struct QueryBuilder;

impl QueryBuilder {
	/// Builds a query document from a `field` / `field__operator` spec.
	///
	/// Unknown operators are ignored. A `range` whose value is not a
	/// two-element array produces no condition.
	pub fn build_filter(spec: &Document) -> Document {
		let mut query = Document::new();
		for (key, value) in spec {
			let (field, operator) = match key.rsplit_once("__") {
				Some((field, operator)) => (field, operator),
				None => (key.as_str(), "eq"),
			};
			let condition = match operator {
				"eq" => convert_value(value, field),
				"ne" | "gt" | "gte" | "lt" | "lte" => {
					operator_condition(operator, convert_value(value, field))
				}
				"in" | "nin" => {
					let values: Vec<Bson> = as_list(value)
						.into_iter()
						.map(|v| convert_value(&v, field))
						.collect();
					operator_condition(operator, Bson::Array(values))
				}
				"regex" => Bson::Document(doc! { "$regex": bson_to_text(value), "$options": "i" }),
				"range" => match value {
					Bson::Array(bounds) if bounds.len() == 2 => Bson::Document(doc! {
						"$gte": convert_value(&bounds[0], field),
						"$lte": convert_value(&bounds[1], field),
					}),
					_ => continue,
				},
				"exists" => Bson::Document(doc! { "$exists": is_truthy(value) }),
				other => {
					tracing::debug!(field, operator = other, "ignoring unknown filter operator");
					continue;
				}
			};
			query.insert(field, condition);
		}
		query
	}

	/// Builds a case-insensitive search across `fields`.
	///
	/// Regex metacharacters in `term` are escaped, so user input is matched
	/// literally. An empty term or field list yields `{}`.
	///
	/// ```rust
	/// use monglo_core::query_builder::QueryBuilder;
	/// use bson::doc;
	///
	/// let query = QueryBuilder::build_search_query("a.b", &["name".to_string()]);
	/// assert_eq!(query, doc! { "$or": [ { "name": { "$regex": "a\\.b", "$options": "i" } } ] });
	/// ```
	pub fn build_search_query(term: &str, fields: &[String]) -> Document {
		Self::build_text_match(term, fields, false)
	}

	/// [`build_search_query`](Self::build_search_query) with selectable case sensitivity
	pub fn build_text_match(term: &str, fields: &[String], case_sensitive: bool) -> Document {
		if term.is_empty() || fields.is_empty() {
			return Document::new();
		}
		let pattern = regex::escape(term);
		let options = if case_sensitive { "" } else { "i" };
		let clauses: Vec<Document> = fields
			.iter()
			.map(|field| {
				let mut clause = Document::new();
				clause.insert(
					field.clone(),
					doc! { "$regex": pattern.as_str(), "$options": options },
				);
				clause
			})
			.collect();
		doc! { "$or": clauses }
	}

	/// Returns the sort spec, defaulting to identity ascending.
	pub fn build_sort(spec: Option<&[(String, SortOrder)]>) -> SortSpec {
		match spec {
			Some(spec) if !spec.is_empty() => spec.to_vec(),
			_ => vec![(ID_FIELD.to_string(), SortOrder::Ascending)],
		}
	}

	/// Native sort document for a sort spec, key order preserved
	pub fn sort_document(spec: &[(String, SortOrder)]) -> Document {
		spec.iter()
			.map(|(field, order)| (field.clone(), Bson::Int32(order.as_i32())))
			.collect()
	}

	/// AND-combines queries, dropping empty ones.
	///
	/// ```rust
	/// use monglo_core::query_builder::QueryBuilder;
	/// use bson::doc;
	///
	/// assert_eq!(QueryBuilder::combine_queries(vec![]), doc! {});
	/// assert_eq!(
	///     QueryBuilder::combine_queries(vec![doc! {}, doc! { "a": 1 }]),
	///     doc! { "a": 1 }
	/// );
	/// ```
	pub fn combine_queries(queries: impl IntoIterator<Item = Document>) -> Document {
		let mut remaining: Vec<Document> = queries.into_iter().filter(|q| !q.is_empty()).collect();
		match remaining.len() {
			0 => Document::new(),
			1 => remaining.remove(0),
			_ => doc! { "$and": remaining },
		}
	}

	/// Clamps `page >= 1` and `per_page` to `[1, max_per_page]`.
	pub fn build_pagination_query(page: i64, per_page: i64, max_per_page: u64) -> PageWindow {
		let page = page.max(1) as u64;
		let per_page = (per_page.max(1) as u64).min(max_per_page.max(1));
		PageWindow {
			page,
			per_page,
			skip: (page - 1).saturating_mul(per_page),
			limit: per_page as i64,
		}
	}

	/// Builds a projection; an include list takes precedence over exclusions.
	///
	/// With an include list, `_id` is suppressed only when it is excluded and
	/// not itself included. Returns `None` when neither list is given.
	pub fn build_projection(include: Option<&[String]>, exclude: Option<&[String]>) -> Option<Document> {
		match (include, exclude) {
			(Some(include), exclude) if !include.is_empty() => {
				let mut projection: Document =
					include.iter().map(|f| (f.clone(), Bson::Int32(1))).collect();
				let excludes_id = exclude.is_some_and(|e| e.iter().any(|f| f == ID_FIELD));
				if excludes_id && !include.iter().any(|f| f == ID_FIELD) {
					projection.insert(ID_FIELD, 0);
				}
				Some(projection)
			}
			(_, Some(exclude)) if !exclude.is_empty() => {
				Some(exclude.iter().map(|f| (f.clone(), Bson::Int32(0))).collect())
			}
			_ => None,
		}
	}
}

/// Converts id-like string values to `ObjectId` for `_id` and `*_id` fields.
///
/// Strings that are not valid ids pass through unchanged.
pub fn convert_value(value: &Bson, field: &str) -> Bson {
	if field == ID_FIELD || field.ends_with("_id") {
		if let Bson::String(raw) = value
			&& let Ok(oid) = ObjectId::parse_str(raw)
		{
			return Bson::ObjectId(oid);
		}
	}
	value.clone()
}

fn operator_condition(operator: &str, value: Bson) -> Bson {
	let mut condition = Document::new();
	condition.insert(format!("${operator}"), value);
	Bson::Document(condition)
}

fn as_list(value: &Bson) -> Vec<Bson> {
	match value {
		Bson::Array(items) => items.clone(),
		other => vec![other.clone()],
	}
}

fn bson_to_text(value: &Bson) -> String {
	match value {
		Bson::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn is_truthy(value: &Bson) -> bool {
	match value {
		Bson::Boolean(b) => *b,
		Bson::Null => false,
		Bson::Int32(n) => *n != 0,
		Bson::Int64(n) => *n != 0,
		Bson::Double(n) => *n != 0.0,
		Bson::String(s) => !s.is_empty(),
		Bson::Array(items) => !items.is_empty(),
		Bson::Document(doc) => !doc.is_empty(),
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	const OID: &str = "507f1f77bcf86cd799439011";

	#[rstest]
	#[case(doc! { "status": "active" }, doc! { "status": "active" })]
	#[case(doc! { "age__ne": 3 }, doc! { "age": { "$ne": 3 } })]
	#[case(doc! { "age__gt": 3 }, doc! { "age": { "$gt": 3 } })]
	#[case(doc! { "age__gte": 3 }, doc! { "age": { "$gte": 3 } })]
	#[case(doc! { "age__lt": 3 }, doc! { "age": { "$lt": 3 } })]
	#[case(doc! { "age__lte": 3 }, doc! { "age": { "$lte": 3 } })]
	#[case(doc! { "tag__in": ["a", "b"] }, doc! { "tag": { "$in": ["a", "b"] } })]
	#[case(doc! { "tag__nin": ["a"] }, doc! { "tag": { "$nin": ["a"] } })]
	#[case(doc! { "name__regex": "^al" }, doc! { "name": { "$regex": "^al", "$options": "i" } })]
	#[case(doc! { "age__range": [18, 30] }, doc! { "age": { "$gte": 18, "$lte": 30 } })]
	#[case(doc! { "age__range": [18] }, doc! {})]
	#[case(doc! { "email__exists": true }, doc! { "email": { "$exists": true } })]
	#[case(doc! { "email__exists": 0 }, doc! { "email": { "$exists": false } })]
	#[case(doc! { "age__between": 1 }, doc! {})]
	#[case(doc! { "meta__key__gt": 1 }, doc! { "meta__key": { "$gt": 1 } })]
	fn test_build_filter_operators(#[case] spec: Document, #[case] expected: Document) {
		assert_eq!(QueryBuilder::build_filter(&spec), expected);
	}

	#[rstest]
	fn test_build_filter_converts_id_fields() {
		let oid = ObjectId::parse_str(OID).expect("valid object id");
		let query = QueryBuilder::build_filter(&doc! {
			"_id": OID,
			"user_id__in": [OID, "not-an-id"],
			"name": OID,
		});
		assert_eq!(
			query,
			doc! {
				"_id": oid,
				"user_id": { "$in": [oid, "not-an-id"] },
				"name": OID,
			}
		);
	}

	#[rstest]
	fn test_invalid_id_string_passes_through() {
		let query = QueryBuilder::build_filter(&doc! { "_id": "42" });
		assert_eq!(query, doc! { "_id": "42" });
	}

	#[rstest]
	fn test_search_query_escapes_and_ors() {
		let fields = vec!["name".to_string(), "email".to_string()];
		let query = QueryBuilder::build_search_query("a+b(", &fields);
		assert_eq!(
			query,
			doc! { "$or": [
				{ "name": { "$regex": "a\\+b\\(", "$options": "i" } },
				{ "email": { "$regex": "a\\+b\\(", "$options": "i" } },
			] }
		);
	}

	#[rstest]
	#[case("", vec!["name".to_string()])]
	#[case("alice", vec![])]
	fn test_search_query_empty(#[case] term: &str, #[case] fields: Vec<String>) {
		assert!(QueryBuilder::build_search_query(term, &fields).is_empty());
	}

	#[rstest]
	fn test_build_sort_defaults_to_identity() {
		assert_eq!(
			QueryBuilder::build_sort(None),
			vec![("_id".to_string(), SortOrder::Ascending)]
		);
		let custom = vec![("created_at".to_string(), SortOrder::Descending)];
		assert_eq!(QueryBuilder::build_sort(Some(&custom)), custom);
		assert_eq!(
			QueryBuilder::sort_document(&custom),
			doc! { "created_at": -1 }
		);
	}

	#[rstest]
	fn test_combine_queries() {
		assert_eq!(QueryBuilder::combine_queries(Vec::new()), doc! {});
		assert_eq!(QueryBuilder::combine_queries(vec![doc! {}, doc! {}]), doc! {});
		assert_eq!(
			QueryBuilder::combine_queries(vec![doc! { "a": 1 }]),
			doc! { "a": 1 },
			"a single query is returned unwrapped"
		);
		assert_eq!(
			QueryBuilder::combine_queries(vec![doc! { "a": 1 }, doc! {}, doc! { "b": 2 }]),
			doc! { "$and": [ { "a": 1 }, { "b": 2 } ] }
		);
	}

	#[rstest]
	#[case(1, 20, 100, PageWindow { page: 1, per_page: 20, skip: 0, limit: 20 })]
	#[case(3, 10, 100, PageWindow { page: 3, per_page: 10, skip: 20, limit: 10 })]
	#[case(0, 10, 100, PageWindow { page: 1, per_page: 10, skip: 0, limit: 10 })]
	#[case(-4, 0, 100, PageWindow { page: 1, per_page: 1, skip: 0, limit: 1 })]
	#[case(2, 500, 100, PageWindow { page: 2, per_page: 100, skip: 100, limit: 100 })]
	fn test_pagination_clamping(
		#[case] page: i64,
		#[case] per_page: i64,
		#[case] max_per_page: u64,
		#[case] expected: PageWindow,
	) {
		assert_eq!(
			QueryBuilder::build_pagination_query(page, per_page, max_per_page),
			expected
		);
	}

	#[rstest]
	fn test_build_projection() {
		let include = vec!["name".to_string(), "email".to_string()];
		let exclude_id = vec!["_id".to_string()];

		assert_eq!(QueryBuilder::build_projection(None, None), None);
		assert_eq!(
			QueryBuilder::build_projection(Some(&include), None),
			Some(doc! { "name": 1, "email": 1 })
		);
		assert_eq!(
			QueryBuilder::build_projection(Some(&include), Some(&exclude_id)),
			Some(doc! { "name": 1, "email": 1, "_id": 0 })
		);
		assert_eq!(
			QueryBuilder::build_projection(None, Some(&include)),
			Some(doc! { "name": 0, "email": 0 })
		);
	}
}
