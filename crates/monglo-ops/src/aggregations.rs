//! Aggregation helpers: field statistics, grouping, histograms

use std::sync::Arc;

use bson::{Bson, Document, doc};
use monglo_core::error::AdminResult;
use monglo_db::DocumentBackend;
use serde::{Deserialize, Serialize};

/// Numeric summary of one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
	pub min: Bson,
	pub max: Bson,
	pub avg: Bson,
	pub sum: Bson,
	/// Matching documents, including those lacking the field
	pub count: i64,
}

impl FieldStats {
	fn empty() -> Self {
		Self {
			min: Bson::Null,
			max: Bson::Null,
			avg: Bson::Null,
			sum: Bson::Null,
			count: 0,
		}
	}
}

/// Options of [`AggregationOperations::group_by`]
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByOptions {
	/// Emit a `count` column
	pub count: bool,
	/// Emit a `total` column summing this field
	pub sum_field: Option<String>,
	/// Emit an `average` column over this field
	pub avg_field: Option<String>,
	pub query: Option<Document>,
	pub limit: Option<i64>,
}

impl Default for GroupByOptions {
	fn default() -> Self {
		Self {
			count: true,
			sum_field: None,
			avg_field: None,
			query: None,
			limit: None,
		}
	}
}

/// Bucket width of a date histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateInterval {
	Day,
	Week,
	Month,
	Year,
}

impl DateInterval {
	/// `$dateToString` format naming the bucket
	pub fn format(self) -> &'static str {
		match self {
			DateInterval::Day => "%Y-%m-%d",
			DateInterval::Week => "%Y-W%V",
			DateInterval::Month => "%Y-%m",
			DateInterval::Year => "%Y",
		}
	}
}

/// One bucket of a date histogram
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
	pub date: String,
	pub count: i64,
}

/// Aggregation queries against one collection
#[derive(Clone)]
pub struct AggregationOperations {
	database: Arc<dyn DocumentBackend>,
	collection: String,
}

impl AggregationOperations {
	pub fn new(database: Arc<dyn DocumentBackend>, collection: impl Into<String>) -> Self {
		Self {
			database,
			collection: collection.into(),
		}
	}

	/// Runs a raw pipeline
	pub async fn aggregate(&self, pipeline: Vec<Document>) -> AdminResult<Vec<Document>> {
		Ok(self.database.aggregate(&self.collection, pipeline).await?)
	}

	/// Min, max, average and sum of `field` in one `$group` stage.
	///
	/// An empty match yields nulls and a count of zero.
	pub async fn get_field_stats(
		&self,
		field: &str,
		query: Option<Document>,
	) -> AdminResult<FieldStats> {
		let path = format!("${field}");
		let mut pipeline = match_stage(query);
		pipeline.push(doc! {
			"$group": {
				"_id": Bson::Null,
				"min": { "$min": path.as_str() },
				"max": { "$max": path.as_str() },
				"avg": { "$avg": path.as_str() },
				"sum": { "$sum": path.as_str() },
				"count": { "$sum": 1 },
			}
		});

		let rows = self.aggregate(pipeline).await?;
		let Some(row) = rows.into_iter().next() else {
			return Ok(FieldStats::empty());
		};
		let take = |key: &str| row.get(key).cloned().unwrap_or(Bson::Null);
		Ok(FieldStats {
			min: take("min"),
			max: take("max"),
			avg: take("avg"),
			sum: take("sum"),
			count: as_count(row.get("count")),
		})
	}

	/// Groups by `field`, most frequent first.
	///
	/// Each row carries the group key under `field` instead of `_id`, plus
	/// `count`, `total` and `average` as requested.
	///
	/// # Examples
	///
	/// ```rust
	/// use std::sync::Arc;
	/// use monglo_db::backends::MemoryBackend;
	/// use monglo_ops::aggregations::{AggregationOperations, GroupByOptions};
	/// use bson::doc;
	///
	/// # async fn example() -> monglo_core::AdminResult<()> {
	/// let backend = MemoryBackend::new();
	/// backend.seed("orders", vec![
	///     doc! { "status": "paid", "total": 10 },
	///     doc! { "status": "paid", "total": 5 },
	///     doc! { "status": "open", "total": 7 },
	/// ])?;
	///
	/// let ops = AggregationOperations::new(Arc::new(backend), "orders");
	/// let options = GroupByOptions { sum_field: Some("total".into()), ..Default::default() };
	/// let rows = ops.group_by("status", options).await?;
	///
	/// assert_eq!(rows[0].get_str("status").ok(), Some("paid"));
	/// assert_eq!(rows[0].get_i32("total").ok(), Some(15));
	/// # Ok(())
	/// # }
	/// ```
	pub async fn group_by(&self, field: &str, options: GroupByOptions) -> AdminResult<Vec<Document>> {
		let mut group = doc! { "_id": format!("${field}") };
		if options.count {
			group.insert("count", doc! { "$sum": 1 });
		}
		if let Some(sum_field) = &options.sum_field {
			group.insert("total", doc! { "$sum": format!("${sum_field}") });
		}
		if let Some(avg_field) = &options.avg_field {
			group.insert("average", doc! { "$avg": format!("${avg_field}") });
		}

		let mut pipeline = match_stage(options.query);
		pipeline.push(doc! { "$group": group });
		if options.count {
			pipeline.push(doc! { "$sort": { "count": -1 } });
		}
		if let Some(limit) = options.limit {
			pipeline.push(doc! { "$limit": limit });
		}

		let rows = self.aggregate(pipeline).await?;
		Ok(rows
			.into_iter()
			.map(|mut row| {
				let key = row.remove("_id").unwrap_or(Bson::Null);
				let mut renamed = Document::new();
				renamed.insert(field, key);
				renamed.extend(row);
				renamed
			})
			.collect())
	}

	/// Occurrences of each distinct value of `field`, most frequent first
	pub async fn get_distinct_counts(
		&self,
		field: &str,
		query: Option<Document>,
	) -> AdminResult<Vec<Document>> {
		self.group_by(
			field,
			GroupByOptions {
				query,
				..Default::default()
			},
		)
		.await
	}

	/// Documents per date bucket, oldest bucket first.
	///
	/// Documents lacking the date field fall into no bucket.
	pub async fn get_date_histogram(
		&self,
		date_field: &str,
		interval: DateInterval,
		query: Option<Document>,
	) -> AdminResult<Vec<HistogramBucket>> {
		let mut pipeline = match_stage(query);
		pipeline.push(doc! {
			"$group": {
				"_id": { "$dateToString": { "format": interval.format(), "date": format!("${date_field}") } },
				"count": { "$sum": 1 },
			}
		});
		pipeline.push(doc! { "$sort": { "_id": 1 } });

		let rows = self.aggregate(pipeline).await?;
		Ok(rows
			.into_iter()
			.filter_map(|row| {
				let date = row.get_str("_id").ok()?.to_string();
				Some(HistogramBucket {
					date,
					count: as_count(row.get("count")),
				})
			})
			.collect())
	}

	/// The `limit` most frequent values of `field`
	pub async fn get_top_values(
		&self,
		field: &str,
		limit: i64,
		query: Option<Document>,
	) -> AdminResult<Vec<Document>> {
		self.group_by(
			field,
			GroupByOptions {
				query,
				limit: Some(limit),
				..Default::default()
			},
		)
		.await
	}
}

fn match_stage(query: Option<Document>) -> Vec<Document> {
	match query {
		Some(query) if !query.is_empty() => vec![doc! { "$match": query }],
		_ => Vec::new(),
	}
}

fn as_count(value: Option<&Bson>) -> i64 {
	match value {
		Some(Bson::Int32(n)) => i64::from(*n),
		Some(Bson::Int64(n)) => *n,
		Some(Bson::Double(n)) => *n as i64,
		_ => 0,
	}
}
