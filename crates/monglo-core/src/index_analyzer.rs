//! Index recommendations
//!
//! Two sources feed recommendations: fields present in most sampled
//! documents, and fields seen in filters recorded with
//! [`IndexAnalyzer::track_query`]. A field already leading an existing index
//! is never recommended.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bson::Document;
use indexmap::IndexMap;
use monglo_db::{DocumentBackend, FindOptions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::AdminResult;
use crate::query_builder::ID_FIELD;

/// Share of sampled documents a field must appear in to be recommended
const COMMON_FIELD_THRESHOLD: f64 = 0.8;

/// Tracked filter uses above which a field is recommended
const FREQUENT_QUERY_THRESHOLD: u64 = 5;

/// Tracked filter uses above which a recommendation is high priority
const HOT_QUERY_THRESHOLD: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
	Single,
	Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	Medium,
	High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecommendation {
	pub fields: Vec<String>,
	#[serde(rename = "type")]
	pub kind: IndexKind,
	pub reason: String,
	pub priority: Priority,
	/// Share of sampled documents holding the field, for sample-based advice
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frequency: Option<f64>,
}

/// Outcome of [`IndexAnalyzer::analyze`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAnalysis {
	pub collection: String,
	pub existing_indexes: Vec<Document>,
	/// Top-level field → number of sampled documents containing it
	pub field_usage: IndexMap<String, u64>,
	pub sampled_documents: usize,
	pub recommendations: Vec<IndexRecommendation>,
}

/// Tracked filter statistics for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatsSummary {
	pub total_queries: u64,
	pub most_queried_field: Option<String>,
	pub field_count: usize,
}

pub struct IndexAnalyzer {
	database: Arc<dyn DocumentBackend>,
	query_stats: Mutex<HashMap<String, IndexMap<String, u64>>>,
}

impl IndexAnalyzer {
	pub fn new(database: Arc<dyn DocumentBackend>) -> Self {
		Self {
			database,
			query_stats: Mutex::new(HashMap::new()),
		}
	}

	/// Records the fields of a filter; operator keys are ignored.
	pub fn track_query(&self, collection: &str, filter: &Document) {
		let mut stats = self.query_stats.lock();
		let fields = stats.entry(collection.to_string()).or_default();
		for key in filter.keys().filter(|k| !k.starts_with('$')) {
			*fields.entry(key.clone()).or_insert(0) += 1;
		}
	}

	/// Samples `collection` and recommends single-field indexes.
	pub async fn analyze(&self, collection: &str, sample_size: usize) -> AdminResult<IndexAnalysis> {
		let existing_indexes = self.database.list_indexes(collection).await?;
		let leading: HashSet<String> = existing_indexes
			.iter()
			.filter_map(|index| index.get_document("key").ok())
			.filter_map(|keys| keys.keys().next().cloned())
			.collect();

		let sample = self
			.database
			.find_many(
				collection,
				Document::new(),
				FindOptions::new().limit(sample_size as i64),
			)
			.await?;

		let mut field_usage: IndexMap<String, u64> = IndexMap::new();
		for document in &sample {
			for key in document.keys() {
				*field_usage.entry(key.clone()).or_insert(0) += 1;
			}
		}

		let mut recommendations = Vec::new();
		if let Some(tracked) = self.query_stats.lock().get(collection) {
			for (field, count) in tracked {
				if *count > FREQUENT_QUERY_THRESHOLD && !leading.contains(field) {
					recommendations.push(IndexRecommendation {
						fields: vec![field.clone()],
						kind: IndexKind::Single,
						reason: format!("Frequently queried ({count} times)"),
						priority: if *count > HOT_QUERY_THRESHOLD {
							Priority::High
						} else {
							Priority::Medium
						},
						frequency: None,
					});
				}
			}
		}

		if !sample.is_empty() {
			let total = sample.len() as f64;
			for (field, count) in &field_usage {
				let frequency = *count as f64 / total;
				if field == ID_FIELD
					|| leading.contains(field)
					|| frequency < COMMON_FIELD_THRESHOLD
					|| recommendations.iter().any(|r| r.fields == [field.clone()])
				{
					continue;
				}
				recommendations.push(IndexRecommendation {
					fields: vec![field.clone()],
					kind: IndexKind::Single,
					reason: format!("Common field in {} of {} sampled documents", count, sample.len()),
					priority: Priority::Low,
					frequency: Some(frequency),
				});
			}
		}

		tracing::debug!(
			collection,
			recommendations = recommendations.len(),
			"Analyzed indexes"
		);
		Ok(IndexAnalysis {
			collection: collection.to_string(),
			existing_indexes,
			field_usage,
			sampled_documents: sample.len(),
			recommendations,
		})
	}

	/// Suggests a compound index over the two most queried fields.
	pub fn suggest_compound_indexes(&self, collection: &str) -> Vec<IndexRecommendation> {
		let stats = self.query_stats.lock();
		let Some(fields) = stats.get(collection) else {
			return Vec::new();
		};
		if fields.len() < 2 {
			return Vec::new();
		}
		let mut ranked: Vec<(&String, &u64)> = fields.iter().collect();
		ranked.sort_by(|a, b| b.1.cmp(a.1));
		vec![IndexRecommendation {
			fields: ranked.iter().take(2).map(|(field, _)| (*field).clone()).collect(),
			kind: IndexKind::Compound,
			reason: "Frequently queried together".to_string(),
			priority: Priority::Medium,
			frequency: None,
		}]
	}

	/// Tracked statistics per collection
	pub fn query_stats_summary(&self) -> HashMap<String, QueryStatsSummary> {
		self.query_stats
			.lock()
			.iter()
			.map(|(collection, fields)| {
				let most_queried_field = fields
					.iter()
					.fold(None::<(&String, u64)>, |best, (field, count)| match best {
						Some((_, top)) if top >= *count => best,
						_ => Some((field, *count)),
					})
					.map(|(field, _)| field.clone());
				(
					collection.clone(),
					QueryStatsSummary {
						total_queries: fields.values().sum(),
						most_queried_field,
						field_count: fields.len(),
					},
				)
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use monglo_db::backends::MemoryBackend;
	use rstest::*;

	#[fixture]
	fn backend() -> MemoryBackend {
		let backend = MemoryBackend::new();
		let mut docs: Vec<Document> = (0..9)
			.map(|i| doc! { "email": format!("u{i}@x.io"), "status": "active", "rare": i })
			.collect();
		for document in docs.iter_mut().skip(2) {
			document.remove("rare");
		}
		docs.push(doc! { "email": "last@x.io" });
		backend.seed("users", docs).expect("seeding should succeed");
		backend.create_index("users", doc! { "email": 1 }, true);
		backend
	}

	#[rstest]
	#[tokio::test]
	async fn test_analyze_recommends_common_unindexed_fields(backend: MemoryBackend) {
		// Arrange
		let analyzer = IndexAnalyzer::new(Arc::new(backend));

		// Act
		let analysis = analyzer
			.analyze("users", 100)
			.await
			.expect("analysis should succeed");

		// Assert
		assert_eq!(analysis.sampled_documents, 10);
		assert_eq!(analysis.existing_indexes.len(), 2);
		assert_eq!(analysis.field_usage.get("status"), Some(&9));
		let fields: Vec<&str> = analysis
			.recommendations
			.iter()
			.map(|r| r.fields[0].as_str())
			.collect();
		assert_eq!(fields, vec!["status"], "email is indexed and rare is uncommon");
		assert_eq!(analysis.recommendations[0].frequency, Some(0.9));
		assert_eq!(analysis.recommendations[0].priority, Priority::Low);
	}

	#[rstest]
	#[tokio::test]
	async fn test_tracked_queries(backend: MemoryBackend) {
		let analyzer = IndexAnalyzer::new(Arc::new(backend));
		for _ in 0..21 {
			analyzer.track_query("users", &doc! { "rare": 1, "$or": [] });
		}
		for _ in 0..6 {
			analyzer.track_query("users", &doc! { "city": "Lyon" });
		}

		let analysis = analyzer
			.analyze("users", 100)
			.await
			.expect("analysis should succeed");
		let compound = analyzer.suggest_compound_indexes("users");
		let summary = analyzer.query_stats_summary();

		assert_eq!(analysis.recommendations[0].fields, vec!["rare"]);
		assert_eq!(analysis.recommendations[0].priority, Priority::High);
		assert_eq!(analysis.recommendations[1].priority, Priority::Medium);
		assert_eq!(compound[0].fields, vec!["rare", "city"]);
		assert_eq!(compound[0].kind, IndexKind::Compound);
		let users = &summary["users"];
		assert_eq!(users.total_queries, 27);
		assert_eq!(users.most_queried_field.as_deref(), Some("rare"));
		assert_eq!(users.field_count, 2);
	}

	#[rstest]
	fn test_no_compound_suggestion_without_two_fields(backend: MemoryBackend) {
		let analyzer = IndexAnalyzer::new(Arc::new(backend));
		analyzer.track_query("users", &doc! { "email": "a" });

		assert!(analyzer.suggest_compound_indexes("users").is_empty());
		assert!(analyzer.suggest_compound_indexes("orders").is_empty());
	}
}
