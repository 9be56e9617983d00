//! Aggregation, export, audit and cursor pagination over seeded collections

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use monglo_core::SortOrder;
use monglo_db::backends::MemoryBackend;
use monglo_db::DocumentBackend;
use monglo_ops::aggregations::{AggregationOperations, DateInterval, GroupByOptions};
use monglo_ops::audit::{AuditAction, AuditLogger, AuditUser};
use monglo_ops::export::{ExportFormat, ExportOperations, ExportOptions, from_json, to_json};
use monglo_ops::pagination::PaginationHandler;
use rstest::*;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// 2024-01-01T00:00:00Z
const JAN_FIRST_MS: i64 = 1_704_067_200_000;

#[fixture]
fn sales() -> MemoryBackend {
	let backend = MemoryBackend::new();
	let rows: Vec<Document> = (0..12)
		.map(|i| {
			let region = ["north", "south", "east"][i % 3];
			doc! {
				"region": region,
				"amount": (i as i32 + 1) * 10,
				"sold_at": bson::DateTime::from_millis(JAN_FIRST_MS + (i as i64 / 4) * DAY_MS),
			}
		})
		.collect();
	backend.seed("sales", rows).expect("seeding should succeed");
	backend
}

#[rstest]
#[tokio::test]
async fn test_field_stats(sales: MemoryBackend) {
	let ops = AggregationOperations::new(Arc::new(sales), "sales");

	let stats = ops
		.get_field_stats("amount", None)
		.await
		.expect("stats should compute");

	assert_eq!(stats.min, Bson::Int32(10));
	assert_eq!(stats.max, Bson::Int32(120));
	assert_eq!(stats.sum, Bson::Int32(780));
	assert_eq!(stats.avg, Bson::Double(65.0));
	assert_eq!(stats.count, 12);
}

#[rstest]
#[tokio::test]
async fn test_field_stats_of_empty_match(sales: MemoryBackend) {
	let ops = AggregationOperations::new(Arc::new(sales), "sales");

	let stats = ops
		.get_field_stats("amount", Some(doc! { "region": "west" }))
		.await
		.expect("stats should compute");

	assert_eq!(stats.count, 0);
	assert_eq!(stats.sum, Bson::Null);
	assert_eq!(stats.avg, Bson::Null);
}

#[rstest]
#[tokio::test]
async fn test_group_by_renames_key_and_adds_columns(sales: MemoryBackend) {
	// Arrange
	let ops = AggregationOperations::new(Arc::new(sales), "sales");
	let options = GroupByOptions {
		sum_field: Some("amount".to_string()),
		avg_field: Some("amount".to_string()),
		query: Some(doc! { "amount": { "$gt": 10 } }),
		..Default::default()
	};

	// Act
	let rows = ops.group_by("region", options).await.expect("grouping should succeed");

	// Assert
	assert_eq!(rows.len(), 3);
	let north = rows
		.iter()
		.find(|row| row.get_str("region").ok() == Some("north"))
		.expect("north group should exist");
	assert!(!north.contains_key("_id"), "group key is renamed");
	assert_eq!(north.get_i32("count").ok(), Some(3));
	assert_eq!(north.get_i32("total").ok(), Some(40 + 70 + 100));
	assert_eq!(north.get_f64("average").ok(), Some(70.0));
	assert!(
		rows.windows(2)
			.all(|pair| pair[0].get_i32("count").unwrap_or(0) >= pair[1].get_i32("count").unwrap_or(0)),
		"rows are ordered by count"
	);
}

#[rstest]
#[tokio::test]
async fn test_top_values_limit(sales: MemoryBackend) {
	let ops = AggregationOperations::new(Arc::new(sales), "sales");

	let rows = ops
		.get_top_values("region", 2, None)
		.await
		.expect("grouping should succeed");

	assert_eq!(rows.len(), 2);
}

#[rstest]
#[case(DateInterval::Day, vec![("2024-01-01", 4), ("2024-01-02", 4), ("2024-01-03", 4)])]
#[case(DateInterval::Month, vec![("2024-01", 12)])]
#[case(DateInterval::Year, vec![("2024", 12)])]
#[tokio::test]
async fn test_date_histogram(
	sales: MemoryBackend,
	#[case] interval: DateInterval,
	#[case] expected: Vec<(&str, i64)>,
) {
	let ops = AggregationOperations::new(Arc::new(sales), "sales");

	let buckets = ops
		.get_date_histogram("sold_at", interval, None)
		.await
		.expect("histogram should compute");

	let summary: Vec<(&str, i64)> = buckets.iter().map(|b| (b.date.as_str(), b.count)).collect();
	assert_eq!(summary, expected);
}

#[rstest]
#[tokio::test]
async fn test_export_round_trip_preserves_fields_and_values() {
	// Arrange
	let backend = MemoryBackend::new();
	let author = ObjectId::new();
	let published = bson::DateTime::from_millis(JAN_FIRST_MS + 1_500);
	backend
		.seed(
			"articles",
			vec![doc! {
				"title": "Schema-less",
				"author_id": author,
				"published_at": published,
				"meta": { "words": 1200, "tags": ["db", "admin"] },
			}],
		)
		.expect("seeding should succeed");
	let exporter = ExportOperations::new(Arc::new(backend), "articles");

	// Act
	let export = exporter
		.export_collection(ExportFormat::Json, ExportOptions::default())
		.await
		.expect("export should succeed");
	let parsed = from_json(&export.content).expect("export should parse back");

	// Assert
	assert_eq!(export.document_count, 1);
	assert!(export.filename.starts_with("articles_") && export.filename.ends_with(".json"));
	let article = &parsed[0];
	let original_keys = ["_id", "title", "author_id", "published_at", "meta"];
	assert_eq!(
		article.keys().map(String::as_str).collect::<Vec<_>>(),
		original_keys,
		"exported objects keep the stored field order"
	);
	let positions: Vec<usize> = original_keys
		.iter()
		.filter_map(|key| export.content.find(&format!("\"{key}\"")))
		.collect();
	assert_eq!(positions.len(), original_keys.len());
	assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "`_id` leads the rendered object");
	assert_eq!(article.get_str("title").ok(), Some("Schema-less"));
	assert_eq!(article.get_str("author_id").ok(), Some(author.to_hex().as_str()));
	assert_eq!(
		article.get_str("published_at").ok(),
		Some("2024-01-01T00:00:01.500Z")
	);
	assert_eq!(
		article.get_document("meta").ok(),
		Some(&doc! { "words": 1200, "tags": ["db", "admin"] })
	);
	assert_eq!(
		to_json(&parsed, true).expect("re-export should render"),
		export.content,
		"a second export of the parsed documents is identical"
	);
}

#[rstest]
#[tokio::test]
async fn test_csv_export_with_fields_and_limit(sales: MemoryBackend) {
	let exporter = ExportOperations::new(Arc::new(sales), "sales");
	let options = ExportOptions {
		fields: Some(vec!["region".to_string(), "amount".to_string()]),
		limit: Some(2),
		..Default::default()
	};

	let export = exporter
		.export_collection(ExportFormat::Csv, options)
		.await
		.expect("export should succeed");

	assert_eq!(export.content, "region,amount\nnorth,10\nsouth,20\n");
	assert_eq!(export.mime_type(), "text/csv");
}

#[rstest]
#[tokio::test]
async fn test_audit_history_newest_first() {
	// Arrange
	let backend = MemoryBackend::new();
	let logger = AuditLogger::new(Arc::new(backend.clone()));
	let editor = AuditUser::new("u-7").with_role("editor");
	let id = ObjectId::new().to_hex();

	// Act
	logger
		.log_create("posts", &id, doc! { "title": "Draft" }, Some(editor.clone()))
		.await;
	logger
		.log_update(
			"posts",
			&id,
			&doc! { "title": "Draft" },
			&doc! { "title": "Final" },
			Some(editor.clone()),
		)
		.await;
	logger
		.log_bulk_operation("posts", "delete", 4, None, Some(doc! { "reason": "cleanup" }))
		.await;

	// Assert
	let history = logger
		.get_document_history("posts", &id, 50)
		.await
		.expect("history should load");
	let actions: Vec<AuditAction> = history.iter().map(|e| e.action).collect();
	assert_eq!(actions, vec![AuditAction::Update, AuditAction::Create]);
	assert_eq!(
		history[0].changes,
		Some(doc! { "title": { "old": "Draft", "new": "Final" } })
	);
	let activity = logger
		.get_user_activity("u-7", 100)
		.await
		.expect("activity should load");
	assert_eq!(activity.len(), 2);
	assert_eq!(activity[0].user.as_ref(), Some(&editor));
	let stored = backend
		.count_documents("monglo_audit_log", doc! { "action": "bulk_delete", "count": 4 })
		.await
		.expect("count should succeed");
	assert_eq!(stored, 1);
}

#[rstest]
#[tokio::test]
async fn test_cursor_pages_respect_the_base_query(sales: MemoryBackend) {
	// Arrange
	let handler = PaginationHandler::new(Arc::new(sales), "sales");
	let base = doc! { "region": "south" };

	// Act
	let first = handler
		.paginate_cursor(base.clone(), None, 3, "amount", SortOrder::Ascending, None)
		.await
		.expect("first page should load");
	let second = handler
		.paginate_cursor(
			base,
			first.next_cursor.as_deref(),
			3,
			"amount",
			SortOrder::Ascending,
			None,
		)
		.await
		.expect("second page should load");

	// Assert
	let amounts = |page: &monglo_ops::pagination::CursorPage| -> Vec<i32> {
		page.items.iter().filter_map(|d| d.get_i32("amount").ok()).collect()
	};
	assert_eq!(amounts(&first), vec![20, 50, 80]);
	assert!(first.has_next);
	assert_eq!(amounts(&second), vec![110]);
	assert!(!second.has_next && second.next_cursor.is_none());
}
