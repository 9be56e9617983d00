//! View configuration rendered from an initialized engine

use std::sync::Arc;

use bson::{Document, doc};
use monglo_core::{EngineOptions, MongloEngine, RelationshipType};
use monglo_db::backends::MemoryBackend;
use monglo_ops::EngineOpsExt;
use monglo_ops::crud::ListQuery;
use monglo_views::serializers::{JsonSerializer, TableSerializer};
use monglo_views::views::{DocumentView, RelationshipView, TableView};
use monglo_views::widgets::Widget;
use rstest::*;

#[fixture]
async fn engine() -> MongloEngine {
	let backend = MemoryBackend::new();
	let users = backend
		.seed(
			"users",
			vec![
				doc! { "name": "Ada", "is_admin": true, "profile": { "city": "London" } },
				doc! { "name": "Grace", "is_admin": false, "profile": { "city": "Arlington" } },
			],
		)
		.expect("seeding should succeed");
	let orders: Vec<Document> = (0..4_usize)
		.map(|i| doc! { "number": i as i32, "user_id": users[i % 2].clone() })
		.collect();
	backend.seed("orders", orders).expect("seeding should succeed");

	let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
	engine.initialize().await.expect("initialization should succeed");
	engine
}

#[rstest]
#[tokio::test]
async fn test_document_view_of_discovered_collection(#[future] engine: MongloEngine) {
	// Arrange
	let engine = engine.await;
	let users = engine.collection("users").expect("users should be registered");

	// Act
	let document = DocumentView::new(users).render_config(None);

	// Assert
	let widgets: Vec<(&str, Widget)> = document
		.fields
		.iter()
		.map(|f| (f.path.as_str(), f.widget))
		.collect();
	assert_eq!(
		widgets,
		vec![
			("_id", Widget::Reference),
			("name", Widget::Text),
			("is_admin", Widget::Checkbox),
			("profile", Widget::Json),
		]
	);
	assert_eq!(document.fields[2].label, "Is Admin");
	assert_eq!(document.fields[3].fields[0].path, "profile.city");
}

#[rstest]
#[tokio::test]
async fn test_detected_relationship_in_views(#[future] engine: MongloEngine) {
	// Arrange
	let engine = engine.await;
	let orders = engine.collection("orders").expect("orders should be registered");

	// Act
	let document = DocumentView::new(Arc::clone(&orders)).render_config(None);
	let graph = RelationshipView::render_full_graph(&engine.registry());

	// Assert
	assert!(
		document
			.relationships
			.iter()
			.any(|r| r.field == "user_id"
				&& r.collection == "users"
				&& r.relationship_type == RelationshipType::OneToOne),
		"user_id should be shown as a reference to users"
	);
	assert!(graph.nodes.iter().all(|n| n.registered));
	assert!(
		graph
			.edges
			.iter()
			.any(|e| e.source == "orders" && e.target == "users" && e.field == "user_id")
	);
}

#[rstest]
#[tokio::test]
async fn test_table_rows_follow_table_columns(#[future] engine: MongloEngine) {
	// Arrange
	let engine = engine.await;
	let ops = engine.ops("users").expect("users should be registered");
	let table = TableView::new(Arc::clone(ops.admin())).render_config();
	let columns: Vec<String> = table.columns.iter().map(|c| c.field.clone()).collect();

	// Act
	let page = ops
		.crud()
		.list(&ListQuery::new())
		.await
		.expect("listing should succeed");
	let rows = TableSerializer::serialize_rows(&page.items, &columns);

	// Assert
	assert_eq!(rows.len(), 2);
	assert_eq!(rows[0].get("name").map(String::as_str), Some("Ada"));
	assert_eq!(rows[0].get("is_admin").map(String::as_str), Some("Yes"));
	assert_eq!(rows[1].get("profile.city").map(String::as_str), Some("Arlington"));
	let json = JsonSerializer::serialize(&page.items[0]);
	assert_eq!(
		rows[0].get("_id").map(String::as_str),
		json["_id"].as_str(),
		"both renderings use the hex id"
	);
}
