//! CRUD and listing behavior against a seeded store

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use monglo_core::config::CollectionConfig;
use monglo_core::relationships::RELATIONSHIPS_KEY;
use monglo_core::{AdminError, EngineOptions, MongloEngine, SortOrder};
use monglo_db::backends::MemoryBackend;
use monglo_ops::crud::{CrudOperations, ListQuery};
use monglo_ops::EngineOpsExt;
use rstest::*;

struct Shop {
	backend: MemoryBackend,
	engine: MongloEngine,
}

impl Shop {
	fn crud(&self, collection: &str) -> CrudOperations {
		self.engine
			.ops(collection)
			.expect("collection should be registered")
			.crud()
	}
}

#[fixture]
async fn shop() -> Shop {
	let backend = MemoryBackend::new();
	let users = backend
		.seed(
			"users",
			vec![doc! { "name": "Ada Lovelace" }, doc! { "name": "Grace Hopper" }],
		)
		.expect("seeding should succeed");
	let orders: Vec<Document> = (0..47)
		.map(|i| {
			doc! {
				"number": i,
				"status": if i % 3 == 0 { "paid" } else { "open" },
				"user_id": users[i as usize % 2].clone(),
			}
		})
		.collect();
	backend.seed("orders", orders).expect("seeding should succeed");

	let engine = MongloEngine::new(Arc::new(backend.clone()), EngineOptions::default());
	engine.initialize().await.expect("initialization should succeed");
	Shop { backend, engine }
}

#[rstest]
#[case(1, 10, true, false)]
#[case(5, 7, false, true)]
#[case(10, 0, false, true)]
#[tokio::test]
async fn test_list_pages_over_47_documents(
	#[future] shop: Shop,
	#[case] page: i64,
	#[case] expected_items: usize,
	#[case] has_next: bool,
	#[case] has_prev: bool,
) {
	// Arrange
	let shop = shop.await;
	let crud = shop.crud("orders");

	// Act
	let result = crud
		.list(&ListQuery::new().page(page).per_page(10))
		.await
		.expect("listing should succeed");

	// Assert
	assert_eq!(result.items.len(), expected_items);
	assert_eq!(result.total, 47, "total must not depend on the requested page");
	assert_eq!(result.pages, 5);
	assert_eq!(result.has_next, has_next);
	assert_eq!(result.has_prev, has_prev);
}

#[rstest]
#[tokio::test]
async fn test_list_combines_filters_and_sort(#[future] shop: Shop) {
	let shop = shop.await;
	let crud = shop.crud("orders");
	let query = ListQuery::new()
		.per_page(100)
		.filters(doc! { "status": "paid", "number__gte": 30 })
		.sort(vec![("number".to_string(), SortOrder::Descending)]);

	let result = crud.list(&query).await.expect("listing should succeed");

	let numbers: Vec<i32> = result
		.items
		.iter()
		.filter_map(|d| d.get_i32("number").ok())
		.collect();
	assert_eq!(numbers, vec![45, 42, 39, 36, 33, 30]);
	assert_eq!(result.total, 6);
}

#[rstest]
#[tokio::test]
async fn test_list_search_uses_configured_fields(#[future] shop: Shop) {
	let shop = shop.await;
	let crud = shop.crud("users");

	let result = crud
		.list(&ListQuery::new().search("hopper"))
		.await
		.expect("listing should succeed");

	assert_eq!(result.total, 1);
	assert_eq!(result.items[0].get_str("name").ok(), Some("Grace Hopper"));
}

#[rstest]
#[tokio::test]
async fn test_list_falls_back_to_configured_default_sort(#[future] shop: Shop) {
	// Arrange
	let shop = shop.await;
	let mut config = CollectionConfig::default();
	config.table_view.default_sort = vec![("number".to_string(), SortOrder::Descending)];
	shop.engine.unregister_collection("orders");
	shop.engine
		.register_collection("orders", Some(config))
		.await
		.expect("registration should succeed");

	// Act
	let result = shop
		.crud("orders")
		.list(&ListQuery::new().per_page(3))
		.await
		.expect("listing should succeed");

	// Assert
	let numbers: Vec<i32> = result
		.items
		.iter()
		.filter_map(|d| d.get_i32("number").ok())
		.collect();
	assert_eq!(numbers, vec![46, 45, 44]);
}

#[rstest]
#[tokio::test]
async fn test_update_with_empty_data_never_writes(#[future] shop: Shop) {
	// Arrange
	let shop = shop.await;
	let crud = shop.crud("users");
	let before = crud
		.list(&ListQuery::new())
		.await
		.expect("listing should succeed")
		.items;
	let id = before[0]
		.get_object_id("_id")
		.expect("seeded documents have ids")
		.to_hex();

	// Act
	let result = crud.update(&id, Document::new(), true).await;
	let malformed = crud.update("nope", Document::new(), false).await;

	// Assert
	assert!(matches!(result, Err(AdminError::Validation(_))), "got {result:?}");
	assert!(matches!(malformed, Err(AdminError::Validation(_))));
	let after = crud
		.list(&ListQuery::new())
		.await
		.expect("listing should succeed")
		.items;
	assert_eq!(before, after, "no document may change");
}

#[rstest]
#[tokio::test]
async fn test_create_returns_stored_document(#[future] shop: Shop) {
	let shop = shop.await;
	let crud = shop.crud("users");

	let created = crud
		.create(doc! { "name": "Katherine Johnson", "roles": ["math"] })
		.await
		.expect("create should succeed");

	let id = created.get_object_id("_id").expect("the store assigns an id");
	assert_eq!(created.get_str("name").ok(), Some("Katherine Johnson"));
	assert_eq!(
		created.get_array("roles").ok(),
		Some(&vec![Bson::String("math".to_string())])
	);
	let fetched = crud.get(&id.to_hex()).await.expect("document should exist");
	assert_eq!(created, fetched);
}

#[rstest]
#[tokio::test]
async fn test_partial_update_merges_fields(#[future] shop: Shop) {
	let shop = shop.await;
	let crud = shop.crud("users");
	let created = crud
		.create(doc! { "name": "Ada", "age": 36 })
		.await
		.expect("create should succeed");
	let id = created.get_object_id("_id").expect("id assigned").to_hex();

	let updated = crud
		.update(&id, doc! { "_id": ObjectId::new(), "age": 37 }, true)
		.await
		.expect("update should succeed");

	assert_eq!(updated.get_str("name").ok(), Some("Ada"));
	assert_eq!(updated.get_i32("age").ok(), Some(37));
	assert_eq!(updated.get_object_id("_id").ok(), created.get_object_id("_id").ok());
}

#[rstest]
#[tokio::test]
async fn test_update_of_missing_document_is_not_found(#[future] shop: Shop) {
	let shop = shop.await;
	let crud = shop.crud("users");

	let result = crud
		.update(&ObjectId::new().to_hex(), doc! { "name": "Ghost" }, true)
		.await;

	assert!(result.is_err_and(|e| e.is_not_found()));
}

#[rstest]
#[tokio::test]
async fn test_relationships_attached_with_one_query_per_relationship(#[future] shop: Shop) {
	// Arrange
	let shop = shop.await;
	let crud = shop.crud("orders");
	let relationships = crud.admin().relationships().len();
	assert!(relationships >= 1, "user_id should be detected");
	let query = ListQuery::new().per_page(20);
	let page = crud.list(&query).await.expect("listing should succeed");
	shop.backend.reset_query_count();

	// Act
	let resolved = crud
		.list_with_relationships(&query)
		.await
		.expect("listing should succeed");

	// Assert
	assert_eq!(
		shop.backend.query_count(),
		2 + relationships as u64,
		"one count, one find, then one lookup per relationship"
	);
	assert_eq!(resolved.items.len(), page.items.len());
	let user = resolved.items[0]
		.get_document(RELATIONSHIPS_KEY)
		.and_then(|related| related.get_document("user_id"))
		.expect("user should be attached");
	assert_eq!(user.get("_id"), page.items[0].get("user_id"));
}

#[rstest]
#[tokio::test]
async fn test_unregistered_collection_has_no_ops(#[future] shop: Shop) {
	let shop = shop.await;

	let result = shop.engine.ops("invoices");

	assert!(matches!(result, Err(AdminError::NotRegistered(_))));
}
