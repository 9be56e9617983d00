//! # Monglo
//!
//! Schema-less administration layer for MongoDB.
//!
//! Monglo discovers collections, infers a schema from sampled documents,
//! detects references between collections and exposes generic CRUD,
//! search, pagination, aggregation and export over any of them. UI adapters
//! build on the view configuration and the auth provider interface.
//!
//! ## Feature Flags
//!
//! - `full` (default) - every layer below
//! - `mongodb` - MongoDB backend; the in-memory backend is always available
//! - `views` - serializers and table/document/graph view configuration
//! - `auth` - authentication provider interface and a simple provider
//!
//! ## Quick Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use monglo::bson::doc;
//! use monglo::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MemoryBackend::new();
//! let users = backend.seed("users", vec![doc! { "name": "Ada" }])?;
//! backend.seed("orders", vec![doc! { "total": 12.5, "user_id": users[0].clone() }])?;
//!
//! let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
//! engine.initialize().await?;
//!
//! let orders = engine.collection("orders")?;
//! assert_eq!(orders.relationships()[0].target_collection, "users");
//!
//! let page = engine.ops("orders")?.crud().list(&ListQuery::new()).await?;
//! assert_eq!(page.total, 1);
//! # Ok(())
//! # }
//! ```

pub use monglo_core as core;
pub use monglo_db as db;
pub use monglo_db::bson;
pub use monglo_ops as ops;

#[cfg(feature = "auth")]
pub use monglo_auth as auth;
#[cfg(feature = "views")]
pub use monglo_views as views;

pub use monglo_core::{
	AdminError, AdminResult, CollectionAdmin, CollectionConfig, CollectionRegistry, EngineOptions,
	FieldType, MongloEngine, MongloSettings, Relationship, RelationshipDetection, RelationshipType,
	Schema, SortOrder,
};
pub use monglo_db::DocumentBackend;
pub use monglo_db::backends::MemoryBackend;
#[cfg(feature = "mongodb")]
pub use monglo_db::backends::MongoDBBackend;
pub use monglo_ops::{CrudOperations, EngineOpsExt, ExportFormat, ListQuery};

/// Re-exports for the common case
pub mod prelude {
	pub use crate::{
		AdminError, AdminResult, CollectionConfig, DocumentBackend, EngineOpsExt, EngineOptions,
		ExportFormat, ListQuery, MemoryBackend, MongloEngine, MongloSettings, Relationship,
		RelationshipType,
	};

	#[cfg(feature = "mongodb")]
	pub use crate::MongoDBBackend;

	#[cfg(feature = "views")]
	pub use monglo_views::{DocumentView, RelationshipView, TableView};

	#[cfg(feature = "auth")]
	pub use monglo_auth::{Action, AuthProvider, AuthUser, SimpleAuthProvider};
}
