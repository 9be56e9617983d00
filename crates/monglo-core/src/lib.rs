//! # Monglo Core
//!
//! Schema-less administration primitives for MongoDB databases.
//!
//! ## Overview
//!
//! Collections carry no declared schema, so everything here is inferred:
//!
//! - [`query_builder`]: translation of filter/search/sort/pagination specs
//!   into native query documents
//! - [`introspection`]: field types, frequency and nullability from sampled
//!   documents
//! - [`relationships`]: cross-collection references guessed from field
//!   names and value shapes, and batch resolution of the referenced
//!   documents
//! - [`registry`] and [`engine`]: per-collection administrative handles and
//!   the orchestrator that discovers and registers them
//! - [`index_analyzer`]: index recommendations from samples and tracked
//!   filters
//!
//! Every store round-trip goes through the
//! [`DocumentBackend`](monglo_db::DocumentBackend) trait, so the crate runs
//! equally against MongoDB and the in-memory backend.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::{EngineOptions, MongloEngine};
//! use monglo_db::backends::MemoryBackend;
//! use bson::doc;
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let backend = MemoryBackend::new();
//! backend.seed("products", vec![doc! { "name": "Lamp", "price": 30 }])?;
//!
//! let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
//! engine.initialize().await?;
//!
//! let stats = engine.get_collection_stats().await?;
//! assert_eq!(stats.total_collections, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index_analyzer;
pub mod introspection;
pub mod query_builder;
pub mod registry;
pub mod relationships;
pub mod settings;

pub use config::CollectionConfig;
pub use engine::{EngineOptions, MongloEngine, RelationshipDetection};
pub use error::{AdminError, AdminResult};
pub use introspection::{FieldType, Schema, SchemaIntrospector};
pub use query_builder::{QueryBuilder, SortOrder};
pub use registry::{CollectionAdmin, CollectionRegistry};
pub use relationships::{Relationship, RelationshipType};
pub use settings::MongloSettings;
