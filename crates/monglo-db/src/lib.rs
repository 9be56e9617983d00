//! # Monglo DB
//!
//! Document store layer for Monglo.
//!
//! Every higher layer (introspection, relationship detection, CRUD, export)
//! reaches the database only through the [`DocumentBackend`] trait, shared as
//! an `Arc<dyn DocumentBackend>` handle.
//!
//! ## Backends
//!
//! - [`backends::mongodb::MongoDBBackend`]: the official async driver with
//!   connection pooling (feature `mongodb`, on by default)
//! - [`backends::memory::MemoryBackend`]: process-local collections that
//!   evaluate the same filter, update and pipeline documents
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_db::{DocumentBackend, FindOptions, backends::MemoryBackend};
//! use bson::doc;
//!
//! # async fn example() -> monglo_db::Result<()> {
//! let backend: Arc<dyn DocumentBackend> = Arc::new(MemoryBackend::new());
//! backend.insert_one("users", doc! { "name": "Alice", "age": 31 }).await?;
//!
//! let adults = backend
//!     .find_many("users", doc! { "age": { "$gte": 18 } }, FindOptions::new().limit(10))
//!     .await?;
//! assert_eq!(adults.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod error;
pub mod types;
pub mod value;

pub use backend::DocumentBackend;
pub use error::{DbError, Result};
pub use types::{FindOptions, UpdateResult};

pub use bson;
