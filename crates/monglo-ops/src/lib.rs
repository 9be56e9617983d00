//! # Monglo Ops
//!
//! Operations over registered collections.
//!
//! ## Modules
//!
//! - [`crud`]: list/get/create/update/delete with id conversion and
//!   re-fetch after writes
//! - [`pagination`]: offset pages with totals and counter-free cursor pages
//! - [`search`] and [`aggregations`]: substring search, statistics,
//!   grouping and date histograms
//! - [`export`]: JSON, CSV and NDJSON rendering of documents
//! - [`transactions`]: bounded exponential-backoff retry of transient
//!   failures, and MongoDB transactions
//! - [`audit`] and [`validation`]: write trail and opt-in field checks
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::{EngineOptions, MongloEngine};
//! use monglo_db::backends::MemoryBackend;
//! use monglo_ops::{EngineOpsExt, crud::ListQuery};
//! use bson::doc;
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let backend = MemoryBackend::new();
//! backend.seed("users", vec![doc! { "name": "Ada" }, doc! { "name": "Grace" }])?;
//!
//! let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
//! engine.initialize().await?;
//!
//! let page = engine.ops("users")?.crud().list(&ListQuery::new()).await?;
//! assert_eq!(page.total, 2);
//! # Ok(())
//! # }
//! ```

pub mod aggregations;
pub mod audit;
pub mod crud;
pub mod export;
pub mod pagination;
pub mod search;
pub mod transactions;
pub mod validation;

use std::sync::Arc;

use monglo_core::error::AdminResult;
use monglo_core::{CollectionAdmin, MongloEngine};

pub use aggregations::AggregationOperations;
pub use audit::{AuditLogger, AuditUser};
pub use crud::{CrudOperations, ListQuery};
pub use export::{ExportFormat, ExportOperations};
pub use pagination::{PageResult, PaginationHandler};
pub use search::SearchOperations;
pub use transactions::with_retry;
pub use validation::DataValidator;

/// Operation handles for one registered collection
#[derive(Debug, Clone)]
pub struct CollectionOps {
	admin: Arc<CollectionAdmin>,
}

impl CollectionOps {
	pub fn new(admin: Arc<CollectionAdmin>) -> Self {
		Self { admin }
	}

	pub fn admin(&self) -> &Arc<CollectionAdmin> {
		&self.admin
	}

	pub fn crud(&self) -> CrudOperations {
		CrudOperations::new(Arc::clone(&self.admin))
	}

	/// Pagination capped at the collection's `max_per_page`
	pub fn pagination(&self) -> PaginationHandler {
		PaginationHandler::new(Arc::clone(self.admin.database()), self.admin.name())
			.with_max_per_page(u64::from(self.admin.config().pagination.max_per_page))
	}

	/// Search over the configured search fields
	pub fn search(&self) -> SearchOperations {
		SearchOperations::new(
			Arc::clone(self.admin.database()),
			self.admin.name(),
			self.admin.config().search_fields().to_vec(),
		)
	}

	pub fn aggregations(&self) -> AggregationOperations {
		AggregationOperations::new(Arc::clone(self.admin.database()), self.admin.name())
	}

	pub fn exporter(&self) -> ExportOperations {
		ExportOperations::new(Arc::clone(self.admin.database()), self.admin.name())
	}

	/// Validator with no constraints yet
	pub fn validator(&self) -> DataValidator {
		DataValidator::new(Arc::clone(self.admin.database()), self.admin.name())
	}
}

/// Builds [`CollectionOps`] from an engine's registry
pub trait EngineOpsExt {
	/// Fails with `NotRegistered` when `name` is not registered
	fn ops(&self, name: &str) -> AdminResult<CollectionOps>;
}

impl EngineOpsExt for MongloEngine {
	fn ops(&self, name: &str) -> AdminResult<CollectionOps> {
		self.collection(name).map(CollectionOps::new)
	}
}
