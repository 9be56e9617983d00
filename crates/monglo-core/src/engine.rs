//! Administration engine
//!
//! [`MongloEngine`] owns the collection registry and wires introspection and
//! relationship detection into registration. It holds no global state: each
//! engine is an ordinary value around a shared store handle.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::engine::{EngineOptions, MongloEngine};
//! use monglo_db::backends::MemoryBackend;
//! use bson::doc;
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let backend = MemoryBackend::new();
//! let ada = backend.seed("users", vec![doc! { "name": "Ada" }])?;
//! backend.seed("orders", vec![doc! { "user_id": ada[0].clone(), "total": 12.5 }])?;
//!
//! let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
//! engine.initialize().await?;
//!
//! let orders = engine.collection("orders")?;
//! assert_eq!(orders.relationships()[0].target_collection, "users");
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bson::Document;
use monglo_db::DocumentBackend;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};

use crate::config::CollectionConfig;
use crate::error::{AdminError, AdminResult};
use crate::introspection::SchemaIntrospector;
use crate::registry::{CollectionAdmin, CollectionRegistry};
use crate::relationships::RelationshipDetector;
use crate::settings::MongloSettings;

/// Prefix of server-managed collections skipped by discovery
const SYSTEM_PREFIX: &str = "system.";

/// Where registered collections get their relationships from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipDetection {
	/// Detected from sampled documents, seeded with configured ones
	#[default]
	Auto,
	/// Configured relationships only
	Manual,
	/// None
	Off,
}

impl std::str::FromStr for RelationshipDetection {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"auto" => Ok(Self::Auto),
			"manual" => Ok(Self::Manual),
			"off" => Ok(Self::Off),
			other => Err(format!("unknown relationship detection mode '{other}'")),
		}
	}
}

/// Engine behaviour switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
	/// Register every collection on [`MongloEngine::initialize`]
	pub auto_discover: bool,
	pub relationship_detection: RelationshipDetection,
	/// Names skipped by discovery
	pub excluded_collections: HashSet<String>,
	/// Documents sampled for introspection and detection
	pub sample_size: usize,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			auto_discover: true,
			relationship_detection: RelationshipDetection::Auto,
			excluded_collections: HashSet::new(),
			sample_size: 100,
		}
	}
}

impl EngineOptions {
	pub fn from_settings(settings: &MongloSettings) -> Self {
		Self {
			auto_discover: settings.engine.auto_discover,
			relationship_detection: settings.engine.relationship_detection,
			excluded_collections: settings.engine.excluded_collections.iter().cloned().collect(),
			sample_size: settings.engine.sample_size,
		}
	}

	pub fn auto_discover(mut self, enabled: bool) -> Self {
		self.auto_discover = enabled;
		self
	}

	pub fn relationship_detection(mut self, mode: RelationshipDetection) -> Self {
		self.relationship_detection = mode;
		self
	}

	pub fn exclude(mut self, collection: impl Into<String>) -> Self {
		self.excluded_collections.insert(collection.into());
		self
	}

	pub fn sample_size(mut self, sample_size: usize) -> Self {
		self.sample_size = sample_size;
		self
	}
}

/// Per-collection entry of [`EngineStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
	pub name: String,
	pub display_name: String,
	pub document_count: u64,
	pub relationship_count: usize,
}

/// Result of [`MongloEngine::get_collection_stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
	pub total_collections: usize,
	pub collections: Vec<CollectionStats>,
}

/// Top-level orchestrator
pub struct MongloEngine {
	database: Arc<dyn DocumentBackend>,
	options: EngineOptions,
	registry: RwLock<CollectionRegistry>,
	introspector: SchemaIntrospector,
	detector: RelationshipDetector,
	/// Configurations supplied by the caller, reused on refresh
	user_configs: RwLock<HashMap<String, CollectionConfig>>,
	initialized: AtomicBool,
}

impl MongloEngine {
	pub fn new(database: Arc<dyn DocumentBackend>, options: EngineOptions) -> Self {
		Self {
			introspector: SchemaIntrospector::new(Arc::clone(&database)),
			detector: RelationshipDetector::new(Arc::clone(&database)),
			database,
			options,
			registry: RwLock::new(CollectionRegistry::new()),
			user_configs: RwLock::new(HashMap::new()),
			initialized: AtomicBool::new(false),
		}
	}

	pub fn database(&self) -> &Arc<dyn DocumentBackend> {
		&self.database
	}

	pub fn options(&self) -> &EngineOptions {
		&self.options
	}

	pub fn introspector(&self) -> &SchemaIntrospector {
		&self.introspector
	}

	pub fn detector(&self) -> &RelationshipDetector {
		&self.detector
	}

	/// Read access to the registry; do not hold across an `.await`
	pub fn registry(&self) -> RwLockReadGuard<'_, CollectionRegistry> {
		self.registry.read()
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized.load(Ordering::SeqCst)
	}

	/// Runs discovery when enabled. Later calls are no-ops.
	///
	/// A collection that fails to register is logged and skipped.
	pub async fn initialize(&self) -> AdminResult<()> {
		if self.is_initialized() {
			return Ok(());
		}

		if self.options.auto_discover {
			self.discover_collections().await?;
		}

		self.initialized.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn discover_collections(&self) -> AdminResult<()> {
		let names = self.database.list_collection_names().await?;
		for name in names {
			if name.starts_with(SYSTEM_PREFIX) || self.options.excluded_collections.contains(&name)
			{
				tracing::debug!(collection = %name, "Skipping collection during discovery");
				continue;
			}
			if self.registry.read().contains(&name) {
				continue;
			}
			if let Err(e) = self.register_collection(&name, None).await {
				tracing::warn!(collection = %name, error = %e, "Failed to register collection");
			}
		}
		Ok(())
	}

	/// Registers a collection.
	///
	/// Without a configuration one is derived from the introspected schema;
	/// a supplied configuration is validated first. Fails with
	/// [`AdminError::AlreadyRegistered`] when the name is taken.
	pub async fn register_collection(
		&self,
		name: &str,
		config: Option<CollectionConfig>,
	) -> AdminResult<Arc<CollectionAdmin>> {
		if self.registry.read().contains(name) {
			return Err(AdminError::AlreadyRegistered(name.to_string()));
		}

		let user_supplied = config.is_some();
		let (admin, config) = self.build_admin(name, config).await?;
		let admin = self.registry.write().register(admin)?;
		if user_supplied {
			self.user_configs.write().insert(name.to_string(), config);
		}

		tracing::info!(
			collection = name,
			relationships = admin.relationships().len(),
			"Registered collection"
		);
		Ok(admin)
	}

	/// Introspects and detects relationships without touching the registry
	async fn build_admin(
		&self,
		name: &str,
		config: Option<CollectionConfig>,
	) -> AdminResult<(CollectionAdmin, CollectionConfig)> {
		let schema = self
			.introspector
			.introspect(name, self.options.sample_size)
			.await?;
		let mut config = match config {
			Some(config) => {
				config.validate()?;
				config
			}
			None => CollectionConfig::from_schema(&schema),
		};
		if config.name.is_none() {
			config.name = Some(name.to_string());
		}

		let relationships = match self.options.relationship_detection {
			RelationshipDetection::Auto => {
				self.detector
					.detect(name, &config, self.options.sample_size)
					.await?
			}
			RelationshipDetection::Manual => config.relationships.clone(),
			RelationshipDetection::Off => Vec::new(),
		};

		let admin = CollectionAdmin::new(name, Arc::clone(&self.database), config.clone())
			.with_relationships(relationships)
			.with_schema(schema);
		Ok((admin, config))
	}

	/// Removes a registration; unknown names are ignored.
	pub fn unregister_collection(&self, name: &str) {
		if self.registry.write().unregister(name).is_some() {
			self.user_configs.write().remove(name);
			tracing::debug!(collection = name, "Unregistered collection");
		}
	}

	/// Re-introspects and re-detects a registered collection, replacing its
	/// registration. A caller-supplied configuration is kept. When the rebuild
	/// fails the previous registration stays in place.
	pub async fn refresh_collection(&self, name: &str) -> AdminResult<Arc<CollectionAdmin>> {
		if !self.registry.read().contains(name) {
			return Err(AdminError::NotRegistered(name.to_string()));
		}

		let config = self.user_configs.read().get(name).cloned();
		self.detector.invalidate_cache();
		let (admin, _) = self.build_admin(name, config).await?;
		let admin = self.registry.write().replace(admin)?;

		tracing::info!(
			collection = name,
			relationships = admin.relationships().len(),
			"Refreshed collection"
		);
		Ok(admin)
	}

	/// Registered admin by name
	pub fn collection(&self, name: &str) -> AdminResult<Arc<CollectionAdmin>> {
		self.registry.read().get(name)
	}

	pub fn collections(&self) -> Vec<Arc<CollectionAdmin>> {
		self.registry.read().get_all()
	}

	pub fn collection_names(&self) -> Vec<String> {
		self.registry.read().names().map(str::to_string).collect()
	}

	/// Document and relationship counts of every registered collection
	pub async fn get_collection_stats(&self) -> AdminResult<EngineStats> {
		let admins = self.collections();
		let mut collections = Vec::with_capacity(admins.len());
		for admin in &admins {
			let document_count = self
				.database
				.count_documents(admin.name(), Document::new())
				.await?;
			collections.push(CollectionStats {
				name: admin.name().to_string(),
				display_name: admin.display_name(),
				document_count,
				relationship_count: admin.relationships().len(),
			});
		}

		Ok(EngineStats {
			total_collections: admins.len(),
			collections,
		})
	}
}
