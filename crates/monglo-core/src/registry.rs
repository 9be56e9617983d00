//! Collection registry
//!
//! The registry maps collection names to [`CollectionAdmin`] handles. It is
//! an ordinary owned value; the engine wraps it in a lock and hands out
//! `Arc<CollectionAdmin>` clones to callers.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::config::CollectionConfig;
//! use monglo_core::registry::{CollectionAdmin, CollectionRegistry};
//! use monglo_db::backends::MemoryBackend;
//!
//! let database = Arc::new(MemoryBackend::new());
//! let mut registry = CollectionRegistry::new();
//! registry
//!     .register(CollectionAdmin::new("user_profiles", database, CollectionConfig::default()))
//!     .unwrap();
//!
//! let admin = registry.get("user_profiles").unwrap();
//! assert_eq!(admin.display_name(), "User Profiles");
//! assert!(registry.register(CollectionAdmin::new(
//!     "user_profiles",
//!     Arc::new(MemoryBackend::new()),
//!     CollectionConfig::default(),
//! )).is_err());
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use monglo_db::DocumentBackend;

use crate::config::CollectionConfig;
use crate::error::{AdminError, AdminResult};
use crate::introspection::Schema;
use crate::relationships::Relationship;

/// Administrative handle for one collection
///
/// The store handle is shared with every other admin; the configuration and
/// relationships belong to this registration and are replaced wholesale
/// when the collection is refreshed.
#[derive(Clone)]
pub struct CollectionAdmin {
	name: String,
	database: Arc<dyn DocumentBackend>,
	config: CollectionConfig,
	relationships: Vec<Relationship>,
	schema: Option<Schema>,
}

impl std::fmt::Debug for CollectionAdmin {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CollectionAdmin")
			.field("name", &self.name)
			.field("backend", &self.database.backend_name())
			.field("relationships", &self.relationships.len())
			.finish()
	}
}

impl CollectionAdmin {
	pub fn new(
		name: impl Into<String>,
		database: Arc<dyn DocumentBackend>,
		config: CollectionConfig,
	) -> Self {
		Self {
			name: name.into(),
			database,
			config,
			relationships: Vec::new(),
			schema: None,
		}
	}

	pub fn with_relationships(mut self, relationships: Vec<Relationship>) -> Self {
		self.relationships = relationships;
		self
	}

	/// Attaches the schema inferred at registration
	pub fn with_schema(mut self, schema: Schema) -> Self {
		self.schema = Some(schema);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Shared store handle
	pub fn database(&self) -> &Arc<dyn DocumentBackend> {
		&self.database
	}

	pub fn config(&self) -> &CollectionConfig {
		&self.config
	}

	pub fn relationships(&self) -> &[Relationship] {
		&self.relationships
	}

	pub fn schema(&self) -> Option<&Schema> {
		self.schema.as_ref()
	}

	/// Configured display name, else the collection name title-cased with
	/// underscores turned into spaces
	pub fn display_name(&self) -> String {
		match &self.config.display_name {
			Some(name) => name.clone(),
			None => title_case(&self.name.replace('_', " ")),
		}
	}

	/// Relationship whose source is `field`
	pub fn get_relationship(&self, field: &str) -> Option<&Relationship> {
		self.relationships.iter().find(|r| r.source_field == field)
	}
}

/// Capitalizes the first letter of every alphabetic run and lowercases the
/// rest (`order_items` → `Order_Items`, `api keys` → `Api Keys`)
pub fn title_case(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut at_word_start = true;
	for ch in text.chars() {
		if ch.is_alphabetic() {
			if at_word_start {
				out.extend(ch.to_uppercase());
			} else {
				out.extend(ch.to_lowercase());
			}
			at_word_start = false;
		} else {
			out.push(ch);
			at_word_start = true;
		}
	}
	out
}

/// Name → admin mapping with unique names, in registration order
#[derive(Debug, Default)]
pub struct CollectionRegistry {
	collections: IndexMap<String, Arc<CollectionAdmin>>,
}

impl CollectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an admin; an already present name is rejected and the
	/// registry is left unchanged.
	pub fn register(&mut self, admin: CollectionAdmin) -> AdminResult<Arc<CollectionAdmin>> {
		if self.collections.contains_key(admin.name()) {
			return Err(AdminError::AlreadyRegistered(admin.name().to_string()));
		}
		let admin = Arc::new(admin);
		self.collections
			.insert(admin.name().to_string(), Arc::clone(&admin));
		Ok(admin)
	}

	/// Swaps in a new admin for a registered name, keeping its position.
	/// Fails with `NotRegistered` and leaves the registry unchanged when the
	/// name is absent.
	pub fn replace(&mut self, admin: CollectionAdmin) -> AdminResult<Arc<CollectionAdmin>> {
		let Some(slot) = self.collections.get_mut(admin.name()) else {
			return Err(AdminError::NotRegistered(admin.name().to_string()));
		};
		let admin = Arc::new(admin);
		*slot = Arc::clone(&admin);
		Ok(admin)
	}

	/// Removes a registration; missing names are ignored.
	pub fn unregister(&mut self, name: &str) -> Option<Arc<CollectionAdmin>> {
		self.collections.shift_remove(name)
	}

	pub fn get(&self, name: &str) -> AdminResult<Arc<CollectionAdmin>> {
		self.collections
			.get(name)
			.cloned()
			.ok_or_else(|| AdminError::NotRegistered(name.to_string()))
	}

	pub fn get_all(&self) -> Vec<Arc<CollectionAdmin>> {
		self.collections.values().cloned().collect()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.collections.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.collections.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CollectionAdmin>)> {
		self.collections.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.collections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.collections.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::relationships::RelationshipType;
	use monglo_db::backends::MemoryBackend;
	use rstest::*;

	#[fixture]
	fn database() -> Arc<dyn DocumentBackend> {
		Arc::new(MemoryBackend::new())
	}

	#[rstest]
	#[case("users", "Users")]
	#[case("order_items", "Order Items")]
	#[case("API_keys", "Api Keys")]
	#[case("v2_events", "V2 Events")]
	fn test_display_name_fallback(
		database: Arc<dyn DocumentBackend>,
		#[case] name: &str,
		#[case] expected: &str,
	) {
		let admin = CollectionAdmin::new(name, database, CollectionConfig::default());

		assert_eq!(admin.display_name(), expected);
	}

	#[rstest]
	fn test_configured_display_name(database: Arc<dyn DocumentBackend>) {
		let config = CollectionConfig {
			display_name: Some("People".to_string()),
			..Default::default()
		};

		let admin = CollectionAdmin::new("users", database, config);

		assert_eq!(admin.display_name(), "People");
	}

	#[rstest]
	fn test_get_relationship(database: Arc<dyn DocumentBackend>) {
		let admin = CollectionAdmin::new("orders", database, CollectionConfig::default())
			.with_relationships(vec![Relationship::new(
				"orders",
				"user_id",
				"users",
				RelationshipType::OneToOne,
			)]);

		assert_eq!(
			admin.get_relationship("user_id").map(|r| r.target_collection.as_str()),
			Some("users")
		);
		assert!(admin.get_relationship("sku").is_none());
	}

	#[rstest]
	fn test_registry_lifecycle(database: Arc<dyn DocumentBackend>) {
		// Arrange
		let mut registry = CollectionRegistry::new();
		let users = CollectionAdmin::new("users", Arc::clone(&database), CollectionConfig::default());
		let orders = CollectionAdmin::new("orders", Arc::clone(&database), CollectionConfig::default());

		// Act
		registry.register(users.clone()).expect("first registration should succeed");
		registry.register(orders).expect("first registration should succeed");
		let duplicate = registry.register(users);

		// Assert
		assert!(matches!(duplicate, Err(AdminError::AlreadyRegistered(name)) if name == "users"));
		assert_eq!(registry.len(), 2, "failed registration leaves registry unchanged");
		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["users", "orders"]);
		assert!(registry.contains("orders"));

		assert!(registry.unregister("users").is_some());
		assert!(registry.unregister("users").is_none(), "unregistering twice is a no-op");
		assert!(matches!(registry.get("users"), Err(AdminError::NotRegistered(_))));
		assert_eq!(registry.get_all().len(), 1);
	}

	#[rstest]
	fn test_replace_keeps_position(database: Arc<dyn DocumentBackend>) {
		let mut registry = CollectionRegistry::new();
		for name in ["users", "orders"] {
			registry
				.register(CollectionAdmin::new(name, Arc::clone(&database), CollectionConfig::default()))
				.expect("first registration should succeed");
		}
		let renamed = CollectionConfig {
			display_name: Some("People".to_string()),
			..Default::default()
		};

		let replaced = registry.replace(CollectionAdmin::new("users", Arc::clone(&database), renamed));
		let missing = registry.replace(CollectionAdmin::new(
			"invoices",
			Arc::clone(&database),
			CollectionConfig::default(),
		));

		assert_eq!(replaced.map(|admin| admin.display_name()).ok(), Some("People".to_string()));
		assert!(matches!(missing, Err(AdminError::NotRegistered(name)) if name == "invoices"));
		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["users", "orders"]);
		assert_eq!(
			registry.get("users").map(|admin| admin.display_name()).ok(),
			Some("People".to_string())
		);
	}
}
