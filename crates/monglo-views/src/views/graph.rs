//! Relationship graph of collections

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use monglo_core::registry::title_case;
use monglo_core::relationships::{Relationship, RelationshipType};
use monglo_core::{CollectionAdmin, CollectionRegistry};
use serde::Serialize;
use tracing::debug;

/// A collection in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	/// `false` for targets that are referenced but not administered
	pub registered: bool,
}

/// A relationship in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
	pub source: String,
	pub target: String,
	pub field: String,
	#[serde(rename = "type")]
	pub relationship_type: RelationshipType,
	pub target_field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipGraph {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
}

#[derive(Default)]
struct GraphBuilder {
	nodes: IndexMap<String, GraphNode>,
	edges: Vec<GraphEdge>,
	seen: IndexSet<(String, String, String)>,
}

impl GraphBuilder {
	fn node(&mut self, name: &str, label: String, registered: bool) {
		let node = self.nodes.entry(name.to_string()).or_insert_with(|| GraphNode {
			id: name.to_string(),
			label: label.clone(),
			registered,
		});
		if registered && !node.registered {
			node.label = label;
			node.registered = true;
		}
	}

	fn admin(&mut self, admin: &CollectionAdmin) {
		self.node(admin.name(), admin.display_name(), true);
		for relationship in admin.relationships() {
			self.edge(relationship);
		}
	}

	/// Skips an edge already added for the same (source, field, target)
	fn edge(&mut self, relationship: &Relationship) {
		let key = (
			relationship.source_collection.clone(),
			relationship.source_field.clone(),
			relationship.target_collection.clone(),
		);
		if !self.seen.insert(key) {
			debug!(
				source = %relationship.source_collection,
				field = %relationship.source_field,
				target = %relationship.target_collection,
				"Skipping duplicate relationship edge"
			);
			return;
		}
		let target = &relationship.target_collection;
		self.node(target, title_case(&target.replace('_', " ")), false);
		self.edges.push(GraphEdge {
			source: relationship.source_collection.clone(),
			target: target.clone(),
			field: relationship.source_field.clone(),
			relationship_type: relationship.relationship_type,
			target_field: relationship.target_field.clone(),
		});
	}

	fn build(self) -> RelationshipGraph {
		RelationshipGraph {
			nodes: self.nodes.into_values().collect(),
			edges: self.edges,
		}
	}
}

/// Relationship view of one collection, or of a whole registry
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use monglo_core::{CollectionAdmin, CollectionConfig, Relationship, RelationshipType};
/// use monglo_db::backends::MemoryBackend;
/// use monglo_views::views::RelationshipView;
///
/// let admin = CollectionAdmin::new("orders", Arc::new(MemoryBackend::new()), CollectionConfig::default())
///     .with_relationships(vec![Relationship::new("orders", "user_id", "users", RelationshipType::OneToOne)]);
///
/// let graph = RelationshipView::new(Arc::new(admin)).render_config();
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.edges[0].field, "user_id");
/// ```
#[derive(Debug, Clone)]
pub struct RelationshipView {
	admin: Arc<CollectionAdmin>,
}

impl RelationshipView {
	pub fn new(admin: Arc<CollectionAdmin>) -> Self {
		Self { admin }
	}

	/// The collection, its relationship targets and the edges between them
	pub fn render_config(&self) -> RelationshipGraph {
		let mut builder = GraphBuilder::default();
		builder.admin(&self.admin);
		builder.build()
	}

	/// Every registered collection with all their relationships
	pub fn render_full_graph(registry: &CollectionRegistry) -> RelationshipGraph {
		let mut builder = GraphBuilder::default();
		for admin in registry.get_all() {
			builder.admin(&admin);
		}
		builder.build()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use monglo_core::CollectionConfig;
	use monglo_db::backends::MemoryBackend;
	use rstest::*;

	fn admin(name: &str, relationships: Vec<Relationship>) -> CollectionAdmin {
		CollectionAdmin::new(name, Arc::new(MemoryBackend::new()), CollectionConfig::default())
			.with_relationships(relationships)
	}

	#[fixture]
	fn registry() -> CollectionRegistry {
		let mut registry = CollectionRegistry::new();
		let order_user = Relationship::new("orders", "user_id", "users", RelationshipType::OneToOne);
		registry
			.register(admin(
				"orders",
				vec![
					order_user.clone(),
					order_user,
					Relationship::new("orders", "item_ids", "line_items", RelationshipType::OneToMany),
				],
			))
			.expect("orders should register");
		registry
			.register(admin(
				"users",
				vec![Relationship::new("users", "team_id", "teams", RelationshipType::OneToOne)],
			))
			.expect("users should register");
		registry
	}

	#[rstest]
	fn test_full_graph_dedupes_edges(registry: CollectionRegistry) {
		// Act
		let graph = RelationshipView::render_full_graph(&registry);

		// Assert
		let edges: Vec<(&str, &str, &str)> = graph
			.edges
			.iter()
			.map(|e| (e.source.as_str(), e.field.as_str(), e.target.as_str()))
			.collect();
		assert_eq!(
			edges,
			vec![
				("orders", "user_id", "users"),
				("orders", "item_ids", "line_items"),
				("users", "team_id", "teams"),
			]
		);
		let nodes: Vec<(&str, &str, bool)> = graph
			.nodes
			.iter()
			.map(|n| (n.id.as_str(), n.label.as_str(), n.registered))
			.collect();
		assert_eq!(
			nodes,
			vec![
				("orders", "Orders", true),
				("users", "Users", true),
				("line_items", "Line Items", false),
				("teams", "Teams", false),
			],
			"a target seen before its registration is promoted in place"
		);
	}

	#[rstest]
	fn test_single_collection_graph(registry: CollectionRegistry) {
		let users = registry.get("users").expect("users is registered");

		let graph = RelationshipView::new(users).render_config();

		assert_eq!(graph.nodes.len(), 2);
		assert_eq!(graph.edges.len(), 1);
		assert_eq!(graph.edges[0].target, "teams");
	}

	#[rstest]
	fn test_empty_registry() {
		let graph = RelationshipView::render_full_graph(&CollectionRegistry::new());

		assert_eq!(graph, RelationshipGraph::default());
	}
}
