//! Single-document view configuration

use std::sync::Arc;

use monglo_core::config::DocumentLayout;
use monglo_core::introspection::{FieldSchema, FieldType, Schema};
use monglo_core::query_builder::ID_FIELD;
use monglo_core::relationships::RelationshipType;
use monglo_core::CollectionAdmin;
use serde::Serialize;

use crate::widgets::{Widget, field_label, infer_widget};

/// One editable or displayed field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConfig {
	pub path: String,
	#[serde(rename = "type")]
	pub field_type: FieldType,
	pub label: String,
	pub widget: Widget,
	pub readonly: bool,
	pub required: bool,
	pub nullable: bool,
	pub frequency: f64,
	/// Direct children of an embedded document
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<FieldConfig>,
}

/// Relationship as shown next to the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipField {
	pub field: String,
	pub collection: String,
	#[serde(rename = "type")]
	pub relationship_type: RelationshipType,
	pub target_field: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reverse_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentConfig {
	pub collection: String,
	pub display_name: String,
	pub layout: DocumentLayout,
	pub fields: Vec<FieldConfig>,
	pub relationships: Vec<RelationshipField>,
	pub readonly_fields: Vec<String>,
	pub enable_relationships: bool,
	pub relationship_depth: u32,
}

/// Document view of a registered collection
#[derive(Debug, Clone)]
pub struct DocumentView {
	admin: Arc<CollectionAdmin>,
}

impl DocumentView {
	pub fn new(admin: Arc<CollectionAdmin>) -> Self {
		Self { admin }
	}

	/// Renders the view for `schema`, or for the registered schema when
	/// `None`.
	///
	/// Only top-level paths become fields; an embedded document lists its
	/// direct children under `fields`. Array element paths (`[]`) are never
	/// shown.
	pub fn render_config(&self, schema: Option<&Schema>) -> DocumentConfig {
		let config = self.admin.config();
		let view = &config.document_view;
		let fields = match schema.or_else(|| self.admin.schema()) {
			Some(schema) => schema
				.iter()
				.filter(|(path, _)| !path.contains('.'))
				.map(|(path, field)| self.field(schema, path, field, false))
				.collect(),
			None => Vec::new(),
		};
		let relationships = self
			.admin
			.relationships()
			.iter()
			.map(|relationship| RelationshipField {
				field: relationship.source_field.clone(),
				collection: relationship.target_collection.clone(),
				relationship_type: relationship.relationship_type,
				target_field: relationship.target_field.clone(),
				reverse_name: relationship.reverse_name.clone(),
			})
			.collect();

		DocumentConfig {
			collection: self.admin.name().to_string(),
			display_name: self.admin.display_name(),
			layout: view.layout,
			fields,
			relationships,
			readonly_fields: view.readonly_fields.clone(),
			enable_relationships: view.enable_relationships,
			relationship_depth: view.relationship_depth,
		}
	}

	fn field(&self, schema: &Schema, path: &str, field: &FieldSchema, parent_readonly: bool) -> FieldConfig {
		let readonly = parent_readonly
			|| self
				.admin
				.config()
				.document_view
				.readonly_fields
				.iter()
				.any(|f| f == path);
		let fields = if field.primary_type == FieldType::Embedded {
			let prefix = format!("{path}.");
			schema
				.iter()
				.filter(|(child, _)| {
					child
						.strip_prefix(&prefix)
						.is_some_and(|rest| !rest.contains('.'))
				})
				.map(|(child, child_field)| self.field(schema, child, child_field, readonly))
				.collect()
		} else {
			Vec::new()
		};
		FieldConfig {
			path: path.to_string(),
			field_type: field.primary_type,
			label: field_label(path),
			widget: infer_widget(field.primary_type, readonly),
			readonly,
			required: path == ID_FIELD,
			nullable: field.nullable,
			frequency: field.frequency,
			fields,
		}
	}
}
