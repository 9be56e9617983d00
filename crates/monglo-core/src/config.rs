//! Per-collection configuration
//!
//! Configuration is either supplied by the embedding application or derived
//! from an introspected [`Schema`] with [`CollectionConfig::from_schema`].
//! Every type deserializes with defaults for omitted keys, so partial
//! configuration files are valid.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AdminError, AdminResult};
use crate::introspection::{FieldType, Schema};
use crate::query_builder::SortOrder;
use crate::relationships::Relationship;

/// Maximum number of search fields derived from a schema
const DERIVED_SEARCH_FIELDS: usize = 5;

/// Maximum number of list fields derived from a schema
const DERIVED_LIST_FIELDS: usize = 10;

fn strings(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| s.to_string()).collect()
}

/// Column shown in the table view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
	pub field: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sortable: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub formatter: Option<String>,
}

impl ColumnConfig {
	pub fn new(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			..Default::default()
		}
	}
}

/// Table view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableViewConfig {
	pub columns: Vec<ColumnConfig>,
	pub default_sort: Vec<(String, SortOrder)>,
	/// Rows per page, `1..=100`
	pub per_page: u32,
	pub enable_bulk_actions: bool,
	pub enable_export: bool,
	pub row_actions: Vec<String>,
}

impl Default for TableViewConfig {
	fn default() -> Self {
		Self {
			columns: Vec::new(),
			default_sort: Vec::new(),
			per_page: 20,
			enable_bulk_actions: true,
			enable_export: true,
			row_actions: strings(&["view", "edit", "delete"]),
		}
	}
}

/// Document view layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentLayout {
	/// JSON-like tree
	#[default]
	Tree,
	/// Form inputs
	Form,
}

/// Document view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentViewConfig {
	pub layout: DocumentLayout,
	pub readonly_fields: Vec<String>,
	pub enable_relationships: bool,
	/// `1..=3`
	pub relationship_depth: u32,
}

impl Default for DocumentViewConfig {
	fn default() -> Self {
		Self {
			layout: DocumentLayout::Tree,
			readonly_fields: Vec::new(),
			enable_relationships: true,
			relationship_depth: 1,
		}
	}
}

/// Filter widget kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
	Eq,
	Ne,
	Gt,
	Lt,
	Gte,
	Lte,
	In,
	Regex,
	Range,
	DateRange,
}

/// A filter offered on the table view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
	pub field: String,
	#[serde(rename = "type")]
	pub filter_type: FilterType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<Vec<serde_json::Value>>,
}

impl FilterConfig {
	pub fn new(field: impl Into<String>, filter_type: FilterType) -> Self {
		Self {
			field: field.into(),
			filter_type,
			label: None,
			options: None,
		}
	}
}

/// How list pages are addressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStyle {
	#[default]
	Offset,
	Cursor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
	pub style: PaginationStyle,
	pub per_page: u32,
	pub max_per_page: u32,
}

impl Default for PaginationConfig {
	fn default() -> Self {
		Self {
			style: PaginationStyle::Offset,
			per_page: 20,
			max_per_page: 100,
		}
	}
}

/// Complete configuration of one administered collection
///
/// # Examples
///
/// ```rust
/// use monglo_core::config::{CollectionConfig, FilterConfig, FilterType};
///
/// let mut config = CollectionConfig::default();
/// config.display_name = Some("Customers".to_string());
/// config.filters.push(FilterConfig::new("status", FilterType::Eq));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.actions, vec!["create", "edit", "delete"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
	/// Set to the registered collection name on registration
	pub name: Option<String>,
	pub display_name: Option<String>,
	pub icon: Option<String>,

	pub list_fields: Option<Vec<String>>,
	pub search_fields: Option<Vec<String>>,
	pub sortable_fields: Option<Vec<String>>,

	pub table_view: TableViewConfig,
	pub document_view: DocumentViewConfig,
	pub filters: Vec<FilterConfig>,

	/// Manually declared relationships
	pub relationships: Vec<Relationship>,

	pub actions: Vec<String>,
	pub bulk_actions: Vec<String>,
	pub custom_actions: Vec<String>,

	/// Role → allowed actions
	pub permissions: IndexMap<String, Vec<String>>,

	#[serde(rename = "pagination_config")]
	pub pagination: PaginationConfig,
}

impl Default for CollectionConfig {
	fn default() -> Self {
		Self {
			name: None,
			display_name: None,
			icon: None,
			list_fields: None,
			search_fields: None,
			sortable_fields: None,
			table_view: TableViewConfig::default(),
			document_view: DocumentViewConfig::default(),
			filters: Vec::new(),
			relationships: Vec::new(),
			actions: strings(&["create", "edit", "delete"]),
			bulk_actions: strings(&["delete", "export"]),
			custom_actions: Vec::new(),
			permissions: IndexMap::new(),
			pagination: PaginationConfig::default(),
		}
	}
}

impl CollectionConfig {
	/// Derives list, search and sortable fields from a schema.
	///
	/// The first five string fields become search fields, fields with an
	/// orderable primary type become sortable, and the first ten paths
	/// become list fields.
	pub fn from_schema(schema: &Schema) -> Self {
		let search_fields = schema
			.iter()
			.filter(|(_, field)| field.primary_type == FieldType::String)
			.map(|(path, _)| path.clone())
			.take(DERIVED_SEARCH_FIELDS)
			.collect();
		let sortable_fields = schema
			.iter()
			.filter(|(_, field)| field.primary_type.is_sortable())
			.map(|(path, _)| path.clone())
			.collect();
		let list_fields = schema
			.paths()
			.take(DERIVED_LIST_FIELDS)
			.map(str::to_string)
			.collect();

		Self {
			list_fields: Some(list_fields),
			search_fields: Some(search_fields),
			sortable_fields: Some(sortable_fields),
			..Self::default()
		}
	}

	/// Rejects out-of-range values
	pub fn validate(&self) -> AdminResult<()> {
		if !(1..=100).contains(&self.table_view.per_page) {
			return Err(AdminError::InvalidConfig(format!(
				"table_view.per_page must be between 1 and 100, got {}",
				self.table_view.per_page
			)));
		}
		if !(1..=3).contains(&self.document_view.relationship_depth) {
			return Err(AdminError::InvalidConfig(format!(
				"document_view.relationship_depth must be between 1 and 3, got {}",
				self.document_view.relationship_depth
			)));
		}
		let pagination = &self.pagination;
		if pagination.max_per_page == 0 {
			return Err(AdminError::InvalidConfig(
				"pagination_config.max_per_page must be at least 1".to_string(),
			));
		}
		if pagination.per_page == 0 || pagination.per_page > pagination.max_per_page {
			return Err(AdminError::InvalidConfig(format!(
				"pagination_config.per_page must be between 1 and {}, got {}",
				pagination.max_per_page, pagination.per_page
			)));
		}
		Ok(())
	}

	/// Configured search fields, empty when none
	pub fn search_fields(&self) -> &[String] {
		self.search_fields.as_deref().unwrap_or_default()
	}

	/// Configured list fields, empty when none
	pub fn list_fields(&self) -> &[String] {
		self.list_fields.as_deref().unwrap_or_default()
	}

	pub fn is_sortable(&self, field: &str) -> bool {
		self.sortable_fields
			.as_deref()
			.is_some_and(|fields| fields.iter().any(|f| f == field))
	}
}
