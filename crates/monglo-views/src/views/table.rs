//! List view configuration

use std::sync::Arc;

use monglo_core::config::FilterConfig;
use monglo_core::introspection::FieldType;
use monglo_core::query_builder::{ID_FIELD, QueryBuilder, SortOrder};
use monglo_core::CollectionAdmin;
use serde::Serialize;

use crate::widgets::field_label;

/// One table column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
	pub field: String,
	pub label: String,
	pub sortable: bool,
	/// Inferred type, `None` when the schema never saw the field
	#[serde(rename = "type")]
	pub field_type: Option<FieldType>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub formatter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortColumn {
	pub field: String,
	pub order: SortOrder,
}

/// Everything a client needs to render the list of one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableConfig {
	pub collection: String,
	pub display_name: String,
	pub columns: Vec<TableColumn>,
	pub default_sort: Vec<SortColumn>,
	pub per_page: u32,
	pub enable_bulk_actions: bool,
	pub enable_export: bool,
	pub row_actions: Vec<String>,
	pub bulk_actions: Vec<String>,
	pub filters: Vec<FilterConfig>,
	pub search_fields: Vec<String>,
}

/// Table view of a registered collection
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use monglo_core::{CollectionAdmin, CollectionConfig};
/// use monglo_db::backends::MemoryBackend;
/// use monglo_views::views::TableView;
///
/// let mut config = CollectionConfig::default();
/// config.list_fields = Some(vec!["email".to_string(), "created_at".to_string()]);
/// let admin = CollectionAdmin::new("users", Arc::new(MemoryBackend::new()), config);
///
/// let table = TableView::new(Arc::new(admin)).render_config();
/// let labels: Vec<&str> = table.columns.iter().map(|c| c.label.as_str()).collect();
/// assert_eq!(labels, vec!["Email", "Created At"]);
/// ```
#[derive(Debug, Clone)]
pub struct TableView {
	admin: Arc<CollectionAdmin>,
}

impl TableView {
	pub fn new(admin: Arc<CollectionAdmin>) -> Self {
		Self { admin }
	}

	/// Columns come from `table_view.columns` when configured, else from
	/// the list fields, else the identity field alone.
	pub fn render_config(&self) -> TableConfig {
		let config = self.admin.config();
		let table = &config.table_view;

		let columns = if !table.columns.is_empty() {
			table
				.columns
				.iter()
				.map(|column| {
					let mut rendered = self.column(&column.field);
					if let Some(label) = &column.label {
						rendered.label = label.clone();
					}
					if let Some(sortable) = column.sortable {
						rendered.sortable = sortable;
					}
					rendered.width = column.width;
					rendered.formatter = column.formatter.clone();
					rendered
				})
				.collect()
		} else if !config.list_fields().is_empty() {
			config.list_fields().iter().map(|field| self.column(field)).collect()
		} else {
			vec![self.column(ID_FIELD)]
		};

		let default_sort = QueryBuilder::build_sort(
			(!table.default_sort.is_empty()).then_some(table.default_sort.as_slice()),
		)
		.into_iter()
		.map(|(field, order)| SortColumn { field, order })
		.collect();

		TableConfig {
			collection: self.admin.name().to_string(),
			display_name: self.admin.display_name(),
			columns,
			default_sort,
			per_page: table.per_page,
			enable_bulk_actions: table.enable_bulk_actions,
			enable_export: table.enable_export,
			row_actions: table.row_actions.clone(),
			bulk_actions: config.bulk_actions.clone(),
			filters: config.filters.clone(),
			search_fields: config.search_fields().to_vec(),
		}
	}

	/// Sortable when the identity field, listed as sortable, or of an
	/// orderable inferred type
	fn column(&self, field: &str) -> TableColumn {
		let field_type = self.admin.schema().and_then(|schema| schema.type_of(field));
		let sortable = field == ID_FIELD
			|| self.admin.config().is_sortable(field)
			|| field_type.is_some_and(FieldType::is_sortable);
		TableColumn {
			field: field.to_string(),
			label: field_label(field),
			sortable,
			field_type,
			width: None,
			formatter: None,
		}
	}
}
