//! Configuration consumed by UI adapters to render collections

mod document;
mod graph;
mod table;

pub use document::{DocumentConfig, DocumentView, FieldConfig, RelationshipField};
pub use graph::{GraphEdge, GraphNode, RelationshipGraph, RelationshipView};
pub use table::{SortColumn, TableColumn, TableConfig, TableView};
