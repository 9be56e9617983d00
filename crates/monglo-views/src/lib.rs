//! # Monglo Views
//!
//! Presentation layer over registered collections. Nothing here renders
//! HTML; UI adapters consume the serializable configuration and documents
//! produced by this crate.
//!
//! ## Modules
//!
//! - [`serializers`]: plain JSON, extended JSON and table cell rendering
//! - [`views`]: table, document and relationship-graph configuration
//! - [`widgets`]: form widget inference and field labels
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monglo_core::{EngineOptions, MongloEngine};
//! use monglo_db::backends::MemoryBackend;
//! use monglo_views::views::{DocumentView, TableView};
//! use monglo_views::widgets::Widget;
//! use bson::doc;
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let backend = MemoryBackend::new();
//! backend.seed("users", vec![doc! { "name": "Ada", "active": true }])?;
//! let engine = MongloEngine::new(Arc::new(backend), EngineOptions::default());
//! engine.initialize().await?;
//!
//! let users = engine.collection("users")?;
//! let table = TableView::new(Arc::clone(&users)).render_config();
//! let document = DocumentView::new(users).render_config(None);
//!
//! assert!(table.columns.iter().any(|c| c.field == "name"));
//! assert!(document.fields.iter().any(|f| f.widget == Widget::Checkbox));
//! # Ok(())
//! # }
//! ```

pub mod serializers;
pub mod views;
pub mod widgets;

pub use serializers::{DocumentSerializer, JsonSerializer, TableSerializer};
pub use views::{DocumentView, RelationshipView, TableView};
pub use widgets::{Widget, field_label, infer_widget};
