//! Field type to form widget mapping and field labels
//!
//! ```text
//! Inferred type        →  Widget
//! ─────────────────────────────────
//! string               →  text
//! integer / number     →  number
//! boolean              →  checkbox
//! datetime             →  datetime
//! date                 →  date
//! objectid             →  reference
//! array                →  list
//! embedded             →  json
//! anything else        →  text
//! ```
//!
//! A readonly field always renders with the `readonly` widget.

use monglo_core::introspection::FieldType;
use monglo_core::query_builder::ID_FIELD;
use monglo_core::registry::title_case;
use serde::{Deserialize, Serialize};

/// Form input used to display or edit one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Widget {
	Text,
	Number,
	Checkbox,
	DateTime,
	Date,
	/// Link to a document in another collection
	Reference,
	List,
	/// Raw JSON editor
	Json,
	Readonly,
}

impl Widget {
	pub fn as_str(self) -> &'static str {
		match self {
			Widget::Text => "text",
			Widget::Number => "number",
			Widget::Checkbox => "checkbox",
			Widget::DateTime => "datetime",
			Widget::Date => "date",
			Widget::Reference => "reference",
			Widget::List => "list",
			Widget::Json => "json",
			Widget::Readonly => "readonly",
		}
	}
}

/// Infers the widget for a field of the given type.
///
/// # Examples
///
/// ```
/// use monglo_core::FieldType;
/// use monglo_views::widgets::{Widget, infer_widget};
///
/// assert_eq!(infer_widget(FieldType::Integer, false), Widget::Number);
/// assert_eq!(infer_widget(FieldType::ObjectId, false), Widget::Reference);
/// assert_eq!(infer_widget(FieldType::String, true), Widget::Readonly);
/// ```
pub fn infer_widget(field_type: FieldType, readonly: bool) -> Widget {
	if readonly {
		return Widget::Readonly;
	}
	match field_type {
		FieldType::String => Widget::Text,
		FieldType::Integer | FieldType::Number => Widget::Number,
		FieldType::Boolean => Widget::Checkbox,
		FieldType::DateTime => Widget::DateTime,
		FieldType::Date => Widget::Date,
		FieldType::ObjectId => Widget::Reference,
		FieldType::Array => Widget::List,
		FieldType::Embedded => Widget::Json,
		FieldType::Null
		| FieldType::DbRef
		| FieldType::Binary
		| FieldType::Unknown => Widget::Text,
	}
}

/// Human-readable label for a field path.
///
/// Uses the last path segment, splits it on underscores and title-cases
/// each word. The identity field is labelled `ID`.
///
/// ```
/// use monglo_views::widgets::field_label;
///
/// assert_eq!(field_label("created_at"), "Created At");
/// assert_eq!(field_label("address.postal_code"), "Postal Code");
/// assert_eq!(field_label("_id"), "ID");
/// ```
pub fn field_label(path: &str) -> String {
	let leaf = path.rsplit('.').next().unwrap_or(path);
	if leaf == ID_FIELD {
		return "ID".to_string();
	}
	let words: Vec<&str> = leaf.split('_').filter(|word| !word.is_empty()).collect();
	title_case(&words.join(" "))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(FieldType::String, Widget::Text)]
	#[case(FieldType::Integer, Widget::Number)]
	#[case(FieldType::Number, Widget::Number)]
	#[case(FieldType::Boolean, Widget::Checkbox)]
	#[case(FieldType::DateTime, Widget::DateTime)]
	#[case(FieldType::Date, Widget::Date)]
	#[case(FieldType::ObjectId, Widget::Reference)]
	#[case(FieldType::Array, Widget::List)]
	#[case(FieldType::Embedded, Widget::Json)]
	#[case(FieldType::Binary, Widget::Text)]
	#[case(FieldType::Unknown, Widget::Text)]
	fn test_infer_widget(#[case] field_type: FieldType, #[case] expected: Widget) {
		assert_eq!(infer_widget(field_type, false), expected);
		assert_eq!(
			infer_widget(field_type, true),
			Widget::Readonly,
			"readonly overrides the type for {field_type}"
		);
	}

	#[rstest]
	#[case("name", "Name")]
	#[case("first_name", "First Name")]
	#[case("__private__field", "Private Field")]
	#[case("items.[].unit_price", "Unit Price")]
	#[case("author._id", "ID")]
	fn test_field_label(#[case] path: &str, #[case] expected: &str) {
		assert_eq!(field_label(path), expected);
	}

	#[rstest]
	fn test_widget_names_match_serialized_form() {
		for widget in [Widget::DateTime, Widget::Reference, Widget::Readonly] {
			assert_eq!(
				serde_json::to_value(widget).ok(),
				Some(serde_json::Value::String(widget.as_str().to_string()))
			);
		}
	}
}
