//! Audit trail of administrative writes
//!
//! Entries are stored as documents in a dedicated collection through the
//! same store handle as the data they describe. Logging never fails the
//! caller: a write that cannot be recorded is reported with `warn!` and
//! dropped.

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use indexmap::IndexSet;
use monglo_core::error::AdminResult;
use monglo_core::query_builder::ID_FIELD;
use monglo_db::value::bson_eq;
use monglo_db::{DocumentBackend, FindOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Collection receiving audit entries unless configured otherwise
pub const DEFAULT_AUDIT_COLLECTION: &str = "monglo_audit_log";

/// Kind of write recorded by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
	Create,
	Update,
	Delete,
	BulkCreate,
	BulkUpdate,
	BulkDelete,
	Export,
}

impl AuditAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditAction::Create => "create",
			AuditAction::Update => "update",
			AuditAction::Delete => "delete",
			AuditAction::BulkCreate => "bulk_create",
			AuditAction::BulkUpdate => "bulk_update",
			AuditAction::BulkDelete => "bulk_delete",
			AuditAction::Export => "export",
		}
	}

	/// Bulk counterpart of a single-document action
	pub fn bulk(operation: &str) -> Option<Self> {
		match operation.to_lowercase().as_str() {
			"create" | "bulk_create" => Some(AuditAction::BulkCreate),
			"update" | "bulk_update" => Some(AuditAction::BulkUpdate),
			"delete" | "bulk_delete" => Some(AuditAction::BulkDelete),
			"export" => Some(AuditAction::Export),
			_ => None,
		}
	}
}

/// Actor recorded on an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditUser {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
}

impl AuditUser {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			role: None,
		}
	}

	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.role = Some(role.into());
		self
	}
}

/// One recorded write
///
/// # Examples
///
/// ```
/// use monglo_ops::audit::{AuditAction, AuditEntry, AuditUser};
/// use bson::doc;
///
/// let entry = AuditEntry::new(AuditAction::Delete, "orders")
///     .with_document_id("65f1c2a9e4b0a1b2c3d4e5f6")
///     .with_user(AuditUser::new("u-1").with_role("admin"))
///     .with_data(doc! { "total": 12 });
///
/// assert_eq!(entry.action, AuditAction::Delete);
/// assert_eq!(entry.user.as_ref().map(|u| u.id.as_str()), Some("u-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<ObjectId>,
	pub timestamp: bson::DateTime,
	pub action: AuditAction,
	pub collection: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub document_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<AuditUser>,
	/// `{field: {old, new}}` for updates
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub changes: Option<Document>,
	/// Document body for creates and deletes
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Document>,
	/// Affected documents for bulk operations
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub count: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Document>,
}

impl AuditEntry {
	/// Entry stamped with the current time
	pub fn new(action: AuditAction, collection: impl Into<String>) -> Self {
		Self {
			id: None,
			timestamp: bson::DateTime::now(),
			action,
			collection: collection.into(),
			document_id: None,
			user: None,
			changes: None,
			data: None,
			count: None,
			metadata: None,
		}
	}

	pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
		self.document_id = Some(document_id.into());
		self
	}

	pub fn with_user(mut self, user: AuditUser) -> Self {
		self.user = Some(user);
		self
	}

	pub fn with_changes(mut self, changes: Document) -> Self {
		self.changes = Some(changes);
		self
	}

	pub fn with_data(mut self, data: Document) -> Self {
		self.data = Some(data);
		self
	}

	pub fn with_count(mut self, count: i64) -> Self {
		self.count = Some(count);
		self
	}

	pub fn with_metadata(mut self, metadata: Document) -> Self {
		self.metadata = Some(metadata);
		self
	}
}

/// Field-level difference between two versions of a document.
///
/// Covers the union of both key sets except `_id`; a field missing on one
/// side is reported as `null` there.
///
/// ```
/// use monglo_ops::audit::compute_changes;
/// use bson::{Bson, doc};
///
/// let changes = compute_changes(
///     &doc! { "_id": 1, "name": "Ada", "age": 36 },
///     &doc! { "_id": 1, "name": "Ada", "age": 37, "city": "London" },
/// );
/// assert_eq!(changes, doc! {
///     "age": { "old": 36, "new": 37 },
///     "city": { "old": Bson::Null, "new": "London" },
/// });
/// ```
pub fn compute_changes(before: &Document, after: &Document) -> Document {
	let keys: IndexSet<&String> = before.keys().chain(after.keys()).collect();
	let mut changes = Document::new();
	for key in keys {
		if key == ID_FIELD {
			continue;
		}
		let old = before.get(key).cloned().unwrap_or(Bson::Null);
		let new = after.get(key).cloned().unwrap_or(Bson::Null);
		if !bson_eq(&old, &new) {
			changes.insert(key.clone(), doc! { "old": old, "new": new });
		}
	}
	changes
}

/// Writes and queries audit entries
#[derive(Clone)]
pub struct AuditLogger {
	database: Arc<dyn DocumentBackend>,
	collection_name: String,
}

impl AuditLogger {
	pub fn new(database: Arc<dyn DocumentBackend>) -> Self {
		Self {
			database,
			collection_name: DEFAULT_AUDIT_COLLECTION.to_string(),
		}
	}

	/// Stores entries in `collection_name` instead of the default
	pub fn with_collection(mut self, collection_name: impl Into<String>) -> Self {
		self.collection_name = collection_name.into();
		self
	}

	pub fn collection_name(&self) -> &str {
		&self.collection_name
	}

	/// Stores an entry, reporting failures with `warn!` only
	pub async fn record(&self, entry: AuditEntry) {
		let action = entry.action.as_str();
		let collection = entry.collection.clone();
		let document = match bson::serialize_to_document(&entry) {
			Ok(document) => document,
			Err(err) => {
				warn!(action, collection = %collection, error = %err, "Failed to encode audit entry");
				return;
			}
		};
		match self.database.insert_one(&self.collection_name, document).await {
			Ok(id) => debug!(action, collection = %collection, audit_id = %id, "Recorded audit entry"),
			Err(err) => {
				warn!(action, collection = %collection, error = %err, "Failed to write audit entry")
			}
		}
	}

	pub async fn log_create(
		&self,
		collection: &str,
		document_id: &str,
		data: Document,
		user: Option<AuditUser>,
	) {
		let mut entry = AuditEntry::new(AuditAction::Create, collection)
			.with_document_id(document_id)
			.with_data(data);
		entry.user = user;
		self.record(entry).await;
	}

	/// Records the fields that differ between `before` and `after`
	pub async fn log_update(
		&self,
		collection: &str,
		document_id: &str,
		before: &Document,
		after: &Document,
		user: Option<AuditUser>,
	) {
		let mut entry = AuditEntry::new(AuditAction::Update, collection)
			.with_document_id(document_id)
			.with_changes(compute_changes(before, after));
		entry.user = user;
		self.record(entry).await;
	}

	/// `data` is the document as it was before deletion, when known
	pub async fn log_delete(
		&self,
		collection: &str,
		document_id: &str,
		data: Option<Document>,
		user: Option<AuditUser>,
	) {
		let mut entry = AuditEntry::new(AuditAction::Delete, collection).with_document_id(document_id);
		entry.data = data;
		entry.user = user;
		self.record(entry).await;
	}

	/// Records a multi-document operation (`create`, `update`, `delete`,
	/// `export`); an unknown operation name is recorded as a bulk update.
	pub async fn log_bulk_operation(
		&self,
		collection: &str,
		operation: &str,
		count: i64,
		user: Option<AuditUser>,
		metadata: Option<Document>,
	) {
		let action = AuditAction::bulk(operation).unwrap_or(AuditAction::BulkUpdate);
		let mut entry = AuditEntry::new(action, collection).with_count(count);
		entry.user = user;
		entry.metadata = metadata;
		self.record(entry).await;
	}

	/// Entries for one document, newest first
	pub async fn get_document_history(
		&self,
		collection: &str,
		document_id: &str,
		limit: i64,
	) -> AdminResult<Vec<AuditEntry>> {
		self.query(doc! { "collection": collection, "document_id": document_id }, limit)
			.await
	}

	/// Entries recorded for one user, newest first
	pub async fn get_user_activity(&self, user_id: &str, limit: i64) -> AdminResult<Vec<AuditEntry>> {
		self.query(doc! { "user.id": user_id }, limit).await
	}

	async fn query(&self, filter: Document, limit: i64) -> AdminResult<Vec<AuditEntry>> {
		let documents = self
			.database
			.find_many(
				&self.collection_name,
				filter,
				FindOptions::new()
					.sort(doc! { "timestamp": -1, ID_FIELD: -1 })
					.limit(limit),
			)
			.await?;
		documents
			.into_iter()
			.map(|document| Ok(bson::deserialize_from_document::<AuditEntry>(document)?))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;

	#[rstest]
	#[case(AuditAction::Create, "create")]
	#[case(AuditAction::BulkDelete, "bulk_delete")]
	#[case(AuditAction::Export, "export")]
	fn test_action_names(#[case] action: AuditAction, #[case] expected: &str) {
		assert_eq!(action.as_str(), expected);
		assert_eq!(
			bson::serialize_to_bson(&action).ok(),
			Some(Bson::String(expected.to_string())),
			"stored name must match as_str"
		);
	}

	#[rstest]
	#[case("delete", Some(AuditAction::BulkDelete))]
	#[case("BULK_CREATE", Some(AuditAction::BulkCreate))]
	#[case("archive", None)]
	fn test_bulk_action(#[case] operation: &str, #[case] expected: Option<AuditAction>) {
		assert_eq!(AuditAction::bulk(operation), expected);
	}

	#[rstest]
	fn test_changes_ignore_identity_and_equal_numbers() {
		let changes = compute_changes(
			&doc! { "_id": 1, "qty": 2, "note": "x" },
			&doc! { "_id": 2, "qty": 2.0, "note": "y" },
		);

		assert_eq!(changes, doc! { "note": { "old": "x", "new": "y" } });
	}

	#[rstest]
	fn test_entry_document_shape() {
		let entry = AuditEntry::new(AuditAction::BulkDelete, "orders").with_count(3);

		let document = bson::serialize_to_document(&entry).expect("entry should encode");

		assert_eq!(document.get_str("action").ok(), Some("bulk_delete"));
		assert_eq!(document.get_i64("count").ok(), Some(3));
		assert!(!document.contains_key("_id"), "the store assigns the identity");
		assert!(!document.contains_key("user"));
	}
}
