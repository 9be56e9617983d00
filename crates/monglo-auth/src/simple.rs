//! Username/password provider with built-in roles

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, doc, oid::ObjectId};
use indexmap::{IndexMap, IndexSet};
use monglo_core::error::AdminResult;
use monglo_core::query_builder::ID_FIELD;
use monglo_db::DocumentBackend;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::provider::{Action, AuthProvider, AuthUser};

/// Role of a stored user without a `role` field
pub const DEFAULT_ROLE: &str = "viewer";

/// Lowercase hex SHA-256 of the password
pub fn hash_password(password: &str) -> String {
	hex::encode(Sha256::digest(password.as_bytes()))
}

/// Compares two hashes without leaking where they differ
fn hashes_match(a: &str, b: &str) -> bool {
	a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, Clone)]
struct UserRecord {
	password_hash: String,
	role: String,
}

#[derive(Clone)]
struct UserStore {
	database: Arc<dyn DocumentBackend>,
	collection: String,
}

/// Provider for in-memory users, optionally falling back to a user
/// collection whose documents carry `username`, `password_hash` and `role`.
///
/// Authorization is role based: `admin` may do everything, `editor`
/// everything but delete, `viewer` view and export. Unknown roles are
/// denied. A role given an allow list is further limited to those
/// collections.
///
/// # Examples
///
/// ```
/// use monglo_auth::{Action, AuthUser, AuthProvider, SimpleAuthProvider};
///
/// # async fn example() {
/// let auth = SimpleAuthProvider::new().with_collection_access("editor", ["posts"]);
/// let editor = AuthUser::new("1", "ada", "editor");
///
/// assert!(auth.authorize(&editor, Action::Create, Some("posts")).await);
/// assert!(!auth.authorize(&editor, Action::Create, Some("payments")).await);
/// # }
/// ```
#[derive(Default)]
pub struct SimpleAuthProvider {
	users: RwLock<IndexMap<String, UserRecord>>,
	store: Option<UserStore>,
	collection_access: IndexMap<String, IndexSet<String>>,
}

impl SimpleAuthProvider {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an in-memory user with a plaintext password
	pub fn with_user(self, username: &str, password: &str, role: &str) -> Self {
		self.add_user(username, password, role);
		self
	}

	/// Adds an in-memory user with an already hashed password
	pub fn with_hashed_user(self, username: &str, password_hash: &str, role: &str) -> Self {
		self.users.write().insert(
			username.to_string(),
			UserRecord {
				password_hash: password_hash.to_ascii_lowercase(),
				role: role.to_string(),
			},
		);
		self
	}

	/// Looks users missing from memory up in `collection`
	pub fn with_user_collection(
		mut self,
		database: Arc<dyn DocumentBackend>,
		collection: impl Into<String>,
	) -> Self {
		self.store = Some(UserStore {
			database,
			collection: collection.into(),
		});
		self
	}

	/// Limits `role` to the given collections
	pub fn with_collection_access<I, S>(mut self, role: &str, collections: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.collection_access
			.entry(role.to_ascii_lowercase())
			.or_default()
			.extend(collections.into_iter().map(Into::into));
		self
	}

	/// Adds or replaces an in-memory user
	pub fn add_user(&self, username: &str, password: &str, role: &str) {
		self.users.write().insert(
			username.to_string(),
			UserRecord {
				password_hash: hash_password(password),
				role: role.to_string(),
			},
		);
	}

	pub fn remove_user(&self, username: &str) -> bool {
		self.users.write().shift_remove(username).is_some()
	}

	async fn authenticate_stored(
		&self,
		store: &UserStore,
		username: &str,
		password_hash: &str,
	) -> AdminResult<Option<AuthUser>> {
		let Some(user) = store
			.database
			.find_one(&store.collection, doc! { "username": username })
			.await?
		else {
			return Ok(None);
		};
		let stored_hash = user.get_str("password_hash").unwrap_or_default();
		if !hashes_match(&stored_hash.to_ascii_lowercase(), password_hash) {
			return Ok(None);
		}
		Ok(Some(AuthUser::new(
			stored_id(user.get(ID_FIELD)).unwrap_or_else(|| username.to_string()),
			username,
			user.get_str("role").unwrap_or(DEFAULT_ROLE),
		)))
	}
}

/// String form of a stored identity
fn stored_id(id: Option<&Bson>) -> Option<String> {
	match id? {
		Bson::ObjectId(oid) => Some(oid.to_hex()),
		Bson::String(text) => Some(text.clone()),
		other => Some(other.to_string()),
	}
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
	async fn authenticate(&self, username: &str, password: &str) -> AdminResult<Option<AuthUser>> {
		let password_hash = hash_password(password);

		let in_memory = self.users.read().get(username).cloned();
		if let Some(record) = in_memory {
			if hashes_match(&record.password_hash, &password_hash) {
				debug!(username, role = %record.role, "Authenticated in-memory user");
				return Ok(Some(AuthUser::new(username, username, record.role)));
			}
			warn!(username, "Rejected credentials");
			return Ok(None);
		}

		if let Some(store) = &self.store {
			let user = self.authenticate_stored(store, username, &password_hash).await?;
			if user.is_none() {
				warn!(username, collection = %store.collection, "Rejected credentials");
			}
			return Ok(user);
		}

		warn!(username, "Rejected credentials for unknown user");
		Ok(None)
	}

	async fn authorize(&self, user: &AuthUser, action: Action, collection: Option<&str>) -> bool {
		let Some(role) = user.builtin_role() else {
			debug!(username = %user.username, role = %user.role, "Denied unknown role");
			return false;
		};
		if !role.allows(action) {
			return false;
		}
		match (collection, self.collection_access.get(&user.role.to_ascii_lowercase())) {
			(Some(collection), Some(allowed)) => allowed.contains(collection),
			_ => true,
		}
	}

	/// In-memory users are identified by username, stored users by their
	/// hex object id
	async fn get_user_info(&self, user_id: &str) -> AdminResult<Option<AuthUser>> {
		let in_memory = self.users.read().get(user_id).cloned();
		if let Some(record) = in_memory {
			return Ok(Some(AuthUser::new(user_id, user_id, record.role)));
		}
		let Some(store) = &self.store else {
			return Ok(None);
		};
		let Ok(oid) = ObjectId::parse_str(user_id) else {
			return Ok(None);
		};
		let user = store
			.database
			.find_one(&store.collection, doc! { ID_FIELD: oid })
			.await?;
		Ok(user.map(|user| {
			AuthUser::new(
				user_id,
				user.get_str("username").unwrap_or_default(),
				user.get_str("role").unwrap_or(DEFAULT_ROLE),
			)
		}))
	}
}
