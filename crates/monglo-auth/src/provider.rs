//! Provider trait and the values it exchanges

use std::str::FromStr;

use async_trait::async_trait;
use monglo_core::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};

/// Action a user attempts on a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	View,
	Create,
	Edit,
	Delete,
	Export,
}

impl Action {
	pub const ALL: [Action; 5] = [
		Action::View,
		Action::Create,
		Action::Edit,
		Action::Delete,
		Action::Export,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Action::View => "view",
			Action::Create => "create",
			Action::Edit => "edit",
			Action::Delete => "delete",
			Action::Export => "export",
		}
	}
}

impl FromStr for Action {
	type Err = AdminError;

	/// Also accepts `read` for view and `update` for edit
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"view" | "read" => Ok(Action::View),
			"create" => Ok(Action::Create),
			"edit" | "update" => Ok(Action::Edit),
			"delete" => Ok(Action::Delete),
			"export" => Ok(Action::Export),
			other => Err(AdminError::Validation(format!("unknown action '{other}'"))),
		}
	}
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Built-in role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Every action
	Admin,
	/// Every action except delete
	Editor,
	/// View and export
	Viewer,
}

impl Role {
	/// `None` for role names outside the built-in set
	pub fn parse(name: &str) -> Option<Self> {
		match name.to_ascii_lowercase().as_str() {
			"admin" => Some(Role::Admin),
			"editor" => Some(Role::Editor),
			"viewer" => Some(Role::Viewer),
			_ => None,
		}
	}

	pub fn allows(self, action: Action) -> bool {
		match self {
			Role::Admin => true,
			Role::Editor => action != Action::Delete,
			Role::Viewer => matches!(action, Action::View | Action::Export),
		}
	}
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
	pub id: String,
	pub username: String,
	/// Role name; names outside [`Role`] are left to custom providers
	pub role: String,
}

impl AuthUser {
	pub fn new(id: impl Into<String>, username: impl Into<String>, role: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			username: username.into(),
			role: role.into(),
		}
	}

	/// The built-in role, if the role name is one
	pub fn builtin_role(&self) -> Option<Role> {
		Role::parse(&self.role)
	}
}

/// Authentication and authorization capability
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use monglo_auth::{Action, AuthProvider, AuthUser};
/// use monglo_core::AdminResult;
///
/// struct ReadOnly;
///
/// #[async_trait]
/// impl AuthProvider for ReadOnly {
///     async fn authenticate(&self, username: &str, _password: &str) -> AdminResult<Option<AuthUser>> {
///         Ok(Some(AuthUser::new(username, username, "guest")))
///     }
///
///     async fn authorize(&self, _user: &AuthUser, action: Action, _collection: Option<&str>) -> bool {
///         action == Action::View
///     }
/// }
/// ```
#[async_trait]
pub trait AuthProvider: Send + Sync {
	/// `Ok(None)` when the credentials are rejected; errors are reserved
	/// for failures of the user store itself
	async fn authenticate(&self, username: &str, password: &str) -> AdminResult<Option<AuthUser>>;

	/// Whether `user` may perform `action`, on `collection` when given
	async fn authorize(&self, user: &AuthUser, action: Action, collection: Option<&str>) -> bool;

	/// Looks a user up by id
	async fn get_user_info(&self, _user_id: &str) -> AdminResult<Option<AuthUser>> {
		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Role::Admin, &Action::ALL)]
	#[case(Role::Editor, &[Action::View, Action::Create, Action::Edit, Action::Export])]
	#[case(Role::Viewer, &[Action::View, Action::Export])]
	fn test_role_permissions(#[case] role: Role, #[case] allowed: &[Action]) {
		let granted: Vec<Action> = Action::ALL.into_iter().filter(|a| role.allows(*a)).collect();

		assert_eq!(granted, allowed);
	}

	#[rstest]
	#[case("read", Action::View)]
	#[case("UPDATE", Action::Edit)]
	#[case("export", Action::Export)]
	fn test_action_aliases(#[case] name: &str, #[case] expected: Action) {
		assert_eq!(name.parse::<Action>().ok(), Some(expected));
	}

	#[rstest]
	fn test_unknown_names() {
		assert!("archive".parse::<Action>().is_err());
		assert_eq!(Role::parse("Admin"), Some(Role::Admin));
		assert_eq!(AuthUser::new("1", "bob", "auditor").builtin_role(), None);
	}
}
