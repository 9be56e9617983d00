//! # Monglo Auth
//!
//! Capability interface for authenticating users and authorizing actions on
//! collections. Nothing in the workspace enforces it; UI adapters call an
//! [`AuthProvider`] before dispatching to the operations layer.
//!
//! [`SimpleAuthProvider`] covers small deployments: in-memory users,
//! optionally backed by a user collection, and three fixed roles.
//!
//! ## Example
//!
//! ```rust
//! use monglo_auth::{Action, AuthProvider, SimpleAuthProvider};
//!
//! # async fn example() -> monglo_core::AdminResult<()> {
//! let auth = SimpleAuthProvider::new()
//!     .with_user("ada", "s3cret", "editor")
//!     .with_user("grace", "hunter2", "viewer");
//!
//! let ada = auth.authenticate("ada", "s3cret").await?.expect("valid credentials");
//! assert!(auth.authorize(&ada, Action::Edit, Some("orders")).await);
//! assert!(!auth.authorize(&ada, Action::Delete, Some("orders")).await);
//! assert!(auth.authenticate("grace", "wrong").await?.is_none());
//! # Ok(())
//! # }
//! ```

mod provider;
mod simple;

pub use provider::{Action, AuthProvider, AuthUser, Role};
pub use simple::{DEFAULT_ROLE, SimpleAuthProvider, hash_password};
