//! Engine settings
//!
//! Settings can be built in code, read from `MONGLO_*` environment variables
//! or loaded from a `.toml` / `.json` file. Every section falls back to its
//! defaults for omitted keys.
//!
//! # Example
//!
//! ```rust
//! use monglo_core::settings::MongloSettings;
//!
//! let settings: MongloSettings = toml::from_str(
//!     r#"
//!     [database]
//!     name = "shop"
//!
//!     [engine]
//!     excluded_collections = ["sessions"]
//!     "#,
//! ).unwrap();
//!
//! assert_eq!(settings.database.name, "shop");
//! assert_eq!(settings.database.url, "mongodb://localhost:27017");
//! assert!(settings.validate().is_ok());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::RelationshipDetection;

/// Root settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MongloSettings {
	#[serde(default)]
	pub database: DatabaseSettings,

	#[serde(default)]
	pub engine: EngineSettings,

	#[serde(default)]
	pub pagination: PaginationSettings,

	#[serde(default)]
	pub logging: LoggingSettings,
}

impl MongloSettings {
	pub fn new() -> Self {
		Self::default()
	}

	/// Checks cross-field constraints
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.database.url.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"database.url must not be empty".to_string(),
			));
		}
		if self.database.name.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"database.name must not be empty".to_string(),
			));
		}
		if let (Some(min), Some(max)) = (self.database.min_pool_size, self.database.max_pool_size)
			&& min > max
		{
			return Err(SettingsError::ValidationError(format!(
				"database.min_pool_size ({min}) exceeds max_pool_size ({max})"
			)));
		}
		if self.engine.sample_size == 0 {
			return Err(SettingsError::ValidationError(
				"engine.sample_size must be at least 1".to_string(),
			));
		}
		let pagination = &self.pagination;
		if pagination.max_per_page == 0
			|| pagination.per_page == 0
			|| pagination.per_page > pagination.max_per_page
		{
			return Err(SettingsError::ValidationError(format!(
				"pagination.per_page must be between 1 and max_per_page ({}), got {}",
				pagination.max_per_page, pagination.per_page
			)));
		}
		Ok(())
	}

	/// Defaults overridden by `MONGLO_*` environment variables
	pub fn from_env() -> Result<Self, SettingsError> {
		let mut settings = Self::default();

		if let Ok(url) = std::env::var("MONGLO_DATABASE_URL") {
			settings.database.url = url;
		}
		if let Ok(name) = std::env::var("MONGLO_DATABASE_NAME") {
			settings.database.name = name;
		}
		if let Ok(flag) = std::env::var("MONGLO_AUTO_DISCOVER") {
			settings.engine.auto_discover = flag.to_lowercase() == "true" || flag == "1";
		}
		if let Ok(mode) = std::env::var("MONGLO_RELATIONSHIP_DETECTION") {
			settings.engine.relationship_detection =
				mode.parse().map_err(SettingsError::ParseError)?;
		}
		if let Ok(names) = std::env::var("MONGLO_EXCLUDED_COLLECTIONS") {
			settings.engine.excluded_collections = names
				.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect();
		}
		if let Ok(size) = std::env::var("MONGLO_SAMPLE_SIZE") {
			settings.engine.sample_size = size.trim().parse().map_err(|e| {
				SettingsError::ParseError(format!("MONGLO_SAMPLE_SIZE: {}", e))
			})?;
		}
		if let Ok(level) = std::env::var("MONGLO_LOG_LEVEL") {
			settings.logging.level = level;
		}

		Ok(settings)
	}

	/// Loads settings from a `.toml` or `.json` file
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
		let path = path.into();
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			SettingsError::FileError(format!("Failed to read {}: {}", path.display(), e))
		})?;

		let settings: MongloSettings = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => toml::from_str(&contents)
				.map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))?,
			Some("json") => serde_json::from_str(&contents)
				.map_err(|e| SettingsError::ParseError(format!("JSON parse error: {}", e)))?,
			_ => {
				return Err(SettingsError::UnsupportedFormat(
					"Supported formats: .toml, .json".to_string(),
				));
			}
		};

		Ok(settings)
	}

	/// Renders the settings as TOML
	pub fn to_toml(&self) -> Result<String, SettingsError> {
		toml::to_string(self).map_err(|e| SettingsError::SerializationError(e.to_string()))
	}
}

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
	pub url: String,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_pool_size: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub min_pool_size: Option<u32>,
}

impl Default for DatabaseSettings {
	fn default() -> Self {
		Self {
			url: "mongodb://localhost:27017".to_string(),
			name: "test".to_string(),
			max_pool_size: None,
			min_pool_size: None,
		}
	}
}

/// Discovery and detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
	pub auto_discover: bool,
	pub relationship_detection: RelationshipDetection,
	pub excluded_collections: Vec<String>,
	pub sample_size: usize,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			auto_discover: true,
			relationship_detection: RelationshipDetection::Auto,
			excluded_collections: Vec::new(),
			sample_size: 100,
		}
	}
}

/// Default page sizes for list operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
	pub per_page: u32,
	pub max_per_page: u32,
}

impl Default for PaginationSettings {
	fn default() -> Self {
		Self {
			per_page: 20,
			max_per_page: 100,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// `tracing` filter directive, e.g. `info` or `monglo_core=debug`
	pub level: String,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
		}
	}
}

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("File error: {0}")]
	FileError(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Unsupported format: {0}")]
	UnsupportedFormat(String),

	#[error("Serialization error: {0}")]
	SerializationError(String),
}
