//! Configuration module for the beer order service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required values are properly set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the beer order service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the in-process brewery simulators.
	#[serde(default)]
	pub simulators: SimulatorConfig,
}

/// Configuration specific to this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub backend: String,
	/// Map of storage implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl StorageConfig {
	/// Returns the raw TOML table for the selected backend, or an empty
	/// table when the backend needs no configuration.
	pub fn backend_config(&self) -> toml::Value {
		self.implementations
			.get(&self.backend)
			.cloned()
			.unwrap_or_else(|| toml::Value::Table(toml::Table::new()))
	}
}

/// Configuration for the in-process brewery simulators.
///
/// UPC markers let the demo binary exercise the failure paths: a line with
/// a matching UPC flips the simulated collaborator's answer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulatorConfig {
	/// Orders containing this UPC fail validation.
	pub fail_validation_upc: Option<String>,
	/// Orders containing this UPC are only partially allocated.
	pub partial_allocation_upc: Option<String>,
	/// Orders containing this UPC fail allocation.
	pub fail_allocation_upc: Option<String>,
}

impl Config {
	/// Loads configuration from a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_toml(&content)
	}

	/// Parses configuration from a TOML string.
	pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation(
				"service.id must not be empty".to_string(),
			));
		}
		if self.storage.backend.is_empty() {
			return Err(ConfigError::Validation(
				"storage.backend must not be empty".to_string(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_full_config() {
		let config = Config::from_toml(
			r#"
			[service]
			id = "beer-order-1"

			[storage]
			backend = "file"

			[storage.implementations.file]
			storage_path = "./data/orders"

			[simulators]
			fail_validation_upc = "fail-validation"
			"#,
		)
		.unwrap();

		assert_eq!(config.service.id, "beer-order-1");
		assert_eq!(config.storage.backend, "file");
		assert_eq!(
			config
				.storage
				.backend_config()
				.get("storage_path")
				.and_then(|v| v.as_str()),
			Some("./data/orders")
		);
		assert_eq!(
			config.simulators.fail_validation_upc.as_deref(),
			Some("fail-validation")
		);
	}

	#[test]
	fn missing_backend_config_yields_empty_table() {
		let config = Config::from_toml(
			r#"
			[service]
			id = "beer-order-1"

			[storage]
			backend = "memory"
			"#,
		)
		.unwrap();

		assert!(config.storage.backend_config().as_table().unwrap().is_empty());
	}

	#[test]
	fn empty_service_id_is_rejected() {
		let result = Config::from_toml(
			r#"
			[service]
			id = ""

			[storage]
			backend = "memory"
			"#,
		);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}
}
