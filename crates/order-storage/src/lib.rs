//! Storage module for the beer order service.
//!
//! This module provides abstractions for persistent storage of order
//! aggregates, supporting different backend implementations such as
//! in-memory or file-based storage.

use async_trait::async_trait;
use chrono::Utc;
use order_types::{ConfigSchema, Order};
use thiserror::Error;
use uuid::Uuid;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Namespace prefix under which order aggregates are stored.
const ORDERS_NAMESPACE: &str = "orders";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the order service. It provides basic key-value
/// operations; each call must be atomic.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key, creating or overwriting.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must
/// provide to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used by the service wiring to pick a backend by name.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		("file", file::create_storage),
		("memory", memory::create_storage),
	]
}

/// High-level order store providing typed operations.
///
/// The OrderStore wraps a low-level storage backend and provides the
/// load/save surface the lifecycle manager depends on, with automatic
/// JSON serialization and `updated_at` stamping on save.
pub struct OrderStore {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl OrderStore {
	/// Creates a new OrderStore with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(id: Uuid) -> String {
		format!("{}:{}", ORDERS_NAMESPACE, id)
	}

	/// Loads an order by identifier.
	///
	/// Returns `Ok(None)` when no order is persisted under the identifier;
	/// backend and deserialization failures are surfaced as errors.
	pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
		let bytes = match self.backend.get_bytes(&Self::key(id)).await {
			Ok(bytes) => bytes,
			Err(StorageError::NotFound) => return Ok(None),
			Err(e) => return Err(e),
		};
		let order = serde_json::from_slice(&bytes)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Some(order))
	}

	/// Persists an order, creating or overwriting.
	///
	/// Stamps `updated_at` before writing. The write is atomic per call;
	/// serializing concurrent writers is the caller's concern.
	pub async fn save(&self, order: &mut Order) -> Result<(), StorageError> {
		order.updated_at = Utc::now();
		let bytes = serde_json::to_vec(order)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(order.id), bytes).await
	}
}
