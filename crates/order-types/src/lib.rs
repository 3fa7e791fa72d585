//! Common types module for the beer order service.
//!
//! This module defines the core data types and structures used throughout
//! the order fulfillment system. It provides a centralized location for
//! shared types to ensure consistency across all service components.

/// Messages exchanged with the validation and allocation collaborators.
pub mod messages;
/// Order aggregate types: orders, lines, statuses and lifecycle events.
pub mod order;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use messages::*;
pub use order::*;
pub use validation::*;
