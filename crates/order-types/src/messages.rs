//! Message types for collaborator communication.
//!
//! This module defines the messages exchanged with the external validation
//! and allocation collaborators. The core mandates no wire format; any
//! at-least-once transport that can carry these serde-able payloads works.

use crate::order::{AllocationResult, OrderLine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request dispatched to the validation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
	/// Identifier of the order to validate.
	pub order_id: Uuid,
}

/// Result delivered back by the validation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
	/// Identifier of the validated order.
	pub order_id: Uuid,
	/// Whether the order passed validation.
	pub passed: bool,
}

/// Request dispatched to the allocation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
	/// Identifier of the order to allocate inventory for.
	pub order_id: Uuid,
	/// Line items to allocate.
	pub lines: Vec<OrderLine>,
}

/// Result delivered back by the allocation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AllocationOutcome {
	/// Every line was fully allocated.
	Allocated(AllocationResult),
	/// Some lines could only be partially allocated.
	PendingInventory(AllocationResult),
	/// The collaborator could not process the order.
	Failed {
		/// Identifier of the affected order.
		order_id: Uuid,
	},
}

impl AllocationOutcome {
	/// Identifier of the order this outcome refers to.
	pub fn order_id(&self) -> Uuid {
		match self {
			AllocationOutcome::Allocated(result) => result.order_id,
			AllocationOutcome::PendingInventory(result) => result.order_id,
			AllocationOutcome::Failed { order_id } => *order_id,
		}
	}
}
