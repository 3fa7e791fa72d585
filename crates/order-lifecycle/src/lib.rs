//! Order lifecycle module for the beer order service.
//!
//! This crate owns the order lifecycle: the domain transition policy
//! (which events are legal in which statuses and with what side effects)
//! and the [`OrderLifecycleManager`], the only component permitted to
//! change an order's persisted status. External validation and allocation
//! collaborators are reached through the dispatch traits defined here.

use async_trait::async_trait;
use order_storage::StorageError;
use order_types::{AllocationRequest, OrderEvent, OrderStatus, ValidationRequest};
use thiserror::Error;

pub mod manager;
pub mod policy;

/// Re-export implementations
pub mod implementations {
	pub mod channel;
}

pub use manager::OrderLifecycleManager;
pub use policy::{ORDER_TRANSITIONS, SideEffect, order_transitions};

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// Error from the order store; retries are the caller's responsibility.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// The submitted event has no entry in the transition policy for the
	/// order's current status.
	#[error("no transition from {status} on {event}")]
	IllegalTransition {
		status: OrderStatus,
		event: OrderEvent,
	},
	/// A machine was seeded with a status the policy does not recognize.
	#[error("unrecognized order status {status}")]
	InvalidState { status: OrderStatus },
	/// The status change could not be persisted; the transition was vetoed.
	#[error("Persistence error: {0}")]
	Persistence(String),
	/// A request could not be dispatched to a collaborator.
	#[error("Dispatch error: {0}")]
	Dispatch(#[from] DispatchError),
}

impl From<order_machine::MachineError<OrderStatus, OrderEvent>> for LifecycleError {
	fn from(err: order_machine::MachineError<OrderStatus, OrderEvent>) -> Self {
		match err {
			order_machine::MachineError::InvalidState { state } => {
				LifecycleError::InvalidState { status: state }
			}
			order_machine::MachineError::IllegalTransition { state, event } => {
				LifecycleError::IllegalTransition {
					status: state,
					event,
				}
			}
			order_machine::MachineError::Interceptor(message) => {
				LifecycleError::Persistence(message)
			}
		}
	}
}

/// Errors that can occur when dispatching a request to a collaborator.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The transport to the collaborator is gone.
	#[error("Channel closed")]
	ChannelClosed,
	/// The transport reported a failure.
	#[error("Transport error: {0}")]
	Transport(String),
}

/// Trait defining the dispatch side of the validation collaborator.
///
/// Implementations accept a request and deliver it over whatever transport
/// they represent; the collaborator answers asynchronously through
/// [`OrderLifecycleManager::record_validation_result`].
#[async_trait]
pub trait ValidationInterface: Send + Sync {
	/// Dispatches a validation request for one order.
	async fn dispatch(&self, request: ValidationRequest) -> Result<(), DispatchError>;
}

/// Trait defining the dispatch side of the allocation collaborator.
///
/// Implementations accept a request and deliver it over whatever transport
/// they represent; the collaborator answers asynchronously through one of
/// the three allocation-result operations on the manager.
#[async_trait]
pub trait AllocationInterface: Send + Sync {
	/// Dispatches an allocation request carrying the order's line items.
	async fn dispatch(&self, request: AllocationRequest) -> Result<(), DispatchError>;
}
