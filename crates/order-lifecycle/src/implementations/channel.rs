//! Channel-backed collaborator implementations.
//!
//! These implementations deliver dispatched requests over in-process tokio
//! channels. Whatever consumes the receiving end plays the collaborator:
//! the service binary wires brewery simulators to it, tests wire
//! assertions. The payloads are serde-able, so swapping the channel for a
//! queue or HTTP callback transport changes nothing in the core.

use crate::{AllocationInterface, DispatchError, ValidationInterface};
use async_trait::async_trait;
use order_types::{AllocationRequest, ValidationRequest};
use tokio::sync::mpsc;

/// Validation collaborator reached over an in-process channel.
pub struct ChannelValidation {
	sender: mpsc::UnboundedSender<ValidationRequest>,
}

impl ChannelValidation {
	/// Creates the dispatch side and the receiver the collaborator
	/// consumes.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<ValidationRequest>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { sender }, receiver)
	}
}

#[async_trait]
impl ValidationInterface for ChannelValidation {
	async fn dispatch(&self, request: ValidationRequest) -> Result<(), DispatchError> {
		self.sender
			.send(request)
			.map_err(|_| DispatchError::ChannelClosed)
	}
}

/// Allocation collaborator reached over an in-process channel.
pub struct ChannelAllocation {
	sender: mpsc::UnboundedSender<AllocationRequest>,
}

impl ChannelAllocation {
	/// Creates the dispatch side and the receiver the collaborator
	/// consumes.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<AllocationRequest>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { sender }, receiver)
	}
}

#[async_trait]
impl AllocationInterface for ChannelAllocation {
	async fn dispatch(&self, request: AllocationRequest) -> Result<(), DispatchError> {
		self.sender
			.send(request)
			.map_err(|_| DispatchError::ChannelClosed)
	}
}
