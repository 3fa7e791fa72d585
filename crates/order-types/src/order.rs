//! Order aggregate types for the beer order service.
//!
//! This module defines the order aggregate (order plus line items), the
//! status enumeration an order moves through, and the lifecycle events that
//! drive status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a beer order.
///
/// Statuses are only ever changed by the lifecycle manager in response to
/// an [`OrderEvent`]; no other component mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	/// Order has been created and not yet submitted for validation.
	New,
	/// A validation request has been dispatched and is awaiting a result.
	ValidationPending,
	/// The validation collaborator confirmed the order.
	Validated,
	/// The validation collaborator rejected the order. Terminal.
	ValidationException,
	/// An allocation request has been dispatched and is awaiting a result.
	AllocationPending,
	/// Inventory has been fully allocated to the order.
	Allocated,
	/// The allocation collaborator failed to process the order. Terminal.
	AllocationException,
	/// Inventory was only partially available; the order waits for stock.
	PendingInventory,
	/// The customer picked the order up. Terminal.
	PickedUp,
	/// The order was cancelled. Terminal.
	Cancelled,
}

impl OrderStatus {
	/// Returns true if no further domain events are expected in this status.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::ValidationException
				| OrderStatus::AllocationException
				| OrderStatus::PickedUp
				| OrderStatus::Cancelled
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::New => "new",
			OrderStatus::ValidationPending => "validation_pending",
			OrderStatus::Validated => "validated",
			OrderStatus::ValidationException => "validation_exception",
			OrderStatus::AllocationPending => "allocation_pending",
			OrderStatus::Allocated => "allocated",
			OrderStatus::AllocationException => "allocation_exception",
			OrderStatus::PendingInventory => "pending_inventory",
			OrderStatus::PickedUp => "picked_up",
			OrderStatus::Cancelled => "cancelled",
		};
		write!(f, "{}", s)
	}
}

/// Events that drive order status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEvent {
	/// Submit the order for validation.
	ValidateOrder,
	/// The validation collaborator accepted the order.
	ValidationPassed,
	/// The validation collaborator rejected the order.
	ValidationFailed,
	/// Submit the order for inventory allocation.
	AllocateOrder,
	/// Inventory was fully allocated.
	AllocationSuccess,
	/// Inventory was only partially available.
	AllocationNoInventory,
	/// The allocation collaborator failed to process the order.
	AllocationFailed,
	/// The customer picked the order up.
	OrderPickedUp,
	/// The order was cancelled by an operator.
	CancelOrder,
}

impl fmt::Display for OrderEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderEvent::ValidateOrder => "validate_order",
			OrderEvent::ValidationPassed => "validation_passed",
			OrderEvent::ValidationFailed => "validation_failed",
			OrderEvent::AllocateOrder => "allocate_order",
			OrderEvent::AllocationSuccess => "allocation_success",
			OrderEvent::AllocationNoInventory => "allocation_no_inventory",
			OrderEvent::AllocationFailed => "allocation_failed",
			OrderEvent::OrderPickedUp => "order_picked_up",
			OrderEvent::CancelOrder => "cancel_order",
		};
		write!(f, "{}", s)
	}
}

/// One product/quantity entry within an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
	/// Unique identifier for this line.
	pub id: Uuid,
	/// Identifier of the beer being ordered.
	pub beer_id: Uuid,
	/// Universal product code of the beer.
	pub upc: String,
	/// Quantity the customer ordered.
	pub ordered_quantity: u32,
	/// Quantity the allocation collaborator has reserved so far.
	pub allocated_quantity: u32,
}

/// The order aggregate: a customer's purchase request and its fulfillment
/// progress.
///
/// The customer reference is a back-reference for lookup only; the order
/// never owns customer data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier, immutable after creation.
	pub id: Uuid,
	/// Reference to the owning customer, if known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer_ref: Option<Uuid>,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Ordered line items.
	pub lines: Vec<OrderLine>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order was last persisted.
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Builds a fresh order from a draft: new identifiers, status `New`,
	/// zero allocated quantities.
	pub fn from_draft(draft: OrderDraft) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			customer_ref: draft.customer_ref,
			status: OrderStatus::New,
			lines: draft
				.lines
				.into_iter()
				.map(|line| OrderLine {
					id: Uuid::new_v4(),
					beer_id: line.beer_id,
					upc: line.upc,
					ordered_quantity: line.ordered_quantity,
					allocated_quantity: 0,
				})
				.collect(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Looks up a line by its identifier.
	pub fn line_mut(&mut self, line_id: Uuid) -> Option<&mut OrderLine> {
		self.lines.iter_mut().find(|line| line.id == line_id)
	}
}

/// A not-yet-persisted order as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
	/// Reference to the owning customer, if known.
	pub customer_ref: Option<Uuid>,
	/// Requested line items.
	pub lines: Vec<OrderLineDraft>,
}

/// One requested line within an [`OrderDraft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineDraft {
	/// Identifier of the beer being ordered.
	pub beer_id: Uuid,
	/// Universal product code of the beer.
	pub upc: String,
	/// Quantity requested.
	pub ordered_quantity: u32,
}

/// Per-line allocation quantities reported by the allocation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatedLine {
	/// Identifier of the order line the quantity applies to.
	pub line_id: Uuid,
	/// Quantity the collaborator reserved for that line.
	pub allocated_quantity: u32,
}

/// Result of an allocation attempt for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
	/// Identifier of the order the result applies to.
	pub order_id: Uuid,
	/// Per-line allocated quantities.
	pub lines: Vec<AllocatedLine>,
}
