//! Domain transition policy for the order lifecycle.
//!
//! This module defines the full table of allowed (status, event)
//! transitions and the side effects the lifecycle manager executes
//! alongside them. Any pair absent from the table is an illegal transition
//! and fails loudly; nothing is silently ignored.

use once_cell::sync::Lazy;
use order_machine::TransitionTable;
use order_types::{OrderEvent, OrderStatus};

/// Side effect attached to a transition, executed by the lifecycle manager
/// after the status change has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
	/// Dispatch a validation request carrying the order identifier.
	DispatchValidation,
	/// Dispatch an allocation request carrying the order's line items.
	DispatchAllocation,
	/// Apply the callback's per-line allocated quantities to the order.
	ApplyAllocation,
}

/// The order transition table type.
pub type OrderTransitions = TransitionTable<OrderStatus, OrderEvent, SideEffect>;

/// Process-wide immutable transition table.
///
/// Constructed once and injected into the lifecycle manager by reference.
pub static ORDER_TRANSITIONS: Lazy<OrderTransitions> = Lazy::new(order_transitions);

/// Builds the order transition table.
pub fn order_transitions() -> OrderTransitions {
	use order_types::OrderEvent as E;
	use order_types::OrderStatus as S;

	let builder = TransitionTable::builder()
		.transition_with(
			S::New,
			E::ValidateOrder,
			S::ValidationPending,
			SideEffect::DispatchValidation,
		)
		.transition(S::ValidationPending, E::ValidationPassed, S::Validated)
		.transition(
			S::ValidationPending,
			E::ValidationFailed,
			S::ValidationException,
		)
		.transition_with(
			S::Validated,
			E::AllocateOrder,
			S::AllocationPending,
			SideEffect::DispatchAllocation,
		)
		.transition_with(
			S::AllocationPending,
			E::AllocationSuccess,
			S::Allocated,
			SideEffect::ApplyAllocation,
		)
		.transition_with(
			S::AllocationPending,
			E::AllocationNoInventory,
			S::PendingInventory,
			SideEffect::ApplyAllocation,
		)
		.transition(
			S::AllocationPending,
			E::AllocationFailed,
			S::AllocationException,
		)
		.transition(S::Allocated, E::OrderPickedUp, S::PickedUp);

	// Cancellation is legal from every non-terminal status.
	[
		S::New,
		S::ValidationPending,
		S::Validated,
		S::AllocationPending,
		S::PendingInventory,
		S::Allocated,
	]
	.into_iter()
	.fold(builder, |builder, status| {
		builder.transition(status, E::CancelOrder, S::Cancelled)
	})
	.build()
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_types::OrderEvent as E;
	use order_types::OrderStatus as S;

	#[test]
	fn every_status_is_recognized() {
		let table = order_transitions();
		for status in [
			S::New,
			S::ValidationPending,
			S::Validated,
			S::ValidationException,
			S::AllocationPending,
			S::Allocated,
			S::AllocationException,
			S::PendingInventory,
			S::PickedUp,
			S::Cancelled,
		] {
			assert!(table.recognizes(&status), "{status} not recognized");
		}
	}

	#[tokio::test]
	async fn mapped_pairs_yield_exactly_the_mapped_next_state() {
		let table = order_transitions();
		let cases = [
			(S::New, E::ValidateOrder, S::ValidationPending),
			(S::ValidationPending, E::ValidationPassed, S::Validated),
			(S::ValidationPending, E::ValidationFailed, S::ValidationException),
			(S::Validated, E::AllocateOrder, S::AllocationPending),
			(S::AllocationPending, E::AllocationSuccess, S::Allocated),
			(S::AllocationPending, E::AllocationNoInventory, S::PendingInventory),
			(S::AllocationPending, E::AllocationFailed, S::AllocationException),
			(S::Allocated, E::OrderPickedUp, S::PickedUp),
			(S::New, E::CancelOrder, S::Cancelled),
			(S::ValidationPending, E::CancelOrder, S::Cancelled),
			(S::Validated, E::CancelOrder, S::Cancelled),
			(S::AllocationPending, E::CancelOrder, S::Cancelled),
			(S::PendingInventory, E::CancelOrder, S::Cancelled),
			(S::Allocated, E::CancelOrder, S::Cancelled),
		];

		for (from, event, to) in cases {
			let mut machine = table.instantiate::<()>(from).unwrap();
			let result = machine.submit(event, &()).await.unwrap();
			assert_eq!(result.next, to, "{from} + {event}");
		}
	}

	#[test]
	fn terminal_statuses_accept_no_events() {
		let table = order_transitions();
		let all_events = [
			E::ValidateOrder,
			E::ValidationPassed,
			E::ValidationFailed,
			E::AllocateOrder,
			E::AllocationSuccess,
			E::AllocationNoInventory,
			E::AllocationFailed,
			E::OrderPickedUp,
			E::CancelOrder,
		];

		for status in [
			S::ValidationException,
			S::AllocationException,
			S::PickedUp,
			S::Cancelled,
		] {
			for event in all_events {
				assert!(
					!table.has_transition(status, event),
					"{status} unexpectedly accepts {event}"
				);
			}
		}
	}

	#[test]
	fn cancel_has_no_self_loop() {
		let table = order_transitions();
		assert!(!table.has_transition(S::Cancelled, E::CancelOrder));
	}

	#[test]
	fn dispatch_effects_are_attached() {
		let table = order_transitions();
		assert!(table.has_transition(S::New, E::ValidateOrder));
		assert!(table.has_transition(S::Validated, E::AllocateOrder));
		// Late allocation callbacks after cancellation are undefined on purpose.
		assert!(!table.has_transition(S::Cancelled, E::AllocationSuccess));
	}
}
