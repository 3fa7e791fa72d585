//! In-process brewery collaborator simulators.
//!
//! These tasks play the external validation and allocation services: they
//! consume dispatched requests from the lifecycle manager's channel
//! collaborators and answer on the outcome channels the callback pump
//! consumes. UPC markers from the configuration flip individual answers so
//! the failure paths can be exercised from a config file.

use order_config::SimulatorConfig;
use order_storage::OrderStore;
use order_types::{
	AllocatedLine, AllocationOutcome, AllocationRequest, AllocationResult, ValidationOutcome,
	ValidationRequest,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn matches_marker(upc: &str, marker: &Option<String>) -> bool {
	marker.as_deref() == Some(upc)
}

/// Spawns the validation simulator.
///
/// Validation requests carry only the order identifier, so the simulator
/// loads the order to inspect its lines, exactly as a real validation
/// service would consult its own view of the order.
pub fn spawn_validation_simulator(
	config: SimulatorConfig,
	store: Arc<OrderStore>,
	mut requests: mpsc::UnboundedReceiver<ValidationRequest>,
	outcomes: mpsc::UnboundedSender<ValidationOutcome>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(request) = requests.recv().await {
			let order = match store.find_by_id(request.order_id).await {
				Ok(Some(order)) => order,
				Ok(None) => {
					tracing::warn!(order_id = %request.order_id, "Validation request for unknown order");
					continue;
				}
				Err(e) => {
					tracing::error!(order_id = %request.order_id, error = %e, "Validation lookup failed");
					continue;
				}
			};

			let passed = !order
				.lines
				.iter()
				.any(|line| matches_marker(&line.upc, &config.fail_validation_upc));

			tracing::info!(order_id = %request.order_id, passed, "Simulated validation");
			if outcomes
				.send(ValidationOutcome {
					order_id: request.order_id,
					passed,
				})
				.is_err()
			{
				break;
			}
		}
	})
}

/// Spawns the allocation simulator.
///
/// Allocation requests carry the line items, so the simulator answers from
/// the request alone: full allocation by default, partial or failed when a
/// line matches the configured UPC markers.
pub fn spawn_allocation_simulator(
	config: SimulatorConfig,
	mut requests: mpsc::UnboundedReceiver<AllocationRequest>,
	outcomes: mpsc::UnboundedSender<AllocationOutcome>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(request) = requests.recv().await {
			let fail = request
				.lines
				.iter()
				.any(|line| matches_marker(&line.upc, &config.fail_allocation_upc));
			let partial = request
				.lines
				.iter()
				.any(|line| matches_marker(&line.upc, &config.partial_allocation_upc));

			let outcome = if fail {
				AllocationOutcome::Failed {
					order_id: request.order_id,
				}
			} else {
				let result = AllocationResult {
					order_id: request.order_id,
					lines: request
						.lines
						.iter()
						.map(|line| AllocatedLine {
							line_id: line.id,
							allocated_quantity: if partial {
								line.ordered_quantity / 2
							} else {
								line.ordered_quantity
							},
						})
						.collect(),
				};
				if partial {
					AllocationOutcome::PendingInventory(result)
				} else {
					AllocationOutcome::Allocated(result)
				}
			};

			tracing::info!(order_id = %request.order_id, fail, partial, "Simulated allocation");
			if outcomes.send(outcome).is_err() {
				break;
			}
		}
	})
}
