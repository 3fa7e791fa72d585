//! Main entry point for the beer order service.
//!
//! This binary wires the order lifecycle manager to a storage backend and
//! to in-process brewery collaborators, then runs the callback pump that
//! routes validation and allocation outcomes back into the manager until
//! interrupted. On startup it walks one sample order through the full
//! lifecycle so the wiring is observable from the logs.

use clap::Parser;
use order_config::Config;
use order_lifecycle::implementations::channel::{ChannelAllocation, ChannelValidation};
use order_lifecycle::{OrderLifecycleManager, ORDER_TRANSITIONS};
use order_storage::{OrderStore, StorageInterface};
use order_types::{AllocationOutcome, OrderDraft, OrderLineDraft};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

mod simulators;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Wires storage, collaborators and the lifecycle manager
/// 5. Runs the callback pump until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order service");

	// Load configuration
	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	// Create storage backend
	let backend = create_storage(&config)?;
	let store = Arc::new(OrderStore::new(backend));
	tracing::info!(component = "storage", implementation = %config.storage.backend, "Loaded");

	// Wire collaborators over in-process channels
	let (validation, validation_requests) = ChannelValidation::channel();
	let (allocation, allocation_requests) = ChannelAllocation::channel();
	let (validation_outcome_tx, mut validation_outcomes) = mpsc::unbounded_channel();
	let (allocation_outcome_tx, mut allocation_outcomes) = mpsc::unbounded_channel();

	let _validation_sim = simulators::spawn_validation_simulator(
		config.simulators.clone(),
		store.clone(),
		validation_requests,
		validation_outcome_tx,
	);
	let _allocation_sim = simulators::spawn_allocation_simulator(
		config.simulators.clone(),
		allocation_requests,
		allocation_outcome_tx,
	);

	let manager = Arc::new(OrderLifecycleManager::new(
		store,
		&ORDER_TRANSITIONS,
		Arc::new(validation),
		Arc::new(allocation),
	));

	// Walk one sample order through the lifecycle so a fresh checkout has
	// something to show in the logs.
	let sample = manager
		.create_order(OrderDraft {
			customer_ref: Some(Uuid::new_v4()),
			lines: vec![OrderLineDraft {
				beer_id: Uuid::new_v4(),
				upc: "0631234200036".to_string(),
				ordered_quantity: 6,
			}],
		})
		.await?;
	tracing::info!(order_id = %sample.id, "Submitted sample order");

	// Callback pump: route collaborator outcomes back into the manager.
	// Per-order failures are logged and never tear the service down.
	loop {
		tokio::select! {
			Some(outcome) = validation_outcomes.recv() => {
				if let Err(e) = manager
					.record_validation_result(outcome.order_id, outcome.passed)
					.await
				{
					tracing::warn!(
						order_id = %outcome.order_id,
						error = %e,
						"Validation callback rejected"
					);
				}
			}

			Some(outcome) = allocation_outcomes.recv() => {
				let order_id = outcome.order_id();
				let result = match outcome {
					AllocationOutcome::Allocated(result) => {
						manager.record_allocation_success(result).await
					}
					AllocationOutcome::PendingInventory(result) => {
						manager.record_allocation_pending_inventory(result).await
					}
					AllocationOutcome::Failed { order_id } => {
						manager.record_allocation_failure(order_id).await
					}
				};
				if let Err(e) = result {
					tracing::warn!(
						order_id = %order_id,
						error = %e,
						"Allocation callback rejected"
					);
				}
			}

			_ = tokio::signal::ctrl_c() => {
				break;
			}
		}
	}

	tracing::info!("Stopped order service");
	Ok(())
}

/// Creates the configured storage backend and validates its configuration
/// against the implementation's schema.
fn create_storage(config: &Config) -> Result<Box<dyn StorageInterface>, Box<dyn std::error::Error>> {
	let factory = order_storage::get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == config.storage.backend)
		.map(|(_, factory)| factory)
		.ok_or_else(|| format!("unknown storage backend '{}'", config.storage.backend))?;

	let backend_config = config.storage.backend_config();
	let backend = factory(&backend_config)?;
	backend.config_schema().validate(&backend_config)?;

	Ok(backend)
}
