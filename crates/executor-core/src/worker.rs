//! Execution worker: drives one job attempt to a terminal outcome.
//!
//! The worker owns the per-attempt state machine and reports every
//! accepted transition to the status sink. It never decides about
//! retries; failures surface to the engine, which owns the re-enqueue
//! versus finalize decision.

use crate::state::{next_state, StateError};
use executor_router::{RouterError, RouterService};
use executor_sink::SinkRegistry;
use executor_types::{Job, OrderState, OrderStatus, StatusUpdate, Swap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Error terminating one execution attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
	/// Price discovery failed for this attempt.
	#[error("{0}")]
	Routing(RouterError),
	/// Settlement failed, or its outcome is unknown.
	#[error("{0}")]
	Settlement(RouterError),
	/// The state machine rejected a transition. Indicates a bug; the
	/// attempt is abandoned without retry.
	#[error("{0}")]
	State(#[from] StateError),
}

impl AttemptError {
	/// Whether the retry policy may re-attempt after this error.
	///
	/// Routing never applies anything, so it is always safe to retry. A
	/// settlement error is retried only when its outcome is known (the
	/// venue rejected it) or the router declares re-submission safe;
	/// otherwise a retry risks double settlement and the order fails into
	/// manual reconciliation.
	pub fn is_retryable(&self, safe_to_resubmit: bool) -> bool {
		match self {
			AttemptError::Routing(_) => true,
			AttemptError::Settlement(err) => !err.is_unknown_outcome() || safe_to_resubmit,
			AttemptError::State(_) => false,
		}
	}
}

/// Executes single attempts of queued jobs.
pub struct ExecutionWorker {
	router: Arc<RouterService>,
	sink: Arc<SinkRegistry>,
	/// Fixed delay modelling transaction construction cost.
	build_delay: Duration,
}

impl ExecutionWorker {
	pub fn new(router: Arc<RouterService>, sink: Arc<SinkRegistry>, build_delay: Duration) -> Self {
		Self {
			router,
			sink,
			build_delay,
		}
	}

	/// Drives one attempt from PENDING to CONFIRMED.
	///
	/// Every attempt starts from a fresh snapshot: partial progress from a
	/// previous failed attempt is discarded, and the first emission of an
	/// attempt is ROUTING (PENDING went out at submission).
	pub async fn process_order(&self, job: &Job) -> Result<Swap, AttemptError> {
		let mut state = OrderState::new();

		state = next_state(&state, OrderStatus::Routing)?;
		state.push_log("Fetching quotes...");
		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Routing).with_log("Fetching quotes..."),
		);

		let quote = self
			.router
			.find_best_route(&job.token_in, &job.token_out, job.amount)
			.await
			.map_err(AttemptError::Routing)?;

		// Re-emit ROUTING with the winning venue.
		state = next_state(&state, OrderStatus::Routing)?;
		let route_line = format!("Best route: {} @ ${:.4}", quote.venue, quote.price);
		state.venue = Some(quote.venue);
		state.push_log(route_line.clone());
		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Routing)
				.with_venue(quote.venue)
				.with_log(route_line),
		);

		state = next_state(&state, OrderStatus::Building)?;
		state.push_log("Constructing transaction...");
		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Building)
				.with_log("Constructing transaction..."),
		);
		tokio::time::sleep(self.build_delay).await;

		state = next_state(&state, OrderStatus::Submitted)?;
		state.push_log("Transaction sent...");
		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Submitted)
				.with_log("Transaction sent..."),
		);

		let swap = self
			.router
			.execute_swap(quote.venue, job.amount)
			.await
			.map_err(AttemptError::Settlement)?;

		state = next_state(&state, OrderStatus::Confirmed)?;
		state.tx_hash = Some(swap.tx_hash.clone());
		state.execution_price = Some(swap.executed_price);
		state.push_log("Transaction confirmed");
		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Confirmed)
				.with_tx_hash(&swap.tx_hash)
				.with_execution_price(swap.executed_price)
				.with_log("Transaction confirmed"),
		);

		info!(
			order_id = %job.order_id,
			attempt = job.attempt,
			tx_hash = %swap.tx_hash,
			executed_price = swap.executed_price,
			"order confirmed"
		);

		Ok(swap)
	}

	/// Emits the terminal FAILED update once no further attempt will run.
	///
	/// The source error message is preserved verbatim in the update's
	/// `error` field.
	pub fn finalize_failure(&self, job: &Job, error: &str) {
		warn!(
			order_id = %job.order_id,
			attempt = job.attempt,
			error,
			"order failed"
		);

		self.sink.deliver(
			StatusUpdate::new(&job.order_id, OrderStatus::Failed)
				.with_error(error)
				.with_log(format!("Order failed: {}", error)),
		);
	}
}
