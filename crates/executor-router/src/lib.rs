//! Router module for the execution engine.
//!
//! A router is the price-discovery and settlement capability behind the
//! pipeline: it quotes the best execution venue for a pair and settles the
//! swap on the chosen venue. Implementations are selected at composition
//! time; the pipeline only ever sees the `RouterService` wrapper, which
//! also enforces the per-call timeout.

use async_trait::async_trait;
use executor_types::{Quote, Swap, Venue};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod live;
	pub mod simulated;
}

/// Errors that can occur during routing and settlement.
#[derive(Debug, Error)]
pub enum RouterError {
	/// The execution identity does not hold enough reserve to trade.
	#[error("Insufficient reserve balance: required {required}, available {available}")]
	InsufficientReserve { required: f64, available: f64 },
	/// No venue can fill the requested pair.
	#[error("No liquidity for pair {token_in}/{token_out}")]
	NoLiquidity { token_in: String, token_out: String },
	/// The venue refused the settlement before applying it.
	#[error("Settlement rejected by {venue}: {reason}")]
	SettlementRejected { venue: Venue, reason: String },
	/// Transport-level failure; the call's outcome is unknown.
	#[error("Network error: {0}")]
	Network(String),
	/// The call exceeded the configured bound; the outcome is unknown.
	#[error("Router call timed out after {timeout_ms} ms")]
	Timeout { timeout_ms: u64 },
}

impl RouterError {
	/// True when the call may have taken effect despite the error.
	///
	/// A rejection or a validation failure is known not to have settled
	/// anything; a transport error or timeout leaves the outcome unknown.
	pub fn is_unknown_outcome(&self) -> bool {
		matches!(self, RouterError::Network(_) | RouterError::Timeout { .. })
	}
}

/// Trait defining the interface for router backends.
///
/// Implementations must be safe to call concurrently: the execution
/// identity they hold (wallet, API credential) is shared across all
/// in-flight orders.
#[async_trait]
pub trait RouterInterface: Send + Sync {
	/// Finds the best-execution quote for the given pair and amount.
	async fn find_best_route(
		&self,
		token_in: &str,
		token_out: &str,
		amount: f64,
	) -> Result<Quote, RouterError>;

	/// Settles a swap on the given venue.
	async fn execute_swap(&self, venue: Venue, amount: f64) -> Result<Swap, RouterError>;

	/// Whether a swap whose outcome is unknown may be safely re-submitted.
	///
	/// Backends that settle against a real ledger must return false here:
	/// re-submitting after an unknown outcome risks double settlement and
	/// the order has to fail into manual reconciliation instead.
	fn safe_to_resubmit(&self) -> bool;
}

/// Router service wrapping the configured backend.
///
/// Applies the caller-supplied timeout to every backend call; an expired
/// call surfaces as `RouterError::Timeout`.
pub struct RouterService {
	/// The underlying router backend implementation.
	implementation: Box<dyn RouterInterface>,
	/// Upper bound on any single backend call.
	call_timeout: Duration,
}

impl RouterService {
	/// Creates a new RouterService with the specified backend and timeout.
	pub fn new(implementation: Box<dyn RouterInterface>, call_timeout: Duration) -> Self {
		Self {
			implementation,
			call_timeout,
		}
	}

	/// Finds the best-execution quote, bounded by the call timeout.
	pub async fn find_best_route(
		&self,
		token_in: &str,
		token_out: &str,
		amount: f64,
	) -> Result<Quote, RouterError> {
		self.bounded(self.implementation.find_best_route(token_in, token_out, amount))
			.await
	}

	/// Settles a swap, bounded by the call timeout.
	pub async fn execute_swap(&self, venue: Venue, amount: f64) -> Result<Swap, RouterError> {
		self.bounded(self.implementation.execute_swap(venue, amount))
			.await
	}

	/// Whether the backend tolerates re-submission after an unknown outcome.
	pub fn safe_to_resubmit(&self) -> bool {
		self.implementation.safe_to_resubmit()
	}

	async fn bounded<T>(
		&self,
		call: impl std::future::Future<Output = Result<T, RouterError>>,
	) -> Result<T, RouterError> {
		match tokio::time::timeout(self.call_timeout, call).await {
			Ok(result) => result,
			Err(_) => Err(RouterError::Timeout {
				timeout_ms: self.call_timeout.as_millis() as u64,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct StallingRouter;

	#[async_trait]
	impl RouterInterface for StallingRouter {
		async fn find_best_route(
			&self,
			_token_in: &str,
			_token_out: &str,
			_amount: f64,
		) -> Result<Quote, RouterError> {
			std::future::pending().await
		}

		async fn execute_swap(&self, _venue: Venue, _amount: f64) -> Result<Swap, RouterError> {
			std::future::pending().await
		}

		fn safe_to_resubmit(&self) -> bool {
			true
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_call_timeout_maps_to_timeout_error() {
		let service = RouterService::new(Box::new(StallingRouter), Duration::from_secs(2));

		let err = service
			.find_best_route("SOL", "USDC", 1.0)
			.await
			.expect_err("stalled call must time out");

		assert!(matches!(err, RouterError::Timeout { timeout_ms: 2000 }));
		assert!(err.is_unknown_outcome());
	}

	#[test]
	fn test_known_outcome_errors() {
		let rejected = RouterError::SettlementRejected {
			venue: Venue::Raydium,
			reason: "slippage".to_string(),
		};
		assert!(!rejected.is_unknown_outcome());

		let no_reserve = RouterError::InsufficientReserve {
			required: 0.002,
			available: 0.0,
		};
		assert!(!no_reserve.is_unknown_outcome());
		assert!(no_reserve.to_string().contains("Insufficient"));
	}
}
