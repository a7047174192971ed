//! Order state machine.
//!
//! Pure transition logic: given the current snapshot and a requested
//! status, either produce the next snapshot or reject the transition.
//! The machine performs no side effects; the execution worker is
//! responsible for delivering an update to the status sink after every
//! accepted transition.

use executor_types::{OrderState, OrderStatus};
use thiserror::Error;

/// Errors raised by the state machine.
///
/// An invalid transition is a programming error in the caller, never a
/// recoverable condition: the attempt is abandoned without retry.
#[derive(Debug, Error)]
pub enum StateError {
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Returns whether the machine permits moving from `from` to `to`.
///
/// The happy path is strictly ordered; `Routing -> Routing` is the one
/// same-status re-emission (venue population after the quote lands), and
/// `Failed` is reachable from every non-terminal status. Nothing leaves a
/// terminal status.
fn transition_permitted(from: OrderStatus, to: OrderStatus) -> bool {
	use OrderStatus::*;

	if from.is_terminal() {
		return false;
	}

	matches!(
		(from, to),
		(Pending, Routing)
			| (Routing, Routing)
			| (Routing, Building)
			| (Building, Submitted)
			| (Submitted, Confirmed)
			| (Pending | Routing | Building | Submitted, Failed)
	)
}

/// Validates the requested transition and returns the next snapshot.
pub fn next_state(current: &OrderState, to: OrderStatus) -> Result<OrderState, StateError> {
	if !transition_permitted(current.status, to) {
		return Err(StateError::InvalidTransition {
			from: current.status,
			to,
		});
	}

	let mut next = current.clone();
	next.status = to;
	Ok(next)
}
