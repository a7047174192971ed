//! Order types for the execution engine.
//!
//! This module defines the submission payload, the queued unit of work,
//! and the ephemeral routing/settlement values exchanged with a router
//! backend during order execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An order execution request as submitted by a client.
///
/// The request fields are immutable for the lifetime of the order; the
/// pipeline owns the order exclusively once it has been accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
	/// Symbol of the token being sold.
	pub token_in: String,
	/// Symbol of the token being bought.
	pub token_out: String,
	/// Amount of `token_in` to swap. Must be a positive real number.
	pub amount: f64,
	/// Identifier of the submitting user.
	pub user_id: String,
}

/// Execution venue a quote can settle on.
///
/// The venue set is closed; routers never invent venue names at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
	Raydium,
	Meteora,
}

impl fmt::Display for Venue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Venue::Raydium => write!(f, "Raydium"),
			Venue::Meteora => write!(f, "Meteora"),
		}
	}
}

/// Best-execution quote returned by a router.
///
/// Quotes are ephemeral: they feed the settlement call for the same
/// attempt and are never persisted past the routing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
	/// Venue offering this price.
	pub venue: Venue,
	/// Quoted price for the pair, in units of `token_out` per `token_in`.
	pub price: f64,
	/// Venue fee as a fraction of notional.
	pub fee: f64,
}

/// Result of a settled swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
	/// Settlement identifier (transaction hash) assigned by the venue.
	pub tx_hash: String,
	/// Price the swap actually executed at, after slippage.
	pub executed_price: f64,
}

/// The unit of work handed to the job queue.
///
/// Carries the immutable order fields plus the queue-managed attempt
/// counter. Exactly one job per `order_id` may be executing at any time;
/// that exclusivity is a contract on the backing queue, not something the
/// pipeline re-checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
	/// Identifier of the order this job executes.
	pub order_id: String,
	pub token_in: String,
	pub token_out: String,
	pub amount: f64,
	/// 1-based attempt number, incremented on every retry.
	pub attempt: u32,
}

impl Job {
	/// Creates the first-attempt job for a submitted order.
	pub fn new(order_id: impl Into<String>, request: &OrderRequest) -> Self {
		Self {
			order_id: order_id.into(),
			token_in: request.token_in.clone(),
			token_out: request.token_out.clone(),
			amount: request.amount,
			attempt: 1,
		}
	}

	/// Derives the job for the next attempt of the same order.
	pub fn next_attempt(&self) -> Self {
		Self {
			attempt: self.attempt + 1,
			..self.clone()
		}
	}
}
