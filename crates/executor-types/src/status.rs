//! Order lifecycle status types and the wire format pushed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Venue;

/// Lifecycle status of an order.
///
/// The happy path runs `Pending -> Routing -> Building -> Submitted ->
/// Confirmed`; `Failed` is reachable from every non-terminal status. The
/// legality of individual transitions is enforced by the state machine in
/// the core crate, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	Pending,
	Routing,
	Building,
	Submitted,
	Confirmed,
	Failed,
}

impl OrderStatus {
	/// Returns true for statuses no transition may leave.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Routing => "routing",
			OrderStatus::Building => "building",
			OrderStatus::Submitted => "submitted",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Failed => "failed",
		};
		write!(f, "{}", s)
	}
}

/// Mutable projection of an order's progress within one attempt.
///
/// The pipeline does not retain this snapshot past the attempt; observers
/// that need history accumulate it from the status updates they receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderState {
	pub status: OrderStatus,
	pub venue: Option<Venue>,
	pub execution_price: Option<f64>,
	pub tx_hash: Option<String>,
	pub error: Option<String>,
	/// Append-only human-readable trace.
	pub logs: Vec<String>,
}

impl OrderState {
	/// Creates the initial snapshot for a fresh attempt.
	pub fn new() -> Self {
		Self {
			status: OrderStatus::Pending,
			venue: None,
			execution_price: None,
			tx_hash: None,
			error: None,
			logs: Vec::new(),
		}
	}

	pub fn push_log(&mut self, line: impl Into<String>) {
		self.logs.push(line.into());
	}
}

impl Default for OrderState {
	fn default() -> Self {
		Self::new()
	}
}

/// A single status update as delivered to an observer.
///
/// This is the wire object: camelCase keys, lowercase status, RFC 3339
/// timestamp, optional fields omitted entirely when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
	pub order_id: String,
	pub status: OrderStatus,
	pub timestamp: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub venue: Option<Venue>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub execution_price: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tx_hash: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logs: Option<Vec<String>>,
}

impl StatusUpdate {
	/// Creates an update for the given order and status, stamped now.
	pub fn new(order_id: impl Into<String>, status: OrderStatus) -> Self {
		Self {
			order_id: order_id.into(),
			status,
			timestamp: Utc::now(),
			venue: None,
			execution_price: None,
			tx_hash: None,
			error: None,
			logs: None,
		}
	}

	pub fn with_venue(mut self, venue: Venue) -> Self {
		self.venue = Some(venue);
		self
	}

	pub fn with_execution_price(mut self, price: f64) -> Self {
		self.execution_price = Some(price);
		self
	}

	pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
		self.tx_hash = Some(tx_hash.into());
		self
	}

	pub fn with_error(mut self, error: impl Into<String>) -> Self {
		self.error = Some(error.into());
		self
	}

	/// Appends a log line to this update.
	pub fn with_log(mut self, line: impl Into<String>) -> Self {
		self.logs.get_or_insert_with(Vec::new).push(line.into());
		self
	}
}
