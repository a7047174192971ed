//! Status sink registry for per-order lifecycle updates.
//!
//! The registry is the process-scoped map from an order id to the live
//! channel of whoever is observing that order. Workers never touch the map
//! directly; they hand updates to `deliver`, which is strictly
//! best-effort: a missing or closed channel means the update is dropped
//! silently. Nothing is buffered and nothing is replayed, so an observer
//! that registers mid-flight only sees updates emitted afterwards.
//!
//! Registration and deregistration belong to the transport layer that owns
//! the observer connections; both are idempotent.

use dashmap::DashMap;
use executor_types::StatusUpdate;
use tokio::sync::mpsc;
use tracing::debug;

/// Sender half of a per-order status channel.
pub type SinkSender = mpsc::UnboundedSender<StatusUpdate>;

/// Process-scoped registry of live per-order status channels.
///
/// Created once at startup and shared by the engine and the transport
/// layer; dropped at shutdown, which closes every remaining channel.
#[derive(Default)]
pub struct SinkRegistry {
	channels: DashMap<String, SinkSender>,
}

impl SinkRegistry {
	pub fn new() -> Self {
		Self {
			channels: DashMap::new(),
		}
	}

	/// Registers the channel observing `order_id`.
	///
	/// Idempotent: registering again replaces the previous channel, so an
	/// order never has more than one live observer channel and updates are
	/// never delivered twice.
	pub fn register(&self, order_id: impl Into<String>, sender: SinkSender) {
		self.channels.insert(order_id.into(), sender);
	}

	/// Removes the channel observing `order_id`, if any. Idempotent.
	pub fn unregister(&self, order_id: &str) {
		self.channels.remove(order_id);
	}

	/// Delivers a status update to the order's observer, best-effort.
	///
	/// A missing or closed channel is not an error; the closed channel is
	/// dropped from the registry so later deliveries skip it entirely.
	pub fn deliver(&self, update: StatusUpdate) {
		let order_id = update.order_id.clone();

		let delivered = match self.channels.get(&order_id) {
			Some(sender) => sender.send(update).is_ok(),
			None => {
				debug!(%order_id, "no sink registered, dropping update");
				return;
			}
		};

		if !delivered {
			debug!(%order_id, "sink closed, dropping channel");
			self.channels.remove(&order_id);
		}
	}

	/// Number of currently registered channels.
	pub fn active(&self) -> usize {
		self.channels.len()
	}
}
