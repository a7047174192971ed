//! Admission controller: the two dispatch gates.
//!
//! A job may start executing only when both gates admit it at the same
//! moment: a concurrency gate bounding how many orders are mid-execution
//! process-wide, and a fixed-window rate gate bounding how many starts the
//! window permits. Jobs beyond either cap stay queued; the single dispatch
//! loop admits in arrival order, so waiting jobs are served FIFO.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum AdmissionError {
	/// The controller's semaphore was closed during shutdown.
	#[error("Admission controller closed")]
	Closed,
}

/// Proof that both gates admitted a job start.
///
/// Holding the permit occupies one concurrency slot; dropping it releases
/// the slot. The rate gate is consumed at admission and is not returned.
pub struct AdmissionPermit {
	_slot: OwnedSemaphorePermit,
}

struct RateWindow {
	started_at: Instant,
	starts: u32,
}

/// Concurrency cap plus fixed-window rate cap, composed as independent
/// gates.
pub struct AdmissionController {
	slots: Arc<Semaphore>,
	rate: Mutex<RateWindow>,
	rate_limit: u32,
	window: Duration,
}

impl AdmissionController {
	pub fn new(max_concurrency: usize, rate_limit: u32, window: Duration) -> Self {
		Self {
			slots: Arc::new(Semaphore::new(max_concurrency)),
			rate: Mutex::new(RateWindow {
				started_at: Instant::now(),
				starts: 0,
			}),
			rate_limit,
			window,
		}
	}

	/// Waits until both gates admit a new job start.
	///
	/// The concurrency slot is taken first; the caller keeps its queue
	/// position while waiting out the rate window.
	pub async fn admit(&self) -> Result<AdmissionPermit, AdmissionError> {
		let slot = self
			.slots
			.clone()
			.acquire_owned()
			.await
			.map_err(|_| AdmissionError::Closed)?;

		self.rate_slot().await;

		Ok(AdmissionPermit { _slot: slot })
	}

	/// Consumes one start from the current rate window, waiting for the
	/// next window when the current one is spent.
	async fn rate_slot(&self) {
		loop {
			let wait = {
				let mut window = self.rate.lock().await;
				let now = Instant::now();

				if now.duration_since(window.started_at) >= self.window {
					window.started_at = now;
					window.starts = 0;
				}

				if window.starts < self.rate_limit {
					window.starts += 1;
					return;
				}

				self.window - now.duration_since(window.started_at)
			};

			tokio::time::sleep(wait).await;
		}
	}

	/// Concurrency slots currently free.
	pub fn available_slots(&self) -> usize {
		self.slots.available_permits()
	}
}
