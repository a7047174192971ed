//! Job queue module for the execution engine.
//!
//! This module defines the contract the pipeline requires from a backing
//! work queue and provides an in-memory implementation. The queue decouples
//! order submission from execution: submitted jobs wait here until the
//! admission controller lets a worker start them, and failed jobs re-enter
//! through a scheduled delayed push.

use async_trait::async_trait;
use executor_types::Job;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
	/// Error that occurs when the queue is shut down while a consumer waits.
	#[error("Queue closed")]
	Closed,
	/// Error that occurs in the queue backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Trait defining the low-level interface for queue backends.
///
/// Contract required from any backing implementation:
/// - at-least-once delivery of every pushed job to a consumer;
/// - FIFO service order among jobs that are ready at the same time;
/// - a job pushed with a delay becomes visible only once the delay has
///   elapsed (the re-enqueue-with-deadline primitive used for backoff);
/// - no two jobs for the same order id are handed out concurrently.
#[async_trait]
pub trait QueueInterface: Send + Sync {
	/// Enqueues a job for immediate execution.
	async fn push(&self, job: Job) -> Result<(), QueueError>;

	/// Enqueues a job that becomes ready after the given delay.
	async fn push_delayed(&self, job: Job, delay: Duration) -> Result<(), QueueError>;

	/// Waits for and removes the next ready job.
	async fn next(&self) -> Result<Job, QueueError>;

	/// Number of jobs currently buffered, ready and delayed combined.
	async fn depth(&self) -> usize;
}

/// High-level queue service wrapping a backend implementation.
pub struct QueueService {
	/// The underlying queue backend implementation.
	backend: Box<dyn QueueInterface>,
}

impl QueueService {
	/// Creates a new QueueService with the specified backend.
	pub fn new(backend: Box<dyn QueueInterface>) -> Self {
		Self { backend }
	}

	/// Enqueues a job for immediate execution.
	pub async fn push(&self, job: Job) -> Result<(), QueueError> {
		debug!(order_id = %job.order_id, attempt = job.attempt, "enqueueing job");
		self.backend.push(job).await
	}

	/// Schedules a retry attempt to become ready after `delay`.
	pub async fn push_delayed(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
		debug!(
			order_id = %job.order_id,
			attempt = job.attempt,
			delay_ms = delay.as_millis() as u64,
			"scheduling delayed job"
		);
		self.backend.push_delayed(job, delay).await
	}

	/// Waits for the next ready job.
	pub async fn next(&self) -> Result<Job, QueueError> {
		self.backend.next().await
	}

	/// Number of jobs currently buffered.
	pub async fn depth(&self) -> usize {
		self.backend.depth().await
	}
}
