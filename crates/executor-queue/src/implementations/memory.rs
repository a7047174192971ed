//! Queue backend implementations for the execution engine.
//!
//! This module provides a concrete implementation of the QueueInterface
//! trait backed by process memory. Durability across restarts is the
//! responsibility of an external backend; this implementation satisfies
//! the ordering and delayed-visibility contract for a single process.

use crate::{QueueError, QueueInterface};
use async_trait::async_trait;
use executor_types::Job;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// A job waiting for its visibility deadline.
struct DelayedJob {
	ready_at: Instant,
	/// Tie-breaker preserving FIFO order among equal deadlines.
	seq: u64,
	job: Job,
}

impl PartialEq for DelayedJob {
	fn eq(&self, other: &Self) -> bool {
		self.ready_at == other.ready_at && self.seq == other.seq
	}
}

impl Eq for DelayedJob {}

impl PartialOrd for DelayedJob {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for DelayedJob {
	fn cmp(&self, other: &Self) -> Ordering {
		// BinaryHeap is a max-heap; invert so the earliest deadline wins.
		other
			.ready_at
			.cmp(&self.ready_at)
			.then_with(|| other.seq.cmp(&self.seq))
	}
}

struct QueueState {
	ready: VecDeque<Job>,
	delayed: BinaryHeap<DelayedJob>,
}

/// In-memory queue implementation.
///
/// Ready jobs are served FIFO; delayed jobs sit in a deadline heap and
/// move to the ready list once due. The consumer side is written for a
/// single dispatch loop, which is how the engine drives it.
pub struct MemoryQueue {
	state: Mutex<QueueState>,
	notify: Notify,
	seq: AtomicU64,
}

impl MemoryQueue {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(QueueState {
				ready: VecDeque::new(),
				delayed: BinaryHeap::new(),
			}),
			notify: Notify::new(),
			seq: AtomicU64::new(0),
		}
	}

	/// Moves every due delayed job onto the ready list.
	fn promote_due(state: &mut QueueState, now: Instant) {
		while state
			.delayed
			.peek()
			.map(|d| d.ready_at <= now)
			.unwrap_or(false)
		{
			if let Some(due) = state.delayed.pop() {
				state.ready.push_back(due.job);
			}
		}
	}
}

impl Default for MemoryQueue {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl QueueInterface for MemoryQueue {
	async fn push(&self, job: Job) -> Result<(), QueueError> {
		self.state.lock().await.ready.push_back(job);
		self.notify.notify_one();
		Ok(())
	}

	async fn push_delayed(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
		let entry = DelayedJob {
			ready_at: Instant::now() + delay,
			seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
			job,
		};
		self.state.lock().await.delayed.push(entry);
		self.notify.notify_one();
		Ok(())
	}

	async fn next(&self) -> Result<Job, QueueError> {
		loop {
			let next_deadline = {
				let mut state = self.state.lock().await;
				Self::promote_due(&mut state, Instant::now());

				if let Some(job) = state.ready.pop_front() {
					return Ok(job);
				}

				state.delayed.peek().map(|d| d.ready_at)
			};

			match next_deadline {
				Some(deadline) => {
					tokio::select! {
						_ = self.notify.notified() => {}
						_ = tokio::time::sleep_until(deadline) => {}
					}
				}
				None => self.notify.notified().await,
			}
		}
	}

	async fn depth(&self) -> usize {
		let state = self.state.lock().await;
		state.ready.len() + state.delayed.len()
	}
}

/// Factory function to create the in-memory queue backend.
pub fn create_queue() -> Box<dyn QueueInterface> {
	Box::new(MemoryQueue::new())
}
