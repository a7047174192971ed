//! Core order execution pipeline.
//!
//! The engine wires the job queue, admission controller, retry policy,
//! execution worker and status sink into one dispatch loop: submission
//! enqueues a job and emits PENDING; the loop hands jobs to workers as
//! soon as both admission gates allow; a failed attempt re-enters the
//! queue with a backoff deadline until the retry budget is spent, at
//! which point the order is finalized as FAILED.

use executor_config::Config;
use executor_queue::implementations::memory::create_queue;
use executor_queue::{QueueError, QueueInterface, QueueService};
use executor_router::{RouterInterface, RouterService};
use executor_sink::SinkRegistry;
use executor_types::{Job, OrderRequest, OrderStatus, StatusUpdate};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub mod limiter;
pub mod retry;
pub mod state;
pub mod worker;

use limiter::{AdmissionController, AdmissionError, AdmissionPermit};
use retry::RetryPolicy;
use worker::ExecutionWorker;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
	#[error("Queue error: {0}")]
	Queue(#[from] QueueError),
	#[error("Admission error: {0}")]
	Admission(#[from] AdmissionError),
}

/// The order execution engine.
///
/// Shared by the transport layer (submission, sink registration) and the
/// dispatch loop; everything inside is either immutable or safe for
/// concurrent access.
pub struct ExecutorEngine {
	queue: Arc<QueueService>,
	router: Arc<RouterService>,
	sink: Arc<SinkRegistry>,
	admission: Arc<AdmissionController>,
	retry: RetryPolicy,
	worker: Arc<ExecutionWorker>,
	shutdown: broadcast::Sender<()>,
}

impl ExecutorEngine {
	/// Accepts an order for execution.
	///
	/// Emits the immediate PENDING update and enqueues the first attempt.
	/// PENDING goes out before the job becomes visible to a worker so no
	/// later status can overtake it. The caller owns `order_id`
	/// generation; ids are unique for the process lifetime and never
	/// reused.
	pub async fn add_order(
		&self,
		order_id: &str,
		request: OrderRequest,
	) -> Result<(), EngineError> {
		if !request.amount.is_finite() || request.amount <= 0.0 {
			return Err(EngineError::InvalidOrder(
				"amount must be a positive number".to_string(),
			));
		}

		info!(
			%order_id,
			token_in = %request.token_in,
			token_out = %request.token_out,
			amount = request.amount,
			user_id = %request.user_id,
			"order accepted"
		);

		self.sink.deliver(
			StatusUpdate::new(order_id, OrderStatus::Pending).with_log("Order queued"),
		);

		self.queue.push(Job::new(order_id, &request)).await?;

		Ok(())
	}

	/// Runs the dispatch loop until `shutdown` is signalled, then drains
	/// in-flight attempts.
	///
	/// Jobs are admitted strictly in queue order: the loop holds the next
	/// job while waiting on the admission gates, so a capped pipeline
	/// serves waiting jobs FIFO.
	pub async fn run(&self) -> Result<(), EngineError> {
		info!("starting dispatch loop");

		let mut shutdown_rx = self.shutdown.subscribe();
		let mut running: JoinSet<()> = JoinSet::new();

		loop {
			tokio::select! {
				job = self.queue.next() => {
					let job = job?;
					let permit = self.admission.admit().await?;
					self.spawn_attempt(&mut running, job, permit);
				}

				Some(_) = running.join_next(), if !running.is_empty() => {}

				_ = shutdown_rx.recv() => break,
			}
		}

		info!(in_flight = running.len(), "draining in-flight orders");
		while running.join_next().await.is_some() {}
		info!("dispatch loop stopped");

		Ok(())
	}

	/// Spawns one execution attempt; the permit is held for its duration.
	fn spawn_attempt(&self, running: &mut JoinSet<()>, job: Job, permit: AdmissionPermit) {
		let worker = self.worker.clone();
		let queue = self.queue.clone();
		let retry = self.retry;
		let safe_to_resubmit = self.router.safe_to_resubmit();

		running.spawn(async move {
			let _permit = permit;

			debug!(order_id = %job.order_id, attempt = job.attempt, "attempt dispatched");

			let Err(err) = worker.process_order(&job).await else {
				return;
			};

			if err.is_retryable(safe_to_resubmit) && retry.should_retry(job.attempt) {
				let delay = retry.backoff_delay(job.attempt);
				warn!(
					order_id = %job.order_id,
					attempt = job.attempt,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"attempt failed, scheduling retry"
				);

				if let Err(queue_err) = queue.push_delayed(job.next_attempt(), delay).await {
					warn!(
						order_id = %job.order_id,
						error = %queue_err,
						"re-enqueue failed, finalizing order"
					);
					worker.finalize_failure(&job, &err.to_string());
				}
			} else {
				worker.finalize_failure(&job, &err.to_string());
			}
		});
	}

	/// Signals the dispatch loop to stop accepting work.
	pub fn shutdown(&self) {
		let _ = self.shutdown.send(());
	}

	/// The status sink registry shared with the transport layer.
	pub fn sink(&self) -> Arc<SinkRegistry> {
		self.sink.clone()
	}

	/// Jobs currently buffered in the queue.
	pub async fn queue_depth(&self) -> usize {
		self.queue.depth().await
	}
}

/// Builder assembling an engine from configuration.
///
/// The router implementation is injected by the composition layer; queue
/// and sink default to the in-process implementations.
pub struct ExecutorBuilder {
	config: Config,
	router: Option<Box<dyn RouterInterface>>,
	queue: Option<Box<dyn QueueInterface>>,
	sink: Option<Arc<SinkRegistry>>,
}

impl ExecutorBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			router: None,
			queue: None,
			sink: None,
		}
	}

	pub fn with_router(mut self, router: Box<dyn RouterInterface>) -> Self {
		self.router = Some(router);
		self
	}

	pub fn with_queue(mut self, queue: Box<dyn QueueInterface>) -> Self {
		self.queue = Some(queue);
		self
	}

	pub fn with_sink(mut self, sink: Arc<SinkRegistry>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn build(self) -> Result<ExecutorEngine, EngineError> {
		let implementation = self
			.router
			.ok_or_else(|| EngineError::Config("Router implementation not provided".into()))?;
		let router = Arc::new(RouterService::new(
			implementation,
			self.config.router.call_timeout(),
		));

		let backend = self.queue.unwrap_or_else(create_queue);
		let queue = Arc::new(QueueService::new(backend));

		let sink = self
			.sink
			.unwrap_or_else(|| Arc::new(SinkRegistry::new()));

		let admission = Arc::new(AdmissionController::new(
			self.config.admission.max_concurrency,
			self.config.admission.rate_limit,
			self.config.admission.rate_window(),
		));

		let retry = RetryPolicy::new(
			self.config.retry.max_attempts,
			self.config.retry.base_delay(),
		);

		let worker = Arc::new(ExecutionWorker::new(
			router.clone(),
			sink.clone(),
			Duration::from_millis(self.config.engine.build_delay_ms),
		));

		let (shutdown, _) = broadcast::channel(1);

		Ok(ExecutorEngine {
			queue,
			router,
			sink,
			admission,
			retry,
			worker,
			shutdown,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use executor_config::{
		AdmissionConfig, EngineSettings, RetryConfig, RouterConfig, RouterKind,
		SimulatedRouterConfig,
	};
	use executor_router::RouterError;
	use executor_types::{Quote, Swap, Venue};
	use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
	use tokio::sync::mpsc;

	fn test_config(max_attempts: u32, max_concurrency: usize) -> Config {
		Config {
			engine: EngineSettings {
				name: "test-engine".to_string(),
				http_port: 0,
				log_level: "info".to_string(),
				build_delay_ms: 0,
			},
			admission: AdmissionConfig {
				max_concurrency,
				rate_limit: 1_000,
				rate_window_ms: 60_000,
			},
			retry: RetryConfig {
				max_attempts,
				base_delay_ms: 10,
			},
			router: RouterConfig {
				kind: RouterKind::Simulated,
				call_timeout_secs: 30,
				simulated: SimulatedRouterConfig::default(),
				live: None,
			},
		}
	}

	fn request() -> OrderRequest {
		OrderRequest {
			token_in: "SOL".to_string(),
			token_out: "USDC".to_string(),
			amount: 1.0,
			user_id: "user_123".to_string(),
		}
	}

	/// Router that fails a scripted number of routing calls, then quotes
	/// Raydium at 150 and settles as tx1.
	struct ScriptedRouter {
		route_failures: AtomicU32,
		insufficient_reserve: bool,
	}

	impl ScriptedRouter {
		fn succeeding() -> Self {
			Self {
				route_failures: AtomicU32::new(0),
				insufficient_reserve: false,
			}
		}

		fn failing_first(failures: u32) -> Self {
			Self {
				route_failures: AtomicU32::new(failures),
				insufficient_reserve: false,
			}
		}

		fn without_reserve() -> Self {
			Self {
				route_failures: AtomicU32::new(0),
				insufficient_reserve: true,
			}
		}
	}

	#[async_trait]
	impl RouterInterface for ScriptedRouter {
		async fn find_best_route(
			&self,
			token_in: &str,
			token_out: &str,
			_amount: f64,
		) -> Result<Quote, RouterError> {
			if self.insufficient_reserve {
				return Err(RouterError::InsufficientReserve {
					required: 0.002,
					available: 0.0,
				});
			}

			let remaining = self.route_failures.load(Ordering::SeqCst);
			if remaining > 0 {
				self.route_failures.store(remaining - 1, Ordering::SeqCst);
				return Err(RouterError::NoLiquidity {
					token_in: token_in.to_string(),
					token_out: token_out.to_string(),
				});
			}

			Ok(Quote {
				venue: Venue::Raydium,
				price: 150.0,
				fee: 0.001,
			})
		}

		async fn execute_swap(&self, _venue: Venue, _amount: f64) -> Result<Swap, RouterError> {
			Ok(Swap {
				tx_hash: "tx1".to_string(),
				executed_price: 150.0,
			})
		}

		fn safe_to_resubmit(&self) -> bool {
			true
		}
	}

	/// Router that tracks how many orders are mid-execution.
	struct TrackingRouter {
		current: Arc<AtomicUsize>,
		peak: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl RouterInterface for TrackingRouter {
		async fn find_best_route(
			&self,
			_token_in: &str,
			_token_out: &str,
			_amount: f64,
		) -> Result<Quote, RouterError> {
			let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
			self.peak.fetch_max(now, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(100)).await;

			Ok(Quote {
				venue: Venue::Meteora,
				price: 100.0,
				fee: 0.001,
			})
		}

		async fn execute_swap(&self, _venue: Venue, _amount: f64) -> Result<Swap, RouterError> {
			tokio::time::sleep(Duration::from_millis(100)).await;
			self.current.fetch_sub(1, Ordering::SeqCst);

			Ok(Swap {
				tx_hash: "tracked".to_string(),
				executed_price: 100.0,
			})
		}

		fn safe_to_resubmit(&self) -> bool {
			true
		}
	}

	/// Router whose settlement outcome is unknown and not re-submittable.
	struct UnsafeSettlementRouter;

	#[async_trait]
	impl RouterInterface for UnsafeSettlementRouter {
		async fn find_best_route(
			&self,
			_token_in: &str,
			_token_out: &str,
			_amount: f64,
		) -> Result<Quote, RouterError> {
			Ok(Quote {
				venue: Venue::Raydium,
				price: 150.0,
				fee: 0.001,
			})
		}

		async fn execute_swap(&self, _venue: Venue, _amount: f64) -> Result<Swap, RouterError> {
			Err(RouterError::Network("connection reset mid-broadcast".to_string()))
		}

		fn safe_to_resubmit(&self) -> bool {
			false
		}
	}

	/// Builds the engine, starts its dispatch loop, and returns the
	/// pieces a scenario needs.
	fn start_engine(
		config: Config,
		router: Box<dyn RouterInterface>,
	) -> (Arc<ExecutorEngine>, Arc<SinkRegistry>) {
		let sink = Arc::new(SinkRegistry::new());
		let engine = Arc::new(
			ExecutorBuilder::new(config)
				.with_router(router)
				.with_sink(sink.clone())
				.build()
				.unwrap(),
		);

		let runner = engine.clone();
		tokio::spawn(async move { runner.run().await });

		(engine, sink)
	}

	/// Collects updates for one order until a terminal status arrives.
	async fn collect_until_terminal(
		rx: &mut mpsc::UnboundedReceiver<StatusUpdate>,
	) -> Vec<StatusUpdate> {
		let mut updates = Vec::new();
		loop {
			let update = tokio::time::timeout(Duration::from_secs(60), rx.recv())
				.await
				.expect("timed out waiting for a terminal status")
				.expect("sink channel closed before a terminal status");

			let terminal = update.status.is_terminal();
			updates.push(update);
			if terminal {
				return updates;
			}
		}
	}

	fn statuses(updates: &[StatusUpdate]) -> Vec<OrderStatus> {
		updates.iter().map(|u| u.status).collect()
	}

	#[tokio::test(start_paused = true)]
	async fn test_happy_path_status_sequence() {
		let (engine, sink) = start_engine(
			test_config(3, 2),
			Box::new(ScriptedRouter::succeeding()),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		use OrderStatus::*;
		assert_eq!(
			statuses(&updates),
			vec![Pending, Routing, Routing, Building, Submitted, Confirmed]
		);

		// Venue appears on the routing re-emission.
		assert_eq!(updates[2].venue, Some(Venue::Raydium));

		let confirmed = updates.last().unwrap();
		assert_eq!(confirmed.tx_hash.as_deref(), Some("tx1"));
		assert_eq!(confirmed.execution_price, Some(150.0));
	}

	#[tokio::test(start_paused = true)]
	async fn test_pending_emitted_first_and_once() {
		let (engine, sink) = start_engine(
			test_config(3, 2),
			Box::new(ScriptedRouter::succeeding()),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		assert_eq!(updates[0].status, OrderStatus::Pending);
		let pending_count = updates
			.iter()
			.filter(|u| u.status == OrderStatus::Pending)
			.count();
		assert_eq!(pending_count, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_two_failures_then_success_confirms_with_three_attempts() {
		let (engine, sink) = start_engine(
			test_config(3, 2),
			Box::new(ScriptedRouter::failing_first(2)),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		assert_eq!(updates.last().unwrap().status, OrderStatus::Confirmed);

		// Three attempts: one ROUTING emission for each failed attempt,
		// two for the successful one.
		let routing_count = updates
			.iter()
			.filter(|u| u.status == OrderStatus::Routing)
			.count();
		assert_eq!(routing_count, 4);
	}

	#[tokio::test(start_paused = true)]
	async fn test_two_failures_exhaust_two_attempt_budget() {
		let (engine, sink) = start_engine(
			test_config(2, 2),
			Box::new(ScriptedRouter::failing_first(2)),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		let failed = updates.last().unwrap();
		assert_eq!(failed.status, OrderStatus::Failed);
		assert!(failed.error.as_deref().unwrap().contains("No liquidity"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_insufficient_reserve_surfaces_in_terminal_error() {
		let (engine, sink) = start_engine(
			test_config(3, 2),
			Box::new(ScriptedRouter::without_reserve()),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		let failed = updates.last().unwrap();
		assert_eq!(failed.status, OrderStatus::Failed);
		assert!(failed.error.as_deref().unwrap().contains("Insufficient"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrency_cap_bounds_in_flight_orders() {
		let current = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));

		let (engine, sink) = start_engine(
			test_config(1, 2),
			Box::new(TrackingRouter {
				current: current.clone(),
				peak: peak.clone(),
			}),
		);

		let mut receivers = Vec::new();
		for i in 0..5 {
			let order_id = format!("order-{}", i);
			let (tx, rx) = mpsc::unbounded_channel();
			sink.register(&order_id, tx);
			engine.add_order(&order_id, request()).await.unwrap();
			receivers.push(rx);
		}

		for rx in &mut receivers {
			let updates = collect_until_terminal(rx).await;
			assert_eq!(updates.last().unwrap().status, OrderStatus::Confirmed);
		}

		assert!(
			peak.load(Ordering::SeqCst) <= 2,
			"more than 2 orders were mid-execution"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unknown_settlement_outcome_fails_without_retry() {
		let (engine, sink) = start_engine(
			test_config(3, 2),
			Box::new(UnsafeSettlementRouter),
		);

		let (tx, mut rx) = mpsc::unbounded_channel();
		sink.register("order-1", tx);
		engine.add_order("order-1", request()).await.unwrap();

		let updates = collect_until_terminal(&mut rx).await;

		let failed = updates.last().unwrap();
		assert_eq!(failed.status, OrderStatus::Failed);
		assert!(failed.error.as_deref().unwrap().contains("Network error"));

		// No second attempt: the order submitted exactly once.
		let submitted_count = updates
			.iter()
			.filter(|u| u.status == OrderStatus::Submitted)
			.count();
		assert_eq!(submitted_count, 1);
	}

	#[tokio::test]
	async fn test_non_positive_amount_rejected() {
		let sink = Arc::new(SinkRegistry::new());
		let engine = ExecutorBuilder::new(test_config(3, 2))
			.with_router(Box::new(ScriptedRouter::succeeding()))
			.with_sink(sink.clone())
			.build()
			.unwrap();

		let mut bad = request();
		bad.amount = 0.0;

		let result = engine.add_order("order-1", bad).await;
		assert!(matches!(result, Err(EngineError::InvalidOrder(_))));
		assert_eq!(engine.queue_depth().await, 0);
	}
}
