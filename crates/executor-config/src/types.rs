//! Configuration types for the execution engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Complete engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Engine identity and HTTP settings.
	pub engine: EngineSettings,
	/// Admission control settings.
	#[serde(default)]
	pub admission: AdmissionConfig,
	/// Retry policy settings.
	#[serde(default)]
	pub retry: RetryConfig,
	/// Router backend selection and settings.
	pub router: RouterConfig,
}

/// Engine identity and HTTP settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
	/// Engine name, used for logging.
	pub name: String,
	/// Port the HTTP/WebSocket API listens on.
	#[serde(default = "default_http_port")]
	pub http_port: u16,
	/// Log level used when RUST_LOG is not set.
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Fixed delay modelling transaction construction cost, in ms.
	#[serde(default = "default_build_delay_ms")]
	pub build_delay_ms: u64,
}

/// Admission control settings: the two independent dispatch gates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
	/// Maximum number of orders executing concurrently.
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: usize,
	/// Maximum number of job starts per rate window.
	#[serde(default = "default_rate_limit")]
	pub rate_limit: u32,
	/// Rate window duration in milliseconds.
	#[serde(default = "default_rate_window_ms")]
	pub rate_window_ms: u64,
}

impl Default for AdmissionConfig {
	fn default() -> Self {
		Self {
			max_concurrency: default_max_concurrency(),
			rate_limit: default_rate_limit(),
			rate_window_ms: default_rate_window_ms(),
		}
	}
}

impl AdmissionConfig {
	pub fn rate_window(&self) -> Duration {
		Duration::from_millis(self.rate_window_ms)
	}
}

/// Retry policy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
	/// Total attempts per order, including the first.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Base backoff delay in milliseconds; attempt n waits
	/// `base_delay_ms * 2^(n-1)` before re-entering the queue.
	#[serde(default = "default_base_delay_ms")]
	pub base_delay_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			base_delay_ms: default_base_delay_ms(),
		}
	}
}

impl RetryConfig {
	pub fn base_delay(&self) -> Duration {
		Duration::from_millis(self.base_delay_ms)
	}
}

/// Router backend selection. The implementation is chosen here at
/// composition time; nothing downstream inspects the concrete type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
	/// Which router implementation to compose.
	pub kind: RouterKind,
	/// Upper bound on any single router call, in seconds.
	#[serde(default = "default_call_timeout_secs")]
	pub call_timeout_secs: u64,
	/// Settings for the simulated router.
	#[serde(default)]
	pub simulated: SimulatedRouterConfig,
	/// Settings for the live router; required when `kind = "live"`.
	pub live: Option<LiveRouterConfig>,
}

impl RouterConfig {
	pub fn call_timeout(&self) -> Duration {
		Duration::from_secs(self.call_timeout_secs)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
	Simulated,
	Live,
}

/// Settings for the latency/variance simulation router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatedRouterConfig {
	/// Base price per input token symbol; unknown symbols fall back to
	/// the simulator's default.
	#[serde(default = "default_base_prices")]
	pub base_prices: HashMap<String, f64>,
	/// Probability in [0, 1) that any router call fails, for exercising
	/// the retry path.
	#[serde(default)]
	pub failure_rate: f64,
}

impl Default for SimulatedRouterConfig {
	fn default() -> Self {
		Self {
			base_prices: default_base_prices(),
			failure_rate: 0.0,
		}
	}
}

/// Settings for the live venue-aggregator router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveRouterConfig {
	/// Base URL of the aggregator REST API.
	pub endpoint: String,
	/// API key for the shared execution identity.
	pub api_key: String,
	/// Minimum reserve balance required before quoting, in units of the
	/// reserve token.
	#[serde(default = "default_min_reserve")]
	pub min_reserve: f64,
}

fn default_http_port() -> u16 {
	3000
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_build_delay_ms() -> u64 {
	500
}

fn default_max_concurrency() -> usize {
	10
}

fn default_rate_limit() -> u32 {
	100
}

fn default_rate_window_ms() -> u64 {
	60_000
}

fn default_max_attempts() -> u32 {
	3
}

fn default_base_delay_ms() -> u64 {
	1_000
}

fn default_call_timeout_secs() -> u64 {
	30
}

fn default_base_prices() -> HashMap<String, f64> {
	HashMap::from([("SOL".to_string(), 150.0)])
}

fn default_min_reserve() -> f64 {
	0.002
}
