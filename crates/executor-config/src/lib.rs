// executor-config/src/lib.rs

use std::env;
use std::path::Path;
use thiserror::Error;

mod types;

pub use types::{
	AdmissionConfig, Config, EngineSettings, LiveRouterConfig, RetryConfig, RouterConfig,
	RouterKind, SimulatedRouterConfig,
};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "EXECUTOR_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		// Load base configuration from file
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		// Apply environment variable overrides
		self.apply_env_overrides(&mut config)?;

		// Validate configuration
		validate_config(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<Config, ConfigError> {
		let content = tokio::fs::read_to_string(file_path).await?;

		// Substitute environment variables
		let substituted_content = self.substitute_env_vars(&content)?;

		// Parse TOML
		let config: Config = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		// Apply environment variable overrides for common settings
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.engine.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.engine.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(max_concurrency) = env::var(format!("{}MAX_CONCURRENCY", self.env_prefix)) {
			config.admission.max_concurrency = max_concurrency.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid max concurrency: {}", e))
			})?;
		}

		Ok(())
	}
}

/// Validates the invariants the engine relies on at composition time.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	if config.admission.max_concurrency == 0 {
		return Err(ConfigError::ValidationError(
			"admission.max_concurrency must be at least 1".to_string(),
		));
	}

	if config.admission.rate_limit == 0 || config.admission.rate_window_ms == 0 {
		return Err(ConfigError::ValidationError(
			"admission rate limit and window must be positive".to_string(),
		));
	}

	if config.retry.max_attempts == 0 {
		return Err(ConfigError::ValidationError(
			"retry.max_attempts must be at least 1".to_string(),
		));
	}

	if !(0.0..1.0).contains(&config.router.simulated.failure_rate) {
		return Err(ConfigError::ValidationError(
			"router.simulated.failure_rate must be in [0, 1)".to_string(),
		));
	}

	if config.router.kind == RouterKind::Live {
		match &config.router.live {
			Some(live) if !live.endpoint.is_empty() => {}
			_ => {
				return Err(ConfigError::ValidationError(
					"router.live.endpoint is required for the live router".to_string(),
				));
			}
		}
	}

	Ok(())
}
