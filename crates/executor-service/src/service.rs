//! Composition of the engine from configuration.
//!
//! The router backend is chosen here, once, from the `router.kind`
//! setting; nothing downstream ever inspects which implementation it got.

use anyhow::{Context, Result};
use executor_config::{Config, RouterKind};
use executor_core::{ExecutorBuilder, ExecutorEngine};
use executor_router::implementations::live::LiveRouter;
use executor_router::implementations::simulated::SimulatedRouter;
use executor_router::RouterInterface;
use tracing::info;

/// Creates the router backend selected by the configuration.
pub fn create_router(config: &Config) -> Result<Box<dyn RouterInterface>> {
	match config.router.kind {
		RouterKind::Simulated => {
			info!("composing simulated router");
			Ok(Box::new(SimulatedRouter::new(
				config.router.simulated.base_prices.clone(),
				config.router.simulated.failure_rate,
			)))
		}
		RouterKind::Live => {
			let live = config
				.router
				.live
				.as_ref()
				.context("router.live section is required for the live router")?;

			info!(endpoint = %live.endpoint, "composing live router");
			let router = LiveRouter::new(&live.endpoint, &live.api_key, live.min_reserve)
				.context("failed to construct live router")?;
			Ok(Box::new(router))
		}
	}
}

/// Builds the engine with the configured router backend.
pub fn build_engine(config: Config) -> Result<ExecutorEngine> {
	let router = create_router(&config)?;

	ExecutorBuilder::new(config)
		.with_router(router)
		.build()
		.context("failed to build executor engine")
}
