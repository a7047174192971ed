//! Latency and price-variance simulation router.
//!
//! Models two venues with distinct variance bands and fee schedules,
//! quoted concurrently, plus settlement latency and slippage. An optional
//! failure rate injects routing/settlement errors for exercising the
//! retry path.

use crate::{RouterError, RouterInterface};
use async_trait::async_trait;
use executor_types::{Quote, Swap, Venue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Fallback base price for tokens missing from the price table.
const DEFAULT_BASE_PRICE: f64 = 100.0;

/// Simulated router implementation.
pub struct SimulatedRouter {
	/// Base price per input token symbol.
	base_prices: HashMap<String, f64>,
	/// Probability in [0, 1) that any call fails.
	failure_rate: f64,
}

impl SimulatedRouter {
	/// Creates a new SimulatedRouter with the given price table.
	pub fn new(base_prices: HashMap<String, f64>, failure_rate: f64) -> Self {
		Self {
			base_prices,
			failure_rate,
		}
	}

	fn base_price(&self, token: &str) -> f64 {
		self.base_prices
			.get(token)
			.copied()
			.unwrap_or(DEFAULT_BASE_PRICE)
	}

	fn inject_failure(&self) -> bool {
		self.failure_rate > 0.0 && rand::random::<f64>() < self.failure_rate
	}

	/// Venue quote latency, 200-300 ms.
	async fn quote_latency() {
		let jitter = (rand::random::<f64>() * 100.0) as u64;
		tokio::time::sleep(Duration::from_millis(200 + jitter)).await;
	}

	async fn raydium_quote(&self, token_in: &str) -> Quote {
		Self::quote_latency().await;

		// Raydium price variance: 0.98 - 1.02
		let variance = 0.98 + rand::random::<f64>() * 0.04;

		Quote {
			venue: Venue::Raydium,
			price: self.base_price(token_in) * variance,
			fee: 0.0025,
		}
	}

	async fn meteora_quote(&self, token_in: &str) -> Quote {
		Self::quote_latency().await;

		// Meteora price variance: 0.97 - 1.03
		let variance = 0.97 + rand::random::<f64>() * 0.06;

		Quote {
			venue: Venue::Meteora,
			price: self.base_price(token_in) * variance,
			fee: 0.001,
		}
	}
}

#[async_trait]
impl RouterInterface for SimulatedRouter {
	async fn find_best_route(
		&self,
		token_in: &str,
		token_out: &str,
		_amount: f64,
	) -> Result<Quote, RouterError> {
		if self.inject_failure() {
			return Err(RouterError::NoLiquidity {
				token_in: token_in.to_string(),
				token_out: token_out.to_string(),
			});
		}

		let (raydium, meteora) =
			tokio::join!(self.raydium_quote(token_in), self.meteora_quote(token_in));

		debug!(
			raydium = format!("{:.4}", raydium.price),
			meteora = format!("{:.4}", meteora.price),
			"venue quotes"
		);

		// Selling token_in, so the higher price wins.
		if raydium.price > meteora.price {
			Ok(raydium)
		} else {
			Ok(meteora)
		}
	}

	async fn execute_swap(&self, venue: Venue, _amount: f64) -> Result<Swap, RouterError> {
		// Transaction building and submission time, 1.5 - 2.5 s.
		let jitter = (rand::random::<f64>() * 1000.0) as u64;
		tokio::time::sleep(Duration::from_millis(1500 + jitter)).await;

		if self.inject_failure() {
			return Err(RouterError::SettlementRejected {
				venue,
				reason: "venue rejected the swap".to_string(),
			});
		}

		// Execution price drifts from the quote by at most 0.5% slippage.
		let slippage = 1.0 - rand::random::<f64>() * 0.005;

		Ok(Swap {
			tx_hash: format!("sol_tx_{:x}", rand::random::<u64>()),
			executed_price: self.base_price("SOL") * slippage,
		})
	}

	fn safe_to_resubmit(&self) -> bool {
		// Simulated settlement has no real-world effect to double-apply.
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn router() -> SimulatedRouter {
		SimulatedRouter::new(HashMap::from([("SOL".to_string(), 150.0)]), 0.0)
	}

	#[tokio::test(start_paused = true)]
	async fn test_best_route_within_variance_bands() {
		let router = router();
		let quote = router.find_best_route("SOL", "USDC", 1.0).await.unwrap();

		// Both venues quote within their variance bands around 150.
		assert!(quote.price >= 150.0 * 0.97);
		assert!(quote.price <= 150.0 * 1.03);
		match quote.venue {
			Venue::Raydium => assert_eq!(quote.fee, 0.0025),
			Venue::Meteora => assert_eq!(quote.fee, 0.001),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_unknown_token_uses_default_price() {
		let router = router();
		let quote = router.find_best_route("BONK", "USDC", 1.0).await.unwrap();
		assert!(quote.price >= DEFAULT_BASE_PRICE * 0.97);
		assert!(quote.price <= DEFAULT_BASE_PRICE * 1.03);
	}

	#[tokio::test(start_paused = true)]
	async fn test_swap_applies_bounded_slippage() {
		let router = router();
		let swap = router.execute_swap(Venue::Raydium, 1.0).await.unwrap();

		assert!(swap.tx_hash.starts_with("sol_tx_"));
		assert!(swap.executed_price <= 150.0);
		assert!(swap.executed_price >= 150.0 * 0.995);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failure_injection() {
		let router = SimulatedRouter::new(HashMap::new(), 0.999_999);

		let route_err = router
			.find_best_route("SOL", "USDC", 1.0)
			.await
			.expect_err("forced routing failure");
		assert!(matches!(route_err, RouterError::NoLiquidity { .. }));

		let swap_err = router
			.execute_swap(Venue::Meteora, 1.0)
			.await
			.expect_err("forced settlement failure");
		assert!(matches!(
			swap_err,
			RouterError::SettlementRejected {
				venue: Venue::Meteora,
				..
			}
		));
	}
}
