//! Live router backed by a venue-aggregator REST API.
//!
//! Quotes and settlements pass through to the aggregator; the API key is
//! the single shared execution identity, and the aggregator owns its
//! sequencing state, so concurrent calls are safe to issue in parallel.
//! Unknown-outcome failures are never re-submitted (see
//! `safe_to_resubmit`).

use crate::{RouterError, RouterInterface};
use async_trait::async_trait;
use executor_types::{Quote, Swap, Venue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Live router implementation.
pub struct LiveRouter {
	client: reqwest::Client,
	/// Base URL of the aggregator API.
	endpoint: String,
	/// API key of the shared execution identity.
	api_key: String,
	/// Minimum reserve balance required before quoting.
	min_reserve: f64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
	balance: f64,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
	venue: Venue,
	price: f64,
	fee: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest {
	venue: Venue,
	amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
	tx_hash: String,
	executed_price: f64,
}

impl LiveRouter {
	/// Creates a new LiveRouter against the given aggregator endpoint.
	pub fn new(
		endpoint: impl Into<String>,
		api_key: impl Into<String>,
		min_reserve: f64,
	) -> Result<Self, RouterError> {
		let client = reqwest::Client::builder()
			.build()
			.map_err(|e| RouterError::Network(e.to_string()))?;

		Ok(Self {
			client,
			endpoint: endpoint.into(),
			api_key: api_key.into(),
			min_reserve,
		})
	}

	/// Fetches the reserve balance of the execution identity.
	async fn reserve_balance(&self) -> Result<f64, RouterError> {
		let response = self
			.client
			.get(format!("{}/v1/balance", self.endpoint))
			.bearer_auth(&self.api_key)
			.send()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(RouterError::Network(format!(
				"balance request failed with status {}",
				response.status()
			)));
		}

		let body: BalanceResponse = response
			.json()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		Ok(body.balance)
	}
}

#[async_trait]
impl RouterInterface for LiveRouter {
	async fn find_best_route(
		&self,
		token_in: &str,
		token_out: &str,
		amount: f64,
	) -> Result<Quote, RouterError> {
		// Confirm the shared identity can actually settle before quoting.
		let balance = self.reserve_balance().await?;
		debug!(balance, min_reserve = self.min_reserve, "reserve check");

		if balance < self.min_reserve {
			return Err(RouterError::InsufficientReserve {
				required: self.min_reserve,
				available: balance,
			});
		}

		let response = self
			.client
			.get(format!("{}/v1/quote", self.endpoint))
			.bearer_auth(&self.api_key)
			.query(&[("inputToken", token_in), ("outputToken", token_out)])
			.query(&[("amount", amount)])
			.send()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Err(RouterError::NoLiquidity {
				token_in: token_in.to_string(),
				token_out: token_out.to_string(),
			});
		}

		if !response.status().is_success() {
			return Err(RouterError::Network(format!(
				"quote request failed with status {}",
				response.status()
			)));
		}

		let body: QuoteResponse = response
			.json()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		Ok(Quote {
			venue: body.venue,
			price: body.price,
			fee: body.fee,
		})
	}

	async fn execute_swap(&self, venue: Venue, amount: f64) -> Result<Swap, RouterError> {
		info!(%venue, amount, "submitting swap to aggregator");

		let response = self
			.client
			.post(format!("{}/v1/swap", self.endpoint))
			.bearer_auth(&self.api_key)
			.json(&SwapRequest { venue, amount })
			.send()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		let status = response.status();

		if status.is_client_error() {
			let reason = response
				.text()
				.await
				.unwrap_or_else(|_| status.to_string());
			return Err(RouterError::SettlementRejected { venue, reason });
		}

		if !status.is_success() {
			return Err(RouterError::Network(format!(
				"swap request failed with status {}",
				status
			)));
		}

		let body: SwapResponse = response
			.json()
			.await
			.map_err(|e| RouterError::Network(e.to_string()))?;

		Ok(Swap {
			tx_hash: body.tx_hash,
			executed_price: body.executed_price,
		})
	}

	fn safe_to_resubmit(&self) -> bool {
		// A timed-out or dropped swap may still settle on the ledger;
		// re-submitting risks double settlement.
		false
	}
}
