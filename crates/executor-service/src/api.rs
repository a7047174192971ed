//! HTTP and WebSocket API for the execution engine.
//!
//! `POST /api/orders/execute` accepts an order and answers immediately
//! with the generated order id; `GET /api/orders/{orderId}/status`
//! upgrades to a WebSocket and streams the order's lifecycle updates.
//! Channel registration and deregistration live entirely here; the engine
//! only ever calls `deliver` on the shared sink registry.

use axum::{
	extract::{
		ws::{Message, WebSocket},
		Path, State, WebSocketUpgrade,
	},
	http::StatusCode,
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use executor_core::{EngineError, ExecutorEngine};
use executor_sink::SinkRegistry;
use executor_types::{OrderRequest, OrderStatus, StatusUpdate};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use uuid::Uuid;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<ExecutorEngine>,
	pub sink: Arc<SinkRegistry>,
}

/// Builds the API router.
pub fn app(state: AppState) -> Router {
	Router::new()
		.route("/api/orders/execute", post(execute_order))
		.route("/api/orders/{order_id}/status", get(order_status))
		.route("/health", get(health_check))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Binds the listener and serves the API until the process exits.
pub async fn start_http_server(state: AppState, port: u16) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

	info!("API server listening on port {}", port);

	axum::serve(listener, app(state)).await?;

	Ok(())
}

/// Order submission payload. Unknown fields are ignored; `userId` falls
/// back to the anonymous submitter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteOrderRequest {
	token_in: String,
	#[serde(default)]
	token_out: String,
	amount: f64,
	#[serde(default = "default_user_id")]
	user_id: String,
}

fn default_user_id() -> String {
	"user_123".to_string()
}

async fn execute_order(
	State(state): State<AppState>,
	Json(body): Json<ExecuteOrderRequest>,
) -> impl IntoResponse {
	let order_id = Uuid::new_v4().to_string();

	let request = OrderRequest {
		token_in: body.token_in,
		token_out: body.token_out,
		amount: body.amount,
		user_id: body.user_id,
	};

	match state.engine.add_order(&order_id, request).await {
		Ok(()) => (
			StatusCode::ACCEPTED,
			Json(serde_json::json!({
				"message": "Order received",
				"orderId": order_id,
				"wsUrl": format!("/api/orders/{}/status", order_id),
			})),
		),
		Err(err) => {
			let status = match &err {
				EngineError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			};
			(
				status,
				Json(serde_json::json!({ "error": err.to_string() })),
			)
		}
	}
}

async fn order_status(
	ws: WebSocketUpgrade,
	Path(order_id): Path<String>,
	State(state): State<AppState>,
) -> impl IntoResponse {
	ws.on_upgrade(move |socket| handle_status_socket(socket, order_id, state))
}

/// Pumps status updates for one order onto its WebSocket.
///
/// The observer channel is registered on upgrade and unregistered when
/// the socket goes away, in either direction. A late-joining observer
/// sees only updates emitted after registration; nothing is replayed.
async fn handle_status_socket(socket: WebSocket, order_id: String, state: AppState) {
	info!(%order_id, "status observer connected");

	let (update_tx, mut update_rx) = mpsc::unbounded_channel();
	state.sink.register(&order_id, update_tx);

	let (mut ws_tx, mut ws_rx) = socket.split();

	// Initial message confirming the stream is live.
	let hello = StatusUpdate::new(&order_id, OrderStatus::Pending)
		.with_log("Connection established. Waiting for order execution...");

	if send_update(&mut ws_tx, &hello).await.is_err() {
		state.sink.unregister(&order_id);
		return;
	}

	loop {
		tokio::select! {
			update = update_rx.recv() => {
				match update {
					Some(update) => {
						if send_update(&mut ws_tx, &update).await.is_err() {
							break;
						}
					}
					None => break,
				}
			}

			incoming = next_client_message(&mut ws_rx) => {
				match incoming {
					ClientMessage::Closed => break,
					ClientMessage::Chatter => {}
				}
			}
		}
	}

	state.sink.unregister(&order_id);
	info!(%order_id, "status observer disconnected");
}

enum ClientMessage {
	Chatter,
	Closed,
}

async fn next_client_message(ws_rx: &mut SplitStream<WebSocket>) -> ClientMessage {
	match ws_rx.next().await {
		Some(Ok(Message::Close(_))) | Some(Err(_)) | None => ClientMessage::Closed,
		Some(Ok(other)) => {
			debug!(?other, "ignoring client message");
			ClientMessage::Chatter
		}
	}
}

async fn send_update(
	ws_tx: &mut SplitSink<WebSocket, Message>,
	update: &StatusUpdate,
) -> Result<(), axum::Error> {
	let payload = serde_json::to_string(update).map_err(axum::Error::new)?;
	ws_tx.send(Message::Text(payload.into())).await
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "healthy",
		"activeConnections": state.sink.active(),
		"queueDepth": state.engine.queue_depth().await,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use executor_config::{Config, RouterKind};
	use executor_core::ExecutorBuilder;
	use executor_router::implementations::simulated::SimulatedRouter;
	use tower::ServiceExt;

	fn test_state() -> AppState {
		let config: Config = toml::from_str(
			r#"
			[engine]
			name = "api-test"

			[router]
			kind = "simulated"
			"#,
		)
		.unwrap();
		assert_eq!(config.router.kind, RouterKind::Simulated);

		let sink = Arc::new(SinkRegistry::new());
		let engine = Arc::new(
			ExecutorBuilder::new(config.clone())
				.with_router(Box::new(SimulatedRouter::new(
					config.router.simulated.base_prices.clone(),
					0.0,
				)))
				.with_sink(sink.clone())
				.build()
				.unwrap(),
		);

		AppState { engine, sink }
	}

	async fn post_json(state: AppState, payload: &str) -> (StatusCode, serde_json::Value) {
		let response = app(state)
			.oneshot(
				Request::post("/api/orders/execute")
					.header("content-type", "application/json")
					.body(Body::from(payload.to_string()))
					.unwrap(),
			)
			.await
			.unwrap();

		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let value = serde_json::from_slice(&bytes).unwrap();
		(status, value)
	}

	#[tokio::test]
	async fn test_execute_returns_accepted_with_order_id() {
		let (status, body) =
			post_json(test_state(), r#"{"tokenIn":"SOL","tokenOut":"USDC","amount":10}"#).await;

		assert_eq!(status, StatusCode::ACCEPTED);
		assert_eq!(body["message"], "Order received");
		let order_id = body["orderId"].as_str().unwrap();
		assert!(!order_id.is_empty());
		assert_eq!(
			body["wsUrl"],
			format!("/api/orders/{}/status", order_id)
		);
	}

	#[tokio::test]
	async fn test_execute_ignores_unknown_fields() {
		let (status, _body) = post_json(
			test_state(),
			r#"{"tokenIn":"SOL","tokenOut":"USDC","amount":10,"extraField":"ignored"}"#,
		)
		.await;

		assert_eq!(status, StatusCode::ACCEPTED);
	}

	#[tokio::test]
	async fn test_execute_tolerates_missing_optional_fields() {
		let (status, _body) =
			post_json(test_state(), r#"{"tokenIn":"SOL","amount":10}"#).await;

		assert_eq!(status, StatusCode::ACCEPTED);
	}

	#[tokio::test]
	async fn test_execute_rejects_non_positive_amount() {
		let (status, body) = post_json(
			test_state(),
			r#"{"tokenIn":"SOL","tokenOut":"USDC","amount":-1}"#,
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body["error"].as_str().unwrap().contains("positive"));
	}

	#[tokio::test]
	async fn test_health_reports_counts() {
		let response = app(test_state())
			.oneshot(Request::get("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(body["status"], "healthy");
		assert_eq!(body["activeConnections"], 0);
	}
}
