pub mod health;
pub mod payment_webhooks;
pub mod payments;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// All API routes. The webhook route carries no bearer token; the HMAC
/// signature check gates it instead.
pub fn api_routes() -> Router<AppState> {
    let payments = Router::new()
        .route("/payments/orders", post(payments::open_order))
        .route("/payments/orders/:order_id", get(payments::get_order))
        .route(
            "/payments/orders/:order_id/verify",
            post(payments::verify_order),
        )
        .route(
            "/payments/webhook",
            post(payment_webhooks::handle_payment_webhook),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", payments)
}
