use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    errors::ServiceError,
    services::{gateway::verify_webhook_signature, lifecycle::ReconcileSource},
    AppState,
};

const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Inbound gateway notification. Only the order id is trusted; the
/// reported status is logged and then re-confirmed with the gateway.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    event_type: Option<String>,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    order: WebhookOrder,
}

#[derive(Debug, Deserialize)]
struct WebhookOrder {
    order_id: String,
    #[serde(default)]
    order_status: Option<String>,
}

/// Receives payment webhooks from the gateway.
///
/// The signature is verified over the raw request bytes before the body
/// is parsed; anything unsigned or mis-signed is rejected with 401
/// untouched. Unknown order ids are acknowledged with 200 so the gateway
/// stops redelivering notifications that can never apply. A gateway
/// error during reconfirmation surfaces as 502, which does trigger a
/// redelivery.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook processed or acknowledged"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 400, description = "Malformed payload"),
        (status = 502, description = "Gateway unavailable during reconfirmation")
    ),
    tag = "webhooks"
)]
#[instrument(skip(state, headers, body))]
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if !verify_webhook_signature(
        &body,
        signature,
        state.config.payment_webhook_secret.as_deref(),
    ) {
        warn!("rejected webhook with missing or invalid signature");
        return Err(ServiceError::SignatureInvalid);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("malformed webhook payload: {}", e)))?;

    let order_id = payload.data.order.order_id;
    info!(
        order_id = %order_id,
        event_type = payload.event_type.as_deref().unwrap_or("unknown"),
        reported_status = payload.data.order.order_status.as_deref().unwrap_or("unknown"),
        "payment webhook received"
    );

    match state
        .lifecycle
        .reconcile(&order_id, ReconcileSource::Webhook)
        .await
    {
        Ok(order) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "ok", "order_status": order.status })),
        )),
        Err(ServiceError::OrderNotFound(_)) => {
            warn!(order_id = %order_id, "webhook for unknown order acknowledged");
            Ok((StatusCode::OK, Json(json!({ "status": "ignored" }))))
        }
        Err(e) => Err(e),
    }
}
