use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    models::{ItemType, OrderStatus, PaymentOrder},
    services::lifecycle::OpenOrderInput,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OpenOrderRequest {
    pub item_type: ItemType,
    #[validate(length(min = 1, message = "item_id must not be empty"))]
    pub item_id: String,
    #[serde(default)]
    pub partner_id: Option<String>,
    #[validate(email)]
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

/// Everything the client needs to hand off to the gateway checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct OpenOrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub currency: String,
    pub payment_session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub item_type: ItemType,
    pub item_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub fulfilled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&PaymentOrder> for OrderResponse {
    fn from(order: &PaymentOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            item_type: order.item_type,
            item_id: order.item_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            fulfilled: order.fulfillment.is_complete(order.item_type),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionSummary {
    pub plan_id: String,
    pub plan_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyOrderResponse {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub fulfilled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins_awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionSummary>,
    /// True while the outcome is not final; the client should poll again.
    pub retry: bool,
}

impl VerifyOrderResponse {
    fn settled(order: &PaymentOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: Some(order.status),
            amount: Some(order.amount),
            currency: Some(order.currency.clone()),
            fulfilled: order.fulfillment.is_complete(order.item_type),
            retry: !order.status.is_terminal(),
            coins_awarded: order.fulfillment.coins.as_ref().map(|c| c.coins_issued),
            new_balance: order.fulfillment.coins.as_ref().map(|c| c.new_balance),
            subscription: order.fulfillment.subscription.as_ref().map(|s| {
                SubscriptionSummary {
                    plan_id: s.plan_id.clone(),
                    plan_name: s.plan_name.clone(),
                    expires_at: s.expires_at,
                }
            }),
        }
    }

    fn pending_retry(order_id: String) -> Self {
        Self {
            order_id,
            status: None,
            amount: None,
            currency: None,
            fulfilled: false,
            coins_awarded: None,
            new_balance: None,
            subscription: None,
            retry: true,
        }
    }
}

/// Opens a payment order for the authenticated user.
#[utoipa::path(
    post,
    path = "/api/v1/payments/orders",
    request_body = OpenOrderRequest,
    responses(
        (status = 201, description = "Order opened", body = OpenOrderResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Item not found"),
        (status = 502, description = "Gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
#[instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn open_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<OpenOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let order = state
        .lifecycle
        .open(OpenOrderInput {
            user_id: user.user_id,
            item_type: payload.item_type,
            item_id: payload.item_id,
            partner_id: payload.partner_id,
            customer_email: payload.customer_email.or(user.email),
            customer_phone: payload.customer_phone.or(user.phone),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OpenOrderResponse {
            order_id: order.order_id,
            status: order.status,
            amount: order.amount,
            currency: order.currency,
            payment_session_id: order.gateway_session_ref,
        }),
    ))
}

/// Returns the order as stored, without touching the gateway.
#[utoipa::path(
    get,
    path = "/api/v1/payments/orders/{order_id}",
    params(("order_id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order = state.lifecycle.get_for_user(user.user_id, &order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// Confirms the payment outcome with the gateway and applies fulfillment.
///
/// A transient gateway failure is reported as 202 with `retry: true`
/// rather than an error; the order stays untouched and the client polls
/// again.
#[utoipa::path(
    post,
    path = "/api/v1/payments/orders/{order_id}/verify",
    params(("order_id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Outcome confirmed", body = VerifyOrderResponse),
        (status = 202, description = "Outcome not available yet, retry", body = VerifyOrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
#[instrument(skip(state), fields(user_id = %user.user_id, order_id = %order_id))]
pub async fn verify_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    match state.lifecycle.verify_for_user(user.user_id, &order_id).await {
        Ok(order) => {
            info!(status = %order.status, "payment verification completed");
            Ok((StatusCode::OK, Json(VerifyOrderResponse::settled(&order))))
        }
        Err(e) if e.is_retryable() => {
            warn!("payment verification deferred: {}", e);
            Ok((
                StatusCode::ACCEPTED,
                Json(VerifyOrderResponse::pending_retry(order_id)),
            ))
        }
        Err(e) => Err(e),
    }
}
