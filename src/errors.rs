use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional detail, when safe to expose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order belongs to another user")]
    OrderForbidden,

    #[error("Order id conflict: {0}")]
    OrderConflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Fulfillment error: {0}")]
    FulfillmentError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ItemNotFound(_) | Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidPrice(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::SignatureInvalid | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::OrderForbidden => StatusCode::FORBIDDEN,
            Self::OrderConflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::FulfillmentError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// text so implementation details never leak.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::FulfillmentError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Transient failures the caller may safely retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayError(_))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::ItemNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::OrderNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidPrice("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::GatewayError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::SignatureInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::OrderForbidden.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::OrderConflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn only_gateway_errors_are_retryable() {
        assert!(ServiceError::GatewayError("timeout".into()).is_retryable());
        assert!(!ServiceError::SignatureInvalid.is_retryable());
        assert!(!ServiceError::OrderNotFound("x".into()).is_retryable());
    }

    #[test]
    fn internal_messages_are_hidden() {
        assert_eq!(
            ServiceError::InternalError("secret detail".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::FulfillmentError("wallet rpc".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::OrderNotFound("ord_1".into()).response_message(),
            "Order not found: ord_1"
        );
    }

    #[tokio::test]
    async fn error_response_body_shape() {
        let response = ServiceError::OrderForbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Forbidden");
        assert_eq!(payload.message, "Order belongs to another user");
    }
}
