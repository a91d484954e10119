use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::RawGatewayStatus;

type HmacSha256 = Hmac<Sha256>;

/// Customer details forwarded to the gateway at order creation.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCustomer {
    pub customer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateRemoteOrderRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer: GatewayCustomer,
    pub return_url: String,
}

/// Opaque handles returned by the gateway for a freshly created order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrderRefs {
    pub gateway_order_ref: String,
    pub gateway_session_ref: String,
}

/// Stateless wrapper around the external payment gateway. Every call is a
/// single network round trip; the caller decides whether to retry.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_remote_order(
        &self,
        request: CreateRemoteOrderRequest,
    ) -> Result<RemoteOrderRefs, ServiceError>;

    async fn fetch_remote_order_status(
        &self,
        gateway_order_ref: &str,
    ) -> Result<RawGatewayStatus, ServiceError>;
}

/// Verifies an inbound webhook signature.
///
/// Recomputes HMAC-SHA256 over the raw payload bytes and constant-time
/// compares against the hex-encoded header. Returns `false` on any mismatch
/// or missing input rather than erroring, so callers must treat `false` as
/// "reject, do not process".
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: Option<&str>,
    secret: Option<&str>,
) -> bool {
    let (Some(signature), Some(secret)) = (signature_header, secret) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature.trim())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[derive(Debug, Serialize)]
struct RemoteOrderPayload<'a> {
    order_id: &'a str,
    order_amount: Decimal,
    order_currency: &'a str,
    customer_details: &'a GatewayCustomer,
    return_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteOrderResponse {
    order_ref: String,
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteOrderStatusResponse {
    order_status: String,
}

/// HTTP gateway client speaking the provider's order API.
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    fn auth_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-client-id", &self.key_id)
            .header("x-client-secret", &self.key_secret)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_remote_order(
        &self,
        request: CreateRemoteOrderRequest,
    ) -> Result<RemoteOrderRefs, ServiceError> {
        let url = format!("{}/orders", self.base_url);
        let payload = RemoteOrderPayload {
            order_id: &request.order_id,
            order_amount: request.amount,
            order_currency: &request.currency,
            customer_details: &request.customer,
            return_url: &request.return_url,
        };

        let response = self
            .auth_headers(self.http.post(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("order creation failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayError(format!(
                "order creation rejected ({}): {}",
                status, body
            )));
        }

        let body: RemoteOrderResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed order response: {}", e)))?;

        debug!(gateway_order_ref = %body.order_ref, "remote order created");

        Ok(RemoteOrderRefs {
            gateway_order_ref: body.order_ref,
            gateway_session_ref: body.payment_session_id,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_remote_order_status(
        &self,
        gateway_order_ref: &str,
    ) -> Result<RawGatewayStatus, ServiceError> {
        let url = format!("{}/orders/{}", self.base_url, gateway_order_ref);

        let response = self
            .auth_headers(self.http.get(&url))
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("status fetch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayError(format!(
                "status fetch rejected ({}): {}",
                status, body
            )));
        }

        let body: RemoteOrderStatusResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed status response: {}", e)))?;

        Ok(RawGatewayStatus::parse(&body.order_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"order_id":"coins_abc","order_status":"PAID"}"#;
        let sig = sign(payload, "whsec-test");
        assert!(verify_webhook_signature(
            payload,
            Some(&sig),
            Some("whsec-test")
        ));
    }

    #[test]
    fn rejects_tampered_body_with_original_signature() {
        let payload = br#"{"order_id":"coins_abc","order_status":"PAID"}"#;
        let sig = sign(payload, "whsec-test");
        let tampered = br#"{"order_id":"coins_zzz","order_status":"PAID"}"#;
        assert!(!verify_webhook_signature(
            tampered,
            Some(&sig),
            Some("whsec-test")
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"body";
        let sig = sign(payload, "secret-a");
        assert!(!verify_webhook_signature(payload, Some(&sig), Some("secret-b")));
    }

    #[test]
    fn rejects_missing_header_or_secret() {
        let payload = b"body";
        let sig = sign(payload, "whsec-test");
        assert!(!verify_webhook_signature(payload, None, Some("whsec-test")));
        assert!(!verify_webhook_signature(payload, Some(&sig), None));
    }

    #[test]
    fn constant_time_eq_checks_length_first() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abcd", "abcd"));
        assert!(!constant_time_eq("abcd", "abce"));
    }
}
