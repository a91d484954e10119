use serde::{Deserialize, Serialize};

use super::order::OrderStatus;

/// Raw order status vocabulary as reported by the payment gateway.
///
/// Normalized exactly once at this boundary; raw gateway strings never
/// travel past it into business logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawGatewayStatus {
    Paid,
    Completed,
    Created,
    Active,
    Authorized,
    Failed,
    Cancelled,
    Rejected,
    Expired,
    /// Anything the gateway sends that we do not recognize. Kept verbatim
    /// for logging; normalizes to PENDING, never to a terminal state.
    Unrecognized(String),
}

impl RawGatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" => RawGatewayStatus::Paid,
            "COMPLETED" => RawGatewayStatus::Completed,
            "CREATED" => RawGatewayStatus::Created,
            "ACTIVE" => RawGatewayStatus::Active,
            "AUTHORIZED" => RawGatewayStatus::Authorized,
            "FAILED" => RawGatewayStatus::Failed,
            "CANCELLED" | "CANCELED" => RawGatewayStatus::Cancelled,
            "REJECTED" => RawGatewayStatus::Rejected,
            "EXPIRED" => RawGatewayStatus::Expired,
            other => RawGatewayStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn normalize(&self) -> OrderStatus {
        match self {
            RawGatewayStatus::Paid | RawGatewayStatus::Completed => OrderStatus::Paid,
            RawGatewayStatus::Created
            | RawGatewayStatus::Active
            | RawGatewayStatus::Authorized => OrderStatus::Pending,
            RawGatewayStatus::Failed
            | RawGatewayStatus::Cancelled
            | RawGatewayStatus::Rejected => OrderStatus::Failed,
            RawGatewayStatus::Expired => OrderStatus::Cancelled,
            RawGatewayStatus::Unrecognized(_) => OrderStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_table() {
        for (raw, want) in [
            ("PAID", OrderStatus::Paid),
            ("completed", OrderStatus::Paid),
            ("CREATED", OrderStatus::Pending),
            ("Active", OrderStatus::Pending),
            ("AUTHORIZED", OrderStatus::Pending),
            ("FAILED", OrderStatus::Failed),
            ("CANCELLED", OrderStatus::Failed),
            ("canceled", OrderStatus::Failed),
            ("REJECTED", OrderStatus::Failed),
            ("EXPIRED", OrderStatus::Cancelled),
        ] {
            assert_eq!(RawGatewayStatus::parse(raw).normalize(), want, "{}", raw);
        }
    }

    #[test]
    fn unknown_status_never_goes_terminal() {
        let raw = RawGatewayStatus::parse("SETTLEMENT_IN_PROGRESS");
        assert!(matches!(raw, RawGatewayStatus::Unrecognized(_)));
        assert_eq!(raw.normalize(), OrderStatus::Pending);
        assert!(!raw.normalize().is_terminal());
    }

    #[test]
    fn parse_keeps_unrecognized_text() {
        match RawGatewayStatus::parse(" settlement ") {
            RawGatewayStatus::Unrecognized(s) => assert_eq!(s, "SETTLEMENT"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
