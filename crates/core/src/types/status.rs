//! Status enums reported by the backend.
//!
//! Unknown values deserialize to `Unknown` so a new backend status never
//! breaks order history rendering.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Portuguese label shown in order history.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Aguardando pagamento",
            Self::Paid => "Pago",
            Self::Processing => "Em preparação",
            Self::Shipped => "Enviado",
            Self::Delivered => "Entregue",
            Self::Canceled => "Cancelado",
            Self::Refunded => "Reembolsado",
            Self::Unknown => "Desconhecido",
        }
    }

    /// Whether the order can no longer change.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled | Self::Refunded)
    }
}

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Paused,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serde() {
        let status: OrderStatus = serde_json::from_str("\"SHIPPED\"").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"PAID\"");
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: OrderStatus = serde_json::from_str("\"AWAITING_PICKUP\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        let status: SubscriptionStatus = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(status, SubscriptionStatus::Unknown);
    }

    #[test]
    fn test_final_statuses() {
        assert!(OrderStatus::Delivered.is_final());
        assert!(!OrderStatus::Shipped.is_final());
    }
}
