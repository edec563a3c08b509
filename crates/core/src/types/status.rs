//! Status enums for various entities.
//!
//! Order state transitions are owned by the backend. These types only name the
//! states and decide how they are shown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle status of an order.
///
/// Serialized with the backend's `SCREAMING_SNAKE_CASE` wire names. A status
/// the storefront does not know about is kept verbatim in [`OrderStatus::Unknown`]
/// so that pages listing orders keep rendering after a backend upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    /// Placed, waiting for the merchant to confirm and set the shipping fee.
    #[default]
    Processing,
    /// Confirmed by the merchant, waiting for the customer's payment.
    WaitingForPayment,
    Paid,
    Shipped,
    Delivered,
    Canceled,
    /// Any status this build does not recognize.
    Unknown(String),
}

/// Error returned when a status string is not one of the known wire names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// Known statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Processing,
        Self::WaitingForPayment,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::Canceled,
    ];

    /// Wire name, e.g. `WAITING_FOR_PAYMENT`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "PROCESSING",
            Self::WaitingForPayment => "WAITING_FOR_PAYMENT",
            Self::Paid => "PAID",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Canceled => "CANCELED",
            Self::Unknown(raw) => raw,
        }
    }

    /// Map a wire name, falling back to [`OrderStatus::Unknown`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| Self::Unknown(raw.to_owned()))
    }

    /// Label shown to customers.
    #[must_use]
    pub fn customer_label(&self) -> &str {
        match self {
            Self::Processing => "Processing",
            Self::WaitingForPayment => "Waiting for Payment",
            Self::Paid => "Paid",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Canceled => "Canceled",
            Self::Unknown(raw) => raw,
        }
    }

    /// Label shown in the admin console.
    #[must_use]
    pub fn admin_label(&self) -> &str {
        match self {
            Self::Processing => "Awaiting merchant confirmation",
            Self::WaitingForPayment => "Awaiting payment",
            Self::Paid => "Paid",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Canceled => "Cancelled",
            Self::Unknown(raw) => raw,
        }
    }

    /// One-line progress description for the order page.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Processing => "Your order is being processed",
            Self::Paid => "Payment confirmed, preparing for shipment",
            Self::Shipped => "Your order has been shipped",
            Self::Delivered => "Your order has been delivered",
            _ => "Status updated",
        }
    }

    /// CSS class for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Processing => "badge-yellow",
            Self::WaitingForPayment => "badge-orange",
            Self::Paid => "badge-purple",
            Self::Shipped => "badge-blue",
            Self::Delivered => "badge-green",
            Self::Canceled => "badge-red",
            Self::Unknown(_) => "badge-gray",
        }
    }

    /// Whether the customer may still cancel the order themselves.
    #[must_use]
    pub const fn is_customer_cancelable(&self) -> bool {
        matches!(self, Self::Processing | Self::WaitingForPayment)
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PROCESSING" => Ok(Self::Processing),
            "WAITING_FOR_PAYMENT" => Ok(Self::WaitingForPayment),
            "PAID" => Ok(Self::Paid),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or_else(Self::default, Self::from_wire))
    }
}

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(str::trim) {
            Some(role) if role.eq_ignore_ascii_case("ADMIN") => Self::Admin,
            _ => Self::User,
        })
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("USER"),
            Self::Admin => f.write_str("ADMIN"),
        }
    }
}

/// Inventory level bucket used by the admin product table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockLevel {
    Active,
    Low,
    OutOfStock,
}

impl StockLevel {
    /// Highest stock count still reported as low.
    pub const LOW_THRESHOLD: u32 = 5;

    #[must_use]
    pub const fn from_stock(stock: u32) -> Self {
        match stock {
            0 => Self::OutOfStock,
            n if n <= Self::LOW_THRESHOLD => Self::Low,
            _ => Self::Active,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Low => "Low Stock",
            Self::OutOfStock => "Out of Stock",
        }
    }

    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Active => "badge-green",
            Self::Low => "badge-yellow",
            Self::OutOfStock => "badge-red",
        }
    }
}
