//! Shipping estimate and cart totals.
//!
//! The backend is the pricing authority. These figures are only what the
//! storefront shows before an order exists; the merchant sets the real
//! shipping fee on the order afterwards.

use serde::{Deserialize, Serialize};

use crate::types::Price;

/// Anything that contributes `unit_price * quantity` to a cart subtotal.
pub trait CartLine {
    fn unit_price(&self) -> Price;
    fn quantity(&self) -> u32;

    fn line_total(&self) -> Price {
        self.unit_price().line_total(self.quantity())
    }
}

impl<T: CartLine + ?Sized> CartLine for &T {
    fn unit_price(&self) -> Price {
        (**self).unit_price()
    }

    fn quantity(&self) -> u32 {
        (**self).quantity()
    }
}

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Orders strictly above this subtotal ship free.
    pub free_threshold: Price,
    pub flat_fee: Price,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: Price::from_dollars(100),
            flat_fee: Price::from_dollars(20),
        }
    }
}

impl ShippingPolicy {
    /// Estimated shipping for a cart with the given subtotal.
    ///
    /// An empty cart (zero subtotal) costs nothing to ship.
    #[must_use]
    pub fn estimate(&self, subtotal: Price) -> Price {
        if subtotal.is_zero() || subtotal > self.free_threshold {
            Price::ZERO
        } else {
            self.flat_fee
        }
    }
}

/// Order summary figures for the cart and checkout sidebars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Price,
    /// `None` while the merchant has not set the fee yet.
    pub shipping: Option<Price>,
    pub tax: Price,
    pub total: Price,
}

impl CartTotals {
    /// Totals with an estimated shipping fee, as on the cart page.
    pub fn estimate<L, I>(lines: I, policy: &ShippingPolicy) -> Self
    where
        L: CartLine,
        I: IntoIterator<Item = L>,
    {
        let subtotal = subtotal(lines);
        let shipping = policy.estimate(subtotal);
        Self {
            subtotal,
            shipping: Some(shipping),
            tax: Price::ZERO,
            total: subtotal + shipping,
        }
    }

    /// Totals with the shipping fee left open, as at checkout.
    pub fn pending_shipping<L, I>(lines: I) -> Self
    where
        L: CartLine,
        I: IntoIterator<Item = L>,
    {
        let subtotal = subtotal(lines);
        Self {
            subtotal,
            shipping: None,
            tax: Price::ZERO,
            total: subtotal,
        }
    }

    /// Whether the estimated shipping came out free.
    #[must_use]
    pub fn ships_free(&self) -> bool {
        self.shipping.is_some_and(|fee| fee.is_zero())
    }
}

fn subtotal<L: CartLine>(lines: impl IntoIterator<Item = L>) -> Price {
    lines.into_iter().map(|line| line.line_total()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line(Price, u32);

    impl CartLine for Line {
        fn unit_price(&self) -> Price {
            self.0
        }

        fn quantity(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.estimate(Price::from_dollars(40)), Price::from_dollars(20));
        assert_eq!(policy.estimate(Price::from_dollars(100)), Price::from_dollars(20));
        assert_eq!(policy.estimate(Price::from_cents(10_001)), Price::ZERO);
        assert_eq!(policy.estimate(Price::ZERO), Price::ZERO);
    }

    #[test]
    fn test_estimate_totals() {
        let lines = [
            Line(Price::from_cents(1999), 2),
            Line(Price::from_dollars(10), 1),
        ];
        let totals = CartTotals::estimate(&lines, &ShippingPolicy::default());
        assert_eq!(totals.subtotal, Price::from_cents(4998));
        assert_eq!(totals.shipping, Some(Price::from_dollars(20)));
        assert_eq!(totals.tax, Price::ZERO);
        assert_eq!(totals.total, Price::from_cents(6998));
        assert!(!totals.ships_free());
    }

    #[test]
    fn test_estimate_free_over_threshold() {
        let lines = [Line(Price::from_dollars(60), 2)];
        let totals = CartTotals::estimate(&lines, &ShippingPolicy::default());
        assert!(totals.ships_free());
        assert_eq!(totals.total, Price::from_dollars(120));
    }

    #[test]
    fn test_empty_cart() {
        let lines: [Line; 0] = [];
        let totals = CartTotals::estimate(&lines, &ShippingPolicy::default());
        assert_eq!(totals.total, Price::ZERO);
    }

    #[test]
    fn test_pending_shipping() {
        let lines = [Line(Price::from_dollars(30), 1)];
        let totals = CartTotals::pending_shipping(&lines);
        assert_eq!(totals.shipping, None);
        assert_eq!(totals.total, Price::from_dollars(30));
    }
}
