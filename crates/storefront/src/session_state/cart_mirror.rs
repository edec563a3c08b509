//! Best-effort copy of the server cart kept in the session.
//!
//! The mirror feeds the header badge so that rendering a page does not cost a
//! cart request. It is refreshed after every cart mutation the storefront
//! performs; changes made elsewhere (another device, the backend expiring a
//! line) only show up the next time the cart page is opened.

use modernstore_core::ProductId;
use serde::{Deserialize, Serialize};

use crate::backend::CartItem;

/// Session copy of the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartMirror {
    items: Vec<CartItem>,
}

impl CartMirror {
    #[must_use]
    pub fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Replace the whole mirror with a freshly fetched server cart.
    pub fn replace(&mut self, items: Vec<CartItem>) {
        self.items = items;
    }

    /// Record a quantity change the backend accepted.
    ///
    /// A quantity of zero removes the line.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| &i.product_id == product_id) {
            item.quantity = quantity;
        }
    }

    /// Record a removal the backend accepted.
    pub fn remove(&mut self, product_id: &ProductId) {
        self.items.retain(|item| &item.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number shown on the header badge: distinct lines, not units.
    #[must_use]
    pub fn badge_count(&self) -> usize {
        self.items.len()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
