//! The cart aggregate and its pricing recomputation.
//!
//! Every mutator finishes by calling [`Cart::calculate_totals`], which rebuilds
//! the totals from the lines and the applied coupon. Totals are a cache and are
//! never adjusted incrementally.

use chrono::Utc;
use uuid::Uuid;

use super::{
    models::{AppliedCoupon, CartItem, CartSnapshot, CartTotals, PersistedCart, ProductRef, VariantRef},
    pricing::PricingRules,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
    coupon: Option<AppliedCoupon>,
    totals: CartTotals,
    rules: PricingRules,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(PricingRules::default())
    }
}

impl Cart {
    pub fn new(rules: PricingRules) -> Self {
        Self {
            items: Vec::new(),
            coupon: None,
            totals: CartTotals::empty(),
            rules,
        }
    }

    /// Rebuild a cart from storage. Lines with a zero quantity are dropped and
    /// the stored totals are discarded in favour of a fresh computation.
    pub fn from_persisted(persisted: PersistedCart, rules: PricingRules) -> Self {
        let mut cart = Self {
            items: persisted
                .items
                .into_iter()
                .filter(|item| item.quantity > 0)
                .collect(),
            coupon: persisted.coupon,
            totals: persisted.totals,
            rules,
        };
        cart.calculate_totals();
        cart
    }

    pub fn to_persisted(&self) -> PersistedCart {
        PersistedCart {
            items: self.items.clone(),
            coupon: self.coupon.clone(),
            totals: self.totals,
        }
    }

    pub fn snapshot(&self, revision: u64) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            coupon_code: self.coupon.as_ref().map(|coupon| coupon.code.clone()),
            coupon: self.coupon.clone(),
            totals: self.totals,
            revision,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn coupon(&self) -> Option<&AppliedCoupon> {
        self.coupon.as_ref()
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon.as_ref().map(|coupon| coupon.code.as_str())
    }

    pub fn totals(&self) -> &CartTotals {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` units of a product (and optional variant).
    ///
    /// A line with the same product and variant absorbs the quantity; anything
    /// else becomes a new line. Returns the id of the line that was touched, or
    /// `None` when `quantity` is zero.
    pub fn add_item(
        &mut self,
        product: ProductRef,
        quantity: u32,
        variant: Option<VariantRef>,
    ) -> Option<Uuid> {
        if quantity == 0 {
            return None;
        }

        let variant_id = variant.as_ref().map(|v| v.id);
        let id = match self
            .items
            .iter_mut()
            .find(|item| item.matches(product.id, variant_id))
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(quantity);
                existing.id
            }
            None => {
                let item = CartItem {
                    id: Uuid::new_v4(),
                    product,
                    variant,
                    quantity,
                    added_at: Utc::now(),
                };
                let id = item.id;
                self.items.push(item);
                id
            }
        };

        self.calculate_totals();
        Some(id)
    }

    /// Remove a line. Unknown ids leave the cart untouched.
    pub fn remove_item(&mut self, item_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        self.calculate_totals();
        self.items.len() != before
    }

    /// Set a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, item_id: Uuid, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_item(item_id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let updated = match self.items.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        };
        self.calculate_totals();
        updated
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
        self.totals = CartTotals::empty();
    }

    pub fn apply_coupon(&mut self, coupon: AppliedCoupon) {
        self.coupon = Some(coupon);
        self.calculate_totals();
    }

    pub fn remove_coupon(&mut self) -> Option<AppliedCoupon> {
        let removed = self.coupon.take();
        self.calculate_totals();
        removed
    }

    pub fn calculate_totals(&mut self) -> &CartTotals {
        self.totals = price(&self.items, self.coupon.as_ref(), &self.rules);
        &self.totals
    }
}

/// Totals for a set of lines and an optional coupon under `rules`.
pub fn price(
    items: &[CartItem],
    coupon: Option<&AppliedCoupon>,
    rules: &PricingRules,
) -> CartTotals {
    let subtotal = items
        .iter()
        .fold(0i64, |acc, item| acc.saturating_add(item.line_total()));
    let total_items = items
        .iter()
        .fold(0u32, |acc, item| acc.saturating_add(item.quantity));
    let (discount, free_shipping) =
        coupon.map_or((0, false), |coupon| (coupon.discount, coupon.free_shipping));

    rules.totals(subtotal, total_items, discount, free_shipping)
}
