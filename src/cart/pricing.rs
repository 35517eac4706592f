//! Storefront pricing rules.
//!
//! Amounts are whole rupees held in `i64`. Percentages are applied with
//! integer arithmetic and rounded half-up, so recomputing a cart always
//! yields exactly the same numbers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::models::CartTotals;

/// Shipping and tax parameters a cart is priced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PricingRules {
    /// Post-discount subtotal at or above which shipping is waived.
    pub free_shipping_threshold: i64,
    /// Shipping charged per unit before the floor/ceiling clamp.
    pub shipping_per_item: i64,
    pub shipping_floor: i64,
    pub shipping_ceiling: i64,
    /// GST applied to the post-discount subtotal.
    pub tax_rate_percent: i64,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 500,
            shipping_per_item: 25,
            shipping_floor: 50,
            shipping_ceiling: 150,
            tax_rate_percent: 18,
        }
    }
}

impl PricingRules {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shipping_floor > self.shipping_ceiling {
            anyhow::bail!(
                "shipping floor ({}) exceeds shipping ceiling ({})",
                self.shipping_floor,
                self.shipping_ceiling
            );
        }
        Ok(())
    }

    /// Shipping for a non-empty cart whose taxable amount is `taxable`.
    pub fn shipping_for(&self, taxable: i64, total_items: u32, free_shipping: bool) -> i64 {
        if total_items == 0 || free_shipping || taxable >= self.free_shipping_threshold {
            return 0;
        }
        i64::from(total_items)
            .saturating_mul(self.shipping_per_item)
            .max(self.shipping_floor)
            .min(self.shipping_ceiling)
    }

    pub fn tax_for(&self, taxable: i64) -> i64 {
        percent_of(taxable, self.tax_rate_percent)
    }

    /// Derive every total from the raw pricing inputs.
    ///
    /// `subtotal` and `total_items` are sums over the cart lines; `coupon_discount`
    /// is whatever the coupon validator granted, clamped here to the subtotal.
    pub fn totals(
        &self,
        subtotal: i64,
        total_items: u32,
        coupon_discount: i64,
        free_shipping: bool,
    ) -> CartTotals {
        let discount = coupon_discount.clamp(0, subtotal.max(0));
        let taxable = subtotal - discount;
        let shipping = self.shipping_for(taxable, total_items, free_shipping);
        let tax = self.tax_for(taxable);

        CartTotals {
            subtotal,
            discount,
            shipping,
            tax,
            total: taxable.saturating_add(tax).saturating_add(shipping),
            total_items,
            is_empty: total_items == 0,
        }
    }
}

/// `amount * percent / 100`, rounded half-up. Saturates instead of
/// overflowing.
pub fn percent_of(amount: i64, percent: i64) -> i64 {
    amount
        .saturating_mul(percent)
        .saturating_add(50)
        .div_euclid(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent_of(249, 18), 45);
        assert_eq!(percent_of(540, 18), 97);
        assert_eq!(percent_of(250, 1), 3);
        assert_eq!(percent_of(0, 18), 0);
    }

    #[test]
    fn shipping_is_clamped_by_item_count() {
        let rules = PricingRules::default();
        assert_eq!(rules.shipping_for(100, 1, false), 50);
        assert_eq!(rules.shipping_for(100, 2, false), 50);
        assert_eq!(rules.shipping_for(100, 3, false), 75);
        assert_eq!(rules.shipping_for(100, 40, false), 150);
    }

    #[test]
    fn shipping_waived_at_threshold_or_by_coupon() {
        let rules = PricingRules::default();
        assert_eq!(rules.shipping_for(500, 1, false), 0);
        assert_eq!(rules.shipping_for(499, 1, false), 50);
        assert_eq!(rules.shipping_for(10, 1, true), 0);
        assert_eq!(rules.shipping_for(0, 0, false), 0);
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let totals = PricingRules::default().totals(200, 1, 1_000, false);
        assert_eq!(totals.discount, 200);
        assert_eq!(totals.tax, 0);
        assert_eq!(totals.total, 50);
    }

    #[test]
    fn inverted_shipping_bounds_are_rejected() {
        let rules = PricingRules {
            shipping_floor: 200,
            shipping_ceiling: 100,
            ..PricingRules::default()
        };
        assert!(rules.validate().is_err());
    }
}
