use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Catalog fields copied into a cart line when it is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductRef {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A priced configuration of a product, such as a pack size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VariantRef {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product: ProductRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantRef>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn unit_price(&self) -> i64 {
        self.variant
            .as_ref()
            .map_or(self.product.price, |variant| variant.price)
    }

    pub fn line_total(&self) -> i64 {
        self.unit_price().saturating_mul(i64::from(self.quantity))
    }

    pub fn variant_id(&self) -> Option<Uuid> {
        self.variant.as_ref().map(|variant| variant.id)
    }

    pub(crate) fn matches(&self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        self.product.id == product_id && self.variant_id() == variant_id
    }
}

/// Outcome of a successful coupon validation, as held by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: i64,
    #[serde(default)]
    pub free_shipping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct CartTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
    pub total_items: u32,
    pub is_empty: bool,
}

impl CartTotals {
    pub fn empty() -> Self {
        Self {
            is_empty: true,
            ..Self::default()
        }
    }
}

/// Read-only view of a cart handed to callers and subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub coupon_code: Option<String>,
    pub coupon: Option<AppliedCoupon>,
    #[serde(flatten)]
    pub totals: CartTotals,
    /// Bumped on every mutation of the owning store.
    pub revision: u64,
}

/// Durable form of a cart. Totals are stored for inspection only and are
/// recomputed whenever the cart is loaded back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub coupon: Option<AppliedCoupon>,
    #[serde(default)]
    pub totals: CartTotals,
}
