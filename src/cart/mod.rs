//! Cart pricing engine.
//!
//! - [`engine`]: the `Cart` aggregate and its totals recomputation
//! - [`pricing`]: shipping/tax rules
//! - [`coupon`]: the coupon validation boundary
//! - [`store`]: a locked, persisted, observable cart per owner
//! - [`storage`]: where cart state is kept between requests
//! - [`registry`]: live carts keyed by owner

pub mod coupon;
pub mod engine;
pub mod models;
pub mod pricing;
pub mod registry;
pub mod storage;
pub mod store;

pub use coupon::{
    CouponRejection, CouponSummary, CouponType, CouponValidation, CouponValidator, CouponVerdict,
};
pub use engine::Cart;
pub use models::{
    AppliedCoupon, CartItem, CartSnapshot, CartTotals, PersistedCart, ProductRef, VariantRef,
};
pub use pricing::PricingRules;
pub use registry::{CacheLimits, CartOwner, CartRegistry};
pub use storage::{CartStorage, MemoryCartStorage, PgCartStorage};
pub use store::{CartError, CartStore};
