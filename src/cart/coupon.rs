use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::models::AppliedCoupon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Percentage,
    Fixed,
    FreeShipping,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "percentage",
            CouponType::Fixed => "fixed",
            CouponType::FreeShipping => "free_shipping",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "percentage" => Some(CouponType::Percentage),
            "fixed" => Some(CouponType::Fixed),
            "free_shipping" => Some(CouponType::FreeShipping),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CouponSummary {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub discount_type: CouponType,
}

/// An accepted coupon and the discount it grants on the submitted order value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CouponValidation {
    pub coupon: CouponSummary,
    pub discount_amount: i64,
    pub free_shipping: bool,
}

impl CouponValidation {
    pub fn into_applied(self) -> AppliedCoupon {
        AppliedCoupon {
            code: self.coupon.code,
            discount: self.discount_amount,
            free_shipping: self.free_shipping,
        }
    }
}

/// A coupon the rules turned down, with a reason fit for the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRejection {
    pub reason: String,
}

impl CouponRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Verdict of a validator that managed to evaluate the code.
pub type CouponVerdict = Result<CouponValidation, CouponRejection>;

/// Boundary to whatever owns coupon rules.
///
/// The outer `Err` is a transport or storage failure; a rule rejection is an
/// `Ok(Err(_))`.
#[async_trait]
pub trait CouponValidator: Send + Sync {
    async fn validate(&self, code: &str, order_value: i64) -> anyhow::Result<CouponVerdict>;
}

/// Trim and upper-case a shopper-entered code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
