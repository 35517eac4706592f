use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    cart::{
        CouponRejection, CouponSummary, CouponType, CouponValidation, CouponValidator,
        CouponVerdict, coupon::normalize_code, pricing::percent_of,
    },
    db::OrmConn,
    dto::coupons::{ValidateCouponRequest, ValidateCouponResponse},
    entity::coupons::{Column as CouponCol, Entity as Coupons, Model as CouponModel},
    error::{AppError, AppResult},
    models::Coupon,
    response::{ApiResponse, Meta},
    state::AppState,
};

const INVALID_CODE: &str = "Invalid coupon code";

/// Apply a coupon's rules to an order value at time `now`.
pub fn evaluate_coupon(coupon: &Coupon, order_value: i64, now: DateTime<Utc>) -> CouponVerdict {
    if !coupon.is_active {
        return Err(CouponRejection::new(INVALID_CODE));
    }
    if coupon.starts_at.is_some_and(|starts| now < starts) {
        return Err(CouponRejection::new("Coupon is not yet active"));
    }
    if coupon.ends_at.is_some_and(|ends| now > ends) {
        return Err(CouponRejection::new("Coupon has expired"));
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.used_count >= limit)
    {
        return Err(CouponRejection::new("Coupon usage limit reached"));
    }
    if let Some(min) = coupon.min_order_value.filter(|min| order_value < *min) {
        return Err(CouponRejection::new(format!(
            "Minimum order value of ₹{min} required"
        )));
    }

    let order_value = order_value.max(0);
    let (discount_amount, free_shipping) = match coupon.discount_type {
        CouponType::Percentage => {
            let discount = percent_of(order_value, coupon.value);
            let discount = coupon
                .max_discount
                .map_or(discount, |cap| discount.min(cap));
            (discount, false)
        }
        CouponType::Fixed => (coupon.value.min(order_value), false),
        CouponType::FreeShipping => (0, true),
    };

    Ok(CouponValidation {
        coupon: CouponSummary {
            code: coupon.code.clone(),
            name: coupon.name.clone(),
            discount_type: coupon.discount_type,
        },
        discount_amount: discount_amount.max(0),
        free_shipping,
    })
}

pub async fn find_by_code<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<Option<Coupon>> {
    let model = Coupons::find()
        .filter(CouponCol::Code.eq(normalize_code(code)))
        .one(conn)
        .await?;
    model.map(coupon_from_entity).transpose()
}

/// Coupon rules backed by the `coupons` table.
pub struct DbCouponValidator {
    orm: OrmConn,
}

impl DbCouponValidator {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl CouponValidator for DbCouponValidator {
    async fn validate(&self, code: &str, order_value: i64) -> anyhow::Result<CouponVerdict> {
        if normalize_code(code).is_empty() {
            return Ok(Err(CouponRejection::new("Coupon code is required")));
        }
        let coupon = find_by_code(&self.orm, code)
            .await
            .map_err(lookup_failed)?;
        Ok(match coupon {
            Some(coupon) => evaluate_coupon(&coupon, order_value, Utc::now()),
            None => Err(CouponRejection::new(INVALID_CODE)),
        })
    }
}

fn lookup_failed(err: AppError) -> anyhow::Error {
    anyhow::Error::new(err).context("coupon lookup failed")
}

pub async fn validate_coupon(
    state: &AppState,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<ValidateCouponResponse>> {
    if payload.order_value < 0 {
        return Err(AppError::BadRequest(
            "order_value must not be negative".to_string(),
        ));
    }

    let validator = DbCouponValidator::new(state.orm.clone());
    let verdict = validator
        .validate(&payload.code, payload.order_value)
        .await?;

    match verdict {
        Ok(validation) => Ok(ApiResponse::success(
            "Coupon applied",
            ValidateCouponResponse::from(validation),
            Some(Meta::empty()),
        )),
        Err(rejection) => Err(AppError::BadRequest(rejection.reason)),
    }
}

pub(crate) fn coupon_from_entity(model: CouponModel) -> AppResult<Coupon> {
    let discount_type = CouponType::parse(&model.discount_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "coupon {} has unknown discount type {}",
            model.code,
            model.discount_type
        ))
    })?;

    Ok(Coupon {
        id: model.id,
        code: model.code,
        name: model.name,
        description: model.description,
        discount_type,
        value: model.value,
        min_order_value: model.min_order_value,
        max_discount: model.max_discount,
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        starts_at: model.starts_at.map(|dt| dt.with_timezone(&Utc)),
        ends_at: model.ends_at.map(|dt| dt.with_timezone(&Utc)),
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
