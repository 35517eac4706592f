use chrono::{Duration, Utc};
use namamy_storefront::{
    cart::CouponType,
    dto::coupons::CreateCouponRequest,
    models::{Coupon, OrderStatus},
    services::{admin_service::validate_new_coupon, coupon_service::evaluate_coupon},
};
use uuid::Uuid;

fn coupon(code: &str, discount_type: CouponType, value: i64) -> Coupon {
    Coupon {
        id: Uuid::new_v4(),
        code: code.into(),
        name: code.into(),
        description: None,
        discount_type,
        value,
        min_order_value: None,
        max_discount: None,
        usage_limit: None,
        used_count: 0,
        starts_at: None,
        ends_at: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn reason(result: namamy_storefront::cart::CouponVerdict) -> String {
    result.expect_err("coupon should be rejected").reason
}

#[test]
fn percentage_discount_is_capped() {
    let mut welcome = coupon("WELCOME10", CouponType::Percentage, 10);
    welcome.min_order_value = Some(500);
    welcome.max_discount = Some(100);

    let small = evaluate_coupon(&welcome, 600, Utc::now()).expect("valid");
    assert_eq!(small.discount_amount, 60);
    assert!(!small.free_shipping);
    assert_eq!(small.coupon.code, "WELCOME10");

    let large = evaluate_coupon(&welcome, 5_000, Utc::now()).expect("valid");
    assert_eq!(large.discount_amount, 100);
}

#[test]
fn percentage_discount_rounds_half_up() {
    let five = coupon("FIVE", CouponType::Percentage, 5);
    // 5% of 249 = 12.45 -> 12, 5% of 250 = 12.5 -> 13
    assert_eq!(evaluate_coupon(&five, 249, Utc::now()).unwrap().discount_amount, 12);
    assert_eq!(evaluate_coupon(&five, 250, Utc::now()).unwrap().discount_amount, 13);
}

#[test]
fn fixed_discount_never_exceeds_order_value() {
    let flat = coupon("FLAT50", CouponType::Fixed, 50);
    assert_eq!(evaluate_coupon(&flat, 300, Utc::now()).unwrap().discount_amount, 50);
    assert_eq!(evaluate_coupon(&flat, 30, Utc::now()).unwrap().discount_amount, 30);
}

#[test]
fn free_shipping_coupon_grants_no_discount() {
    let freeship = coupon("FREESHIP", CouponType::FreeShipping, 0);
    let validation = evaluate_coupon(&freeship, 249, Utc::now()).expect("valid");
    assert_eq!(validation.discount_amount, 0);
    assert!(validation.free_shipping);

    let applied = validation.into_applied();
    assert_eq!(applied.code, "FREESHIP");
    assert!(applied.free_shipping);
}

#[test]
fn minimum_order_value_is_enforced() {
    let mut welcome = coupon("WELCOME10", CouponType::Percentage, 10);
    welcome.min_order_value = Some(500);

    assert_eq!(
        reason(evaluate_coupon(&welcome, 499, Utc::now())),
        "Minimum order value of ₹500 required"
    );
    assert!(evaluate_coupon(&welcome, 500, Utc::now()).is_ok());
}

#[test]
fn inactive_coupon_reads_as_invalid() {
    let mut retired = coupon("OLD", CouponType::Fixed, 50);
    retired.is_active = false;
    assert_eq!(
        reason(evaluate_coupon(&retired, 1_000, Utc::now())),
        "Invalid coupon code"
    );
}

#[test]
fn validity_window_is_enforced() {
    let now = Utc::now();

    let mut upcoming = coupon("SOON", CouponType::Fixed, 50);
    upcoming.starts_at = Some(now + Duration::days(1));
    assert_eq!(
        reason(evaluate_coupon(&upcoming, 1_000, now)),
        "Coupon is not yet active"
    );

    let mut expired = coupon("GONE", CouponType::Fixed, 50);
    expired.ends_at = Some(now - Duration::days(1));
    assert_eq!(
        reason(evaluate_coupon(&expired, 1_000, now)),
        "Coupon has expired"
    );

    let mut running = coupon("LIVE", CouponType::Fixed, 50);
    running.starts_at = Some(now - Duration::days(1));
    running.ends_at = Some(now + Duration::days(1));
    assert!(evaluate_coupon(&running, 1_000, now).is_ok());
}

#[test]
fn usage_limit_is_enforced() {
    let mut limited = coupon("FLAT50", CouponType::Fixed, 50);
    limited.usage_limit = Some(1000);
    limited.used_count = 999;
    assert!(evaluate_coupon(&limited, 300, Utc::now()).is_ok());

    limited.used_count = 1000;
    assert_eq!(
        reason(evaluate_coupon(&limited, 300, Utc::now())),
        "Coupon usage limit reached"
    );
}

fn create_request(discount_type: CouponType, value: i64) -> CreateCouponRequest {
    CreateCouponRequest {
        code: "monsoon15".into(),
        name: "Monsoon sale".into(),
        description: None,
        discount_type,
        value,
        min_order_value: Some(400),
        max_discount: None,
        usage_limit: None,
        starts_at: None,
        ends_at: None,
    }
}

#[test]
fn new_coupon_values_are_checked() {
    assert!(validate_new_coupon(&create_request(CouponType::Percentage, 15)).is_ok());
    assert!(validate_new_coupon(&create_request(CouponType::Percentage, 0)).is_err());
    assert!(validate_new_coupon(&create_request(CouponType::Percentage, 101)).is_err());
    assert!(validate_new_coupon(&create_request(CouponType::Fixed, 0)).is_err());
    assert!(validate_new_coupon(&create_request(CouponType::FreeShipping, 0)).is_ok());

    let mut blank = create_request(CouponType::Fixed, 50);
    blank.code = "   ".into();
    assert!(validate_new_coupon(&blank).is_err());

    let mut inverted = create_request(CouponType::Fixed, 50);
    inverted.starts_at = Some(Utc::now());
    inverted.ends_at = Some(Utc::now() - Duration::hours(1));
    assert!(validate_new_coupon(&inverted).is_err());
}

#[test]
fn order_status_transitions() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
    assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Shipped));
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));

    assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
    assert_eq!(OrderStatus::parse("lost"), None);
}
