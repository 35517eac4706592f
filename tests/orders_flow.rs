use std::sync::Arc;

use namamy_storefront::{
    cart::{Cart, CartOwner, CartRegistry, MemoryCartStorage, PricingRules, ProductRef, VariantRef},
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, ApplyCouponRequest},
        orders::{OrderWithItems, PlaceOrderRequest, UpdateOrderStatusRequest},
    },
    entity::{
        coupons::{ActiveModel as CouponActive, Entity as Coupons},
        product_variants::{ActiveModel as VariantActive, Entity as ProductVariants},
        products::{ActiveModel as ProductActive, Entity as Products},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::ShippingAddress,
    response::ApiResponse,
    services::{
        admin_service, cart_service,
        order_service::{self, lock_order},
    },
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: shopper fills a cart, applies WELCOME10, places the order;
// admin then moves the order along.
#[tokio::test]
async fn cart_coupon_checkout_and_admin_status_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let makhana = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Classic Makhana".into()),
        slug: Set("classic-makhana".into()),
        description: Set(Some("Lightly salted fox nuts".into())),
        price: Set(249),
        stock: Set(20),
        image_url: Set(None),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let almonds = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Roasted Almonds".into()),
        slug: Set("roasted-almonds".into()),
        description: Set(None),
        price: Set(299),
        stock: Set(10),
        image_url: Set(None),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    let almonds_350 = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(almonds.id),
        name: Set("350g".into()),
        price: Set(351),
        stock: Set(5),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let welcome = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set("WELCOME10".into()),
        name: Set("Welcome offer".into()),
        description: Set(None),
        discount_type: Set("percentage".into()),
        value: Set(10),
        min_order_value: Set(Some(500)),
        max_discount: Set(Some(100)),
        usage_limit: Set(None),
        used_count: Set(0),
        starts_at: Set(None),
        ends_at: Set(None),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let shopper = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let owner = CartOwner::User(shopper.user_id);

    // One ₹249 item: too small for WELCOME10.
    let resp = cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id: makhana.id,
            variant_id: None,
            quantity: 1,
        },
    )
    .await?;
    let cart = resp.data.expect("cart");
    assert_eq!(cart.totals.total, 344);

    let rejected = cart_service::apply_coupon(
        &state,
        &owner,
        ApplyCouponRequest {
            code: "welcome10".into(),
        },
    )
    .await;
    assert!(rejected.is_err(), "coupon should need a ₹500 order");

    cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id: almonds.id,
            variant_id: Some(almonds_350.id),
            quantity: 1,
        },
    )
    .await?;

    let resp = cart_service::apply_coupon(
        &state,
        &owner,
        ApplyCouponRequest {
            code: "welcome10".into(),
        },
    )
    .await?;
    let cart = resp.data.expect("cart");
    assert_eq!(cart.coupon_code.as_deref(), Some("WELCOME10"));
    assert_eq!(cart.totals.subtotal, 600);
    assert_eq!(cart.totals.discount, 60);
    assert_eq!(cart.totals.shipping, 0);
    assert_eq!(cart.totals.tax, 97);
    assert_eq!(cart.totals.total, 637);

    let placed = order_service::place_order(
        &state,
        &shopper,
        PlaceOrderRequest {
            shipping_address: address(),
            payment_method: "UPI".into(),
        },
    )
    .await?;
    let placed = placed.data.expect("order");
    assert_eq!(placed.order.total, 637);
    assert_eq!(placed.order.coupon_code.as_deref(), Some("WELCOME10"));
    assert_eq!(placed.order.payment_method, "upi");
    assert_eq!(placed.items.len(), 2);
    assert!(placed.order.order_number.starts_with("NMY-"));

    // Cart is emptied once the order is committed.
    let cart = cart_service::get_cart(&state, &owner).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert!(cart.totals.is_empty);

    // Stock and coupon usage moved with the order.
    let variant = ProductVariants::find_by_id(almonds_350.id)
        .one(&state.orm)
        .await?
        .expect("variant");
    assert_eq!(variant.stock, 4);
    let coupon = Coupons::find_by_id(welcome.id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(coupon.used_count, 1);

    // Empty cart cannot be ordered again.
    let again = order_service::place_order(
        &state,
        &shopper,
        PlaceOrderRequest {
            shipping_address: address(),
            payment_method: "cod".into(),
        },
    )
    .await;
    assert!(again.is_err());

    let updated = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await?;
    assert_eq!(updated.data.expect("order").status, "shipped");

    // Shoppers cannot use admin endpoints.
    let denied = admin_service::update_order_status(
        &state,
        &shopper,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
        },
    )
    .await;
    assert!(denied.is_err());

    opposite_order_checkouts(&state, makhana.id, almonds.id).await?;

    Ok(())
}

// Two shoppers hold the same products added in opposite orders and check out
// at the same time. Both orders must go through.
async fn opposite_order_checkouts(
    state: &AppState,
    first: Uuid,
    second: Uuid,
) -> anyhow::Result<()> {
    let left = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    let right = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };

    for (shopper, products) in [(&left, [first, second]), (&right, [second, first])] {
        let owner = CartOwner::User(shopper.user_id);
        for product_id in products {
            cart_service::add_to_cart(
                state,
                &owner,
                AddToCartRequest {
                    product_id,
                    variant_id: None,
                    quantity: 1,
                },
            )
            .await?;
        }
    }

    let (left_order, right_order) =
        tokio::join!(checkout(state, &left), checkout(state, &right));
    assert_eq!(left_order?.data.expect("order").items.len(), 2);
    assert_eq!(right_order?.data.expect("order").items.len(), 2);

    let makhana = Products::find_by_id(first)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(makhana.stock, 17);
    let almonds = Products::find_by_id(second)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(almonds.stock, 8);
    Ok(())
}

async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    order_service::place_order(
        state,
        user,
        PlaceOrderRequest {
            shipping_address: address(),
            payment_method: "cod".into(),
        },
    )
    .await
}

#[test]
fn catalog_rows_are_locked_in_one_global_order() {
    let first = ProductRef {
        id: Uuid::from_u128(1),
        name: "Classic Makhana".into(),
        price: 249,
        image_url: None,
    };
    let second = ProductRef {
        id: Uuid::from_u128(2),
        name: "Roasted Almonds".into(),
        price: 299,
        image_url: None,
    };
    let pack = VariantRef {
        id: Uuid::from_u128(3),
        name: "350g".into(),
        price: 351,
    };

    let mut one = Cart::default();
    one.add_item(second.clone(), 1, Some(pack.clone()));
    one.add_item(first.clone(), 1, None);
    one.add_item(second.clone(), 1, None);

    let mut other = Cart::default();
    other.add_item(first, 1, None);
    other.add_item(second.clone(), 1, None);
    other.add_item(second, 1, Some(pack));

    let keys = |cart: &Cart| {
        lock_order(cart.items())
            .into_iter()
            .map(|item| (item.product.id, item.variant_id()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&one), keys(&other));
    assert_eq!(
        keys(&one),
        vec![
            (Uuid::from_u128(1), None),
            (Uuid::from_u128(2), None),
            (Uuid::from_u128(2), Some(Uuid::from_u128(3))),
        ]
    );
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = orm_from_pool(&pool);
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, carts, coupons, product_variants, products, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    let storage = Arc::new(MemoryCartStorage::new());
    Ok(AppState {
        pool,
        orm,
        carts: Arc::new(CartRegistry::new(storage, PricingRules::default())),
    })
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Verma".into(),
        phone: "9876543210".into(),
        line1: "12 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        postal_code: "560001".into(),
        country: "IN".into(),
    }
}
