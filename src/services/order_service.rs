use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    cart::{CartItem, CartOwner},
    dto::orders::{OrderList, OrderWithItems, PlaceOrderRequest},
    entity::{
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        product_variants::{Column as VariantCol, Entity as ProductVariants, Model as VariantModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::coupon_service::{coupon_from_entity, evaluate_coupon},
    state::AppState,
};

const PAYMENT_METHODS: [&str; 3] = ["cod", "upi", "card"];

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or_default();

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Turn the shopper's cart into an order.
///
/// Catalog prices and stock are re-read under row locks, the applied coupon
/// is validated again against the final subtotal, and the cart is cleared
/// only after the order has been committed.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let payment_method = payload.payment_method.trim().to_lowercase();
    if !PAYMENT_METHODS.contains(&payment_method.as_str()) {
        return Err(AppError::BadRequest("Unsupported payment method".into()));
    }

    let owner = CartOwner::User(user.user_id);
    let store = state.carts.open(&owner).await?;
    let cart = store.snapshot();
    if cart.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let txn = state.orm.begin().await?;

    check_lines(&txn, &cart.items).await?;

    let coupon_code = match cart.coupon.as_ref() {
        Some(applied) => {
            let coupon = Coupons::find()
                .filter(CouponCol::Code.eq(applied.code.clone()))
                .lock(LockType::Update)
                .one(&txn)
                .await?;
            let coupon = match coupon {
                Some(c) => coupon_from_entity(c)?,
                None => return Err(AppError::BadRequest("Invalid coupon code".into())),
            };
            if let Err(rejection) = evaluate_coupon(&coupon, cart.totals.subtotal, Utc::now()) {
                return Err(AppError::BadRequest(rejection.reason));
            }

            Coupons::update_many()
                .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).add(1))
                .filter(CouponCol::Id.eq(coupon.id))
                .exec(&txn)
                .await?;
            Some(coupon.code)
        }
        None => None,
    };

    let order_id = Uuid::new_v4();
    let shipping_address = serde_json::to_value(&payload.shipping_address)
        .map_err(|err| AppError::Internal(err.into()))?;

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(build_order_number(order_id)),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_status: Set("pending".into()),
        payment_method: Set(payment_method),
        shipping_address: Set(shipping_address),
        subtotal: Set(cart.totals.subtotal),
        discount: Set(cart.totals.discount),
        shipping: Set(cart.totals.shipping),
        tax: Set(cart.totals.tax),
        total: Set(cart.totals.total),
        coupon_code: Set(coupon_code),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| AppError::BadRequest("Cart has invalid quantity".into()))?;
        let row = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product.id),
            variant_id: Set(item.variant_id()),
            product_name: Set(item.product.name.clone()),
            variant_name: Set(item.variant.as_ref().map(|v| v.name.clone())),
            quantity: Set(quantity),
            unit_price: Set(item.unit_price()),
            line_total: Set(item.line_total()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(row));

        // reduce stock
        match item.variant_id() {
            Some(variant_id) => {
                ProductVariants::update_many()
                    .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(quantity))
                    .filter(VariantCol::Id.eq(variant_id))
                    .exec(&txn)
                    .await?;
            }
            None => {
                Products::update_many()
                    .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
                    .filter(ProdCol::Id.eq(item.product.id))
                    .exec(&txn)
                    .await?;
            }
        }
    }

    txn.commit().await?;

    if store.clear_if_unchanged(cart.revision).await.is_none() {
        tracing::warn!(order_id = %order.id, "cart changed during checkout and was kept");
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_placed",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;
    tracing::info!(order_id = %order.id, total = order.total, "order placed");

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

/// Cart lines in the order their catalog rows are locked: by product, then
/// variant. Every checkout takes locks in this one global order, so two
/// carts holding the same products in different add orders cannot deadlock.
pub fn lock_order(items: &[CartItem]) -> Vec<&CartItem> {
    let mut lines: Vec<&CartItem> = items.iter().collect();
    lines.sort_by_key(|item| (item.product.id, item.variant_id()));
    lines
}

/// Lock the catalog rows behind the cart and check price and stock.
///
/// All product rows are locked before any variant row.
async fn check_lines<C: sea_orm::ConnectionTrait>(txn: &C, items: &[CartItem]) -> AppResult<()> {
    let lines = lock_order(items);

    let mut products: HashMap<Uuid, ProductModel> = HashMap::new();
    for item in &lines {
        if products.contains_key(&item.product.id) {
            continue;
        }
        let product = Products::find_by_id(item.product.id)
            .lock(LockType::Update)
            .one(txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} is no longer available", item.product.name))
            })?;
        products.insert(product.id, product);
    }

    let mut variants: HashMap<Uuid, VariantModel> = HashMap::new();
    for item in &lines {
        let Some(variant) = item.variant.as_ref() else {
            continue;
        };
        let row = ProductVariants::find_by_id(variant.id)
            .lock(LockType::Update)
            .one(txn)
            .await?
            .filter(|v| v.is_active && v.product_id == item.product.id)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "{} ({}) is no longer available",
                    item.product.name, variant.name
                ))
            })?;
        variants.insert(row.id, row);
    }

    for item in &lines {
        let (price, stock) = match item.variant_id().and_then(|id| variants.get(&id)) {
            Some(variant) => (variant.price, variant.stock),
            None => match products.get(&item.product.id) {
                Some(product) => (product.price, product.stock),
                None => return Err(AppError::NotFound),
            },
        };

        if price != item.unit_price() {
            return Err(AppError::BadRequest(format!(
                "Price of {} has changed; refresh your cart",
                item.product.name
            )));
        }
        if i64::from(stock) < i64::from(item.quantity) {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                item.product.name
            )));
        }
    }
    Ok(())
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = load_items(state, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        status: model.status,
        payment_status: model.payment_status,
        payment_method: model.payment_method,
        shipping_address: model.shipping_address,
        subtotal: model.subtotal,
        discount: model.discount,
        shipping: model.shipping,
        tax: model.tax,
        total: model.total,
        coupon_code: model.coupon_code,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        product_name: model.product_name,
        variant_name: model.variant_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        line_total: model.line_total,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("NMY-{}-{}", date, &suffix[..8])
}
