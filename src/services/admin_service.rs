use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    cart::{CouponType, coupon::normalize_code},
    dto::{
        coupons::{CouponList, CreateCouponRequest, UpdateCouponRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    entity::{
        coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::{
        coupon_service::{coupon_from_entity, find_by_code},
        order_service::{load_items, order_from_entity},
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or_default();
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
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity);
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = load_items(state, order.id).await?;

    let data = OrderWithItems { order, items };
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&existing.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status {}",
            existing.id,
            existing.status
        ))
    })?;
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current.as_str(), "to": next.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Coupons::find().order_by_desc(CouponCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(meta)))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    validate_new_coupon(&payload)?;

    let code = normalize_code(&payload.code);
    if find_by_code(&state.orm, &code).await?.is_some() {
        return Err(AppError::Conflict(format!("coupon {code} already exists")));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        name: Set(payload.name),
        description: Set(payload.description),
        discount_type: Set(payload.discount_type.as_str().into()),
        value: Set(payload.value),
        min_order_value: Set(payload.min_order_value),
        max_discount: Set(payload.max_discount),
        usage_limit: Set(payload.usage_limit),
        used_count: Set(0),
        starts_at: Set(payload.starts_at.map(Into::into)),
        ends_at: Set(payload.ends_at.map(Into::into)),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        coupon_from_entity(coupon)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let existing = Coupons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let starts_at = payload
        .starts_at
        .or_else(|| existing.starts_at.map(|dt| dt.with_timezone(&Utc)));
    let ends_at = payload
        .ends_at
        .or_else(|| existing.ends_at.map(|dt| dt.with_timezone(&Utc)));
    if let (Some(starts), Some(ends)) = (starts_at, ends_at) {
        if starts >= ends {
            return Err(AppError::BadRequest("starts_at must be before ends_at".into()));
        }
    }
    if let Some(value) = payload.value {
        let kind = CouponType::parse(&existing.discount_type);
        check_value(kind.unwrap_or(CouponType::Fixed), value)?;
    }

    let mut active: CouponActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(value) = payload.value {
        active.value = Set(value);
    }
    if let Some(min) = payload.min_order_value {
        active.min_order_value = Set(Some(min));
    }
    if let Some(cap) = payload.max_discount {
        active.max_discount = Set(Some(cap));
    }
    if let Some(limit) = payload.usage_limit {
        active.usage_limit = Set(Some(limit));
    }
    if let Some(starts) = payload.starts_at {
        active.starts_at = Set(Some(starts.into()));
    }
    if let Some(ends) = payload.ends_at {
        active.ends_at = Set(Some(ends.into()));
    }
    let coupon = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_update",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "is_active": coupon.is_active }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon updated",
        coupon_from_entity(coupon)?,
        Some(Meta::empty()),
    ))
}

pub fn validate_new_coupon(payload: &CreateCouponRequest) -> AppResult<()> {
    if normalize_code(&payload.code).is_empty() {
        return Err(AppError::BadRequest("code is required".into()));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    check_value(payload.discount_type, payload.value)?;
    if payload.min_order_value.is_some_and(|min| min < 0)
        || payload.max_discount.is_some_and(|cap| cap <= 0)
        || payload.usage_limit.is_some_and(|limit| limit <= 0)
    {
        return Err(AppError::BadRequest(
            "limits must be positive".into(),
        ));
    }
    if let (Some(starts), Some(ends)) = (payload.starts_at, payload.ends_at) {
        if starts >= ends {
            return Err(AppError::BadRequest("starts_at must be before ends_at".into()));
        }
    }
    Ok(())
}

fn check_value(kind: CouponType, value: i64) -> AppResult<()> {
    match kind {
        CouponType::Percentage if !(1..=100).contains(&value) => Err(AppError::BadRequest(
            "percentage must be between 1 and 100".into(),
        )),
        CouponType::Fixed if value <= 0 => {
            Err(AppError::BadRequest("value must be greater than 0".into()))
        }
        _ => Ok(()),
    }
}
