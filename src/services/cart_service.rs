use std::sync::Arc;

use uuid::Uuid;

use crate::{
    audit,
    cart::{CartOwner, CartSnapshot, CartStore},
    dto::cart::{AddToCartRequest, ApplyCouponRequest, UpdateCartItemRequest},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    services::{coupon_service::DbCouponValidator, product_service},
    state::AppState,
};

pub async fn open_cart(state: &AppState, owner: &CartOwner) -> AppResult<Arc<CartStore>> {
    Ok(state.carts.open(owner).await?)
}

pub async fn get_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<CartSnapshot>> {
    let store = open_cart(state, owner).await?;
    Ok(ApiResponse::success("OK", store.snapshot(), Some(Meta::empty())))
}

pub async fn add_to_cart(
    state: &AppState,
    owner: &CartOwner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let quantity = line_quantity(payload.quantity)?;

    let (product, variant) =
        product_service::resolve_line(&state.orm, payload.product_id, payload.variant_id).await?;

    let store = open_cart(state, owner).await?;
    let (item_id, snapshot) = store.add_item(product, quantity, variant).await;

    audit::record(
        &state.pool,
        owner.user_id(),
        "cart_add",
        "carts",
        serde_json::json!({
            "cart": owner.storage_key(),
            "item_id": item_id,
            "product_id": payload.product_id,
            "variant_id": payload.variant_id,
            "quantity": quantity,
        }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", snapshot, Some(Meta::empty())))
}

pub async fn update_item(
    state: &AppState,
    owner: &CartOwner,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    // Zero or less removes the line; only the upper bound is checked here.
    if payload.quantity > 0 {
        line_quantity(payload.quantity)?;
    }
    let store = open_cart(state, owner).await?;
    let (changed, snapshot) = store.update_quantity(item_id, payload.quantity).await;
    if !changed {
        tracing::debug!(cart = %owner, %item_id, "update for unknown cart item ignored");
    }
    Ok(ApiResponse::success("Cart updated", snapshot, Some(Meta::empty())))
}

fn line_quantity(quantity: i64) -> AppResult<u32> {
    u32::try_from(quantity).map_err(|_| AppError::BadRequest("quantity is too large".to_string()))
}

pub async fn remove_item(
    state: &AppState,
    owner: &CartOwner,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartSnapshot>> {
    let store = open_cart(state, owner).await?;
    let (removed, snapshot) = store.remove_item(item_id).await;

    if removed {
        audit::record(
            &state.pool,
            owner.user_id(),
            "cart_remove",
            "carts",
            serde_json::json!({ "cart": owner.storage_key(), "item_id": item_id }),
        )
        .await;
    }

    Ok(ApiResponse::success("Removed from cart", snapshot, Some(Meta::empty())))
}

pub async fn clear_cart(state: &AppState, owner: &CartOwner) -> AppResult<ApiResponse<CartSnapshot>> {
    let store = open_cart(state, owner).await?;
    let snapshot = store.clear().await;
    Ok(ApiResponse::success("Cart cleared", snapshot, Some(Meta::empty())))
}

pub async fn apply_coupon(
    state: &AppState,
    owner: &CartOwner,
    payload: ApplyCouponRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    let store = open_cart(state, owner).await?;
    let validator = DbCouponValidator::new(state.orm.clone());
    let snapshot = store.apply_coupon(&payload.code, &validator).await?;

    audit::record(
        &state.pool,
        owner.user_id(),
        "coupon_apply",
        "carts",
        serde_json::json!({
            "cart": owner.storage_key(),
            "code": snapshot.coupon_code,
            "discount": snapshot.totals.discount,
        }),
    )
    .await;

    Ok(ApiResponse::success("Coupon applied", snapshot, Some(Meta::empty())))
}

pub async fn remove_coupon(
    state: &AppState,
    owner: &CartOwner,
) -> AppResult<ApiResponse<CartSnapshot>> {
    let store = open_cart(state, owner).await?;
    let snapshot = store.remove_coupon().await;
    Ok(ApiResponse::success("Coupon removed", snapshot, Some(Meta::empty())))
}
