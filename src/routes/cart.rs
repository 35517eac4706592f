use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    cart::{CartOwner, CartSnapshot, PricingRules},
    dto::cart::{AddToCartRequest, ApplyCouponRequest, UpdateCartItemRequest},
    error::AppResult,
    response::{ApiResponse, Meta},
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{item_id}", patch(update_item).delete(remove_item))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/pricing", get(pricing_rules))
}

#[utoipa::path(
    get,
    path = "/api/cart/pricing",
    responses(
        (status = 200, description = "Shipping and tax rules carts are priced under", body = ApiResponse<PricingRules>)
    ),
    tag = "Cart"
)]
pub async fn pricing_rules(State(state): State<AppState>) -> Json<ApiResponse<PricingRules>> {
    Json(ApiResponse::success("OK", *state.carts.rules(), Some(Meta::empty())))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("x-cart-session" = Option<String>, Header, description = "Anonymous cart session id")
    ),
    responses(
        (status = 200, description = "Current cart with totals", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Missing cart session")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    owner: CartOwner,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::get_cart(&state, &owner).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a product, or more of it", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Bad request"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    owner: CartOwner,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::add_to_cart(&state, &owner, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Set a line's quantity; zero or less removes it", body = ApiResponse<CartSnapshot>),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    owner: CartOwner,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::update_item(&state, &owner, item_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    responses(
        (status = 200, description = "Remove a line; unknown ids are ignored", body = ApiResponse<CartSnapshot>),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    owner: CartOwner,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::remove_item(&state, &owner, item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Empty the cart and drop its coupon", body = ApiResponse<CartSnapshot>),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    owner: CartOwner,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::clear_cart(&state, &owner).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/coupon",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Coupon applied", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Coupon rejected; cart unchanged"),
        (status = 409, description = "Cart kept changing during validation"),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    owner: CartOwner,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::apply_coupon(&state, &owner, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/coupon",
    responses(
        (status = 200, description = "Coupon removed", body = ApiResponse<CartSnapshot>),
    ),
    security((), ("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    owner: CartOwner,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let resp = cart_service::remove_coupon(&state, &owner).await?;
    Ok(Json(resp))
}
