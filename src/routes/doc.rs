use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::{AppliedCoupon, CartItem, CartSnapshot, CartTotals, CouponSummary, CouponType, PricingRules, ProductRef, VariantRef},
    dto::{
        cart::{AddToCartRequest, ApplyCouponRequest, UpdateCartItemRequest},
        coupons::{CouponList, CreateCouponRequest, UpdateCouponRequest, ValidateCouponRequest, ValidateCouponResponse},
        orders::{OrderList, OrderWithItems, PlaceOrderRequest, UpdateOrderStatusRequest},
        products::{ProductDetail, ProductList},
    },
    models::{Coupon, Order, OrderItem, OrderStatus, Product, ProductVariant, ShippingAddress},
    response::{ApiResponse, Meta},
    routes::{admin, cart, coupons, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        cart::pricing_rules,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        cart::apply_coupon,
        cart::remove_coupon,
        coupons::validate_coupon,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_coupons,
        admin::create_coupon,
        admin::update_coupon
    ),
    components(
        schemas(
            Product,
            ProductVariant,
            ProductList,
            ProductDetail,
            ProductRef,
            VariantRef,
            CartItem,
            CartTotals,
            CartSnapshot,
            PricingRules,
            AppliedCoupon,
            AddToCartRequest,
            UpdateCartItemRequest,
            ApplyCouponRequest,
            Coupon,
            CouponType,
            CouponSummary,
            CouponList,
            CreateCouponRequest,
            UpdateCouponRequest,
            ValidateCouponRequest,
            ValidateCouponResponse,
            Order,
            OrderItem,
            OrderStatus,
            OrderList,
            OrderWithItems,
            PlaceOrderRequest,
            UpdateOrderStatusRequest,
            ShippingAddress,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartSnapshot>,
            ApiResponse<PricingRules>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Coupon>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart and pricing endpoints"),
        (name = "Coupons", description = "Coupon validation"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
