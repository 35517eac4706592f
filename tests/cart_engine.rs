use namamy_storefront::cart::{
    AppliedCoupon, Cart, CartTotals, PersistedCart, PricingRules, ProductRef, VariantRef,
};
use uuid::Uuid;

fn product(name: &str, price: i64) -> ProductRef {
    ProductRef {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
        image_url: None,
    }
}

fn variant(name: &str, price: i64) -> VariantRef {
    VariantRef {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
    }
}

fn welcome10(discount: i64) -> AppliedCoupon {
    AppliedCoupon {
        code: "WELCOME10".into(),
        discount,
        free_shipping: false,
    }
}

#[test]
fn single_item_below_threshold_pays_shipping_and_tax() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);

    let totals = *cart.totals();
    assert_eq!(totals.subtotal, 249);
    assert_eq!(totals.discount, 0);
    assert_eq!(totals.shipping, 50);
    assert_eq!(totals.tax, 45);
    assert_eq!(totals.total, 344);
    assert_eq!(totals.total_items, 1);
    assert!(!totals.is_empty);
}

#[test]
fn coupon_discount_can_waive_shipping_threshold_on_post_discount_amount() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    cart.add_item(product("Roasted Almonds", 351), 1, None);
    cart.apply_coupon(welcome10(60));

    let totals = *cart.totals();
    assert_eq!(totals.subtotal, 600);
    assert_eq!(totals.discount, 60);
    assert_eq!(totals.shipping, 0);
    assert_eq!(totals.tax, 97);
    assert_eq!(totals.total, 637);
    assert_eq!(cart.coupon_code(), Some("WELCOME10"));
}

#[test]
fn discount_that_drops_below_threshold_brings_shipping_back() {
    let mut cart = Cart::default();
    cart.add_item(product("Trail Mix", 520), 1, None);
    assert_eq!(cart.totals().shipping, 0);

    cart.apply_coupon(welcome10(52));
    assert_eq!(cart.totals().shipping, 50);
    assert_eq!(cart.totals().total, 468 + 84 + 50);
}

#[test]
fn same_product_and_variant_merges_into_one_line() {
    let mut cart = Cart::default();
    let makhana = product("Classic Makhana", 249);
    let pack = variant("250g", 549);

    let first = cart.add_item(makhana.clone(), 1, Some(pack.clone()));
    let second = cart.add_item(makhana.clone(), 2, Some(pack.clone()));
    assert_eq!(first, second);
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].quantity, 3);

    // Different variant of the same product is its own line.
    cart.add_item(makhana.clone(), 1, Some(variant("100g", 249)));
    // No variant at all is yet another line.
    cart.add_item(makhana, 1, None);
    assert_eq!(cart.items().len(), 3);
    assert_eq!(cart.totals().subtotal, 549 * 3 + 249 + 249);
}

#[test]
fn variant_price_overrides_product_price() {
    let mut cart = Cart::default();
    cart.add_item(product("Peri Peri Makhana", 299), 2, Some(variant("250g", 649)));
    assert_eq!(cart.totals().subtotal, 1298);
    assert_eq!(cart.items()[0].unit_price(), 649);
}

#[test]
fn adding_zero_quantity_is_ignored() {
    let mut cart = Cart::default();
    assert!(cart.add_item(product("Trail Mix", 399), 0, None).is_none());
    assert!(cart.is_empty());
    assert!(cart.totals().is_empty);
}

#[test]
fn non_positive_quantity_update_removes_the_line() {
    for quantity in [0, -1] {
        let mut cart = Cart::default();
        let id = cart
            .add_item(product("Trail Mix", 399), 2, None)
            .expect("line id");
        cart.add_item(product("Roasted Almonds", 351), 1, None);

        assert!(cart.update_quantity(id, quantity));
        assert!(cart.item(id).is_none());
        assert!(cart.items().iter().all(|item| item.quantity >= 1));
        assert_eq!(cart.totals().subtotal, 351);
    }
}

#[test]
fn update_quantity_sets_rather_than_adds() {
    let mut cart = Cart::default();
    let id = cart
        .add_item(product("Trail Mix", 399), 2, None)
        .expect("line id");
    assert!(cart.update_quantity(id, 5));
    assert_eq!(cart.item(id).map(|item| item.quantity), Some(5));
    assert_eq!(cart.totals().total_items, 5);
}

#[test]
fn removing_unknown_item_is_a_noop() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    let before = cart.clone();

    assert!(!cart.remove_item(Uuid::new_v4()));
    assert!(!cart.update_quantity(Uuid::new_v4(), 3));
    assert_eq!(cart, before);
}

#[test]
fn huge_prices_and_quantities_saturate_instead_of_overflowing() {
    let mut cart = Cart::default();
    let id = cart
        .add_item(product("Gold Hamper", i64::MAX / 2), 1, None)
        .expect("line id");
    cart.add_item(product("Silver Hamper", i64::MAX / 2), 1, None);
    assert!(cart.update_quantity(id, i64::from(u32::MAX)));

    let totals = *cart.totals();
    assert_eq!(cart.item(id).expect("line").line_total(), i64::MAX);
    assert_eq!(totals.subtotal, i64::MAX);
    assert_eq!(totals.shipping, 0);
    assert_eq!(totals.total, i64::MAX);
}

#[test]
fn calculate_totals_is_idempotent() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 3, None);
    cart.add_item(product("Roasted Almonds", 351), 1, Some(variant("500g", 699)));
    cart.apply_coupon(welcome10(100));

    let first = *cart.calculate_totals();
    let second = *cart.calculate_totals();
    assert_eq!(first, second);
}

#[test]
fn clear_resets_items_coupon_and_totals() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 4, None);
    cart.apply_coupon(welcome10(99));
    cart.clear();

    assert!(cart.items().is_empty());
    assert!(cart.coupon_code().is_none());
    assert_eq!(*cart.totals(), CartTotals::empty());
    assert!(cart.totals().is_empty);
    assert_eq!(cart.totals().total, 0);
}

#[test]
fn removing_coupon_restores_undiscounted_totals() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    let plain = *cart.totals();

    cart.apply_coupon(welcome10(20));
    assert_ne!(*cart.totals(), plain);

    let removed = cart.remove_coupon();
    assert_eq!(removed.map(|c| c.code), Some("WELCOME10".to_string()));
    assert_eq!(*cart.totals(), plain);
}

#[test]
fn oversized_discount_is_clamped_to_subtotal() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    cart.apply_coupon(welcome10(10_000));

    let totals = *cart.totals();
    assert_eq!(totals.discount, 249);
    assert_eq!(totals.tax, 0);
    assert!(totals.total >= 0);
    assert_eq!(totals.total, totals.shipping);
}

#[test]
fn free_shipping_coupon_waives_shipping_only() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    cart.apply_coupon(AppliedCoupon {
        code: "FREESHIP".into(),
        discount: 0,
        free_shipping: true,
    });

    let totals = *cart.totals();
    assert_eq!(totals.shipping, 0);
    assert_eq!(totals.tax, 45);
    assert_eq!(totals.total, 294);
}

#[test]
fn shipping_grows_with_items_up_to_the_ceiling() {
    let mut cart = Cart::default();
    let id = cart
        .add_item(product("Sample Pack", 10), 3, None)
        .expect("line id");
    assert_eq!(cart.totals().shipping, 75);

    cart.update_quantity(id, 40);
    assert_eq!(cart.totals().subtotal, 400);
    assert_eq!(cart.totals().shipping, 150);
}

#[test]
fn custom_rules_are_honoured() {
    let rules = PricingRules {
        free_shipping_threshold: 1_000,
        shipping_per_item: 40,
        shipping_floor: 40,
        shipping_ceiling: 200,
        tax_rate_percent: 5,
    };
    let mut cart = Cart::new(rules);
    cart.add_item(product("Trail Mix", 399), 2, None);

    let totals = *cart.totals();
    assert_eq!(totals.shipping, 80);
    assert_eq!(totals.tax, 40);
    assert_eq!(totals.total, 798 + 40 + 80);
}

#[test]
fn subtotal_always_matches_lines_after_random_mutations() {
    let catalog: Vec<ProductRef> = [249, 299, 351, 399, 549, 649]
        .iter()
        .enumerate()
        .map(|(i, price)| product(&format!("Product {i}"), *price))
        .collect();

    let mut cart = Cart::default();
    // Small LCG so the sequence is deterministic.
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as usize
    };

    for _ in 0..500 {
        match next() % 4 {
            0 | 1 => {
                let p = catalog[next() % catalog.len()].clone();
                cart.add_item(p, (next() % 4) as u32, None);
            }
            2 if !cart.items().is_empty() => {
                let id = cart.items()[next() % cart.items().len()].id;
                cart.update_quantity(id, (next() % 7) as i64 - 2);
            }
            _ if !cart.items().is_empty() => {
                let id = cart.items()[next() % cart.items().len()].id;
                cart.remove_item(id);
            }
            _ => {}
        }

        let expected: i64 = cart
            .items()
            .iter()
            .map(|item| item.unit_price() * i64::from(item.quantity))
            .sum();
        assert_eq!(cart.totals().subtotal, expected);
        assert!(cart.items().iter().all(|item| item.quantity >= 1));
        assert!(cart.totals().discount <= cart.totals().subtotal);
        assert!(cart.totals().total >= 0);
    }
}

#[test]
fn rehydrated_cart_recomputes_stale_totals_and_drops_empty_lines() {
    let mut cart = Cart::default();
    cart.add_item(product("Classic Makhana", 249), 1, None);
    cart.add_item(product("Roasted Almonds", 351), 1, None);
    cart.apply_coupon(welcome10(60));
    let expected = *cart.totals();

    let mut persisted = cart.to_persisted();
    persisted.totals.total = 1;
    persisted.totals.subtotal = 99_999;
    let mut ghost = persisted.items[0].clone();
    ghost.id = Uuid::new_v4();
    ghost.product.id = Uuid::new_v4();
    ghost.quantity = 0;
    persisted.items.push(ghost);

    let restored = Cart::from_persisted(persisted, PricingRules::default());
    assert_eq!(*restored.totals(), expected);
    assert_eq!(restored.items().len(), 2);
    assert_eq!(restored.coupon_code(), Some("WELCOME10"));
}

#[test]
fn persisted_cart_round_trips_through_json() {
    let mut cart = Cart::default();
    cart.add_item(product("Peri Peri Makhana", 299), 2, Some(variant("100g", 299)));

    let json = serde_json::to_value(cart.to_persisted()).expect("serialize");
    let back: PersistedCart = serde_json::from_value(json).expect("deserialize");
    let restored = Cart::from_persisted(back, PricingRules::default());
    assert_eq!(restored, cart);
}
