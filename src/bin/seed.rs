use namamy_storefront::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm_from_pool(&pool)).await?;

    seed_products(&pool).await?;
    seed_coupons(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (name, slug, description, base price, stock, [(variant, price, stock)])
    let products: Vec<(&str, &str, &str, i64, i32, Vec<(&str, i64, i32)>)> = vec![
        (
            "Classic Makhana",
            "classic-makhana",
            "Roasted fox nuts with Himalayan salt",
            249,
            120,
            vec![("100g", 249, 80), ("250g", 549, 40)],
        ),
        (
            "Peri Peri Makhana",
            "peri-peri-makhana",
            "Fox nuts tossed in peri peri spice",
            299,
            90,
            vec![("100g", 299, 60), ("250g", 649, 30)],
        ),
        (
            "Roasted Almonds",
            "roasted-almonds",
            "Lightly salted California almonds",
            351,
            60,
            Vec::new(),
        ),
        (
            "Trail Mix",
            "trail-mix",
            "Cashews, raisins, cranberries and seeds",
            399,
            45,
            Vec::new(),
        ),
    ];

    for (name, slug, desc, price, stock, variants) in products {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, slug, description, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .fetch_optional(pool)
        .await?;

        // Already seeded: leave its variants alone.
        let Some((product_id,)) = row else {
            continue;
        };

        for (variant, variant_price, variant_stock) in variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, name, price, stock)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(variant)
            .bind(variant_price)
            .bind(variant_stock)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (code, name, type, value, min order, max discount, usage limit)
    let coupons: [(&str, &str, &str, i64, Option<i64>, Option<i64>, Option<i32>); 3] = [
        ("WELCOME10", "10% off your first order", "percentage", 10, Some(500), Some(100), None),
        ("FLAT50", "₹50 off", "fixed", 50, Some(300), None, Some(1000)),
        ("FREESHIP", "Free shipping", "free_shipping", 0, None, None, None),
    ];

    for (code, name, kind, value, min_order, max_discount, usage_limit) in coupons {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, name, discount_type, value, min_order_value, max_discount, usage_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .bind(kind)
        .bind(value)
        .bind(min_order)
        .bind(max_discount)
        .bind(usage_limit)
        .execute(pool)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
