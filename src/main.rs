use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use namamy_storefront::{
    cart::{CartRegistry, PgCartStorage},
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    routes::build_app,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,namamy_storefront=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    let orm = orm_from_pool(&pool);

    run_migrations(&orm).await?;

    let storage = Arc::new(PgCartStorage::new(pool.clone()));
    let carts = Arc::new(CartRegistry::new(storage, config.pricing).with_limits(config.cart_cache));
    carts
        .clone()
        .spawn_sweeper((config.cart_cache.idle_ttl / 4).max(Duration::from_secs(1)));
    let state = AppState { pool, orm, carts };
    tracing::info!(pricing = ?config.pricing, cart_cache = ?config.cart_cache, "cart pricing rules loaded");

    let app = build_app(state);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!(%addr, "namamy storefront listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
