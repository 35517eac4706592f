use std::{env, time::Duration};

use crate::cart::{CacheLimits, PricingRules};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pricing: PricingRules,
    pub cart_cache: CacheLimits,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let pricing = pricing_from_env()?;
        let cart_cache = cart_cache_from_env()?;
        Ok(Self {
            port,
            database_url,
            host,
            pricing,
            cart_cache,
        })
    }
}

/// Pricing overrides; anything unset falls back to the storefront defaults.
fn pricing_from_env() -> anyhow::Result<PricingRules> {
    let defaults = PricingRules::default();
    let rules = PricingRules {
        free_shipping_threshold: amount_var("FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?,
        shipping_per_item: amount_var("SHIPPING_PER_ITEM", defaults.shipping_per_item)?,
        shipping_floor: amount_var("SHIPPING_FLOOR", defaults.shipping_floor)?,
        shipping_ceiling: amount_var("SHIPPING_CEILING", defaults.shipping_ceiling)?,
        tax_rate_percent: amount_var("TAX_RATE_PERCENT", defaults.tax_rate_percent)?,
    };
    rules.validate()?;
    Ok(rules)
}

fn cart_cache_from_env() -> anyhow::Result<CacheLimits> {
    let defaults = CacheLimits::default();
    let capacity = amount_var("CART_CACHE_CAPACITY", defaults.capacity as i64)?;
    let idle_secs = amount_var("CART_IDLE_SECS", defaults.idle_ttl.as_secs() as i64)?;
    if capacity == 0 {
        anyhow::bail!("CART_CACHE_CAPACITY must be at least 1");
    }
    Ok(CacheLimits {
        capacity: usize::try_from(capacity)?,
        idle_ttl: Duration::from_secs(u64::try_from(idle_secs)?),
    })
}

fn amount_var(name: &str, default: i64) -> anyhow::Result<i64> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("{name} must be a whole number: {e}"))?;
            if value < 0 {
                anyhow::bail!("{name} must not be negative");
            }
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}
