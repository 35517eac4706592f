use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::models::PersistedCart;
use crate::db::DbPool;

/// Durable home for cart state, keyed by owner.
///
/// `load` hands back the raw document so the store can decide what to do with
/// state it cannot decode.
#[async_trait]
pub trait CartStorage: Send + Sync {
    async fn load(&self, key: &str) -> anyhow::Result<Option<Value>>;
    async fn save(&self, key: &str, cart: &PersistedCart) -> anyhow::Result<()>;
}

/// Postgres-backed storage in the `carts` table.
pub struct PgCartStorage {
    pool: DbPool,
}

impl PgCartStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStorage for PgCartStorage {
    async fn load(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT state FROM carts WHERE owner_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(state,)| state))
    }

    async fn save(&self, key: &str, cart: &PersistedCart) -> anyhow::Result<()> {
        let state = serde_json::to_value(cart)?;
        sqlx::query(
            r#"
            INSERT INTO carts (owner_key, state, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (owner_key)
            DO UPDATE SET state = EXCLUDED.state, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local storage, used when no database is wired in and by tests.
#[derive(Default)]
pub struct MemoryCartStorage {
    documents: DashMap<String, Value>,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an arbitrary document under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: impl Into<String>, document: Value) {
        self.documents.insert(key.into(), document);
    }

    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.documents.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl CartStorage for MemoryCartStorage {
    async fn load(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.get_raw(key))
    }

    async fn save(&self, key: &str, cart: &PersistedCart) -> anyhow::Result<()> {
        self.documents
            .insert(key.to_string(), serde_json::to_value(cart)?);
        Ok(())
    }
}
