use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use super::{
    coupon::{CouponValidator, normalize_code},
    engine::Cart,
    models::{CartSnapshot, PersistedCart, ProductRef, VariantRef},
    pricing::PricingRules,
    storage::CartStorage,
};

/// How many times a coupon is re-validated when the cart keeps changing
/// underneath an in-flight validation.
const MAX_COUPON_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    CouponRejected(String),

    #[error("cart changed while coupon {code} was being validated")]
    StaleCoupon { code: String },

    #[error("coupon validation failed")]
    Validator(#[source] anyhow::Error),
}

struct Inner {
    cart: Cart,
    revision: u64,
}

/// Single owner's cart: every mutation runs under one lock, is persisted,
/// and is then published to subscribers.
pub struct CartStore {
    key: String,
    inner: Mutex<Inner>,
    storage: Arc<dyn CartStorage>,
    updates: watch::Sender<CartSnapshot>,
}

impl CartStore {
    pub fn new(key: impl Into<String>, cart: Cart, storage: Arc<dyn CartStorage>) -> Self {
        let (updates, _) = watch::channel(cart.snapshot(0));
        Self {
            key: key.into(),
            inner: Mutex::new(Inner { cart, revision: 0 }),
            storage,
            updates,
        }
    }

    /// Rehydrate the cart stored under `key`, recomputing its totals.
    ///
    /// Missing state yields an empty cart. Undecodable state is logged and
    /// also yields an empty cart; the bad document is overwritten on the next
    /// mutation.
    pub async fn load(
        key: impl Into<String>,
        storage: Arc<dyn CartStorage>,
        rules: PricingRules,
    ) -> anyhow::Result<Self> {
        let key = key.into();
        let cart = match storage.load(&key).await? {
            Some(document) => match serde_json::from_value::<PersistedCart>(document) {
                Ok(persisted) => Cart::from_persisted(persisted, rules),
                Err(err) => {
                    tracing::warn!(cart = %key, error = %err, "discarding unreadable cart state");
                    Cart::new(rules)
                }
            },
            None => Cart::new(rules),
        };
        tracing::debug!(cart = %key, items = cart.items().len(), "cart loaded");
        Ok(Self::new(key, cart, storage))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Latest published state. Never waits on a mutation in progress.
    pub fn snapshot(&self) -> CartSnapshot {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.updates.subscribe()
    }

    pub async fn add_item(
        &self,
        product: ProductRef,
        quantity: u32,
        variant: Option<VariantRef>,
    ) -> (Option<Uuid>, CartSnapshot) {
        self.mutate("add_item", |cart| cart.add_item(product, quantity, variant))
            .await
    }

    pub async fn remove_item(&self, item_id: Uuid) -> (bool, CartSnapshot) {
        self.mutate("remove_item", |cart| cart.remove_item(item_id))
            .await
    }

    pub async fn update_quantity(&self, item_id: Uuid, quantity: i64) -> (bool, CartSnapshot) {
        self.mutate("update_quantity", |cart| {
            cart.update_quantity(item_id, quantity)
        })
        .await
    }

    pub async fn clear(&self) -> CartSnapshot {
        self.mutate("clear", Cart::clear).await.1
    }

    /// Clear the cart only if nothing changed since `revision` was observed.
    pub async fn clear_if_unchanged(&self, revision: u64) -> Option<CartSnapshot> {
        let mut inner = self.inner.lock().await;
        if inner.revision != revision {
            tracing::warn!(
                cart = %self.key,
                expected = revision,
                actual = inner.revision,
                "cart changed since it was read; leaving it in place"
            );
            return None;
        }
        inner.cart.clear();
        Some(self.commit(&mut inner, "clear").await)
    }

    pub async fn remove_coupon(&self) -> CartSnapshot {
        self.mutate("remove_coupon", Cart::remove_coupon).await.1
    }

    /// Validate `code` against the current subtotal and apply it.
    ///
    /// The lock is released while the validator runs, so readers and other
    /// mutators are never blocked on it. A verdict computed for a revision that
    /// is no longer current is thrown away and the code is validated again.
    /// On any error the cart is left exactly as it was.
    pub async fn apply_coupon(
        &self,
        code: &str,
        validator: &dyn CouponValidator,
    ) -> Result<CartSnapshot, CartError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CartError::CouponRejected(
                "Coupon code is required".to_string(),
            ));
        }

        for attempt in 1..=MAX_COUPON_ATTEMPTS {
            let (subtotal, revision) = {
                let inner = self.inner.lock().await;
                (inner.cart.totals().subtotal, inner.revision)
            };

            let verdict = validator
                .validate(&code, subtotal)
                .await
                .map_err(CartError::Validator)?;
            let validation = match verdict {
                Ok(validation) => validation,
                Err(rejection) => {
                    tracing::debug!(cart = %self.key, code = %code, reason = %rejection.reason, "coupon rejected");
                    return Err(CartError::CouponRejected(rejection.reason));
                }
            };

            let mut inner = self.inner.lock().await;
            if inner.revision != revision {
                tracing::debug!(cart = %self.key, code = %code, attempt, "coupon verdict is stale, revalidating");
                continue;
            }

            inner.cart.apply_coupon(validation.into_applied());
            return Ok(self.commit(&mut inner, "apply_coupon").await);
        }

        Err(CartError::StaleCoupon { code })
    }

    async fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Cart) -> R) -> (R, CartSnapshot) {
        let mut inner = self.inner.lock().await;
        let out = f(&mut inner.cart);
        let snapshot = self.commit(&mut inner, op).await;
        (out, snapshot)
    }

    /// Bump the revision, write the cart through and publish it. Runs with the
    /// lock held so storage sees writes in mutation order.
    async fn commit(&self, inner: &mut Inner, op: &'static str) -> CartSnapshot {
        inner.revision += 1;
        let snapshot = inner.cart.snapshot(inner.revision);

        if let Err(err) = self.storage.save(&self.key, &inner.cart.to_persisted()).await {
            tracing::warn!(cart = %self.key, op, error = %err, "cart persist failed");
        }

        tracing::debug!(
            cart = %self.key,
            op,
            revision = snapshot.revision,
            total = snapshot.totals.total,
            "cart updated"
        );
        self.updates.send_replace(snapshot.clone());
        snapshot
    }
}
