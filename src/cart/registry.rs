use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{pricing::PricingRules, storage::CartStorage, store::CartStore};

/// Whoever a cart belongs to: a signed-in shopper or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

impl CartOwner {
    pub fn storage_key(&self) -> String {
        match self {
            CartOwner::User(id) => format!("user:{id}"),
            CartOwner::Session(id) => format!("session:{id}"),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// How many carts stay in memory, and for how long once nobody uses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub capacity: usize,
    pub idle_ttl: Duration,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            capacity: 4096,
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

struct CachedCart {
    store: Arc<CartStore>,
    last_used: AtomicU64,
}

impl CachedCart {
    fn new(store: Arc<CartStore>, now: u64) -> Self {
        Self {
            store,
            last_used: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_used.store(now, Ordering::Relaxed);
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    // The map's own reference is the only one when no request holds the cart.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.store) > 1
    }
}

/// Live carts by owner, loaded from storage on first use.
///
/// Storage is write-through, so dropping an idle cart loses nothing: the next
/// `open` reloads it and recomputes its totals.
pub struct CartRegistry {
    carts: DashMap<String, CachedCart>,
    storage: Arc<dyn CartStorage>,
    rules: PricingRules,
    limits: CacheLimits,
    epoch: Instant,
}

impl CartRegistry {
    pub fn new(storage: Arc<dyn CartStorage>, rules: PricingRules) -> Self {
        Self {
            carts: DashMap::new(),
            storage,
            rules,
            limits: CacheLimits::default(),
            epoch: Instant::now(),
        }
    }

    pub fn with_limits(mut self, limits: CacheLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn rules(&self) -> &PricingRules {
        &self.rules
    }

    pub async fn open(&self, owner: &CartOwner) -> anyhow::Result<Arc<CartStore>> {
        let key = owner.storage_key();
        let now = self.now();
        if let Some(cached) = self.carts.get(&key) {
            cached.touch(now);
            return Ok(cached.store.clone());
        }

        let loaded = Arc::new(CartStore::load(key.clone(), self.storage.clone(), self.rules).await?);
        // Another request may have loaded the same cart meanwhile; keep the first.
        let store = {
            let cached = self
                .carts
                .entry(key)
                .or_insert_with(|| CachedCart::new(loaded, now));
            cached.touch(now);
            cached.store.clone()
        };

        if self.carts.len() > self.limits.capacity {
            self.sweep();
        }
        Ok(store)
    }

    /// Drop the in-memory copy; the next `open` reloads from storage.
    pub fn evict(&self, owner: &CartOwner) -> bool {
        self.carts.remove(&owner.storage_key()).is_some()
    }

    /// Drop carts idle for longer than the TTL, then the least recently used
    /// ones while the registry is over capacity. Carts held by a request are
    /// never dropped. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.carts.len();
        let now = self.now();
        let ttl = u64::try_from(self.limits.idle_ttl.as_millis()).unwrap_or(u64::MAX);

        self.carts
            .retain(|_, cached| cached.in_use() || now.saturating_sub(cached.last_used()) < ttl);

        if self.carts.len() > self.limits.capacity {
            // Trim below capacity so the next few opens do not sweep again.
            let target = self.limits.capacity - self.limits.capacity / 8;
            let mut idle: Vec<(u64, String)> = self
                .carts
                .iter()
                .filter(|cached| !cached.in_use())
                .map(|cached| (cached.last_used(), cached.key().clone()))
                .collect();
            idle.sort_unstable();

            let excess = self.carts.len().saturating_sub(target);
            for (_, key) in idle.into_iter().take(excess) {
                self.carts.remove_if(&key, |_, cached| !cached.in_use());
            }
        }

        let dropped = before.saturating_sub(self.carts.len());
        if dropped > 0 {
            tracing::debug!(dropped, cached = self.carts.len(), "dropped idle carts");
        }
        dropped
    }

    /// Sweep on a timer so idle carts go even when the registry is below
    /// capacity.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
