use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::Result;
use autoscale_cuckoo_filter::CuckooFilter;
use chrono::Utc;
use moka::future::Cache;
use tracing::info;

use crate::store::Store;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86_400);

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// In-memory accelerator for "is this username taken?".
///
/// The cuckoo filter answers "definitely free" without touching the store; the
/// moka cache answers "definitely taken" for recently seen names. Anything else
/// falls through to the store, which stays authoritative.
pub struct UsernameIndex {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, bool>,
}

impl Default for UsernameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameIndex {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CuckooFilter<String>> {
        self.filter.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CuckooFilter<String>> {
        self.filter.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if a username might exist (false positives possible)
    pub fn might_exist(&self, username: &str) -> bool {
        self.read().contains(&normalize(username))
    }

    /// Record a username that now belongs to an account.
    pub async fn mark_taken(&self, username: &str) {
        let username = normalize(username);
        self.write().add(&username);
        self.taken.insert(username, true).await;
    }

    /// Forget a username that was renamed away.
    pub async fn release(&self, username: &str) {
        let username = normalize(username);
        self.write().remove(&username);
        self.taken.invalidate(&username).await;
    }

    /// true => username AVAILABLE, false => TAKEN
    pub async fn is_available(&self, username: &str, store: &dyn Store) -> bool {
        let username = normalize(username);

        // 1. cuckoo filter: fast negative
        if !self.read().contains(&username) {
            return true;
        }

        // 2. moka cache: fast positive
        if self.taken.get(&username).await.unwrap_or(false) {
            return false;
        }

        // 3. store fallback
        match store.username_exists(&username).await {
            Ok(true) => {
                self.taken.insert(username, true).await;
                false
            }
            Ok(false) => true,
            // fail-safe: treat as taken, the insert would hit the unique key anyway
            Err(e) => {
                tracing::warn!(error = %e, "Username lookup failed");
                false
            }
        }
    }

    /// Loads every username into the filter and recent logins into the cache.
    pub async fn warmup(&self, store: &dyn Store, recent_days: i64) -> Result<()> {
        let all = store.all_usernames().await?;
        {
            let mut filter = self.write();
            for username in &all {
                filter.add(username);
            }
        }

        let since = Utc::now() - chrono::Duration::days(recent_days);
        let recent = store.recent_usernames(since).await?;
        let inserts: Vec<_> = recent
            .iter()
            .map(|u| self.taken.insert(u.clone(), true))
            .collect();
        futures::future::join_all(inserts).await;

        info!(
            total = all.len(),
            recent = recent.len(),
            days = recent_days,
            "Username index warmup complete"
        );
        Ok(())
    }
}
