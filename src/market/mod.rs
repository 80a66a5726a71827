//! Marketplace snapshot.
//!
//! The marketplace-sync collaborator publishes an immutable
//! `MarketSnapshot`; evaluations take one `Arc` to it at the start and
//! never observe a later swap. `SnapshotStore::replace` is the single
//! pointer swap that publishes a new one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::types::{Intent, KeyPrice, Listing, TradeError};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub buy_listings: Vec<Listing>,
    pub sell_listings: Vec<Listing>,
    pub key_price: KeyPrice,
    #[serde(default)]
    pub etag: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Split raw listings by intent. Only buyout buy orders are kept.
    pub fn from_listings(listings: Vec<Listing>, key_price: KeyPrice, etag: Option<String>) -> Self {
        let (buy, sell): (Vec<Listing>, Vec<Listing>) =
            listings.into_iter().partition(|l| l.intent == Intent::Buy);

        Self {
            buy_listings: buy.into_iter().filter(|l| l.buyout).collect(),
            sell_listings: sell,
            key_price,
            etag,
            fetched_at: Utc::now(),
        }
    }

    /// Average key price in refined, rejecting an unusable one.
    pub fn average_key_price(&self) -> Result<Decimal, TradeError> {
        let average = self.key_price.average();
        if average <= Decimal::ZERO {
            return Err(TradeError::ConfigurationInvalid(format!(
                "key price {average} is not positive"
            )));
        }
        Ok(average)
    }
}

/// Buy-order changes between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotDiff {
    pub added: usize,
    pub removed: usize,
}

impl SnapshotDiff {
    pub fn between(old: &MarketSnapshot, new: &MarketSnapshot) -> Self {
        let old_ids: HashSet<&str> = old.buy_listings.iter().map(|l| l.id.as_str()).collect();
        let new_ids: HashSet<&str> = new.buy_listings.iter().map(|l| l.id.as_str()).collect();
        Self {
            added: new_ids.difference(&old_ids).count(),
            removed: old_ids.difference(&new_ids).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Published {
    snapshot: Arc<MarketSnapshot>,
    /// Bumped on every `replace`.
    generation: u64,
}

pub struct SnapshotStore {
    current: RwLock<Published>,
    credential_refresh: Notify,
}

impl SnapshotStore {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            current: RwLock::new(Published {
                snapshot: Arc::new(snapshot),
                generation: 0,
            }),
            credential_refresh: Notify::new(),
        }
    }

    /// The snapshot every new evaluation should use.
    pub fn current(&self) -> Arc<MarketSnapshot> {
        self.current_with_generation().0
    }

    /// The current snapshot together with its publication generation,
    /// read under one lock.
    pub fn current_with_generation(&self) -> (Arc<MarketSnapshot>, u64) {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&guard.snapshot), guard.generation)
    }

    pub fn generation(&self) -> u64 {
        self.current_with_generation().1
    }

    /// Publish a new snapshot and report the buy-order churn.
    pub fn replace(&self, snapshot: MarketSnapshot) -> SnapshotDiff {
        let next = Arc::new(snapshot);
        let (previous, generation) = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            guard.generation += 1;
            (std::mem::replace(&mut guard.snapshot, Arc::clone(&next)), guard.generation)
        };

        let diff = SnapshotDiff::between(&previous, &next);
        if diff.is_empty() {
            debug!(etag = ?next.etag, generation, "Marketplace snapshot refreshed, no buy order changes");
        } else {
            info!(
                added = diff.added,
                removed = diff.removed,
                etag = ?next.etag,
                generation,
                "Marketplace snapshot refreshed"
            );
        }
        diff
    }

    /// Ask the marketplace-sync collaborator to refresh its credentials.
    pub fn request_credential_refresh(&self, reason: &str) {
        warn!(reason, "Requesting marketplace credential refresh");
        self.credential_refresh.notify_one();
    }

    /// Resolves once a credential refresh has been requested.
    pub async fn credential_refresh_requested(&self) {
        self.credential_refresh.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
