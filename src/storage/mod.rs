//! Replay inputs and outputs.
//!
//! Loads a marketplace snapshot and a batch of offers from JSON files, and
//! writes the resulting verdicts back out. The engine itself owns no
//! on-disk format; these files only feed the replay runner.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::market::MarketSnapshot;
use crate::types::{KeyPrice, Listing, Offer, Verdict};

/// On-disk snapshot: raw listings as the marketplace returns them.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub listings: Vec<Listing>,
    pub key_price: KeyPrice,
    #[serde(default)]
    pub etag: Option<String>,
}

/// Load a marketplace snapshot, keeping only buyout buy orders.
pub fn load_snapshot(path: &str) -> Result<MarketSnapshot> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let file: SnapshotFile = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    let snapshot = MarketSnapshot::from_listings(file.listings, file.key_price, file.etag);
    info!(
        path,
        buy_listings = snapshot.buy_listings.len(),
        sell_listings = snapshot.sell_listings.len(),
        "Snapshot loaded from disk"
    );
    Ok(snapshot)
}

/// Load a batch of offers. A missing file is an empty batch.
pub fn load_offers(path: &str) -> Result<Vec<Offer>> {
    if !Path::new(path).exists() {
        info!(path, "No offers file found, nothing to replay");
        return Ok(Vec::new());
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read offers from {path}"))?;

    let offers: Vec<Offer> = serde_json::from_str(&json)
        .context(format!("Failed to parse offers from {path}"))?;

    info!(path, count = offers.len(), "Offers loaded from disk");
    Ok(offers)
}

/// Write verdicts as pretty JSON.
pub fn save_verdicts(verdicts: &[Verdict], path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(verdicts)
        .context("Failed to serialise verdicts")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write verdicts to {path}"))?;

    debug!(path, count = verdicts.len(), "Verdicts saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
