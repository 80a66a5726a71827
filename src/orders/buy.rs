//! Buy-order matcher.
//!
//! Pairs the items a counterparty hands over with our standing buy
//! listings. Each purchase is credited to the counterparty's offered
//! currency, may consume keys on our side, and is recorded in the
//! per-offer purchase ledger.
//!
//! Unusual-quality items can satisfy several price tiers at once, so they
//! are collected during the main pass and settled afterwards, preferring
//! the listing that names the item's exact particle effect.

use rust_decimal::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::items::classifier::{self, UNITS_PER_REFINED};
use crate::items::tags::{index_items, MatchTag, MissingClassification};
use crate::types::{CurrencyTotal, Item, ItemIdentity, Listing, KEY_NAME, QUALITY_UNUSUAL};

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// What the buy-order pass consumed and what is left for the sell pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyPass {
    /// Received-side indices bought through listings, in purchase order.
    pub bought: Vec<usize>,
    /// Given-side key indices spent on purchases.
    pub ignored_given: Vec<usize>,
    /// Display names of everything bought (one per purchase).
    pub purchased_names: Vec<String>,
    /// Given-side indices still to be explained by sell listings.
    pub residual_given: Vec<usize>,
    /// Received-side indices not bought, original order.
    pub residual_received: Vec<usize>,
    /// Counterparty's currency after crediting purchases.
    pub offered: CurrencyTotal,
}

impl BuyPass {
    /// No buy orders to apply: everything is residual.
    pub fn passthrough(given: &[Item], received: &[Item], offered: CurrencyTotal) -> Self {
        Self {
            bought: Vec::new(),
            ignored_given: Vec::new(),
            purchased_names: Vec::new(),
            residual_given: (0..given.len()).collect(),
            residual_received: (0..received.len()).collect(),
            offered,
        }
    }
}

// ---------------------------------------------------------------------------
// Deferred unusual candidates
// ---------------------------------------------------------------------------

struct DeferredMatch<'a> {
    index: usize,
    item: &'a Item,
    candidates: Vec<&'a Listing>,
}

/// Collects unusual candidates keyed by item identity, in first-seen order.
#[derive(Default)]
struct DeferredUnusuals<'a> {
    slots: HashMap<ItemIdentity, usize>,
    entries: Vec<DeferredMatch<'a>>,
}

impl<'a> DeferredUnusuals<'a> {
    fn push(&mut self, index: usize, item: &'a Item, listing: &'a Listing) {
        let slot = *self.slots.entry(item.identity()).or_insert_with(|| {
            self.entries.push(DeferredMatch {
                index,
                item,
                candidates: Vec::new(),
            });
            self.entries.len() - 1
        });
        self.entries[slot].candidates.push(listing);
    }
}

/// Whether a listing asks for exactly this item's particle effect.
fn particle_matches(item: &Item, listing: &Listing) -> bool {
    classifier::particle_effect(item).is_some() && classifier::display_name(item) == listing.item.name
}

/// First listing naming the exact particle, else the first without a
/// particle restriction. Listings `available` rejects are passed over.
fn pick_unusual_listing<'a>(entry: &DeferredMatch<'a>, available: impl Fn(&Listing) -> bool) -> Option<&'a Listing> {
    let available = &available;
    let open = move || entry.candidates.iter().copied().filter(move |&listing| available(listing));
    open()
        .find(|listing| particle_matches(entry.item, listing))
        .or_else(|| open().find(|listing| listing.item.particle_id().is_none()))
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

struct Matcher<'a> {
    given: &'a [Item],
    received: &'a [Item],
    include_weapons: bool,
    offered: CurrencyTotal,
    given_consumed: Vec<bool>,
    received_consumed: Vec<bool>,
    bought: Vec<usize>,
    ignored_given: Vec<usize>,
    purchased_names: Vec<String>,
    fills: HashMap<&'a str, u32>,
}

impl<'a> Matcher<'a> {
    fn new(given: &'a [Item], received: &'a [Item], offered: CurrencyTotal, include_weapons: bool) -> Self {
        Self {
            given,
            received,
            include_weapons,
            offered,
            given_consumed: vec![false; given.len()],
            received_consumed: vec![false; received.len()],
            bought: Vec::new(),
            ignored_given: Vec::new(),
            purchased_names: Vec::new(),
            fills: HashMap::new(),
        }
    }

    fn listing_exhausted(&self, listing: &Listing) -> bool {
        match listing.stock_limit {
            Some(limit) => self.fills.get(listing.id.as_str()).copied().unwrap_or(0) >= limit,
            None => false,
        }
    }

    fn buy(&mut self, index: usize, listing: &'a Listing) {
        let received = self.received;
        let item = &received[index];

        // An individually priced craft weapon no longer counts as scrap.
        if self.include_weapons && classifier::is_craft_weapon(item) {
            self.offered.metal -= Decimal::ONE / Decimal::from(UNITS_PER_REFINED);
        }

        self.offered.add(&listing.currencies);

        if listing.currencies.keys > Decimal::ZERO {
            let mut owed = listing.currencies.keys.ceil().to_usize().unwrap_or(0);
            for (i, given_item) in self.given.iter().enumerate() {
                if owed == 0 {
                    break;
                }
                if !self.given_consumed[i] && classifier::is_key(given_item) {
                    self.given_consumed[i] = true;
                    self.ignored_given.push(i);
                    owed -= 1;
                }
            }
        }

        let name = classifier::display_name(item);
        debug!(
            listing = %listing.id,
            index,
            item = %name,
            price = %listing.currencies,
            "Bought item through buy order"
        );

        self.purchased_names.push(name);
        self.received_consumed[index] = true;
        self.bought.push(index);
        *self.fills.entry(listing.id.as_str()).or_insert(0) += 1;
    }

    fn finish(mut self) -> BuyPass {
        self.offered.normalize();

        let residual_given = (0..self.given.len()).filter(|i| !self.given_consumed[*i]).collect();
        let residual_received = (0..self.received.len())
            .filter(|i| !self.received_consumed[*i])
            .collect();

        BuyPass {
            bought: self.bought,
            ignored_given: self.ignored_given,
            purchased_names: self.purchased_names,
            residual_given,
            residual_received,
            offered: self.offered,
        }
    }
}

/// Match received items against buy listings.
///
/// Returns `MissingClassification` when a received non-currency item has no
/// app data yet; the caller should recheck the offer later.
pub fn match_buy_orders(
    given: &[Item],
    received: &[Item],
    listings: &[Listing],
    offered: CurrencyTotal,
    include_weapons: bool,
) -> Result<BuyPass, MissingClassification> {
    if listings.is_empty() {
        return Ok(BuyPass::passthrough(given, received, offered));
    }

    let index = index_items(received)?;
    let mut matcher = Matcher::new(given, received, offered, include_weapons);
    let mut unusuals = DeferredUnusuals::default();

    for listing in listings {
        // Keys are currency; pricing them against themselves is circular.
        if listing.item.name == KEY_NAME {
            continue;
        }

        let tag = MatchTag::for_listing(&listing.item);
        let Some(indices) = index.get(&tag) else {
            continue;
        };

        for &i in indices {
            if matcher.received_consumed[i] {
                continue;
            }
            let item = &received[i];

            if listing.item.quality == QUALITY_UNUSUAL {
                unusuals.push(i, item, listing);
                continue;
            }

            if listing.item.flag_cannot_craft != classifier::is_uncraftable(item) {
                continue;
            }
            if listing.item.killstreak_tier() != classifier::killstreak_tier(item) {
                continue;
            }
            if matcher.listing_exhausted(listing) {
                break;
            }

            matcher.buy(i, listing);
        }
    }

    for entry in &unusuals.entries {
        if matcher.received_consumed[entry.index] {
            continue;
        }
        let Some(listing) = pick_unusual_listing(entry, |l| !matcher.listing_exhausted(l)) else {
            debug!(item = %entry.item.market_hash_name, "No open unusual listing matched particle effect");
            continue;
        };
        matcher.buy(entry.index, listing);
    }

    Ok(matcher.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
