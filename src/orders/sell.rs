//! Sell-order validation and the final price check.
//!
//! Whatever the bot gives up after the buy-order pass must be covered by
//! one of its sell listings; those listing prices make up what we ask. The
//! price check then compares the asked value against what the counterparty
//! offers, both expressed in keys.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::currency::{resolve, ExchangeOutcome, ExchangePolicy};
use crate::items::classifier;
use crate::types::{CurrencyTotal, Item, Listing};

/// Below this many keys on both sides, values are compared at 3 decimals.
const CLIP_BELOW_KEYS: Decimal = Decimal::TWO;
const CLIP_DECIMALS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SellRejection {
    #[error("{name} ({asset_id}) is not listed for sale")]
    Unlisted { asset_id: String, name: String },

    #[error("stock limit: {name} appears more than once")]
    StockLimit { name: String },
}

/// Add the sell-listing price of every residual non-currency item we give.
///
/// `residual` holds indices into `given`. An item with no listing carrying
/// its asset id rejects the whole offer.
pub fn price_given_items(
    given: &[Item],
    residual: &[usize],
    sell_listings: &[Listing],
    mut required: CurrencyTotal,
) -> Result<CurrencyTotal, SellRejection> {
    let by_asset: HashMap<&str, &Listing> = sell_listings
        .iter()
        .filter_map(|l| l.item.asset_id.as_deref().map(|id| (id, l)))
        .collect();

    for &i in residual {
        let item = &given[i];
        if classifier::is_key(item) || classifier::is_metal(item) {
            continue;
        }

        let Some(listing) = by_asset.get(item.asset_id.as_str()) else {
            return Err(SellRejection::Unlisted {
                asset_id: item.asset_id.clone(),
                name: classifier::display_name(item),
            });
        };

        debug!(
            listing = %listing.id,
            asset_id = %item.asset_id,
            price = %listing.currencies,
            "Priced item from sell listing"
        );
        required.add(&listing.currencies);
    }

    required.normalize();
    Ok(required)
}

/// Reject when the same display name occurs more than once.
pub fn check_stock_limit(names: &[String]) -> Result<(), SellRejection> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(SellRejection::StockLimit { name: name.clone() });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Price check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PriceCheck {
    /// Value we ask, in keys.
    pub ask: Decimal,
    /// Value offered, in keys.
    pub bid: Decimal,
    pub price_ok: bool,
    pub exchange: ExchangeOutcome,
    pub required: CurrencyTotal,
    /// Offered totals after exchange resolution.
    pub offered: CurrencyTotal,
}

fn clip(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CLIP_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolve currencies, then compare asked and offered value in keys.
pub fn check_price(
    required: CurrencyTotal,
    mut offered: CurrencyTotal,
    key_price: Decimal,
    policy: ExchangePolicy,
) -> PriceCheck {
    let exchange = resolve(&required, &mut offered, key_price, policy);

    let mut ask = required.value_in_keys(key_price);
    let mut bid = offered.value_in_keys(key_price);

    if required.keys < CLIP_BELOW_KEYS && offered.keys < CLIP_BELOW_KEYS {
        ask = clip(ask);
        bid = clip(bid);
    }

    PriceCheck {
        ask,
        bid,
        price_ok: bid >= ask,
        exchange,
        required,
        offered,
    }
}
