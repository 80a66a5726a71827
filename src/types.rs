//! Shared types for the OFFERDESK engine.
//!
//! These types form the data model used across all modules: raw items and
//! offers as delivered by the trade service, marketplace listings, currency
//! totals and the decision values produced by the lifecycle controller.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Game constants
// ---------------------------------------------------------------------------

/// App id of the only game economy the engine understands.
pub const TF2_APP_ID: u32 = 440;

/// Market name of the premium currency item.
pub const KEY_NAME: &str = "Mann Co. Supply Crate Key";

/// Name colour carried by unique-quality items.
pub const UNIQUE_COLOR: &str = "7D6D00";

pub const QUALITY_UNUSUAL: u32 = 5;
pub const QUALITY_STRANGE: u32 = 11;
pub const QUALITY_DECORATED: u32 = 15;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One description line shown under an item in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub value: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Typed inventory tag, e.g. category `Type`, name `Primary weapon`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub category: String,
    pub name: String,
}

/// Game-specific metadata. Absent when the inventory service raced us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub def_index: Option<u32>,
    /// Normal-quality items carry no quality; treated as 0.
    #[serde(default)]
    pub quality: Option<u32>,
}

/// An item as delivered by the inventory/trade service.
///
/// Immutable snapshot; the classifier derives tags without touching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub app_id: u32,
    #[serde(default = "default_context_id")]
    pub context_id: String,
    pub asset_id: String,
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    pub market_hash_name: String,
    #[serde(default)]
    pub name_color: Option<String>,
    #[serde(default = "default_true")]
    pub tradable: bool,
    #[serde(default)]
    pub marketable: bool,
    #[serde(default)]
    pub descriptions: Vec<Description>,
    #[serde(default)]
    pub tags: Vec<ItemTag>,
    #[serde(default)]
    pub app_data: Option<AppData>,
}

fn default_context_id() -> String {
    "2".to_string()
}

fn default_amount() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Item {
    /// A tradable, non-marketable item with no colour, tags or metadata.
    pub fn new(app_id: u32, asset_id: impl Into<String>, market_hash_name: impl Into<String>) -> Self {
        Self {
            app_id,
            context_id: default_context_id(),
            asset_id: asset_id.into(),
            class_id: String::new(),
            instance_id: "0".to_string(),
            amount: 1,
            market_hash_name: market_hash_name.into(),
            name_color: None,
            tradable: true,
            marketable: false,
            descriptions: Vec::new(),
            tags: Vec::new(),
            app_data: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.name_color = Some(UNIQUE_COLOR.to_string());
        self
    }

    pub fn marketable(mut self, marketable: bool) -> Self {
        self.marketable = marketable;
        self
    }

    pub fn with_app_data(mut self, def_index: u32, quality: u32) -> Self {
        self.app_data = Some(AppData {
            def_index: Some(def_index),
            quality: Some(quality),
        });
        self
    }

    pub fn with_description(mut self, value: impl Into<String>) -> Self {
        self.descriptions.push(Description {
            value: value.into(),
            color: None,
        });
        self
    }

    pub fn with_tag(mut self, category: impl Into<String>, name: impl Into<String>) -> Self {
        self.tags.push(ItemTag {
            category: category.into(),
            name: name.into(),
        });
        self
    }

    /// Look up a tag by category.
    pub fn tag(&self, category: &str) -> Option<&ItemTag> {
        self.tags.iter().find(|t| t.category == category)
    }

    /// Identity of the physical item, stable across list filtering.
    pub fn identity(&self) -> ItemIdentity {
        ItemIdentity {
            app_id: self.app_id,
            context_id: self.context_id.clone(),
            asset_id: self.asset_id.clone(),
        }
    }
}

/// Namespace + context + asset id: what makes an item unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemIdentity {
    pub app_id: u32,
    pub context_id: String,
    pub asset_id: String,
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// A keys + metal amount. Metal is measured in refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurrencyTotal {
    #[serde(default)]
    pub keys: Decimal,
    #[serde(default)]
    pub metal: Decimal,
}

impl CurrencyTotal {
    pub const ZERO: CurrencyTotal = CurrencyTotal {
        keys: Decimal::ZERO,
        metal: Decimal::ZERO,
    };

    pub fn new(keys: Decimal, metal: Decimal) -> Self {
        Self { keys, metal }
    }

    /// Snap metal to the nearest whole refined when its fractional part
    /// reaches 0.99 (repeated 1/9 and 1/3 additions leave x.99… behind).
    pub fn normalize(&mut self) {
        if self.metal.fract() >= dec!(0.99) {
            self.metal = self.metal.round();
        }
    }

    /// Total value expressed in keys.
    pub fn value_in_keys(&self, key_price: Decimal) -> Decimal {
        if key_price.is_zero() {
            return self.keys;
        }
        self.keys + self.metal / key_price
    }

    pub fn add(&mut self, other: &CurrencyTotal) {
        self.keys += other.keys;
        self.metal += other.metal;
    }

    pub fn is_zero(&self) -> bool {
        self.keys.is_zero() && self.metal.is_zero()
    }
}

impl fmt::Display for CurrencyTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.keys.is_zero() {
            let keys = format_amount(self.keys);
            let unit = if keys == "1.00" { "key" } else { "keys" };
            parts.push(format!("{keys} {unit}"));
        }
        if !self.metal.is_zero() {
            parts.push(format!("{} ref", format_amount(self.metal)));
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Truncate to two decimals, never rounding up.
pub fn truncate2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Attribute defindex carrying an unusual particle effect id.
pub const ATTR_PARTICLE: u32 = 134;
/// Attribute defindex carrying the killstreak tier.
pub const ATTR_KILLSTREAK_TIER: u32 = 2025;
/// Attribute defindex marking an australium item.
pub const ATTR_AUSTRALIUM: u32 = 2027;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingAttribute {
    pub defindex: u32,
    #[serde(default)]
    pub float_value: Option<f64>,
}

/// The item side of a listing: what it matches against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingItem {
    pub defindex: u32,
    pub quality: u32,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<ListingAttribute>,
    #[serde(default)]
    pub flag_cannot_craft: bool,
    /// Sell listings point at the concrete asset being sold.
    #[serde(default)]
    pub asset_id: Option<String>,
}

impl ListingItem {
    fn attribute(&self, defindex: u32) -> Option<&ListingAttribute> {
        self.attributes.iter().find(|a| a.defindex == defindex)
    }

    /// Required particle effect id; `None` means any effect matches.
    pub fn particle_id(&self) -> Option<u32> {
        self.attribute(ATTR_PARTICLE)
            .and_then(|a| a.float_value)
            .map(|v| v as u32)
            .filter(|id| *id != 0)
    }

    /// Killstreak tier the listing asks for (0 when unrestricted).
    pub fn killstreak_tier(&self) -> u8 {
        if !self.name.contains("Killstreak") {
            return 0;
        }
        self.attribute(ATTR_KILLSTREAK_TIER)
            .and_then(|a| a.float_value)
            .map(|v| v as u8)
            .unwrap_or(0)
    }

    pub fn is_australium(&self) -> bool {
        self.attribute(ATTR_AUSTRALIUM).is_some()
    }
}

/// A standing buy or sell order on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub intent: Intent,
    pub item: ListingItem,
    pub currencies: CurrencyTotal,
    /// Only buyout orders may be filled automatically.
    #[serde(default = "default_true")]
    pub buyout: bool,
    /// Maximum units this listing may fill within one offer.
    #[serde(default)]
    pub stock_limit: Option<u32>,
}

impl Listing {
    pub fn buy(id: impl Into<String>, item: ListingItem, currencies: CurrencyTotal) -> Self {
        Self {
            id: id.into(),
            intent: Intent::Buy,
            item,
            currencies,
            buyout: true,
            stock_limit: None,
        }
    }

    pub fn sell(id: impl Into<String>, item: ListingItem, currencies: CurrencyTotal) -> Self {
        Self {
            id: id.into(),
            intent: Intent::Sell,
            item,
            currencies,
            buyout: true,
            stock_limit: None,
        }
    }
}

/// Low/high community price of a key, in refined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPrice {
    pub low: Decimal,
    pub high: Decimal,
}

impl KeyPrice {
    pub fn average(&self) -> Decimal {
        (self.low + self.high) / dec!(2)
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// Trade-offer states reported by the trade service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferState {
    Active,
    Accepted,
    Declined,
    Canceled,
    InvalidItems,
    InEscrow,
    Other,
}

impl Default for OfferState {
    fn default() -> Self {
        OfferState::Active
    }
}

/// An incoming trade offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    /// 64-bit steam id of the counterparty.
    pub partner: u64,
    /// Items the bot would give away.
    #[serde(default)]
    pub items_to_give: Vec<Item>,
    /// Items the bot would receive.
    #[serde(default)]
    pub items_to_receive: Vec<Item>,
    /// Set by the trade service when item data is missing.
    #[serde(default)]
    pub glitched: bool,
    #[serde(default)]
    pub state: OfferState,
}

impl Offer {
    /// Base-36 uppercase rendering of the offer id, used in log lines.
    pub fn short_id(&self) -> String {
        match self.id.parse::<u64>() {
            Ok(mut n) => {
                if n == 0 {
                    return "0".to_string();
                }
                let mut digits = Vec::new();
                while n > 0 {
                    let d = (n % 36) as u32;
                    digits.push(std::char::from_digit(d, 36).unwrap_or('0').to_ascii_uppercase());
                    n /= 36;
                }
                digits.iter().rev().collect()
            }
            Err(_) => self.id.clone(),
        }
    }

    /// Steam3 rendering of the partner id: `[U:1:<account id>]`.
    pub fn partner_steam3(&self) -> String {
        format!("[U:1:{}]", self.partner & 0xFFFF_FFFF)
    }

    pub fn is_one_sided(&self) -> bool {
        self.items_to_give.is_empty() || self.items_to_receive.is_empty()
    }

    /// Nothing asked, something given.
    pub fn is_gift(&self) -> bool {
        self.items_to_give.is_empty() && !self.items_to_receive.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Terminal decision for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Decline,
    ManualReview,
    AbandonForRecheck,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => write!(f, "ACCEPT"),
            Decision::Decline => write!(f, "DECLINE"),
            Decision::ManualReview => write!(f, "MANUAL REVIEW"),
            Decision::AbandonForRecheck => write!(f, "RECHECK"),
        }
    }
}

/// Why an offer ended where it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reason {
    Owner,
    Gift,
    Glitched,
    OneSided,
    ForeignGame { app_ids: Vec<u32> },
    MissingClassification { asset_id: String },
    Unlisted { asset_id: String, name: String },
    StockLimit { name: String },
    /// Values in keys.
    InsufficientValue { required: Decimal, offered: Decimal },
    /// Values in refined.
    MetalShortfall { required: Decimal, offered: Decimal },
    KeyShortfall { required: Decimal, offered: Decimal },
    Suspicious { signals: Vec<String> },
    Escrow { days: u32 },
    InvalidItems,
    Matched,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Owner => write!(f, "offer from owner"),
            Reason::Gift => write!(f, "gift offer"),
            Reason::Glitched => write!(f, "offer is glitched"),
            Reason::OneSided => write!(f, "one-sided offer"),
            Reason::ForeignGame { app_ids } => write!(f, "contains items from other games {app_ids:?}"),
            Reason::MissingClassification { asset_id } => {
                write!(f, "item {asset_id} is missing app data")
            }
            Reason::Unlisted { asset_id, name } => {
                write!(f, "asks for {name} ({asset_id}) which is not listed for sale")
            }
            Reason::StockLimit { name } => write!(f, "stock limit reached for {name}"),
            Reason::InsufficientValue { required, offered } => {
                write!(f, "not enough value (required = {required}, given = {offered})")
            }
            Reason::MetalShortfall { required, offered } => {
                write!(f, "not enough metal (required = {required}, given = {offered})")
            }
            Reason::KeyShortfall { required, offered } => {
                write!(f, "not enough keys (required = {required}, given = {offered})")
            }
            Reason::Suspicious { signals } => write!(f, "counterparty looks suspicious: {}", signals.join(", ")),
            Reason::Escrow { days } => write!(f, "would incur {days} day(s) of escrow"),
            Reason::InvalidItems => write!(f, "offer items became invalid"),
            Reason::Matched => write!(f, "listings and price matched"),
        }
    }
}

/// Accept dispatch result reported by the trade service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptStatus {
    Accepted,
    /// Accepted but waiting on a mobile confirmation.
    Pending,
}

/// Outcome of evaluating one offer.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub offer_id: String,
    pub decision: Decision,
    pub reason: Reason,
    pub accept_status: Option<AcceptStatus>,
    /// Human-readable asked/offered summary.
    pub summary: String,
    /// Indices into `items_to_receive` bought through buy orders.
    pub bought: Vec<usize>,
    /// Display names subject to the one-unit stock cap.
    pub stock_limit: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

impl Verdict {
    pub fn new(offer_id: &str, decision: Decision, reason: Reason) -> Self {
        Self {
            offer_id: offer_id.to_string(),
            decision,
            reason,
            accept_status: None,
            summary: String::new(),
            bought: Vec::new(),
            stock_limit: Vec::new(),
            decided_at: Utc::now(),
        }
    }

    pub fn confirmation_required(&self) -> bool {
        self.accept_status == Some(AcceptStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for OFFERDESK.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeError {
    #[error("Item {asset_id} is missing classification data")]
    MissingClassification { asset_id: String },

    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Marketplace snapshot unusable: {0}")]
    ConfigurationInvalid(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TradeError {
    pub fn transport(operation: &str, message: impl Into<String>) -> Self {
        TradeError::Transport {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
