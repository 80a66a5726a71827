//! Item classifier.
//!
//! Every function here is total over an `Item`: missing descriptions, tags
//! or colours yield the neutral answer instead of an error. Nothing mutates
//! the item; derived data comes back in a `Classification`.

use crate::types::{Item, KEY_NAME, UNIQUE_COLOR};

// ---------------------------------------------------------------------------
// Fixed vocabulary
// ---------------------------------------------------------------------------

const SCRAP: &str = "Scrap Metal";
const RECLAIMED: &str = "Reclaimed Metal";
const REFINED: &str = "Refined Metal";

/// Metal values in eighteenths of a refined.
const SCRAP_UNITS: u32 = 2;
const RECLAIMED_UNITS: u32 = 6;
const REFINED_UNITS: u32 = 18;
const CRAFT_WEAPON_UNITS: u32 = 1;

/// Eighteenths per refined.
pub const UNITS_PER_REFINED: u32 = 18;

const UNCRAFTABLE_LINE: &str = "( Not Usable in Crafting )";
const UNCRAFTABLE_PREFIX: &str = "Non-Craftable ";
const PARTICLE_PREFIX: &str = "★ Unusual Effect: ";

const WEAPON_TYPES: [&str; 5] = [
    "primary weapon",
    "secondary weapon",
    "melee weapon",
    "primary pda",
    "secondary pda",
];

const WEAR_GRADES: [&str; 5] = [
    "Factory New",
    "Minimal Wear",
    "Field-Tested",
    "Well-Worn",
    "Battle Scarred",
];

// ---------------------------------------------------------------------------
// Classification result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Key,
    Metal,
}

/// Read-only tags derived from one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub currency: Option<CurrencyKind>,
    pub craft_weapon: bool,
    pub killstreak_tier: u8,
    pub particle_effect: Option<String>,
    pub australium: bool,
    pub uncraftable: bool,
    pub decorated_skin: bool,
    /// Canonical name used for matching and de-duplication.
    pub display_name: String,
}

impl Classification {
    pub fn is_currency(&self) -> bool {
        self.currency.is_some()
    }
}

/// Derive every tag for an item.
pub fn classify(item: &Item) -> Classification {
    let currency = if is_key(item) {
        Some(CurrencyKind::Key)
    } else if is_metal(item) {
        Some(CurrencyKind::Metal)
    } else {
        None
    };

    Classification {
        currency,
        craft_weapon: is_craft_weapon(item),
        killstreak_tier: killstreak_tier(item),
        particle_effect: particle_effect(item).map(str::to_string),
        australium: is_australium(item),
        uncraftable: is_uncraftable(item),
        decorated_skin: is_decorated_skin(item),
        display_name: display_name(item),
    }
}

// ---------------------------------------------------------------------------
// Individual predicates
// ---------------------------------------------------------------------------

pub fn is_unique(item: &Item) -> bool {
    item.name_color
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(UNIQUE_COLOR))
}

pub fn is_key(item: &Item) -> bool {
    item.market_hash_name == KEY_NAME && is_unique(item)
}

pub fn is_metal(item: &Item) -> bool {
    matches!(item.market_hash_name.as_str(), SCRAP | RECLAIMED | REFINED) && is_unique(item)
}

/// Metal value of an item in eighteenths of a refined.
///
/// Craft weapons count for one eighteenth, but only with `include_weapons`.
pub fn metal_units(item: &Item, include_weapons: bool) -> u32 {
    if is_metal(item) {
        return match item.market_hash_name.as_str() {
            SCRAP => SCRAP_UNITS,
            RECLAIMED => RECLAIMED_UNITS,
            REFINED => REFINED_UNITS,
            _ => 0,
        };
    }
    if include_weapons && is_craft_weapon(item) {
        return CRAFT_WEAPON_UNITS;
    }
    0
}

/// A weapon with no market identity of its own, usable as crafting fodder.
pub fn is_craft_weapon(item: &Item) -> bool {
    if item.marketable || !is_unique(item) {
        return false;
    }

    let Some(kind) = item.tag("Type") else {
        return false;
    };

    let name = &item.market_hash_name;
    if name.contains("Class Token") || name.contains("Slot Token") {
        return false;
    }
    if !is_uncraftable(item) {
        return false;
    }

    let kind = kind.name.to_lowercase();
    WEAPON_TYPES.contains(&kind.as_str())
}

fn has_description(item: &Item, line: &str) -> bool {
    item.descriptions.iter().any(|d| d.value == line)
}

fn has_description_prefix(item: &Item, prefix: &str) -> bool {
    item.descriptions.iter().any(|d| d.value.starts_with(prefix))
}

/// 3 = professional, 2 = specialized, 1 = basic, 0 = none.
pub fn killstreak_tier(item: &Item) -> u8 {
    if has_description_prefix(item, "Killstreaker:") {
        3
    } else if has_description_prefix(item, "Sheen:") {
        2
    } else if has_description(item, "Killstreaks Active") {
        1
    } else {
        0
    }
}

pub fn particle_effect(item: &Item) -> Option<&str> {
    item.descriptions
        .iter()
        .find_map(|d| d.value.strip_prefix(PARTICLE_PREFIX))
        .filter(|effect| !effect.is_empty())
}

pub fn is_australium(item: &Item) -> bool {
    let name = &item.market_hash_name;
    name.starts_with("Strange") && name.contains("Australium")
}

pub fn is_uncraftable(item: &Item) -> bool {
    has_description(item, UNCRAFTABLE_LINE)
}

pub fn is_decorated_skin(item: &Item) -> bool {
    WEAR_GRADES.iter().any(|grade| item.market_hash_name.contains(grade))
}

/// Canonical marketplace name.
///
/// The particle effect replaces the leading quality word of unusual items
/// ("Unusual Team Captain" → "Burning Flames Team Captain") and uncraftable
/// items get exactly one "Non-Craftable " prefix.
pub fn display_name(item: &Item) -> String {
    let mut name = item.market_hash_name.clone();

    if let Some(effect) = particle_effect(item) {
        let rest = name.split_once(' ').map(|(_, rest)| rest).unwrap_or(&name);
        name = format!("{effect} {rest}");
    }

    if is_uncraftable(item) && !name.starts_with(UNCRAFTABLE_PREFIX) {
        name = format!("{UNCRAFTABLE_PREFIX}{name}");
    }

    name
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
