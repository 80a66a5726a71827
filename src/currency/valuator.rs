//! Currency valuator.
//!
//! Folds an item list into a `CurrencyTotal`. Metal is accumulated in whole
//! eighteenths of a refined and converted once at the end, so the same
//! input always produces the same total.

use rust_decimal::Decimal;
use std::collections::BTreeSet;

use crate::items::classifier::{self, UNITS_PER_REFINED};
use crate::types::{CurrencyTotal, Item};

/// Currency held by one side of an offer, plus the games its items span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Valuation {
    pub total: CurrencyTotal,
    pub app_ids: BTreeSet<u32>,
}

/// Value a list of items.
///
/// Keys add one key each; metal adds its fixed denomination; craft weapons
/// add one eighteenth only when `include_weapons` is set.
pub fn value_items(items: &[Item], include_weapons: bool) -> Valuation {
    let mut keys: u64 = 0;
    let mut units: u64 = 0;
    let mut app_ids = BTreeSet::new();

    for item in items {
        app_ids.insert(item.app_id);

        if classifier::is_key(item) {
            keys += 1;
        } else {
            units += u64::from(classifier::metal_units(item, include_weapons));
        }
    }

    let mut total = CurrencyTotal::new(
        Decimal::from(keys),
        Decimal::from(units) / Decimal::from(UNITS_PER_REFINED),
    );
    total.normalize();

    Valuation { total, app_ids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KEY_NAME, TF2_APP_ID};
    use rust_decimal_macros::dec;

    fn metal(asset: &str, name: &str) -> Item {
        Item::new(TF2_APP_ID, asset, name).unique()
    }

    fn craft_weapon(asset: &str) -> Item {
        Item::new(TF2_APP_ID, asset, "Shotgun")
            .unique()
            .with_tag("Type", "Secondary weapon")
            .with_description("( Not Usable in Crafting )")
    }

    #[test]
    fn test_keys_and_metal() {
        let items = vec![
            Item::new(TF2_APP_ID, "1", KEY_NAME).unique(),
            Item::new(TF2_APP_ID, "2", KEY_NAME).unique(),
            metal("3", "Refined Metal"),
            metal("4", "Reclaimed Metal"),
            metal("5", "Scrap Metal"),
        ];
        let v = value_items(&items, false);
        assert_eq!(v.total.keys, dec!(2));
        assert_eq!(v.total.metal.round_dp(2), dec!(1.44));
        assert_eq!(v.app_ids.len(), 1);
    }

    #[test]
    fn test_nine_scrap_is_one_refined() {
        let items: Vec<Item> = (0..9).map(|i| metal(&i.to_string(), "Scrap Metal")).collect();
        assert_eq!(value_items(&items, false).total.metal, dec!(1));
    }

    #[test]
    fn test_nine_craft_weapons_make_half_a_refined() {
        let items: Vec<Item> = (0..9).map(|i| craft_weapon(&i.to_string())).collect();
        let v = value_items(&items, true);
        assert_eq!(v.total.metal, dec!(0.5));
        assert_eq!(value_items(&items, false).total.metal, Decimal::ZERO);
    }

    #[test]
    fn test_fraction_never_left_in_snap_window() {
        for n in 0..60u32 {
            let items: Vec<Item> = (0..n).map(|i| metal(&i.to_string(), "Scrap Metal")).collect();
            let total = value_items(&items, false).total;
            assert!(total.metal >= Decimal::ZERO);
            assert!(total.metal.fract() < dec!(0.99));
        }
    }

    #[test]
    fn test_tracks_games() {
        let items = vec![metal("1", "Refined Metal"), Item::new(730, "2", "AK-47 | Redline")];
        let v = value_items(&items, false);
        assert_eq!(v.app_ids.into_iter().collect::<Vec<_>>(), vec![440, 730]);
    }

    #[test]
    fn test_deterministic() {
        let items: Vec<Item> = (0..7).map(|i| metal(&i.to_string(), "Reclaimed Metal")).collect();
        assert_eq!(value_items(&items, true), value_items(&items, true));
    }
}
