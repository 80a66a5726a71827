//! Match tags: the composite key that groups offer items with listings.

use std::collections::HashMap;

use super::classifier::{self, Classification};
use crate::types::{Item, ListingItem, QUALITY_DECORATED, QUALITY_STRANGE};

/// Definition indices the inventory service reports wrongly, mapped to the
/// index the marketplace lists them under.
const DEFINDEX_REMAP: [(u32, u32); 7] = [
    (205, 18),
    (211, 29),
    (737, 25),
    (199, 10),
    (160, 294),
    (210, 24),
    (212, 30),
];

pub fn normalize_def_index(def_index: u32) -> u32 {
    DEFINDEX_REMAP
        .iter()
        .find(|(from, _)| *from == def_index)
        .map(|(_, to)| *to)
        .unwrap_or(def_index)
}

/// An item lacked the game metadata needed to build its tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("item {asset_id} is missing app data")]
pub struct MissingClassification {
    pub asset_id: String,
}

/// `(def_index, effective_quality, australium, name)`.
///
/// The name is dropped for the strange bucket so that strange items match
/// regardless of their counter-decorated names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchTag {
    pub def_index: u32,
    pub quality: u32,
    pub australium: bool,
    pub name: Option<String>,
}

impl MatchTag {
    fn build(def_index: u32, quality: u32, australium: bool, name: &str) -> Self {
        let name = (quality != QUALITY_STRANGE).then(|| name.to_string());
        Self {
            def_index,
            quality,
            australium,
            name,
        }
    }

    /// Tag for an inventory item. Fails when app data is absent.
    pub fn for_item(item: &Item, class: &Classification) -> Result<Self, MissingClassification> {
        let missing = || MissingClassification {
            asset_id: item.asset_id.clone(),
        };
        let app_data = item.app_data.ok_or_else(missing)?;
        let def_index = app_data.def_index.ok_or_else(missing)?;

        let quality = if class.decorated_skin {
            QUALITY_DECORATED
        } else {
            app_data.quality.unwrap_or(0)
        };

        Ok(Self::build(
            normalize_def_index(def_index),
            quality,
            class.australium,
            &class.display_name,
        ))
    }

    /// Tag for the item side of a listing.
    pub fn for_listing(item: &ListingItem) -> Self {
        Self::build(item.defindex, item.quality, item.is_australium(), &item.name)
    }
}

/// Group non-currency items by tag, keeping original indices in order.
pub fn index_items(items: &[Item]) -> Result<HashMap<MatchTag, Vec<usize>>, MissingClassification> {
    let mut index: HashMap<MatchTag, Vec<usize>> = HashMap::new();

    for (i, item) in items.iter().enumerate() {
        let class = classifier::classify(item);
        if class.is_currency() {
            continue;
        }
        let tag = MatchTag::for_item(item, &class)?;
        index.entry(tag).or_default().push(i);
    }

    Ok(index)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
