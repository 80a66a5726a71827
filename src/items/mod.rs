//! Item classification.
//!
//! Pure derivation of currency and matching tags from raw inventory items,
//! plus the `MatchTag` key used to pair items with marketplace listings.

pub mod classifier;
pub mod tags;

pub use classifier::{classify, display_name, Classification, CurrencyKind};
pub use tags::{MatchTag, MissingClassification};
