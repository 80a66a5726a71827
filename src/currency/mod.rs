//! Currency arithmetic: valuing item lists and resolving key/metal
//! shortfalls between the two sides of an offer.

pub mod exchange;
pub mod valuator;

pub use exchange::{resolve, ExchangeOutcome, ExchangePolicy};
pub use valuator::{value_items, Valuation};
