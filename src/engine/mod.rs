//! Core engine: the offer lifecycle and its summaries.

pub mod lifecycle;
pub mod summary;

pub use lifecycle::{OfferController, Policy};
pub use summary::{offer_summary, summarize_items};
