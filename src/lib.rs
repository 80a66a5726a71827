//! OFFERDESK: trade-offer evaluation engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the replay binary.

pub mod config;
pub mod types;
pub mod items;
pub mod currency;
pub mod orders;
pub mod market;
pub mod trade;
pub mod profile;
pub mod engine;
pub mod storage;
