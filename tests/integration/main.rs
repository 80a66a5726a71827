//! Integration tests: the offer pipeline against an in-memory trade service.

mod mock_trade;
mod scenarios;
