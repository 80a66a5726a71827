//! Marketplace order handling: buy-order matching, sell-order validation,
//! the price check and the shared stock ledger.

pub mod buy;
pub mod ledger;
pub mod sell;

pub use buy::{match_buy_orders, BuyPass};
pub use ledger::{StockConflict, StockLedger};
pub use sell::{check_price, check_stock_limit, price_given_items, PriceCheck, SellRejection};
