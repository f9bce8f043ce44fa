//! Keeps per-class watch-lists of stocks, forex pairs and crypto pairs in a
//! workspace database up to date with live quotes.

pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod market_data;
pub mod store;
pub mod sync;
