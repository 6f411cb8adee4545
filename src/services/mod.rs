pub mod analytics;
pub mod commands;
pub mod market_close;
pub mod messages;
pub mod snapshot_service;
pub mod watchlist;
