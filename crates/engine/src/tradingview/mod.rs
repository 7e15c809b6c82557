pub mod client;
pub mod columns;

pub use client::TradingViewClient;
