pub mod audit;
pub mod collector;
pub mod lifecycle;
pub mod tradingview;

pub use audit::AuditLog;
pub use collector::CandidateCollector;
pub use lifecycle::{Engine, EngineHandle, RefreshReport};
pub use tradingview::TradingViewClient;
