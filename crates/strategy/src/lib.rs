pub mod config;
pub mod scorer;
pub mod selector;

pub use config::{CategoryConfig, WatchlistConfig};
pub use scorer::{score, RuleWeights, ScoringPolicy, Thresholds};
pub use selector::select_best;
