use std::collections::HashSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use common::{Error, Instrument, MarketKind, Result, TimeFrame};

use crate::scorer::ScoringPolicy;

/// Tracked-symbol configuration file (TOML).
///
/// Example `config/watchlist.toml`:
/// ```toml
/// time_frames = ["5m", "1h"]
/// min_score = 5
///
/// [[category]]
/// name = "forex"
/// kind = "forex"
/// screener = "forex"
/// exchange = "FX_IDC"
/// symbols = ["EURUSD", "USDJPY", "GBPJPY"]
///
/// [[category]]
/// name = "crypto"
/// kind = "crypto"
/// screener = "crypto"
/// exchange = "BINANCE"
/// symbols = ["BTCUSDT"]
/// trades_weekends = true
///
/// [scoring.weights]
/// ma_recommendation = 2
/// ```
///
/// Category order, then symbol order, is the scan order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchlistConfig {
    pub time_frames: Vec<TimeFrame>,
    /// Minimum trade score for the best candidate to be acted on.
    pub min_score: u32,
    #[serde(rename = "category")]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryConfig {
    /// Category label, e.g. "forex".
    pub name: String,
    #[serde(default)]
    pub kind: MarketKind,
    /// Provider screener, e.g. "forex" or "crypto".
    pub screener: String,
    /// Provider exchange prefix, e.g. "FX_IDC".
    pub exchange: String,
    pub symbols: Vec<String>,
    /// Scanned on Saturdays and Sundays as well.
    #[serde(default)]
    pub trades_weekends: bool,
}

impl CategoryConfig {
    fn instrument(&self, symbol: &str) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            category: self.name.clone(),
            kind: self.kind,
            screener: self.screener.clone(),
            exchange: self.exchange.clone(),
        }
    }
}

impl WatchlistConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read watchlist at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Invalid watchlist at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_frames.is_empty() {
            return Err(Error::Config("at least one time frame is required".into()));
        }
        if self.min_score == 0 {
            return Err(Error::Config("min_score must be at least 1".into()));
        }
        if self.categories.is_empty() {
            return Err(Error::Config("at least one [[category]] is required".into()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.symbols.is_empty() {
                return Err(Error::Config(format!(
                    "category '{}' has no symbols",
                    category.name
                )));
            }
            for symbol in &category.symbols {
                if !seen.insert(symbol.to_ascii_uppercase()) {
                    return Err(Error::Config(format!("symbol '{symbol}' is listed twice")));
                }
            }
        }
        Ok(())
    }

    /// Every tracked instrument, in scan order.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.categories
            .iter()
            .flat_map(|c| c.symbols.iter().map(move |s| c.instrument(s)))
            .collect()
    }

    /// Instruments to scan on `weekday`. Weekends only scan categories that
    /// trade through them.
    pub fn instruments_for(&self, weekday: Weekday) -> Vec<Instrument> {
        let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);
        self.categories
            .iter()
            .filter(|c| !weekend || c.trades_weekends)
            .flat_map(|c| c.symbols.iter().map(move |s| c.instrument(s)))
            .collect()
    }
}
