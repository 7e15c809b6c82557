use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, PriceSource, Result};

/// Telegram delivery credentials.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
}

/// Process configuration loaded from environment variables at startup.
///
/// The tracked-symbol watchlist lives in a separate TOML file, see
/// `strategy::WatchlistConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    pub watchlist_path: String,

    // Notifications
    pub telegram: Option<TelegramConfig>,
    pub notify_progress: bool,

    // Account and risk policy
    pub account_balance: f64,
    pub risk_fraction: f64,
    pub stop_pips: f64,
    pub target_pips: f64,
    pub max_open_trades: usize,
    pub price_decimals: u32,
    pub price_source: PriceSource,

    // Cadence
    pub refresh_interval: Duration,
    pub poll_interval: Duration,

    // Data provider
    pub tradingview_url: String,

    /// Directory for per-decision JSON audit files. Disabled when unset.
    pub audit_log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watchlist_path: "config/watchlist.toml".to_string(),
            telegram: None,
            notify_progress: false,
            account_balance: 10_000.0,
            risk_fraction: 0.02,
            stop_pips: 20.0,
            target_pips: 30.0,
            max_open_trades: 2,
            price_decimals: 4,
            price_source: PriceSource::Open,
            refresh_interval: Duration::from_secs(6),
            poll_interval: Duration::from_secs(60),
            tradingview_url: "https://scanner.tradingview.com".to_string(),
            audit_log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Separated from `from_env` so
    /// tests don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let telegram = match (lookup("TELEGRAM_TOKEN"), lookup("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                token,
                chat_id: parse_value("TELEGRAM_CHAT_ID", &chat_id)?,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "TELEGRAM_TOKEN and TELEGRAM_CHAT_ID must be set together".into(),
                ))
            }
        };

        let price_source = match lookup("PRICE_SOURCE").map(|s| s.to_lowercase()) {
            None => defaults.price_source,
            Some(s) if s == "open" => PriceSource::Open,
            Some(s) if s == "close" => PriceSource::Close,
            Some(other) => {
                return Err(Error::Config(format!(
                    "PRICE_SOURCE must be 'open' or 'close', got: '{other}'"
                )))
            }
        };

        let cfg = Config {
            watchlist_path: lookup("WATCHLIST_PATH").unwrap_or(defaults.watchlist_path),
            telegram,
            notify_progress: optional(&lookup, "NOTIFY_PROGRESS", defaults.notify_progress)?,
            account_balance: optional(&lookup, "ACCOUNT_BALANCE", defaults.account_balance)?,
            risk_fraction: optional(&lookup, "RISK_FRACTION", defaults.risk_fraction)?,
            stop_pips: optional(&lookup, "STOP_PIPS", defaults.stop_pips)?,
            target_pips: optional(&lookup, "TARGET_PIPS", defaults.target_pips)?,
            max_open_trades: optional(&lookup, "MAX_OPEN_TRADES", defaults.max_open_trades)?,
            price_decimals: optional(&lookup, "PRICE_DECIMALS", defaults.price_decimals)?,
            price_source,
            refresh_interval: lookup("REFRESH_INTERVAL_SECS")
                .map(|v| parse_value("REFRESH_INTERVAL_SECS", &v).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(defaults.refresh_interval),
            poll_interval: lookup("POLL_INTERVAL_SECS")
                .map(|v| parse_value("POLL_INTERVAL_SECS", &v).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(defaults.poll_interval),
            tradingview_url: lookup("TRADINGVIEW_URL").unwrap_or(defaults.tradingview_url),
            audit_log_dir: lookup("AUDIT_LOG_DIR").map(PathBuf::from),
        };

        if cfg.poll_interval.is_zero() {
            return Err(Error::Config("POLL_INTERVAL_SECS must be at least 1".into()));
        }
        Ok(cfg)
    }
}

fn optional<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_reference_policy() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.account_balance, 10_000.0);
        assert_eq!(cfg.risk_fraction, 0.02);
        assert_eq!(cfg.stop_pips, 20.0);
        assert_eq!(cfg.target_pips, 30.0);
        assert_eq!(cfg.max_open_trades, 2);
        assert_eq!(cfg.price_decimals, 4);
        assert!(cfg.telegram.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("STOP_PIPS", "15"),
            ("MAX_OPEN_TRADES", "3"),
            ("PRICE_SOURCE", "Close"),
            ("REFRESH_INTERVAL_SECS", "120"),
            ("TELEGRAM_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "-100123"),
        ]))
        .unwrap();
        assert_eq!(cfg.stop_pips, 15.0);
        assert_eq!(cfg.max_open_trades, 3);
        assert_eq!(cfg.price_source, PriceSource::Close);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(120));
        assert_eq!(cfg.telegram.unwrap().chat_id, -100123);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = Config::from_lookup(lookup_from(&[("RISK_FRACTION", "two")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("TELEGRAM_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("PRICE_SOURCE", "mid")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
