use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Broad market an instrument trades in. Drives pip sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    #[default]
    Forex,
    Crypto,
    Other,
}

/// A tracked symbol together with the provider coordinates needed to query it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Name of the watchlist category this symbol was configured under.
    pub category: String,
    pub kind: MarketKind,
    pub screener: String,
    pub exchange: String,
}

impl Instrument {
    /// `EXCHANGE:SYMBOL`, the form the scanner expects.
    pub fn ticker(&self) -> String {
        format!("{}:{}", self.exchange, self.symbol)
    }

    pub fn exposure(&self) -> Exposure {
        Exposure::parse(&self.symbol)
    }

    pub fn pip(&self) -> PipSpec {
        PipSpec::for_instrument(self)
    }
}

// ─── Pip sizing ───────────────────────────────────────────────────────────────

/// Smallest standard price increment and the decimal scale used when
/// reporting pip movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipSpec {
    pub value: f64,
    pub scale: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipClass {
    Crypto,
    Yen,
    Standard,
}

const PIP_TABLE: [(PipClass, PipSpec); 3] = [
    (PipClass::Crypto, PipSpec { value: 1.0, scale: 6 }),
    (PipClass::Yen, PipSpec { value: 0.01, scale: 2 }),
    (PipClass::Standard, PipSpec { value: 0.0001, scale: 4 }),
];

impl PipClass {
    fn classify(instrument: &Instrument) -> Self {
        if instrument.kind == MarketKind::Crypto {
            PipClass::Crypto
        } else if instrument.symbol.to_ascii_uppercase().contains("JPY") {
            PipClass::Yen
        } else {
            PipClass::Standard
        }
    }
}

impl PipSpec {
    pub fn for_instrument(instrument: &Instrument) -> Self {
        let class = PipClass::classify(instrument);
        PIP_TABLE
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, spec)| *spec)
            .unwrap_or(PIP_TABLE[2].1)
    }

    /// Price distance covered by `pips` pips.
    pub fn offset(&self, pips: f64) -> f64 {
        pips * self.value
    }

    /// Signed pip movement for a price delta, in reporting units:
    /// `(delta / value) * 10^scale`.
    pub fn pips(&self, price_delta: f64) -> f64 {
        (price_delta / self.value) * 10f64.powi(self.scale as i32)
    }
}

// ─── Currency exposure ────────────────────────────────────────────────────────

/// Quote codes recognised at the end of symbols that are not plain
/// six-letter currency pairs. Longest first so `USDT` wins over `USD`.
const QUOTE_SUFFIXES: [&str; 9] = [
    "FDUSD", "USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH", "BNB",
];

/// Base/quote currency codes implied by a pair symbol.
///
/// Six-letter alphabetic symbols split 3/3 (`EURUSD` → `EUR`/`USD`).
/// Separator forms (`BTC/USD`, `BTC-USD`) split on the separator. Other
/// symbols split on a known quote suffix (`BTCUSDT` → `BTC`/`USDT`); a
/// symbol matching none of these is a single opaque code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    pub base: String,
    pub quote: Option<String>,
}

impl Exposure {
    pub fn parse(symbol: &str) -> Self {
        let symbol = symbol.trim().to_ascii_uppercase();

        if let Some((base, quote)) = symbol.split_once(['/', '-', '_']) {
            if !base.is_empty() && !quote.is_empty() {
                return Self::pair(base, quote);
            }
        }

        if symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_alphabetic()) {
            let (base, quote) = symbol.split_at(3);
            return Self::pair(base, quote);
        }

        for suffix in QUOTE_SUFFIXES {
            if let Some(base) = symbol.strip_suffix(suffix) {
                if !base.is_empty() {
                    return Self::pair(base, suffix);
                }
            }
        }

        Self {
            base: symbol,
            quote: None,
        }
    }

    fn pair(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_string(),
            quote: Some(quote.to_string()),
        }
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base.as_str()).chain(self.quote.as_deref())
    }

    /// True when the two exposures share any currency code.
    pub fn overlaps(&self, other: &Exposure) -> bool {
        self.codes().any(|a| other.codes().any(|b| a == b))
    }

    /// The first shared code, if any.
    pub fn shared_code(&self, other: &Exposure) -> Option<String> {
        self.codes()
            .find(|a| other.codes().any(|b| a == &b))
            .map(str::to_string)
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.quote {
            Some(quote) => write!(f, "{}/{}", self.base, quote),
            None => write!(f, "{}", self.base),
        }
    }
}

// ─── Time frames ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 10] = [
        TimeFrame::M1,
        TimeFrame::M5,
        TimeFrame::M15,
        TimeFrame::M30,
        TimeFrame::H1,
        TimeFrame::H2,
        TimeFrame::H4,
        TimeFrame::D1,
        TimeFrame::W1,
        TimeFrame::Mo1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::M1 => "1m",
            TimeFrame::M5 => "5m",
            TimeFrame::M15 => "15m",
            TimeFrame::M30 => "30m",
            TimeFrame::H1 => "1h",
            TimeFrame::H2 => "2h",
            TimeFrame::H4 => "4h",
            TimeFrame::D1 => "1d",
            TimeFrame::W1 => "1W",
            TimeFrame::Mo1 => "1M",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s.trim())
            .ok_or_else(|| Error::Config(format!("unknown time frame '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(symbol: &str, kind: MarketKind) -> Instrument {
        Instrument {
            symbol: symbol.into(),
            category: "test".into(),
            kind,
            screener: "forex".into(),
            exchange: "FX_IDC".into(),
        }
    }

    #[test]
    fn pip_lookup_by_category() {
        let crypto = instrument("BTCUSDT", MarketKind::Crypto).pip();
        assert_eq!(crypto, PipSpec { value: 1.0, scale: 6 });

        let yen = instrument("GBPJPY", MarketKind::Forex).pip();
        assert_eq!(yen, PipSpec { value: 0.01, scale: 2 });

        let standard = instrument("EURUSD", MarketKind::Forex).pip();
        assert_eq!(standard, PipSpec { value: 0.0001, scale: 4 });
    }

    #[test]
    fn crypto_kind_wins_over_jpy_substring() {
        let pip = instrument("BTCJPY", MarketKind::Crypto).pip();
        assert_eq!(pip.value, 1.0);
    }

    #[test]
    fn six_letter_pairs_split_evenly() {
        let e = Exposure::parse("eurusd");
        assert_eq!(e.base, "EUR");
        assert_eq!(e.quote.as_deref(), Some("USD"));
    }

    #[test]
    fn crypto_tickers_split_on_quote_suffix() {
        let e = Exposure::parse("BTCUSDT");
        assert_eq!(e.base, "BTC");
        assert_eq!(e.quote.as_deref(), Some("USDT"));

        let e = Exposure::parse("DOGE/USD");
        assert_eq!(e.base, "DOGE");
        assert_eq!(e.quote.as_deref(), Some("USD"));
    }

    #[test]
    fn unrecognised_symbol_is_single_code() {
        let e = Exposure::parse("SPX500");
        assert_eq!(e.base, "SPX500");
        assert!(e.quote.is_none());
        assert!(!e.overlaps(&Exposure::parse("EURUSD")));
        assert!(e.overlaps(&Exposure::parse("SPX500")));
    }

    #[test]
    fn shared_base_or_quote_overlaps() {
        let eurusd = Exposure::parse("EURUSD");
        assert!(eurusd.overlaps(&Exposure::parse("GBPEUR")));
        assert!(eurusd.overlaps(&Exposure::parse("USDJPY")));
        assert!(!eurusd.overlaps(&Exposure::parse("GBPJPY")));
        assert_eq!(
            eurusd.shared_code(&Exposure::parse("GBPEUR")).as_deref(),
            Some("EUR")
        );
    }

    #[test]
    fn time_frame_parses_provider_names() {
        assert_eq!("1h".parse::<TimeFrame>().unwrap(), TimeFrame::H1);
        assert_eq!("1M".parse::<TimeFrame>().unwrap(), TimeFrame::Mo1);
        assert!("7m".parse::<TimeFrame>().is_err());
    }
}
