use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instrument::{Instrument, PipSpec, TimeFrame};

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// A single rule's vote. `Wait` only ever comes from the aggregate
/// recommendation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Buy,
    Sell,
    Wait,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Buy => write!(f, "BUY"),
            Vote::Sell => write!(f, "SELL"),
            Vote::Wait => write!(f, "WAIT"),
        }
    }
}

impl From<Direction> for Vote {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => Vote::Buy,
            Direction::Sell => Vote::Sell,
        }
    }
}

/// Accumulated weighted votes for one snapshot. Only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionScores {
    #[serde(rename = "BUY")]
    pub buy: u32,
    #[serde(rename = "SELL")]
    pub sell: u32,
    #[serde(rename = "WAIT")]
    pub wait: u32,
}

impl DirectionScores {
    pub fn add(&mut self, vote: Vote, weight: u32) {
        let slot = match vote {
            Vote::Buy => &mut self.buy,
            Vote::Sell => &mut self.sell,
            Vote::Wait => &mut self.wait,
        };
        *slot = slot.saturating_add(weight);
    }

    pub fn get(&self, vote: Vote) -> u32 {
        match vote {
            Vote::Buy => self.buy,
            Vote::Sell => self.sell,
            Vote::Wait => self.wait,
        }
    }

    pub fn total(&self) -> u32 {
        self.buy.saturating_add(self.sell).saturating_add(self.wait)
    }

    /// Trade score and direction: the larger of BUY and SELL, ties go to BUY.
    pub fn trade_side(&self) -> (u32, Direction) {
        if self.buy >= self.sell {
            (self.buy, Direction::Buy)
        } else {
            (self.sell, Direction::Sell)
        }
    }

    /// Vote with the highest score. Ties resolve BUY, then SELL, then WAIT.
    pub fn leading(&self) -> Vote {
        [Vote::Sell, Vote::Wait]
            .into_iter()
            .fold(Vote::Buy, |best, v| if self.get(v) > self.get(best) { v } else { best })
    }

    /// Leading vote's share of the total, as a whole percentage.
    pub fn confidence(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let share = u64::from(self.get(self.leading())) * 100 / u64::from(total);
        share as u32
    }
}

// ─── Indicator snapshot ───────────────────────────────────────────────────────

/// Categorical moving-average recommendation from the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MaRecommendation {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
    Other(String),
}

impl MaRecommendation {
    pub fn as_str(&self) -> &str {
        match self {
            MaRecommendation::StrongBuy => "STRONG_BUY",
            MaRecommendation::Buy => "BUY",
            MaRecommendation::Neutral => "NEUTRAL",
            MaRecommendation::Sell => "SELL",
            MaRecommendation::StrongSell => "STRONG_SELL",
            MaRecommendation::Other(s) => s,
        }
    }
}

impl From<&str> for MaRecommendation {
    fn from(s: &str) -> Self {
        match s {
            "STRONG_BUY" => MaRecommendation::StrongBuy,
            "BUY" => MaRecommendation::Buy,
            "NEUTRAL" => MaRecommendation::Neutral,
            "SELL" => MaRecommendation::Sell,
            "STRONG_SELL" => MaRecommendation::StrongSell,
            other => MaRecommendation::Other(other.to_string()),
        }
    }
}

impl From<String> for MaRecommendation {
    fn from(s: String) -> Self {
        MaRecommendation::from(s.as_str())
    }
}

impl From<MaRecommendation> for String {
    fn from(rec: MaRecommendation) -> Self {
        rec.as_str().to_string()
    }
}

impl fmt::Display for MaRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moving-average recommendation bundle: the category plus the vote counts
/// behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    #[serde(rename = "RECOMMENDATION")]
    pub recommendation: Option<MaRecommendation>,
    #[serde(rename = "BUY")]
    pub buy: u32,
    #[serde(rename = "SELL")]
    pub sell: u32,
    #[serde(rename = "NEUTRAL")]
    pub neutral: u32,
}

/// Indicator readings the scorer and the position ledger consume. Serialized
/// under the provider's column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "Mom")]
    Momentum,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "volume")]
    Volume,
    #[serde(rename = "MACD.macd")]
    Macd,
    #[serde(rename = "EMA20")]
    Ema20,
    #[serde(rename = "EMA50")]
    Ema50,
    #[serde(rename = "BB.upper")]
    BollingerUpper,
    #[serde(rename = "BB.lower")]
    BollingerLower,
    #[serde(rename = "Pivot.M.Classic.R1")]
    PivotR1,
    #[serde(rename = "Pivot.M.Classic.S1")]
    PivotS1,
    #[serde(rename = "Stoch.RSI.K")]
    StochRsiK,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "UO")]
    UltimateOscillator,
    #[serde(rename = "CCI20")]
    Cci20,
    #[serde(rename = "P.SAR")]
    ParabolicSar,
    #[serde(rename = "Recommend.All")]
    RecommendAll,
}

impl Indicator {
    pub const ALL: [Indicator; 18] = [
        Indicator::Open,
        Indicator::Close,
        Indicator::Momentum,
        Indicator::Rsi,
        Indicator::Volume,
        Indicator::Macd,
        Indicator::Ema20,
        Indicator::Ema50,
        Indicator::BollingerUpper,
        Indicator::BollingerLower,
        Indicator::PivotR1,
        Indicator::PivotS1,
        Indicator::StochRsiK,
        Indicator::Adx,
        Indicator::UltimateOscillator,
        Indicator::Cci20,
        Indicator::ParabolicSar,
        Indicator::RecommendAll,
    ];

    /// Provider column name.
    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Open => "open",
            Indicator::Close => "close",
            Indicator::Momentum => "Mom",
            Indicator::Rsi => "RSI",
            Indicator::Volume => "volume",
            Indicator::Macd => "MACD.macd",
            Indicator::Ema20 => "EMA20",
            Indicator::Ema50 => "EMA50",
            Indicator::BollingerUpper => "BB.upper",
            Indicator::BollingerLower => "BB.lower",
            Indicator::PivotR1 => "Pivot.M.Classic.R1",
            Indicator::PivotS1 => "Pivot.M.Classic.S1",
            Indicator::StochRsiK => "Stoch.RSI.K",
            Indicator::Adx => "ADX",
            Indicator::UltimateOscillator => "UO",
            Indicator::Cci20 => "CCI20",
            Indicator::ParabolicSar => "P.SAR",
            Indicator::RecommendAll => "Recommend.All",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Indicator::ALL.into_iter().find(|i| i.column() == column)
    }
}

/// Named indicator readings. A missing key means the provider had no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Indicators(BTreeMap<Indicator, f64>);

impl Indicators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present and finite readings only; NaN and infinities count as absent.
    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        self.0.get(&indicator).copied().filter(|v| v.is_finite())
    }

    pub fn insert(&mut self, indicator: Indicator, value: f64) {
        self.0.insert(indicator, value);
    }

    pub fn with(mut self, indicator: Indicator, value: f64) -> Self {
        self.insert(indicator, value);
        self
    }

    pub fn price(&self, source: PriceSource) -> Option<f64> {
        match source {
            PriceSource::Open => self.get(Indicator::Open),
            PriceSource::Close => self.get(Indicator::Close),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Indicator, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Indicator, f64)> for Indicators {
    fn from_iter<T: IntoIterator<Item = (Indicator, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Which candle price stands in for "the current price".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    Open,
    Close,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Open => write!(f, "open"),
            PriceSource::Close => write!(f, "close"),
        }
    }
}

/// One (pair, time frame) observation from the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub time_frame: TimeFrame,
    pub moving_averages: MovingAverages,
    pub indicators: Indicators,
}

// ─── Scoring output ───────────────────────────────────────────────────────────

/// Result of scoring one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredDecision {
    /// Human-readable trace, one line per rule that fired, in rule order.
    pub reasoning: Vec<String>,
    pub scores: DirectionScores,
}

impl ScoredDecision {
    pub fn confidence(&self) -> u32 {
        self.scores.confidence()
    }

    pub fn leading(&self) -> Vote {
        self.scores.leading()
    }
}

/// A scored, not-yet-committed trade opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub instrument: Instrument,
    pub time_frame: TimeFrame,
    /// Larger of the BUY and SELL totals.
    pub score: u32,
    pub direction: Direction,
    pub reasoning: Vec<String>,
    pub scores: DirectionScores,
    pub indicators: Indicators,
}

impl Candidate {
    pub fn new(
        instrument: Instrument,
        time_frame: TimeFrame,
        decision: ScoredDecision,
        indicators: Indicators,
    ) -> Self {
        let (score, direction) = decision.scores.trade_side();
        Self {
            instrument,
            time_frame,
            score,
            direction,
            reasoning: decision.reasoning,
            scores: decision.scores,
            indicators,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }
}

// ─── Positions ────────────────────────────────────────────────────────────────

/// An open trade held by the position ledger.
///
/// BUY: `stop_loss < entry_price < target_price`.
/// SELL: `target_price < entry_price < stop_loss`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub instrument: Instrument,
    pub time_frame: TimeFrame,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    /// Size in reference lots ($10 per pip).
    pub size: f64,
    pub pip: PipSpec,
    pub stop_pips: f64,
    pub target_pips: f64,
    /// Dollar amount at risk if the stop is hit.
    pub risk_usd: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }
}

/// Which bound closed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    TargetHit,
    StopHit,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::TargetHit => write!(f, "Take profit hit"),
            CloseReason::StopHit => write!(f, "Stop loss hit"),
        }
    }
}

/// Distance report for one open position at one monitoring pass.
///
/// Pip figures are positive-is-good regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub current_price: f64,
    pub pips_to_target: f64,
    pub pips_to_stop: f64,
    /// Raw `current - entry`.
    pub change: f64,
    pub change_pips: f64,
}

/// Reason the ledger or sizer refused a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    MaxOpenTrades { limit: usize },
    CurrencyExposure { held: String, code: String },
    DuplicatePosition,
    InvalidStopPips,
    InvalidTargetPips,
    InvalidEntryPrice,
    InvalidAccountRisk,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MaxOpenTrades { limit } => {
                write!(f, "max open trades reached ({limit})")
            }
            RejectionReason::CurrencyExposure { held, code } => {
                write!(f, "currency exposure: {code} already held via {held}")
            }
            RejectionReason::DuplicatePosition => write!(f, "position id already open"),
            RejectionReason::InvalidStopPips => write!(f, "stop pips must be positive"),
            RejectionReason::InvalidTargetPips => write!(f, "target pips must be positive"),
            RejectionReason::InvalidEntryPrice => write!(f, "entry price must be positive"),
            RejectionReason::InvalidAccountRisk => {
                write!(f, "account balance and risk fraction must be positive")
            }
        }
    }
}

// ─── Engine control ───────────────────────────────────────────────────────────

/// Current state of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Run a refresh cycle now instead of waiting for the next tick.
    RefreshNow,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_side_ties_favour_buy() {
        let scores = DirectionScores { buy: 3, sell: 3, wait: 0 };
        assert_eq!(scores.trade_side(), (3, Direction::Buy));

        let scores = DirectionScores { buy: 1, sell: 4, wait: 9 };
        assert_eq!(scores.trade_side(), (4, Direction::Sell));
    }

    #[test]
    fn confidence_is_share_of_leading_vote() {
        let scores = DirectionScores { buy: 3, sell: 1, wait: 0 };
        assert_eq!(scores.leading(), Vote::Buy);
        assert_eq!(scores.confidence(), 75);

        let scores = DirectionScores { buy: 0, sell: 0, wait: 1 };
        assert_eq!(scores.leading(), Vote::Wait);
        assert_eq!(scores.confidence(), 100);

        assert_eq!(DirectionScores::default().confidence(), 0);
    }

    #[test]
    fn confidence_handles_large_weights() {
        let scores = DirectionScores { buy: 50_000_000, sell: 0, wait: 0 };
        assert_eq!(scores.confidence(), 100);

        let scores = DirectionScores { buy: u32::MAX / 2, sell: u32::MAX / 2, wait: 1 };
        assert_eq!(scores.leading(), Vote::Buy);
        assert_eq!(scores.confidence(), 49);
    }

    #[test]
    fn non_finite_readings_count_as_absent() {
        let indicators = Indicators::new()
            .with(Indicator::Rsi, f64::NAN)
            .with(Indicator::Close, 1.1);
        assert_eq!(indicators.get(Indicator::Rsi), None);
        assert_eq!(indicators.price(PriceSource::Close), Some(1.1));
        assert_eq!(indicators.price(PriceSource::Open), None);
    }

    #[test]
    fn indicators_serialize_under_column_names() {
        let indicators = Indicators::new().with(Indicator::Macd, 0.02);
        let json = serde_json::to_string(&indicators).unwrap();
        assert_eq!(json, r#"{"MACD.macd":0.02}"#);
    }

    #[test]
    fn recommendation_roundtrips_through_provider_text() {
        assert_eq!(MaRecommendation::from("STRONG_SELL"), MaRecommendation::StrongSell);
        assert_eq!(
            MaRecommendation::from("ERROR"),
            MaRecommendation::Other("ERROR".into())
        );
        let json = serde_json::to_string(&MaRecommendation::StrongBuy).unwrap();
        assert_eq!(json, r#""STRONG_BUY""#);
    }

    #[test]
    fn candidate_takes_trade_side_from_scores() {
        let decision = ScoredDecision {
            reasoning: vec!["x".into()],
            scores: DirectionScores { buy: 2, sell: 5, wait: 1 },
        };
        let instrument = Instrument {
            symbol: "EURUSD".into(),
            category: "forex".into(),
            kind: crate::MarketKind::Forex,
            screener: "forex".into(),
            exchange: "FX_IDC".into(),
        };
        let c = Candidate::new(instrument, TimeFrame::H1, decision, Indicators::new());
        assert_eq!(c.score, 5);
        assert_eq!(c.direction, Direction::Sell);
    }
}
