//! Multi-indicator signal scoring.
//!
//! Every rule reads its inputs from the snapshot independently. A rule whose
//! inputs are absent contributes nothing: no score and no reasoning line.
//! Scores are decided first; the reasoning text is rendered from the decided
//! outcome and is never read back.

use serde::{Deserialize, Serialize};

use common::{
    DirectionScores, Indicator, IndicatorSnapshot, MaRecommendation, MovingAverages,
    ScoredDecision, Vote,
};

/// Integer weight per rule. Trend strength has no weight because it never
/// votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    pub ma_recommendation: u32,
    pub ema_cross: u32,
    pub rsi: u32,
    pub macd: u32,
    pub bollinger: u32,
    pub stochastic: u32,
    pub ultimate_oscillator: u32,
    pub cci: u32,
    pub recommend_all: u32,
    pub pivot: u32,
    pub parabolic_sar: u32,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            ma_recommendation: 2,
            ema_cross: 1,
            rsi: 1,
            macd: 1,
            bollinger: 1,
            stochastic: 1,
            ultimate_oscillator: 1,
            cci: 1,
            recommend_all: 1,
            pivot: 1,
            parabolic_sar: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_buy: f64,
    pub macd_sell: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub adx_strong: f64,
    pub adx_weak: f64,
    pub uo_oversold: f64,
    pub uo_overbought: f64,
    pub cci_oversold: f64,
    pub cci_overbought: f64,
    pub recommend_buy: f64,
    pub recommend_sell: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_buy: 0.01,
            macd_sell: -0.01,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            adx_strong: 25.0,
            adx_weak: 20.0,
            uo_oversold: 30.0,
            uo_overbought: 70.0,
            cci_oversold: -100.0,
            cci_overbought: 100.0,
            recommend_buy: 0.7,
            recommend_sell: 0.3,
        }
    }
}

/// Immutable scoring configuration. Cheap to clone; two policies can score
/// side by side without sharing any state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub weights: RuleWeights,
    pub thresholds: Thresholds,
}

/// What one rule concluded about a snapshot.
#[derive(Debug, Clone, PartialEq)]
struct Finding {
    vote: Option<Vote>,
    weight: u32,
    reason: String,
}

impl Finding {
    fn vote(vote: Vote, weight: u32, reason: impl Into<String>) -> Self {
        Self {
            vote: Some(vote),
            weight,
            reason: reason.into(),
        }
    }

    fn note(reason: impl Into<String>) -> Self {
        Self {
            vote: None,
            weight: 0,
            reason: reason.into(),
        }
    }
}

type Rule = fn(&ScoringPolicy, &IndicatorSnapshot) -> Option<Finding>;

/// Evaluation order, which is also reasoning order.
const RULES: [Rule; 12] = [
    ma_recommendation,
    ema_cross,
    rsi,
    macd,
    bollinger,
    stochastic,
    trend_strength,
    ultimate_oscillator,
    cci,
    recommend_all,
    pivot,
    parabolic_sar,
];

impl ScoringPolicy {
    /// Score one snapshot. Pure and total.
    pub fn score(&self, snapshot: &IndicatorSnapshot) -> ScoredDecision {
        let mut scores = DirectionScores::default();
        let mut reasoning = Vec::new();

        for finding in RULES.iter().filter_map(|rule| rule(self, snapshot)) {
            if let Some(vote) = finding.vote {
                scores.add(vote, finding.weight);
            }
            reasoning.push(finding.reason);
        }

        ScoredDecision { reasoning, scores }
    }
}

/// Score with the reference policy.
pub fn score(snapshot: &IndicatorSnapshot) -> ScoredDecision {
    ScoringPolicy::default().score(snapshot)
}

// ─── Rules ────────────────────────────────────────────────────────────────────

fn ma_recommendation(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let MovingAverages {
        recommendation,
        buy,
        sell,
        neutral,
    } = &s.moving_averages;
    let weight = policy.weights.ma_recommendation;

    let finding = match recommendation.as_ref()? {
        MaRecommendation::StrongBuy => Finding::vote(
            Vote::Buy,
            weight,
            format!("Moving Average: potential STRONG BUY ({buy})"),
        ),
        MaRecommendation::Buy => Finding::vote(
            Vote::Buy,
            weight,
            format!("Moving Average: potential BUY ({buy}, {sell}, {neutral})"),
        ),
        MaRecommendation::StrongSell => Finding::vote(
            Vote::Sell,
            weight,
            format!("Moving Average: potential STRONG SELL ({sell})"),
        ),
        MaRecommendation::Sell => Finding::vote(
            Vote::Sell,
            weight,
            format!("Moving Average: potential SELL ({buy}, {sell}, {neutral})"),
        ),
        MaRecommendation::Neutral => Finding::note(format!("Moving Average: WAIT ({neutral})")),
        MaRecommendation::Other(_) => Finding::note("MA: HOLD"),
    };
    Some(finding)
}

fn ema_cross(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let short = s.indicators.get(Indicator::Ema20)?;
    let long = s.indicators.get(Indicator::Ema50)?;
    let weight = policy.weights.ema_cross;

    Some(if short > long {
        Finding::vote(Vote::Buy, weight, "EMA20 is above EMA50, potential BUY")
    } else if short < long {
        Finding::vote(Vote::Sell, weight, "EMA50 is above EMA20, potential SELL")
    } else {
        Finding::note("EMA20 and EMA50 are equal, no clear direction")
    })
}

fn rsi(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::Rsi)?;
    let t = &policy.thresholds;
    let weight = policy.weights.rsi;

    if value < t.rsi_oversold {
        Some(Finding::vote(
            Vote::Buy,
            weight,
            format!("RSI is below {} - potential BUY", t.rsi_oversold),
        ))
    } else if value > t.rsi_overbought {
        Some(Finding::vote(
            Vote::Sell,
            weight,
            format!("RSI is above {} - potential SELL", t.rsi_overbought),
        ))
    } else {
        None
    }
}

fn macd(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::Macd)?;
    let t = &policy.thresholds;
    let weight = policy.weights.macd;

    if value > t.macd_buy {
        Some(Finding::vote(Vote::Buy, weight, "MACD is above the signal line - potential BUY"))
    } else if value < t.macd_sell {
        Some(Finding::vote(Vote::Sell, weight, "MACD is below the signal line - potential SELL"))
    } else {
        None
    }
}

fn bollinger(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let upper = s.indicators.get(Indicator::BollingerUpper)?;
    let lower = s.indicators.get(Indicator::BollingerLower)?;
    let close = s.indicators.get(Indicator::Close)?;
    let weight = policy.weights.bollinger;

    if close > upper {
        Some(Finding::vote(
            Vote::Sell,
            weight,
            "Price is above Bollinger Band upper limit - potential SELL",
        ))
    } else if close < lower {
        Some(Finding::vote(
            Vote::Buy,
            weight,
            "Price is below Bollinger Band lower limit - potential BUY",
        ))
    } else {
        None
    }
}

fn stochastic(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::StochRsiK)?;
    let t = &policy.thresholds;
    let weight = policy.weights.stochastic;

    if value < t.stoch_oversold {
        Some(Finding::vote(
            Vote::Buy,
            weight,
            "Stochastic Oscillator is in oversold region - potential BUY",
        ))
    } else if value > t.stoch_overbought {
        Some(Finding::vote(
            Vote::Sell,
            weight,
            "Stochastic Oscillator is in overbought region - potential SELL",
        ))
    } else {
        None
    }
}

/// Informational only.
fn trend_strength(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::Adx)?;
    let t = &policy.thresholds;

    if value > t.adx_strong {
        Some(Finding::note("Strong trend strength (ADX)"))
    } else if value < t.adx_weak {
        Some(Finding::note("Weak trend strength (ADX)"))
    } else {
        None
    }
}

fn ultimate_oscillator(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::UltimateOscillator)?;
    let t = &policy.thresholds;
    let weight = policy.weights.ultimate_oscillator;

    if value > t.uo_overbought {
        Some(Finding::vote(
            Vote::Sell,
            weight,
            "UO indicates overbought conditions - potential SELL",
        ))
    } else if value < t.uo_oversold {
        Some(Finding::vote(
            Vote::Buy,
            weight,
            "UO indicates oversold conditions - potential BUY",
        ))
    } else {
        None
    }
}

fn cci(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::Cci20)?;
    let t = &policy.thresholds;
    let weight = policy.weights.cci;

    if value > t.cci_overbought {
        Some(Finding::vote(
            Vote::Sell,
            weight,
            "CCI indicates overbought conditions - potential SELL",
        ))
    } else if value < t.cci_oversold {
        Some(Finding::vote(
            Vote::Buy,
            weight,
            "CCI indicates oversold conditions - potential BUY",
        ))
    } else {
        None
    }
}

/// The only rule that can vote WAIT.
fn recommend_all(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let value = s.indicators.get(Indicator::RecommendAll)?;
    let t = &policy.thresholds;
    let weight = policy.weights.recommend_all;

    Some(if value > t.recommend_buy {
        Finding::vote(Vote::Buy, weight, "Recommendation score indicates potential BUY")
    } else if value < t.recommend_sell {
        Finding::vote(Vote::Sell, weight, "Recommendation score indicates potential SELL")
    } else {
        Finding::vote(Vote::Wait, weight, "Recommendation score is neutral - WAIT")
    })
}

/// R1 breakout is bullish only; there is no S1 counterpart.
fn pivot(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let close = s.indicators.get(Indicator::Close)?;
    let r1 = s.indicators.get(Indicator::PivotR1)?;

    (close > r1).then(|| {
        Finding::vote(
            Vote::Buy,
            policy.weights.pivot,
            "Price is above Pivot Point R1, potential BUY",
        )
    })
}

/// Exhaustive: with both inputs present this always votes.
fn parabolic_sar(policy: &ScoringPolicy, s: &IndicatorSnapshot) -> Option<Finding> {
    let close = s.indicators.get(Indicator::Close)?;
    let sar = s.indicators.get(Indicator::ParabolicSar)?;
    let weight = policy.weights.parabolic_sar;

    Some(if close > sar {
        Finding::vote(Vote::Buy, weight, "Price is above P.SAR, potential BUY")
    } else {
        Finding::vote(Vote::Sell, weight, "Price is at or below P.SAR, potential SELL")
    })
}
