use chrono::{DateTime, Utc};
use tracing::debug;

use common::{Candidate, Direction, Position, PriceSource, RejectionReason};

use crate::RiskConfig;

/// Dollar value of one pip on one reference lot.
pub const REFERENCE_PIP_VALUE_USD: f64 = 10.0;

/// Risk arithmetic for one trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBudget {
    /// `account_balance * risk_fraction`.
    pub max_risk_usd: f64,
    /// Dollars lost per pip if the stop is hit.
    pub risk_per_pip: f64,
    /// Position size in reference lots.
    pub size: f64,
}

impl RiskBudget {
    pub fn new(
        account_balance: f64,
        risk_fraction: f64,
        stop_pips: f64,
    ) -> Result<Self, RejectionReason> {
        if !(account_balance > 0.0 && risk_fraction > 0.0) {
            return Err(RejectionReason::InvalidAccountRisk);
        }
        if !(stop_pips > 0.0 && stop_pips.is_finite()) {
            return Err(RejectionReason::InvalidStopPips);
        }
        let max_risk_usd = account_balance * risk_fraction;
        let risk_per_pip = max_risk_usd / stop_pips;
        Ok(Self {
            max_risk_usd,
            risk_per_pip,
            size: risk_per_pip / REFERENCE_PIP_VALUE_USD,
        })
    }
}

/// Turns a selected candidate into concrete entry, stop, target and size.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    pub account_balance: f64,
    pub risk_fraction: f64,
    pub stop_pips: f64,
    pub target_pips: f64,
    pub price_source: PriceSource,
}

impl PositionSizer {
    pub fn new(account_balance: f64, risk_fraction: f64, stop_pips: f64, target_pips: f64) -> Self {
        Self {
            account_balance,
            risk_fraction,
            stop_pips,
            target_pips,
            price_source: PriceSource::default(),
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self {
            account_balance: config.account_balance,
            risk_fraction: config.risk_fraction,
            stop_pips: config.stop_pips,
            target_pips: config.target_pips,
            price_source: config.price_source,
        }
    }

    pub fn with_price_source(mut self, source: PriceSource) -> Self {
        self.price_source = source;
        self
    }

    /// The candidate's current price, if the snapshot carried one. Callers
    /// treat `None` as "try again next cycle", not as a sizing failure.
    pub fn entry_price(&self, candidate: &Candidate) -> Option<f64> {
        candidate.indicators.price(self.price_source)
    }

    /// Size a position for `candidate`, opened at `now`.
    pub fn size(
        &self,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Result<Position, RejectionReason> {
        let entry = self
            .entry_price(candidate)
            .filter(|p| *p > 0.0)
            .ok_or(RejectionReason::InvalidEntryPrice)?;
        if !(self.target_pips > 0.0 && self.target_pips.is_finite()) {
            return Err(RejectionReason::InvalidTargetPips);
        }
        let budget = RiskBudget::new(self.account_balance, self.risk_fraction, self.stop_pips)?;

        let pip = candidate.instrument.pip();
        let stop_offset = pip.offset(self.stop_pips);
        let target_offset = pip.offset(self.target_pips);

        let (stop_loss, target_price) = match candidate.direction {
            Direction::Buy => (entry - stop_offset, entry + target_offset),
            Direction::Sell => (entry + stop_offset, entry - target_offset),
        };

        debug!(
            pair = %candidate.symbol(),
            direction = %candidate.direction,
            entry,
            stop_loss,
            target_price,
            size = budget.size,
            "Position sized"
        );

        Ok(Position {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: candidate.instrument.clone(),
            time_frame: candidate.time_frame,
            direction: candidate.direction,
            entry_price: entry,
            stop_loss,
            target_price,
            size: budget.size,
            pip,
            stop_pips: self.stop_pips,
            target_pips: self.target_pips,
            risk_usd: budget.max_risk_usd,
            opened_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        DirectionScores, Indicator, Indicators, Instrument, MarketKind, ScoredDecision, TimeFrame,
    };

    fn candidate(symbol: &str, kind: MarketKind, open: f64, buy: u32, sell: u32) -> Candidate {
        let instrument = Instrument {
            symbol: symbol.into(),
            category: "test".into(),
            kind,
            screener: "forex".into(),
            exchange: "FX_IDC".into(),
        };
        let decision = ScoredDecision {
            reasoning: Vec::new(),
            scores: DirectionScores { buy, sell, wait: 0 },
        };
        let indicators = Indicators::new()
            .with(Indicator::Open, open)
            .with(Indicator::Close, open + 1.0);
        Candidate::new(instrument, TimeFrame::H1, decision, indicators)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reference_risk_budget() {
        let budget = RiskBudget::new(10_000.0, 0.02, 20.0).unwrap();
        assert!(approx(budget.max_risk_usd, 200.0));
        assert!(approx(budget.risk_per_pip, 10.0));
        assert!(approx(budget.size, 1.0));
    }

    #[test]
    fn yen_buy_offsets_by_hundredths() {
        let sizer = PositionSizer::new(10_000.0, 0.02, 20.0, 30.0);
        let p = sizer
            .size(&candidate("GBPJPY", MarketKind::Forex, 180.0, 5, 1), Utc::now())
            .unwrap();
        assert_eq!(p.direction, Direction::Buy);
        assert!(approx(p.entry_price, 180.0));
        assert!(approx(p.stop_loss, 179.8));
        assert!(approx(p.target_price, 180.3));
        assert_eq!(p.pip.value, 0.01);
        assert_eq!(p.pip.scale, 2);
    }

    #[test]
    fn sell_mirrors_bounds() {
        let sizer = PositionSizer::new(10_000.0, 0.02, 20.0, 30.0);
        let p = sizer
            .size(&candidate("EURUSD", MarketKind::Forex, 1.1, 1, 5), Utc::now())
            .unwrap();
        assert_eq!(p.direction, Direction::Sell);
        assert!(approx(p.stop_loss, 1.102));
        assert!(approx(p.target_price, 1.097));
        assert!(p.target_price < p.entry_price && p.entry_price < p.stop_loss);
    }

    #[test]
    fn crypto_uses_whole_unit_pips() {
        let sizer = PositionSizer::new(10_000.0, 0.02, 20.0, 30.0);
        let p = sizer
            .size(&candidate("BTCUSDT", MarketKind::Crypto, 60_000.0, 3, 0), Utc::now())
            .unwrap();
        assert!(approx(p.stop_loss, 59_980.0));
        assert!(approx(p.target_price, 60_030.0));
    }

    #[test]
    fn price_source_selects_candle_field() {
        let sizer = PositionSizer::new(10_000.0, 0.02, 20.0, 30.0).with_price_source(PriceSource::Close);
        let p = sizer
            .size(&candidate("EURUSD", MarketKind::Forex, 1.1, 3, 0), Utc::now())
            .unwrap();
        assert!(approx(p.entry_price, 2.1));
    }

    #[test]
    fn invalid_inputs_are_refused() {
        let c = candidate("EURUSD", MarketKind::Forex, 1.1, 3, 0);

        let zero_stop = PositionSizer::new(10_000.0, 0.02, 0.0, 30.0);
        assert_eq!(zero_stop.size(&c, Utc::now()), Err(RejectionReason::InvalidStopPips));

        let zero_target = PositionSizer::new(10_000.0, 0.02, 20.0, 0.0);
        assert_eq!(zero_target.size(&c, Utc::now()), Err(RejectionReason::InvalidTargetPips));

        let no_balance = PositionSizer::new(0.0, 0.02, 20.0, 30.0);
        assert_eq!(no_balance.size(&c, Utc::now()), Err(RejectionReason::InvalidAccountRisk));

        let mut no_price = c.clone();
        no_price.indicators = Indicators::new();
        let sizer = PositionSizer::new(10_000.0, 0.02, 20.0, 30.0);
        assert!(sizer.entry_price(&no_price).is_none());
        assert_eq!(sizer.size(&no_price, Utc::now()), Err(RejectionReason::InvalidEntryPrice));
    }
}
