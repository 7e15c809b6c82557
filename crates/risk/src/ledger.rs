use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{
    CloseReason, Config, Direction, Exposure, Instrument, Position, PriceSource, Progress,
    RejectionReason,
};

/// Account and position policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub account_balance: f64,
    /// Share of the balance risked per trade (e.g. 0.02 = 2%).
    pub risk_fraction: f64,
    pub stop_pips: f64,
    pub target_pips: f64,
    pub max_open_trades: usize,
    /// Decimal places prices and bounds are rounded to before comparison.
    pub price_decimals: u32,
    pub price_source: PriceSource,
    /// Minimum time between candidate refreshes.
    pub refresh_interval: Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_balance: 10_000.0,
            risk_fraction: 0.02,
            stop_pips: 20.0,
            target_pips: 30.0,
            max_open_trades: 2,
            price_decimals: 4,
            price_source: PriceSource::Open,
            refresh_interval: Duration::from_secs(6),
        }
    }
}

impl From<&Config> for RiskConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            account_balance: cfg.account_balance,
            risk_fraction: cfg.risk_fraction,
            stop_pips: cfg.stop_pips,
            target_pips: cfg.target_pips,
            max_open_trades: cfg.max_open_trades,
            price_decimals: cfg.price_decimals,
            price_source: cfg.price_source,
            refresh_interval: cfg.refresh_interval,
        }
    }
}

/// Result of checking one open position against a fresh price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub progress: Progress,
    pub close: Option<CloseReason>,
}

/// Owner of the open-position set.
///
/// All mutation goes through `&mut self`, so whoever owns the ledger
/// serializes admissions and removals. Two positions whose pairs share a
/// base or quote currency are never held together, and the count never
/// exceeds `max_open_trades`.
#[derive(Debug)]
pub struct PositionLedger {
    max_open_trades: usize,
    price_decimals: u32,
    refresh_interval: Duration,
    positions: Vec<Position>,
    last_refresh: Option<DateTime<Utc>>,
}

impl PositionLedger {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            max_open_trades: config.max_open_trades,
            price_decimals: config.price_decimals,
            refresh_interval: config.refresh_interval,
            positions: Vec::new(),
            last_refresh: None,
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn max_open_trades(&self) -> usize {
        self.max_open_trades
    }

    pub fn has_capacity(&self) -> bool {
        self.positions.len() < self.max_open_trades
    }

    /// Currency exposures currently held. Candidate collection filters
    /// against this view instead of touching the positions themselves.
    pub fn exposures(&self) -> Vec<Exposure> {
        self.positions.iter().map(|p| p.instrument.exposure()).collect()
    }

    /// Check whether a new position on `instrument` would be admitted.
    pub fn check_admission(&self, instrument: &Instrument) -> Result<(), RejectionReason> {
        if !self.has_capacity() {
            return Err(RejectionReason::MaxOpenTrades {
                limit: self.max_open_trades,
            });
        }
        let exposure = instrument.exposure();
        for held in &self.positions {
            if let Some(code) = held.instrument.exposure().shared_code(&exposure) {
                return Err(RejectionReason::CurrencyExposure {
                    held: held.symbol().to_string(),
                    code,
                });
            }
        }
        Ok(())
    }

    /// Admit a sized position. Existing positions are never touched.
    pub fn admit(&mut self, position: Position) -> Result<&Position, RejectionReason> {
        if self.get(&position.id).is_some() {
            return Err(RejectionReason::DuplicatePosition);
        }
        if let Err(reason) = self.check_admission(&position.instrument) {
            warn!(pair = %position.symbol(), reason = %reason, "Position admission rejected");
            return Err(reason);
        }

        info!(
            pair = %position.symbol(),
            id = %position.id,
            direction = %position.direction,
            entry = position.entry_price,
            stop = position.stop_loss,
            target = position.target_price,
            "Position opened"
        );
        self.positions.push(position);
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Round the stored bounds of position `id`, then compare them against
    /// the rounded `current_price`. Returns `None` for an unknown id.
    pub fn evaluate(&mut self, id: &str, current_price: f64) -> Option<Evaluation> {
        let decimals = self.price_decimals;
        let position = self.positions.iter_mut().find(|p| p.id == id)?;

        position.target_price = round_to(position.target_price, decimals);
        position.stop_loss = round_to(position.stop_loss, decimals);
        let current = round_to(current_price, decimals);

        Some(Evaluation {
            progress: progress(position, current),
            close: close_reason(
                position.direction,
                current,
                position.target_price,
                position.stop_loss,
            ),
        })
    }

    /// Remove position `id`. Closing an already-closed id is a no-op that
    /// returns `None`.
    pub fn close(&mut self, id: &str) -> Option<Position> {
        let idx = self.positions.iter().position(|p| p.id == id)?;
        let removed = self.positions.remove(idx);
        info!(pair = %removed.symbol(), id = %removed.id, "Position removed from ledger after close");
        Some(removed)
    }

    /// True when there is room for another position and the refresh interval
    /// has elapsed since the last candidate refresh. A ledger that has never
    /// refreshed is always due.
    pub fn refill_due(&self, now: DateTime<Utc>) -> bool {
        if !self.has_capacity() {
            return false;
        }
        match self.last_refresh {
            None => true,
            Some(last) => match (now - last).to_std() {
                Ok(elapsed) => elapsed >= self.refresh_interval,
                Err(_) => false, // clock went backwards
            },
        }
    }

    pub fn mark_refreshed(&mut self, now: DateTime<Utc>) {
        self.last_refresh = Some(now);
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Which bound, if any, `current` has reached. Target wins if both have.
pub fn close_reason(
    direction: Direction,
    current: f64,
    target: f64,
    stop: f64,
) -> Option<CloseReason> {
    let (target_hit, stop_hit) = match direction {
        Direction::Buy => (current >= target, current <= stop),
        Direction::Sell => (current <= target, current >= stop),
    };
    if target_hit {
        Some(CloseReason::TargetHit)
    } else if stop_hit {
        Some(CloseReason::StopHit)
    } else {
        None
    }
}

/// Pip distances for `position` at `current`. Both distances are negated for
/// SELL positions so that positive always means "still room on this side".
pub fn progress(position: &Position, current: f64) -> Progress {
    let pip = position.pip;
    let mut pips_to_target = pip.pips(position.target_price - current);
    let mut pips_to_stop = pip.pips(current - position.stop_loss);
    if position.direction == Direction::Sell {
        pips_to_target = -pips_to_target;
        pips_to_stop = -pips_to_stop;
    }
    let change = current - position.entry_price;
    Progress {
        current_price: current,
        pips_to_target,
        pips_to_stop,
        change,
        change_pips: pip.pips(change),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
