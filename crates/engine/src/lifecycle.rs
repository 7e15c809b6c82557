use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{
    deliver, Candidate, CloseReason, Config, EngineCommand, EngineState, Notification, Notifier,
    Position, PriceSource, SnapshotProvider, TimeFrame,
};
use risk::{PositionLedger, PositionSizer, RiskConfig};
use strategy::{select_best, WatchlistConfig};

use crate::audit::AuditLog;
use crate::collector::CandidateCollector;

/// Candle interval used to read the current price of open positions.
pub const MONITOR_TIME_FRAME: TimeFrame = TimeFrame::M5;

/// Cloneable handle passed to the binary and to anything else that needs to
/// steer or observe the engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    positions: Arc<RwLock<Vec<Position>>>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Copy of the open positions as of the end of the last refresh.
    pub async fn open_positions(&self) -> Vec<Position> {
        self.positions.read().await.clone()
    }
}

/// What one refresh cycle changed.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub closed: Vec<(Position, CloseReason)>,
    pub opened: Option<Position>,
}

/// Owns the position ledger and drives monitoring and refill. All ledger
/// writes happen on this task.
pub struct Engine {
    provider: Arc<dyn SnapshotProvider>,
    notifier: Arc<dyn Notifier>,
    collector: CandidateCollector,
    sizer: PositionSizer,
    ledger: PositionLedger,
    min_score: u32,
    price_source: PriceSource,
    notify_progress: bool,
    poll_interval: Duration,
    state: Arc<RwLock<EngineState>>,
    positions: Arc<RwLock<Vec<Position>>>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    pub fn new(
        config: &Config,
        watchlist: WatchlistConfig,
        provider: Arc<dyn SnapshotProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let positions = Arc::new(RwLock::new(Vec::new()));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            positions: positions.clone(),
        };

        let risk = RiskConfig::from(config);
        let min_score = watchlist.min_score;
        let mut collector = CandidateCollector::new(provider.clone(), watchlist);
        if let Some(dir) = &config.audit_log_dir {
            let audit = AuditLog::new(dir);
            info!(dir = %audit.dir().display(), "Writing scored decisions to audit log");
            collector = collector.with_audit(audit);
        }

        let engine = Engine {
            provider,
            notifier,
            collector,
            sizer: PositionSizer::from_config(&risk),
            ledger: PositionLedger::new(&risk),
            min_score,
            price_source: risk.price_source,
            notify_progress: config.notify_progress,
            poll_interval: config.poll_interval,
            state,
            positions,
            command_rx,
        };

        (engine, handle)
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// Run the refresh loop until `Stop` arrives or every handle is dropped.
    /// Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            poll_secs = self.poll_interval.as_secs(),
            max_open_trades = self.ledger.max_open_trades(),
            "Engine running"
        );
        *self.state.write().await = EngineState::Running;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh(Utc::now()).await;
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::RefreshNow) => {
                        info!("Refresh requested");
                        self.refresh(Utc::now()).await;
                    }
                    Some(EngineCommand::Stop) => {
                        info!(open = self.ledger.len(), "Engine stopping");
                        break;
                    }
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },
            }
        }

        *self.state.write().await = EngineState::Stopped;
    }

    /// One cycle: check open positions against fresh prices, then try to
    /// fill a free slot.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> RefreshReport {
        let closed = self.monitor(now).await;
        let opened = self.refill(now).await;

        *self.positions.write().await = self.ledger.positions().to_vec();
        RefreshReport { closed, opened }
    }

    async fn monitor(&mut self, now: DateTime<Utc>) -> Vec<(Position, CloseReason)> {
        let open = self.ledger.positions().to_vec();
        if open.is_empty() {
            return Vec::new();
        }

        let provider = self.provider.clone();
        let source = self.price_source;
        let prices = join_all(
            open.iter()
                .map(|p| provider.current_price(&p.instrument, MONITOR_TIME_FRAME, source)),
        )
        .await;

        let mut closed = Vec::new();
        for (position, price) in open.iter().zip(prices) {
            let price = match price {
                Ok(p) => p,
                Err(e) => {
                    warn!(pair = %position.symbol(), error = %e, "No price for open position");
                    continue;
                }
            };
            let Some(eval) = self.ledger.evaluate(&position.id, price) else {
                continue;
            };
            let Some(current) = self.ledger.get(&position.id).cloned() else {
                continue;
            };

            let progress = eval.progress;
            info!(
                pair = %current.symbol(),
                direction = %current.direction,
                entry = current.entry_price,
                price = progress.current_price,
                to_target = progress.pips_to_target,
                to_stop = progress.pips_to_stop,
                change_pips = progress.change_pips,
                "Position update"
            );
            if self.notify_progress {
                let update = Notification::PositionUpdate {
                    position: current.clone(),
                    progress,
                    at: now,
                };
                deliver(&*self.notifier, &update).await;
            }

            let Some(reason) = eval.close else {
                continue;
            };
            if let Some(removed) = self.ledger.close(&position.id) {
                info!(
                    pair = %removed.symbol(),
                    reason = %reason,
                    price = progress.current_price,
                    "Position closed"
                );
                let msg = Notification::TradeClosed {
                    position: removed.clone(),
                    price: progress.current_price,
                    reason,
                };
                deliver(&*self.notifier, &msg).await;
                closed.push((removed, reason));
            }
        }
        closed
    }

    /// Collect, select and admit at most one new position. Existing
    /// positions are only read, through their exposures.
    async fn refill(&mut self, now: DateTime<Utc>) -> Option<Position> {
        if !self.ledger.refill_due(now) {
            debug!(open = self.ledger.len(), "Refill not due");
            return None;
        }

        let held = self.ledger.exposures();
        let candidates = self.collector.collect(&held, now).await;
        let opened = match select_best(candidates, self.min_score) {
            Some(best) => self.promote(best, now).await,
            None => {
                info!(min_score = self.min_score, "No candidate reached the minimum score");
                None
            }
        };

        self.ledger.mark_refreshed(now);
        opened
    }

    async fn promote(&mut self, best: Candidate, now: DateTime<Utc>) -> Option<Position> {
        info!(
            pair = %best.symbol(),
            time_frame = %best.time_frame,
            direction = %best.direction,
            score = best.score,
            confidence = best.scores.confidence(),
            "Best candidate"
        );
        deliver(&*self.notifier, &Notification::BestCandidate(best.clone())).await;

        let position = match self.sizer.size(&best, now) {
            Ok(p) => p,
            Err(reason) => {
                warn!(pair = %best.symbol(), reason = %reason, "Could not size position");
                return None;
            }
        };

        let opened = match self.ledger.admit(position) {
            Ok(p) => p.clone(),
            Err(_) => return None,
        };
        deliver(&*self.notifier, &Notification::TradeOpened(opened.clone())).await;
        Some(opened)
    }
}
