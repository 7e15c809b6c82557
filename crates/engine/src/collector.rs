use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use common::{Candidate, Exposure, Instrument, SnapshotProvider, TimeFrame};
use strategy::{ScoringPolicy, WatchlistConfig};

use crate::audit::AuditLog;

/// Scores every tracked (instrument, time frame) pair and turns the results
/// into candidates. Read-only against the ledger: callers pass in a view of
/// the exposures currently held.
pub struct CandidateCollector {
    provider: Arc<dyn SnapshotProvider>,
    watchlist: WatchlistConfig,
    audit: Option<AuditLog>,
}

impl CandidateCollector {
    pub fn new(provider: Arc<dyn SnapshotProvider>, watchlist: WatchlistConfig) -> Self {
        Self {
            provider,
            watchlist,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.watchlist.scoring
    }

    /// Instruments eligible for a new position at `now`: the weekday's scan
    /// set minus anything sharing a currency with `held`.
    pub fn eligible(&self, held: &[Exposure], now: DateTime<Utc>) -> Vec<Instrument> {
        self.watchlist
            .instruments_for(now.weekday())
            .into_iter()
            .filter(|instrument| {
                let exposure = instrument.exposure();
                let clash = held.iter().any(|h| h.overlaps(&exposure));
                if clash {
                    debug!(pair = %instrument.symbol, "Skipping pair, currency already held");
                }
                !clash
            })
            .collect()
    }

    /// Score all eligible pairs concurrently. Output order is watchlist
    /// order, then time-frame order. A pair whose snapshot fails is logged
    /// and left out; the rest of the scan carries on.
    pub async fn collect(&self, held: &[Exposure], now: DateTime<Utc>) -> Vec<Candidate> {
        let instruments = self.eligible(held, now);
        let jobs: Vec<(&Instrument, TimeFrame)> = instruments
            .iter()
            .flat_map(|i| self.watchlist.time_frames.iter().map(move |tf| (i, *tf)))
            .collect();

        info!(pairs = instruments.len(), jobs = jobs.len(), "Collecting candidates");

        let results = join_all(
            jobs.iter()
                .map(|(instrument, tf)| self.evaluate(instrument, *tf, now)),
        )
        .await;

        results.into_iter().flatten().collect()
    }

    async fn evaluate(
        &self,
        instrument: &Instrument,
        time_frame: TimeFrame,
        now: DateTime<Utc>,
    ) -> Option<Candidate> {
        let snapshot = match self.provider.snapshot(instrument, time_frame).await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    pair = %instrument.symbol,
                    time_frame = %time_frame,
                    error = %e,
                    "Snapshot unavailable, skipping"
                );
                return None;
            }
        };

        let decision = self.policy().score(&snapshot);
        debug!(
            pair = %instrument.symbol,
            time_frame = %time_frame,
            leading = %decision.leading(),
            confidence = decision.confidence(),
            "Scored"
        );

        if let Some(audit) = &self.audit {
            audit.record(&snapshot, &decision, now).await;
        }

        Some(Candidate::new(
            instrument.clone(),
            time_frame,
            decision,
            snapshot.indicators,
        ))
    }
}
