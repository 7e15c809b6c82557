use async_trait::async_trait;

use crate::{Error, IndicatorSnapshot, Instrument, PriceSource, Result, TimeFrame};

/// Abstraction over the market-data source.
///
/// `TradingViewClient` in `crates/engine` implements this against the public
/// scanner. Tests use in-memory fakes.
///
/// Implementations must return `Error::DataUnavailable` (not panic) when a
/// market is closed or a symbol is unknown, so callers can skip that pair for
/// the cycle.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the moving-average bundle and indicator readings for one
    /// instrument on one time frame.
    async fn snapshot(&self, instrument: &Instrument, time_frame: TimeFrame)
        -> Result<IndicatorSnapshot>;

    /// Latest price for an instrument, read from a fresh snapshot.
    async fn current_price(
        &self,
        instrument: &Instrument,
        time_frame: TimeFrame,
        source: PriceSource,
    ) -> Result<f64> {
        let snapshot = self.snapshot(instrument, time_frame).await?;
        snapshot
            .indicators
            .price(source)
            .ok_or_else(|| Error::unavailable(&instrument.symbol, format!("no {source} price")))
    }
}
