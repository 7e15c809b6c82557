use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{Candidate, CloseReason, Position, Progress, Result};

/// Outbound human-readable message sink (Telegram, log, ...).
///
/// Delivery failures are reported as `Error::Notification` and must never
/// abort the caller; use [`deliver`] rather than calling `send` directly.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Notifier that writes every message to the log. Used when no Telegram
/// credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        info!(target: "notify", "{text}");
        Ok(())
    }
}

/// Something worth telling the operator about.
#[derive(Debug, Clone)]
pub enum Notification {
    BestCandidate(Candidate),
    TradeOpened(Position),
    PositionUpdate {
        position: Position,
        progress: Progress,
        at: DateTime<Utc>,
    },
    TradeClosed {
        position: Position,
        price: f64,
        reason: CloseReason,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::BestCandidate(c) => {
                write!(
                    f,
                    "Best opportunity is to {} {} ({}) with an analysis score of {} (confidence {}%).",
                    c.direction,
                    c.symbol(),
                    c.time_frame,
                    c.score,
                    c.scores.confidence()
                )?;
                for line in &c.reasoning {
                    write!(f, "\n- {line}")?;
                }
                Ok(())
            }
            Notification::TradeOpened(p) => write!(
                f,
                "{} trade opened: {} at {:.4}, lot size: {:.2} units.\n\
                 Target: {:.4} ({} pips), Stop Loss: {:.4} ({} pips)",
                p.direction,
                p.symbol(),
                p.entry_price,
                p.size,
                p.target_price,
                p.target_pips,
                p.stop_loss,
                p.stop_pips
            ),
            Notification::PositionUpdate {
                position: p,
                progress,
                at,
            } => write!(
                f,
                "Pair:    {}, {}\n\
                 Entry:   {:.4}, Current: {:.4}\n\
                 Target:  {:.4} to target: {:.1} pips\n\
                 Loss:    {:.4} to stop: {:.1} pips\n\
                 Change:  {:.4} {:.1} pips\n\
                 Updated: {}",
                p.direction,
                p.symbol(),
                p.entry_price,
                progress.current_price,
                p.target_price,
                progress.pips_to_target,
                p.stop_loss,
                progress.pips_to_stop,
                progress.change,
                progress.change_pips,
                at.format("%H:%M:%S")
            ),
            Notification::TradeClosed {
                position: p,
                price,
                reason,
            } => {
                let bound = match reason {
                    CloseReason::TargetHit => p.target_price,
                    CloseReason::StopHit => p.stop_loss,
                };
                write!(
                    f,
                    "{reason} for {} {}.\n\
                     Entry: {:.4}, Closed at: {:.4}, Change: {:.4}\n\
                     Bound: {:.4}. Trade closed.",
                    p.direction,
                    p.symbol(),
                    p.entry_price,
                    price,
                    price - p.entry_price,
                    bound
                )
            }
        }
    }
}

/// Deliver a notification, absorbing failures.
///
/// On failure a short error report is attempted through the same notifier;
/// if that fails too, both errors are logged.
pub async fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    let text = notification.to_string();
    if let Err(e) = notifier.send(&text).await {
        warn!(error = %e, "Notification delivery failed");
        let report = format!("An error occurred sending message: {e}");
        if let Err(e) = notifier.send(&report).await {
            warn!(error = %e, "Fallback notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::{
        Direction, DirectionScores, Error, Indicators, Instrument, MarketKind, PipSpec, TimeFrame,
    };

    /// Fails the first `failures` sends, records everything that got through.
    struct Flaky {
        failures: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Flaky {
        async fn send(&self, text: &str) -> Result<()> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Notification("boom".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn position() -> Position {
        Position {
            id: "p1".into(),
            instrument: Instrument {
                symbol: "EURUSD".into(),
                category: "forex".into(),
                kind: MarketKind::Forex,
                screener: "forex".into(),
                exchange: "FX_IDC".into(),
            },
            time_frame: TimeFrame::H1,
            direction: Direction::Buy,
            entry_price: 1.1,
            stop_loss: 1.098,
            target_price: 1.103,
            size: 1.0,
            pip: PipSpec { value: 0.0001, scale: 4 },
            stop_pips: 20.0,
            target_pips: 30.0,
            risk_usd: 200.0,
            opened_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_delivery_falls_back_to_error_report() {
        let notifier = Flaky {
            failures: Mutex::new(1),
            sent: Mutex::new(Vec::new()),
        };
        deliver(&notifier, &Notification::TradeOpened(position())).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("An error occurred sending message"));
    }

    #[tokio::test]
    async fn double_failure_is_absorbed() {
        let notifier = Flaky {
            failures: Mutex::new(2),
            sent: Mutex::new(Vec::new()),
        };
        deliver(&notifier, &Notification::TradeOpened(position())).await;
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn closed_message_names_the_bound_hit() {
        let text = Notification::TradeClosed {
            position: position(),
            price: 1.0979,
            reason: CloseReason::StopHit,
        }
        .to_string();
        assert!(text.starts_with("Stop loss hit for BUY EURUSD"));
        assert!(text.contains("Bound: 1.0980"));
    }

    #[test]
    fn candidate_message_lists_reasoning() {
        let candidate = Candidate {
            instrument: position().instrument,
            time_frame: TimeFrame::H1,
            score: 4,
            direction: Direction::Buy,
            reasoning: vec!["RSI is below 30 - potential BUY".into()],
            scores: DirectionScores { buy: 4, sell: 0, wait: 0 },
            indicators: Indicators::new(),
        };
        let text = Notification::BestCandidate(candidate).to_string();
        assert!(text.contains("BUY EURUSD (1h) with an analysis score of 4"));
        assert!(text.ends_with("\n- RSI is below 30 - potential BUY"));
    }
}
