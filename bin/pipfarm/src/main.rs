use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, EngineCommand, LogNotifier, Notifier, SnapshotProvider};
use engine::{Engine, TradingViewClient};
use strategy::WatchlistConfig;
use telegram_notify::TelegramNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("Failed to load configuration")?;
    let watchlist = WatchlistConfig::load(&cfg.watchlist_path)
        .with_context(|| format!("Failed to load watchlist {}", cfg.watchlist_path))?;
    info!(
        symbols = watchlist.instruments().len(),
        time_frames = watchlist.time_frames.len(),
        min_score = watchlist.min_score,
        max_open_trades = cfg.max_open_trades,
        "pipfarm starting"
    );

    // ── Collaborators ─────────────────────────────────────────────────────────
    let provider: Arc<dyn SnapshotProvider> = Arc::new(
        TradingViewClient::new(&cfg.tradingview_url).context("Failed to build scanner client")?,
    );

    let notifier: Arc<dyn Notifier> = match &cfg.telegram {
        Some(tg) => {
            info!(chat_id = tg.chat_id, "Notifications go to Telegram");
            Arc::new(TelegramNotifier::from_config(tg))
        }
        None => {
            warn!("TELEGRAM_TOKEN not set, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    if let Some(dir) = &cfg.audit_log_dir {
        info!(dir = %dir.display(), "Decision audit enabled");
    }

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(&cfg, watchlist, provider, notifier);
    let task = tokio::spawn(engine.run());

    info!("Engine started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping engine");

    handle.send(EngineCommand::Stop).await;
    task.await.context("Engine task panicked")?;

    let open = handle.open_positions().await;
    if !open.is_empty() {
        warn!(open = open.len(), "Exiting with positions still open");
    }
    Ok(())
}
