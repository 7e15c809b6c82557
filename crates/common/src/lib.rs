pub mod config;
pub mod error;
pub mod instrument;
pub mod notify;
pub mod provider;
pub mod types;

pub use config::{Config, TelegramConfig};
pub use error::{Error, Result};
pub use instrument::{Exposure, Instrument, MarketKind, PipSpec, TimeFrame};
pub use notify::{deliver, LogNotifier, Notification, Notifier};
pub use provider::SnapshotProvider;
pub use types::*;
