pub mod event;
pub mod guest;
pub mod seat;
pub mod table;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use checkin_core::CheckinConfig;
use checkin_store::{ChangeEvent, ChangeSink, Store};
use serde::Serialize;
use tracing::{info, warn};

/// Everything a command needs: the opened store and who is acting.
pub struct Context {
    pub store: Store,
    pub actor: String,
}

impl Context {
    pub fn open(config: &CheckinConfig, actor: String) -> anyhow::Result<Self> {
        let store = Store::open(config)
            .with_context(|| format!("opening data directory {}", config.storage.data_dir.display()))?;
        info!(data_dir = ?config.storage.data_dir, "store ready");
        Ok(Self { store, actor })
    }

    /// Forward committed changes to stdout, one JSON object per line.
    pub fn announce(&self, changes: &[ChangeEvent]) {
        let sink = |change: &ChangeEvent| match serde_json::to_string(change) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(change = change.name(), error = %e, "failed to encode change"),
        };
        sink.publish_all(changes);
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn parse_date(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid date {value:?}, expected RFC 3339"))?;
    Ok(parsed.with_timezone(&Utc))
}
