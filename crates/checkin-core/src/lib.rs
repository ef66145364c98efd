pub mod config;

pub use config::{CheckinConfig, LimitsConfig, StorageConfig};
