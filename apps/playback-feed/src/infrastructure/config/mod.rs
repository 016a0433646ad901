//! Configuration Module
//!
//! Configuration loading and validation for the playback feed.

mod settings;

pub use settings::{BroadcastSettings, ConfigError, FeedSettings, PlaybackConfig, ServerSettings};
