//! Playback Configuration Settings
//!
//! Configuration types for the playback feed, loaded from environment
//! variables and validated into session settings.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::driver::{DriverConfig, TickPolicy};
use crate::application::services::session::SessionConfig;
use crate::domain::errors::UniverseError;
use crate::domain::instrument::InstrumentUniverse;
use crate::domain::tick::TickProfile;

/// Universe, window and scheduling settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Explicit universe; `None` generates `universe_size` identifiers.
    pub instruments: Option<Vec<String>>,
    /// Size of the generated universe.
    pub universe_size: usize,
    /// Instrument active at startup; `None` selects the first member.
    pub initial_instrument: Option<String>,
    /// Tick period `P`.
    pub tick_period: Duration,
    /// Window size `W`.
    pub window_size: usize,
    /// Instrument selection policy.
    pub policy: TickPolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            instruments: None,
            universe_size: 100,
            initial_instrument: None,
            tick_period: Duration::from_millis(500),
            window_size: 500,
            policy: TickPolicy::Random,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Control and health HTTP port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Capacity of the chart frame broadcast channel.
    pub chart_frames_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            chart_frames_capacity: 1_024,
        }
    }
}

/// Complete playback configuration.
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    /// Universe, window and scheduling.
    pub feed: FeedSettings,
    /// Tick waveform.
    pub tick: TickProfile,
    /// Server port settings.
    pub server: ServerSettings,
    /// Broadcast channel settings.
    pub broadcast: BroadcastSettings,
    /// Start ticking as soon as the service is up.
    pub autostart: bool,
}

impl PlaybackConfig {
    /// Create configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults; semantic checks
    /// happen in [`PlaybackConfig::resolve`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let feed_defaults = FeedSettings::default();
        let tick_defaults = TickProfile::default();

        let instruments = lookup("PLAYBACK_INSTRUMENTS").map(|raw| {
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                raw.split(',').map(|s| s.trim().to_string()).collect()
            }
        });

        let initial_instrument = lookup("PLAYBACK_INITIAL_INSTRUMENT")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let feed = FeedSettings {
            instruments,
            universe_size: parse_or(
                &lookup,
                "PLAYBACK_UNIVERSE_SIZE",
                feed_defaults.universe_size,
            ),
            initial_instrument,
            tick_period: parse_duration_millis(
                &lookup,
                "PLAYBACK_TICK_PERIOD_MS",
                feed_defaults.tick_period,
            ),
            window_size: parse_or(&lookup, "PLAYBACK_WINDOW_SIZE", feed_defaults.window_size),
            policy: lookup("PLAYBACK_TICK_POLICY")
                .map(|s| TickPolicy::from_str_case_insensitive(&s))
                .unwrap_or_default(),
        };

        let tick = TickProfile {
            base_price: parse_or(&lookup, "PLAYBACK_BASE_PRICE", tick_defaults.base_price),
            amplitude: parse_or(&lookup, "PLAYBACK_AMPLITUDE", tick_defaults.amplitude),
            wave_period_secs: parse_or(
                &lookup,
                "PLAYBACK_WAVE_PERIOD_SECS",
                tick_defaults.wave_period_secs,
            ),
            noise: parse_or(&lookup, "PLAYBACK_NOISE", tick_defaults.noise),
        };

        let server = ServerSettings {
            http_port: parse_or(
                &lookup,
                "PLAYBACK_HTTP_PORT",
                ServerSettings::default().http_port,
            ),
        };

        let broadcast = BroadcastSettings {
            chart_frames_capacity: parse_or(
                &lookup,
                "PLAYBACK_CHART_CAPACITY",
                BroadcastSettings::default().chart_frames_capacity,
            ),
        };

        let autostart = lookup("PLAYBACK_AUTOSTART").is_some_and(|v| parse_bool(&v));

        Self {
            feed,
            tick,
            server,
            broadcast,
            autostart,
        }
    }

    /// Validate and build the universe and session settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty or duplicated universe, an initial
    /// instrument outside the universe, a zero window or period, or a
    /// non-finite tick profile.
    pub fn resolve(&self) -> Result<(InstrumentUniverse, SessionConfig), ConfigError> {
        let universe = match &self.feed.instruments {
            Some(list) => InstrumentUniverse::new(list.iter().cloned())?,
            None => InstrumentUniverse::generated(self.feed.universe_size)?,
        };

        let initial_instrument = match &self.feed.initial_instrument {
            Some(name) => universe
                .resolve(name)
                .map_err(|_| ConfigError::UnknownInitialInstrument(name.clone()))?
                .clone(),
            None => universe.first().clone(),
        };

        let window = NonZeroUsize::new(self.feed.window_size).ok_or(ConfigError::ZeroWindow)?;

        if self.feed.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }

        if let Some(field) = self.tick.non_finite_field() {
            return Err(ConfigError::InvalidTickProfile(field));
        }

        let session = SessionConfig {
            initial_instrument,
            window,
            driver: DriverConfig {
                period: self.feed.tick_period,
                policy: self.feed.policy,
                profile: self.tick,
            },
        };

        Ok((universe, session))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured universe cannot be built.
    #[error("invalid instrument universe: {0}")]
    InvalidUniverse(#[from] UniverseError),
    /// The initial instrument is not a universe member.
    #[error("initial instrument {0} is not in the universe")]
    UnknownInitialInstrument(String),
    /// Window size was zero.
    #[error("window size must be at least 1")]
    ZeroWindow,
    /// Tick period was zero.
    #[error("tick period must be greater than zero")]
    ZeroTickPeriod,
    /// A tick profile parameter is NaN or infinite.
    #[error("tick profile field {0} must be finite")]
    InvalidTickProfile(&'static str),
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::domain::instrument::Instrument;

    fn config_from(pairs: &[(&str, &str)]) -> PlaybackConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PlaybackConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.feed.universe_size, 100);
        assert_eq!(config.feed.tick_period, Duration::from_millis(500));
        assert_eq!(config.feed.window_size, 500);
        assert_eq!(config.feed.policy, TickPolicy::Random);
        assert_eq!(config.server.http_port, 8083);
        assert_eq!(config.broadcast.chart_frames_capacity, 1_024);
        assert!(!config.autostart);
        assert_eq!(config.tick, TickProfile::default());
    }

    #[test]
    fn default_resolution_selects_first_generated_member() {
        let (universe, session) = config_from(&[]).resolve().unwrap();
        assert_eq!(universe.len(), 100);
        assert_eq!(session.initial_instrument.as_str(), "AAPL1");
        assert_eq!(session.window.get(), 500);
    }

    #[test]
    fn explicit_universe_and_overrides() {
        let config = config_from(&[
            ("PLAYBACK_INSTRUMENTS", " SPY, QQQ ,IWM"),
            ("PLAYBACK_INITIAL_INSTRUMENT", "QQQ"),
            ("PLAYBACK_TICK_PERIOD_MS", "250"),
            ("PLAYBACK_WINDOW_SIZE", "20"),
            ("PLAYBACK_TICK_POLICY", "round-robin"),
            ("PLAYBACK_NOISE", "0"),
            ("PLAYBACK_HTTP_PORT", "9000"),
            ("PLAYBACK_AUTOSTART", "true"),
        ]);
        assert!(config.autostart);
        assert_eq!(config.server.http_port, 9000);

        let (universe, session) = config.resolve().unwrap();
        let names: Vec<&str> = universe.iter().map(Instrument::as_str).collect();
        assert_eq!(names, vec!["SPY", "QQQ", "IWM"]);
        assert_eq!(session.initial_instrument.as_str(), "QQQ");
        assert_eq!(session.driver.period, Duration::from_millis(250));
        assert_eq!(session.driver.policy, TickPolicy::RoundRobin);
        assert!(session.driver.profile.noise.abs() < f64::EPSILON);
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PLAYBACK_WINDOW_SIZE", "lots"),
            ("PLAYBACK_HTTP_PORT", "99999"),
            ("PLAYBACK_BASE_PRICE", "cheap"),
        ]);
        assert_eq!(config.feed.window_size, 500);
        assert_eq!(config.server.http_port, 8083);
        assert!((config.tick.base_price - 100.0).abs() < f64::EPSILON);
    }

    #[test_case("1", true)]
    #[test_case("TRUE", true)]
    #[test_case("yes", true)]
    #[test_case("0", false)]
    #[test_case("off", false)]
    #[test_case("", false)]
    fn autostart_parsing(value: &str, expected: bool) {
        assert_eq!(
            config_from(&[("PLAYBACK_AUTOSTART", value)]).autostart,
            expected
        );
    }

    #[test]
    fn empty_universe_is_rejected() {
        let err = config_from(&[("PLAYBACK_INSTRUMENTS", "  ")])
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUniverse(UniverseError::Empty)
        ));

        let err = config_from(&[("PLAYBACK_UNIVERSE_SIZE", "0")])
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUniverse(UniverseError::Empty)
        ));
    }

    #[test]
    fn duplicate_instrument_is_rejected() {
        let err = config_from(&[("PLAYBACK_INSTRUMENTS", "SPY,QQQ,SPY")])
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUniverse(UniverseError::Duplicate(ref s)) if s == "SPY"
        ));
    }

    #[test]
    fn blank_member_is_rejected() {
        let err = config_from(&[("PLAYBACK_INSTRUMENTS", "SPY,,QQQ")])
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUniverse(UniverseError::BlankIdentifier)
        ));
    }

    #[test]
    fn initial_instrument_outside_universe_is_rejected() {
        let err = config_from(&[("PLAYBACK_INITIAL_INSTRUMENT", "AAPL")])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownInitialInstrument(ref s) if s == "AAPL"));
    }

    #[test]
    fn zero_window_and_period_are_rejected() {
        assert!(matches!(
            config_from(&[("PLAYBACK_WINDOW_SIZE", "0")]).resolve(),
            Err(ConfigError::ZeroWindow)
        ));
        assert!(matches!(
            config_from(&[("PLAYBACK_TICK_PERIOD_MS", "0")]).resolve(),
            Err(ConfigError::ZeroTickPeriod)
        ));
    }

    #[test_case("PLAYBACK_BASE_PRICE", "base_price")]
    #[test_case("PLAYBACK_AMPLITUDE", "amplitude")]
    #[test_case("PLAYBACK_WAVE_PERIOD_SECS", "wave_period_secs")]
    #[test_case("PLAYBACK_NOISE", "noise")]
    fn non_finite_profile_is_rejected(key: &str, field: &str) {
        let err = config_from(&[(key, "NaN")]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTickProfile(f) if f == field));
    }
}
