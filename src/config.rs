//! Gateway client configuration

use std::time::Duration;

use snafu::prelude::*;

/// Gateway api version requested by default
pub const DEFAULT_API_VERSION: u8 = 10;
/// Default member count above which guilds are considered large
pub const DEFAULT_LARGE_THRESHOLD: u8 = 250;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);
const READY_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);
const INVALID_SESSION_DELAY_MIN: Duration = Duration::from_secs(1);
const INVALID_SESSION_DELAY_MAX: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 32;

/// Invalid configuration value
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConfigError {
    /// backoff floor is above backoff cap
    #[snafu(display("backoff min {min:?} is greater than backoff max {max:?}"))]
    BackoffRange {
        /// configured floor
        min: Duration,
        /// configured cap
        max: Duration,
    },

    /// invalid session delay range is inverted
    #[snafu(display("invalid session delay min {min:?} is greater than max {max:?}"))]
    InvalidSessionDelayRange {
        /// configured min
        min: Duration,
        /// configured max
        max: Duration,
    },

    /// event channel can not have zero capacity
    #[snafu(display("event buffer size must be positive"))]
    ZeroEventBuffer,

    /// retry limit of zero would never connect
    #[snafu(display("max retries must be positive when set"))]
    ZeroMaxRetries,
}

/// Tunable behavior of a [`Gateway`](crate::ws::Gateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// gateway api version, sent as `v` query parameter
    pub api_version: u8,
    /// bound for establishing the websocket connection
    pub connect_timeout: Duration,
    /// bound for receiving hello after connect
    pub hello_timeout: Duration,
    /// bound for receiving READY/RESUMED after identify/resume
    pub ready_timeout: Duration,
    /// bound for sending close frame when tearing a connection down
    pub close_timeout: Duration,
    /// first delay of exponential reconnect backoff
    pub backoff_min: Duration,
    /// cap of exponential reconnect backoff
    pub backoff_max: Duration,
    /// consecutive failed connection attempts allowed, `None` for unlimited
    pub max_retries: Option<u32>,
    /// time allowed to stay disconnected, `None` for unlimited
    pub max_retry_duration: Option<Duration>,
    /// lower bound of random wait after a non-resumable invalid session
    pub invalid_session_delay_min: Duration,
    /// upper bound of random wait after a non-resumable invalid session
    pub invalid_session_delay_max: Duration,
    /// capacity of the event channel to consumer
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION,
            connect_timeout: CONNECT_TIMEOUT,
            hello_timeout: HELLO_TIMEOUT,
            ready_timeout: READY_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
            backoff_min: BACKOFF_MIN,
            backoff_max: BACKOFF_MAX,
            max_retries: None,
            max_retry_duration: None,
            invalid_session_delay_min: INVALID_SESSION_DELAY_MIN,
            invalid_session_delay_max: INVALID_SESSION_DELAY_MAX,
            event_buffer: EVENT_BUFFER,
        }
    }
}

impl Config {
    /// Set gateway api version
    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    /// Set handshake timeouts
    pub fn with_handshake_timeouts(mut self, hello: Duration, ready: Duration) -> Self {
        self.hello_timeout = hello;
        self.ready_timeout = ready;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long sending the close frame may take on teardown
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set reconnect backoff range
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.backoff_min = min;
        self.backoff_max = max;
        self
    }

    /// Set retry limit
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set how long the client may stay disconnected before giving up
    pub fn with_max_retry_duration(mut self, duration: Duration) -> Self {
        self.max_retry_duration = Some(duration);
        self
    }

    /// Set random wait range after a non-resumable invalid session
    pub fn with_invalid_session_delay(mut self, min: Duration, max: Duration) -> Self {
        self.invalid_session_delay_min = min;
        self.invalid_session_delay_max = max;
        self
    }

    /// Set event channel capacity
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Check values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.backoff_min <= self.backoff_max,
            error::BackoffRange {
                min: self.backoff_min,
                max: self.backoff_max,
            }
        );
        ensure!(
            self.invalid_session_delay_min <= self.invalid_session_delay_max,
            error::InvalidSessionDelayRange {
                min: self.invalid_session_delay_min,
                max: self.invalid_session_delay_max,
            }
        );
        ensure!(self.event_buffer > 0, error::ZeroEventBuffer);
        ensure!(self.max_retries != Some(0), error::ZeroMaxRetries);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.api_version, 10);
        assert_eq!(config.backoff_min, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(60));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn test_setters_change_timeouts() {
        let config = Config::default()
            .with_connect_timeout(Duration::from_secs(3))
            .with_handshake_timeouts(Duration::from_secs(4), Duration::from_secs(5))
            .with_close_timeout(Duration::from_millis(500));

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.hello_timeout, Duration::from_secs(4));
        assert_eq!(config.ready_timeout, Duration::from_secs(5));
        assert_eq!(config.close_timeout, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_inverted_backoff() {
        let config =
            Config::default().with_backoff(Duration::from_secs(10), Duration::from_secs(1));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::BackoffRange { .. })
        ));
    }

    #[test]
    fn test_config_rejects_zero_values() {
        let config = Config::default().with_event_buffer(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroEventBuffer)
        ));

        let config = Config::default().with_max_retries(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMaxRetries)));
    }
}
