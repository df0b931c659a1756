//! Handshake configuration.

use std::time::Duration;

/// Environment variable overriding [`HandshakeConfig::timeout`], in seconds.
pub const HANDSHAKE_TIMEOUT_ENV: &str = "CONNCAPTURE_HANDSHAKE_TIMEOUT_SECS";

/// Default time allowed for a handshake before the connection is dropped.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings applied around every handshake the gRPC glue runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Upper bound on a single handshake. Governs only the handshake; reads
    /// and writes afterwards use connection deadlines.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl HandshakeConfig {
    /// Load configuration from the environment.
    ///
    /// Optional:
    /// - `CONNCAPTURE_HANDSHAKE_TIMEOUT_SECS`
    ///
    /// Unparsable values are logged and the default is kept.
    pub fn from_env() -> Self {
        Self::default().with_env_value(std::env::var(HANDSHAKE_TIMEOUT_ENV).ok().as_deref())
    }

    /// Override the handshake timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_env_value(self, value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return self;
        };
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => self.with_timeout(Duration::from_secs(secs)),
            _ => {
                tracing::warn!(
                    var = HANDSHAKE_TIMEOUT_ENV,
                    value = raw,
                    "Ignoring invalid handshake timeout"
                );
                self
            }
        }
    }
}
