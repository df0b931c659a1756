//! Error types.

use std::fmt;
use std::io;
use std::time::Duration;

/// Which end of a connection a handshake runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The dialing side.
    Client,
    /// The accepting side.
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Server => f.write_str("server"),
        }
    }
}

/// Errors produced by a transport handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The underlying connection failed during the handshake.
    #[error("handshake i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The authority or override is not a usable server name.
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    /// The credentials carry no configuration for this side.
    #[error("{0} handshake is not configured for these credentials")]
    NotConfigured(Side),

    /// The handshake did not finish in time.
    #[error("handshake did not complete within {0:?}")]
    TimedOut(Duration),
}

/// Errors produced while establishing a client channel.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The target string could not be parsed.
    #[error("invalid target {0:?}")]
    InvalidTarget(String),

    /// Dialing the target failed.
    #[error("failed to dial {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The connection was dialed but the handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// tonic could not build the channel.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Why a captured connection could not hand out its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RawFdError {
    /// The wrapped connection has no OS-level descriptor to expose.
    #[error("connection does not expose a raw descriptor")]
    Unsupported,

    /// The connection was closed or released by its owner.
    #[error("connection is closed")]
    Closed,

    /// A thread panicked while holding the connection.
    #[error("connection lock poisoned")]
    Poisoned,
}

impl From<RawFdError> for io::Error {
    fn from(err: RawFdError) -> Self {
        let kind = match err {
            RawFdError::Unsupported => io::ErrorKind::Unsupported,
            RawFdError::Closed => io::ErrorKind::NotConnected,
            RawFdError::Poisoned => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
