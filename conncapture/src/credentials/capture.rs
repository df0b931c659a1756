//! Credentials decorator that captures the handshaken connection.
//!
//! Delegates to the wrapped credentials first; only a connection that
//! completed that handshake gets wrapped in [`ConnAddr`]. Wrapping earlier
//! would hand the inner implementation an adapter instead of the raw socket.

use std::fmt;
use std::sync::Arc;

use super::{AuthInfo, Handshake, ProtocolInfo, TransportCredentials};
use crate::error::HandshakeError;
use crate::net::{BoxConn, ConnAddr};

#[derive(Clone, Default)]
enum Inner {
    /// Cleartext: the connection is used as dialed or accepted.
    #[default]
    Insecure,
    Secured(Box<dyn TransportCredentials>),
}

/// Outcome of a capturing handshake.
#[derive(Debug)]
pub struct Captured {
    /// The handshaken connection, reporting itself as its remote address.
    pub conn: ConnAddr,
    /// Whatever the wrapped credentials established; `None` for cleartext.
    pub auth_info: Option<Arc<dyn AuthInfo>>,
}

/// Transport credentials under which the peer address *is* the connection.
///
/// Wraps zero or one other [`TransportCredentials`] without changing its
/// authentication in any way. With nothing wrapped, handshakes are cleartext
/// passthroughs and capture still happens.
#[derive(Clone, Default)]
pub struct CaptureCredentials {
    inner: Inner,
}

impl CaptureCredentials {
    /// Decorate `inner`, or nothing for cleartext.
    pub fn new(inner: Option<Box<dyn TransportCredentials>>) -> Self {
        let inner = match inner {
            Some(creds) => Inner::Secured(creds),
            None => Inner::Insecure,
        };
        Self { inner }
    }

    /// Cleartext credentials that still capture the connection.
    pub fn insecure() -> Self {
        Self::default()
    }

    /// Decorate `creds`.
    pub fn wrap<T: TransportCredentials>(creds: T) -> Self {
        Self::new(Some(Box::new(creds)))
    }

    /// Whether a security implementation is wrapped.
    pub fn is_secured(&self) -> bool {
        matches!(self.inner, Inner::Secured(_))
    }

    /// Client handshake returning the concrete adapter.
    pub async fn capture_client(
        &self,
        authority: &str,
        conn: BoxConn,
    ) -> Result<Captured, HandshakeError> {
        let handshake = match &self.inner {
            Inner::Insecure => Handshake {
                conn,
                auth_info: None,
            },
            Inner::Secured(creds) => creds.client_handshake(authority, conn).await?,
        };
        tracing::trace!(authority, secured = self.is_secured(), "capturing client connection");
        Ok(capture(handshake))
    }

    /// Server handshake returning the concrete adapter.
    pub async fn capture_server(&self, conn: BoxConn) -> Result<Captured, HandshakeError> {
        let handshake = match &self.inner {
            Inner::Insecure => Handshake {
                conn,
                auth_info: None,
            },
            Inner::Secured(creds) => creds.server_handshake(conn).await?,
        };
        tracing::trace!(secured = self.is_secured(), "capturing server connection");
        Ok(capture(handshake))
    }
}

fn capture(handshake: Handshake) -> Captured {
    Captured {
        conn: ConnAddr::from_boxed(handshake.conn),
        auth_info: handshake.auth_info,
    }
}

impl fmt::Debug for CaptureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureCredentials")
            .field("info", &self.info())
            .finish()
    }
}

#[tonic::async_trait]
impl TransportCredentials for CaptureCredentials {
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxConn,
    ) -> Result<Handshake, HandshakeError> {
        let captured = self.capture_client(authority, conn).await?;
        Ok(Handshake {
            conn: Box::new(captured.conn),
            auth_info: captured.auth_info,
        })
    }

    async fn server_handshake(&self, conn: BoxConn) -> Result<Handshake, HandshakeError> {
        let captured = self.capture_server(conn).await?;
        Ok(Handshake {
            conn: Box::new(captured.conn),
            auth_info: captured.auth_info,
        })
    }

    fn info(&self) -> ProtocolInfo {
        match &self.inner {
            Inner::Insecure => ProtocolInfo::default(),
            Inner::Secured(creds) => creds.info(),
        }
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials> {
        Box::new(self.clone())
    }

    fn override_server_name(&mut self, name: &str) -> Result<(), HandshakeError> {
        match &mut self.inner {
            Inner::Insecure => Ok(()),
            Inner::Secured(creds) => creds.override_server_name(name),
        }
    }
}
