//! TLS credentials over rustls.
//!
//! A single [`TlsCredentials`] can serve both ends: it holds an optional
//! client config and an optional server config, and fails the handshake for a
//! side it has no config for.

use std::any::Any;
use std::fmt;
use std::io;
#[cfg(unix)]
use std::os::fd::RawFd;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ServerConfig};
use tokio::time::Instant;
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};

use super::{AuthInfo, Handshake, ProtocolInfo, TransportCredentials};
use crate::error::{HandshakeError, Side};
use crate::net::{Addr, BoxConn, Connection};

/// Lowest protocol version the rustls configs negotiate.
const SECURITY_VERSION: &str = "1.2";

/// What a TLS handshake established.
#[derive(Debug, Clone)]
pub struct TlsAuthInfo {
    /// Certificates the peer presented, leaf first. Empty if none.
    pub peer_certificates: Vec<CertificateDer<'static>>,
    /// Negotiated protocol version, e.g. `"TLSv1_3"`.
    pub protocol_version: Option<String>,
    /// Negotiated ALPN protocol.
    pub alpn_protocol: Option<Vec<u8>>,
}

impl TlsAuthInfo {
    fn from_common(conn: &rustls::CommonState) -> Self {
        Self {
            peer_certificates: conn
                .peer_certificates()
                .map(|certs| certs.to_vec())
                .unwrap_or_default(),
            protocol_version: conn.protocol_version().map(|v| format!("{v:?}")),
            alpn_protocol: conn.alpn_protocol().map(|p| p.to_vec()),
        }
    }
}

impl AuthInfo for TlsAuthInfo {
    fn auth_type(&self) -> &str {
        "tls"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// rustls-backed [`TransportCredentials`].
#[derive(Clone, Default)]
pub struct TlsCredentials {
    client: Option<Arc<ClientConfig>>,
    server: Option<Arc<ServerConfig>>,
    server_name: Option<ServerName<'static>>,
}

impl TlsCredentials {
    /// Credentials for both ends.
    pub fn new(client: Arc<ClientConfig>, server: Arc<ServerConfig>) -> Self {
        Self {
            client: Some(client),
            server: Some(server),
            server_name: None,
        }
    }

    /// Credentials that can only dial.
    pub fn client(config: Arc<ClientConfig>) -> Self {
        Self {
            client: Some(config),
            ..Default::default()
        }
    }

    /// Credentials that can only accept.
    pub fn server(config: Arc<ServerConfig>) -> Self {
        Self {
            server: Some(config),
            ..Default::default()
        }
    }

    fn resolve_server_name(&self, authority: &str) -> Result<ServerName<'static>, HandshakeError> {
        if let Some(name) = &self.server_name {
            return Ok(name.clone());
        }
        parse_server_name(strip_port(authority))
    }
}

/// `host:port` or `[v6]:port` to the bare host.
fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => authority,
    }
}

fn parse_server_name(name: &str) -> Result<ServerName<'static>, HandshakeError> {
    ServerName::try_from(name.to_string())
        .map_err(|_| HandshakeError::InvalidServerName(name.to_string()))
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("client", &self.client.is_some())
            .field("server", &self.server.is_some())
            .field("server_name", &self.server_name)
            .finish()
    }
}

#[tonic::async_trait]
impl TransportCredentials for TlsCredentials {
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxConn,
    ) -> Result<Handshake, HandshakeError> {
        let config = self
            .client
            .clone()
            .ok_or(HandshakeError::NotConfigured(Side::Client))?;
        let server_name = self.resolve_server_name(authority)?;

        let stream = TlsConnector::from(config).connect(server_name, conn).await?;
        let auth_info = TlsAuthInfo::from_common(stream.get_ref().1);
        Ok(Handshake {
            conn: Box::new(stream),
            auth_info: Some(Arc::new(auth_info)),
        })
    }

    async fn server_handshake(&self, conn: BoxConn) -> Result<Handshake, HandshakeError> {
        let config = self
            .server
            .clone()
            .ok_or(HandshakeError::NotConfigured(Side::Server))?;

        let stream = TlsAcceptor::from(config).accept(conn).await?;
        let auth_info = TlsAuthInfo::from_common(stream.get_ref().1);
        Ok(Handshake {
            conn: Box::new(stream),
            auth_info: Some(Arc::new(auth_info)),
        })
    }

    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            protocol_version: String::new(),
            security_protocol: "tls".to_string(),
            security_version: SECURITY_VERSION.to_string(),
            server_name: self
                .server_name
                .as_ref()
                .map(|name| name.to_str().into_owned())
                .unwrap_or_default(),
        }
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials> {
        Box::new(self.clone())
    }

    fn override_server_name(&mut self, name: &str) -> Result<(), HandshakeError> {
        self.server_name = Some(parse_server_name(name)?);
        Ok(())
    }
}

// Handshaken streams stay connections; everything but the bytes themselves
// is answered by the transport underneath.
macro_rules! tls_connection {
    ($stream:ty) => {
        impl<C: Connection> Connection for $stream {
            fn local_addr(&self) -> io::Result<Addr> {
                self.get_ref().0.local_addr()
            }

            fn remote_addr(&self) -> io::Result<Addr> {
                self.get_ref().0.remote_addr()
            }

            fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
                self.get_mut().0.set_read_deadline(deadline)
            }

            fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
                self.get_mut().0.set_write_deadline(deadline)
            }

            #[cfg(unix)]
            fn raw_fd(&self) -> Option<RawFd> {
                self.get_ref().0.raw_fd()
            }
        }
    };
}

tls_connection!(client::TlsStream<C>);
tls_connection!(server::TlsStream<C>);
