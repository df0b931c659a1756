//! Transport credentials: pluggable handshake providers.
//!
//! [`TransportCredentials`] is the contract an RPC transport calls into when a
//! connection is dialed or accepted. [`CaptureCredentials`] implements it by
//! decorating another implementation (or none), and [`TlsCredentials`] is a
//! rustls-backed implementation to decorate.

mod capture;
mod tls;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::HandshakeError;
use crate::net::BoxConn;

pub use capture::{CaptureCredentials, Captured};
pub use tls::{TlsAuthInfo, TlsCredentials};

/// Security information produced by a handshake.
pub trait AuthInfo: fmt::Debug + Send + Sync + 'static {
    /// Short name of the mechanism, e.g. `"tls"`.
    fn auth_type(&self) -> &str;

    /// For downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Static description of what a credentials implementation provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// RPC protocol version, empty if unspecified.
    pub protocol_version: String,
    /// Security protocol name, e.g. `"tls"`. Empty for cleartext.
    pub security_protocol: String,
    /// Security protocol version.
    pub security_version: String,
    /// Server name used for verification on the client side.
    pub server_name: String,
}

/// A connection that finished its handshake.
pub struct Handshake {
    /// The connection to use from now on.
    pub conn: BoxConn,
    /// What the handshake established, if anything.
    pub auth_info: Option<Arc<dyn AuthInfo>>,
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("auth_info", &self.auth_info)
            .finish_non_exhaustive()
    }
}

/// Handshake provider for a connection-oriented RPC transport.
#[tonic::async_trait]
pub trait TransportCredentials: Send + Sync + 'static {
    /// Run the dialing side of the handshake. `authority` is the name the
    /// client dialed.
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxConn,
    ) -> Result<Handshake, HandshakeError>;

    /// Run the accepting side of the handshake.
    async fn server_handshake(&self, conn: BoxConn) -> Result<Handshake, HandshakeError>;

    /// Describe the protocol. Must not have side effects.
    fn info(&self) -> ProtocolInfo;

    /// An independent copy of these credentials.
    fn clone_box(&self) -> Box<dyn TransportCredentials>;

    /// Use `name` instead of the dial authority when verifying servers.
    fn override_server_name(&mut self, name: &str) -> Result<(), HandshakeError>;
}

impl Clone for Box<dyn TransportCredentials> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
