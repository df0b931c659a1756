//! Transport credentials under which the gRPC peer address is the live
//! connection.
//!
//! [`CaptureCredentials`] decorates another [`TransportCredentials`] (or
//! none, for cleartext). After the wrapped handshake succeeds, the connection
//! is wrapped in a [`ConnAddr`], which reports itself as its own remote
//! address. Anything that reads the peer address of a call therefore gets a
//! handle to the connection, including its raw file descriptor.
//!
//! # Server
//!
//! ```no_run
//! use conncapture::grpc::{incoming, Listener, Peer};
//! use conncapture::{CaptureCredentials, HandshakeConfig};
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = Listener::bind_unix("/tmp/service.sock")?;
//! let conns = incoming(listener, CaptureCredentials::insecure(), HandshakeConfig::from_env());
//! // tonic::transport::Server::builder().add_service(..).serve_with_incoming(conns)
//! # let _ = conns;
//! # Ok(())
//! # }
//!
//! fn handler(request: &tonic::Request<()>) {
//!     if let Some(conn) = Peer::from_request(request).and_then(Peer::conn) {
//!         let _fd = conn.raw_fd();
//!     }
//! }
//! ```
//!
//! # Client
//!
//! ```no_run
//! use conncapture::grpc::connect;
//! use conncapture::{CaptureCredentials, HandshakeConfig};
//!
//! # async fn run() -> Result<(), conncapture::ConnectError> {
//! let channel = connect(
//!     "unix:///tmp/service.sock",
//!     CaptureCredentials::insecure(),
//!     HandshakeConfig::default(),
//! )
//! .await?;
//! let _peer = channel.current_peer();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod grpc;
pub mod net;

pub use config::HandshakeConfig;
pub use credentials::{
    AuthInfo, CaptureCredentials, Captured, Handshake, ProtocolInfo, TlsAuthInfo, TlsCredentials,
    TransportCredentials,
};
pub use error::{ConnectError, HandshakeError, RawFdError, Side};
pub use grpc::Peer;
pub use net::{capture, Addr, BoxConn, ConnAddr, Connection, Socket, CONN_ADDR_NETWORK};
