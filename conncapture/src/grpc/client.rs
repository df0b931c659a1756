//! Dial side: a tonic connector that runs the capturing client handshake.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint};
use tower::Service;

use super::{Peer, PeerSlot, PeerStream};
use crate::config::HandshakeConfig;
use crate::credentials::CaptureCredentials;
use crate::error::{ConnectError, HandshakeError};
use crate::net::Socket;

/// Authority presented for unix socket targets, which have no host.
const UNIX_AUTHORITY: &str = "localhost";

/// Where a client dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `unix://path` or `unix:path`.
    #[cfg(unix)]
    Unix(PathBuf),
    /// `host:port`.
    Tcp(String),
}

impl Target {
    /// The authority used for the handshake and the channel URI.
    pub fn authority(&self) -> &str {
        match self {
            #[cfg(unix)]
            Target::Unix(_) => UNIX_AUTHORITY,
            Target::Tcp(addr) => addr,
        }
    }

    /// Open a raw connection to the target.
    pub async fn dial(&self) -> io::Result<Socket> {
        match self {
            #[cfg(unix)]
            Target::Unix(path) => UnixStream::connect(path).await.map(Socket::from),
            Target::Tcp(addr) => TcpStream::connect(addr.as_str()).await.map(Socket::from),
        }
    }
}

impl FromStr for Target {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConnectError::InvalidTarget(s.to_string());

        if let Some(rest) = s.strip_prefix("unix:") {
            #[cfg(unix)]
            {
                let path = rest.strip_prefix("//").unwrap_or(rest);
                if path.is_empty() {
                    return Err(invalid());
                }
                return Ok(Target::Unix(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            {
                let _ = rest;
                return Err(invalid());
            }
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Target::Tcp(s.to_string()))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Target::Unix(path) => write!(f, "unix://{}", path.display()),
            Target::Tcp(addr) => f.write_str(addr),
        }
    }
}

/// Connector handed to `Endpoint::connect_with_connector`.
///
/// Every (re)connect dials the target, runs the capturing client handshake
/// under the configured timeout and records the resulting [`Peer`].
#[derive(Clone)]
pub struct CaptureConnector {
    target: Arc<Target>,
    creds: Arc<CaptureCredentials>,
    config: HandshakeConfig,
    peer: PeerSlot,
}

impl CaptureConnector {
    /// Connector for `target` with an empty peer slot.
    pub fn new(target: Target, creds: CaptureCredentials, config: HandshakeConfig) -> Self {
        Self {
            target: Arc::new(target),
            creds: Arc::new(creds),
            config,
            peer: PeerSlot::default(),
        }
    }

    /// Slot holding the peer of the latest connection.
    pub fn peer_slot(&self) -> PeerSlot {
        self.peer.clone()
    }
}

impl fmt::Debug for CaptureConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConnector")
            .field("target", &self.target)
            .field("creds", &self.creds)
            .field("config", &self.config)
            .finish()
    }
}

impl Service<Uri> for CaptureConnector {
    type Response = TokioIo<PeerStream>;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    // The URI is ignored; the channel only ever talks to `target`.
    fn call(&mut self, _uri: Uri) -> Self::Future {
        let target = self.target.clone();
        let creds = self.creds.clone();
        let timeout = self.config.timeout;
        let slot = self.peer.clone();

        Box::pin(async move {
            let socket = target.dial().await.map_err(|source| {
                tracing::warn!(addr = %target, error = %source, "Dial failed");
                ConnectError::Dial {
                    target: target.to_string(),
                    source,
                }
            })?;

            let handshake = creds.capture_client(target.authority(), Box::new(socket));
            let captured = match tokio::time::timeout(timeout, handshake).await {
                Ok(result) => result,
                Err(_) => Err(HandshakeError::TimedOut(timeout)),
            }
            .map_err(|e| {
                tracing::warn!(addr = %target, error = %e, "Client handshake failed");
                e
            })?;

            let stream = PeerStream::new(captured);
            slot.set(stream.peer().clone());
            tracing::debug!(addr = %target, "Client handshake successful");
            Ok(TokioIo::new(stream))
        })
    }
}

/// Wraps a client channel so every response carries the [`Peer`] that
/// answered it, readable with [`Peer::from_response`].
///
/// The peer is taken from the slot when the request is dispatched. If the
/// channel reconnects between dispatch and the request reaching a
/// connection, the response carries the previous connection's peer, which by
/// then reports itself closed.
#[derive(Debug, Clone)]
pub struct PeerService<S> {
    inner: S,
    peer: PeerSlot,
}

impl<S> PeerService<S> {
    /// Wrap `inner`, reading peers from `peer`.
    pub fn new(inner: S, peer: PeerSlot) -> Self {
        Self { inner, peer }
    }

    /// Peer of the connection the channel currently uses.
    pub fn current_peer(&self) -> Option<Peer> {
        self.peer.current()
    }

    /// The wrapped service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for PeerService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let dispatched = self.peer.current();
        let slot = self.peer.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await?;
            // Nothing was connected at dispatch; the call made the connection.
            if let Some(peer) = dispatched.or_else(|| slot.current()) {
                response.extensions_mut().insert(peer);
            }
            Ok(response)
        })
    }
}

/// A tonic channel whose responses carry their [`Peer`].
pub type PeerChannel = PeerService<Channel>;

/// Dial `target` through `creds` and return a ready channel.
///
/// `target` is `unix://path`, `unix:path` or `host:port`.
pub async fn connect(
    target: &str,
    creds: CaptureCredentials,
    config: HandshakeConfig,
) -> Result<PeerChannel, ConnectError> {
    let target: Target = target.parse()?;
    let uri = format!("http://{}", target.authority());
    let connector = CaptureConnector::new(target, creds, config);
    let slot = connector.peer_slot();

    let channel = Endpoint::from_shared(uri)?
        .connect_with_connector(connector)
        .await?;
    Ok(PeerService::new(channel, slot))
}
