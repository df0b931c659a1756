//! Accept side: turns a listener into a stream of captured connections.

use std::io;
#[cfg(unix)]
use std::path::Path;

use async_stream::stream;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tokio_stream::Stream;

use super::PeerStream;
use crate::config::HandshakeConfig;
use crate::credentials::CaptureCredentials;
use crate::error::HandshakeError;
use crate::net::{Addr, Socket};

/// A bound stream listener.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Bind a unix domain socket at `path`.
    #[cfg(unix)]
    pub fn bind_unix(path: impl AsRef<Path>) -> io::Result<Self> {
        UnixListener::bind(path).map(Listener::Unix)
    }

    /// Bind a TCP socket.
    pub async fn bind_tcp(addr: &str) -> io::Result<Self> {
        TcpListener::bind(addr).await.map(Listener::Tcp)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<Addr> {
        match self {
            Listener::Tcp(l) => l.local_addr().map(Addr::from),
            #[cfg(unix)]
            Listener::Unix(l) => l.local_addr().map(Addr::from),
        }
    }

    /// Accept one raw connection.
    pub async fn accept(&self) -> io::Result<(Socket, Addr)> {
        match self {
            Listener::Tcp(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((Socket::from(stream), Addr::from(addr)))
            }
            #[cfg(unix)]
            Listener::Unix(l) => {
                let (stream, addr) = l.accept().await?;
                Ok((Socket::from(stream), Addr::from(addr)))
            }
        }
    }
}

impl From<TcpListener> for Listener {
    fn from(listener: TcpListener) -> Self {
        Listener::Tcp(listener)
    }
}

#[cfg(unix)]
impl From<UnixListener> for Listener {
    fn from(listener: UnixListener) -> Self {
        Listener::Unix(listener)
    }
}

/// Accept connections on `listener` and run the capturing server handshake
/// on each, for use with `Server::serve_with_incoming`.
///
/// Handshakes run concurrently, each bounded by `config.timeout`. Failed
/// handshakes are logged and dropped without affecting the listener.
/// Dropping the stream stops accepting and cancels pending handshakes.
pub fn incoming(
    listener: impl Into<Listener>,
    creds: CaptureCredentials,
    config: HandshakeConfig,
) -> impl Stream<Item = io::Result<PeerStream>> {
    let listener = listener.into();
    let timeout = config.timeout;

    stream! {
        let mut pending = JoinSet::new();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            let creds = creds.clone();
                            pending.spawn(async move {
                                (peer_addr, handshake(&creds, socket, timeout).await)
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                    }
                }

                Some(joined) = pending.join_next(), if !pending.is_empty() => {
                    match joined {
                        Ok((peer_addr, Ok(conn))) => {
                            tracing::debug!(peer = %peer_addr, network = peer_addr.network(), "Server handshake successful");
                            yield Ok::<_, io::Error>(conn);
                        }
                        Ok((peer_addr, Err(e))) => {
                            tracing::warn!(peer = %peer_addr, error = %e, "Server handshake failed");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Handshake task failed");
                        }
                    }
                }
            }
        }
    }
}

async fn handshake(
    creds: &CaptureCredentials,
    socket: Socket,
    timeout: std::time::Duration,
) -> Result<PeerStream, HandshakeError> {
    match tokio::time::timeout(timeout, creds.capture_server(Box::new(socket))).await {
        Ok(captured) => Ok(PeerStream::new(captured?)),
        Err(_) => Err(HandshakeError::TimedOut(timeout)),
    }
}
