//! Per-call peer information.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tonic::transport::server::Connected;

use crate::credentials::{AuthInfo, Captured};
use crate::net::{Addr, ConnAddr};

/// The other end of a call.
///
/// For connections handshaken by [`CaptureCredentials`](crate::CaptureCredentials)
/// `addr` is [`Addr::Conn`]: a view of the live connection carrying the call.
/// Holding a `Peer` does not keep that connection open.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Peer address.
    pub addr: Addr,
    /// What the handshake established, if anything.
    pub auth_info: Option<Arc<dyn AuthInfo>>,
}

impl Peer {
    /// Peer of an incoming call, as seen by a server handler.
    pub fn from_request<T>(request: &tonic::Request<T>) -> Option<&Peer> {
        request.extensions().get::<Peer>()
    }

    /// Peer that answered a call, as seen by a client going through
    /// [`PeerService`](super::PeerService).
    pub fn from_response<T>(response: &tonic::Response<T>) -> Option<&Peer> {
        response.extensions().get::<Peer>()
    }

    /// The connection behind the address, if it was captured.
    pub fn conn(&self) -> Option<&ConnAddr> {
        self.addr.as_conn()
    }
}

impl From<&Captured> for Peer {
    fn from(captured: &Captured) -> Self {
        Self {
            addr: captured.conn.remote_addr(),
            auth_info: captured.auth_info.clone(),
        }
    }
}

/// A captured connection handed to tonic.
///
/// Its [`Connected::connect_info`] is the [`Peer`], which tonic attaches to
/// every request served over it. The stream owns the connection: once tonic
/// drops it, the socket closes and every `Peer` view reports it closed.
pub struct PeerStream {
    conn: ConnAddr,
    peer: Peer,
}

impl PeerStream {
    /// Take ownership of a handshaken connection.
    pub fn new(captured: Captured) -> Self {
        let peer = Peer::from(&captured);
        Self {
            conn: captured.conn,
            peer,
        }
    }

    /// The peer tonic will see for this connection.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }
}

impl Connected for PeerStream {
    type ConnectInfo = Peer;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.peer.clone()
    }
}

impl AsyncRead for PeerStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_read(cx, buf)
    }
}

impl AsyncWrite for PeerStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.conn).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.conn).poll_shutdown(cx)
    }
}

/// Latest peer of a client channel.
///
/// Written by the connector on every (re)connect and read on every response,
/// lock-free on both paths.
#[derive(Clone, Default)]
pub struct PeerSlot {
    current: Arc<ArcSwapOption<Peer>>,
}

impl PeerSlot {
    /// The peer of the connection most recently established.
    pub fn current(&self) -> Option<Peer> {
        self.current.load_full().map(|peer| (*peer).clone())
    }

    pub(crate) fn set(&self, peer: Peer) {
        self.current.store(Some(Arc::new(peer)));
    }
}

impl std::fmt::Debug for PeerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSlot")
            .field("current", &self.current.load().as_deref())
            .finish()
    }
}
