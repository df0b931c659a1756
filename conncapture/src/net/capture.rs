//! A connection that is also its own remote address.
//!
//! RPC frameworks copy whatever a connection reports as its remote address
//! into the per-call peer slot. Wrapping the connection in [`ConnAddr`] makes
//! that value the live connection itself, so handlers on either end can get
//! at the socket (and its descriptor) behind a call.

use std::fmt;
use std::future::poll_fn;
use std::io;
#[cfg(unix)]
use std::os::fd::{BorrowedFd, RawFd};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use super::{Addr, BoxConn, Connection};
#[cfg(unix)]
use crate::error::RawFdError;

/// Network family reported by every [`ConnAddr`].
///
/// Fixed regardless of the wrapped transport; the string form is always empty.
pub const CONN_ADDR_NETWORK: &str = "unix";

/// Wrap `conn` so that its remote address is the connection itself.
///
/// Usable outside the handshake path, e.g. on a socket that will never be
/// handshaken at all. The returned handle owns `conn`.
pub fn capture<C: Connection>(conn: C) -> ConnAddr {
    ConnAddr::new(conn)
}

/// Handle over one live connection.
///
/// The handle returned by [`ConnAddr::new`] (or a handshake) owns the
/// connection. Clones, including every address handed out by
/// [`ConnAddr::remote_addr`], are views: they reach the same connection while
/// it is open but do not keep it open. Dropping the owning handle, or calling
/// [`ConnAddr::close`] on any handle, releases the connection; afterwards
/// every handle fails with `NotConnected`.
///
/// All handles to one connection compare equal; handles to different
/// connections never do. Every operation holds the connection's lock for
/// that one call only.
pub struct ConnAddr {
    conn: Arc<Mutex<Option<BoxConn>>>,
    owner: bool,
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection is closed")
}

impl ConnAddr {
    /// Wrap a connection. Always succeeds.
    pub fn new<C: Connection>(conn: C) -> Self {
        Self::from_boxed(Box::new(conn))
    }

    /// Wrap an already boxed connection without boxing it again.
    pub fn from_boxed(conn: BoxConn) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            owner: true,
        }
    }

    /// Network family; always [`CONN_ADDR_NETWORK`].
    pub fn network(&self) -> &str {
        CONN_ADDR_NETWORK
    }

    /// The remote address of this connection: the connection itself.
    pub fn remote_addr(&self) -> Addr {
        Addr::Conn(self.clone())
    }

    /// Whether this handle owns the connection.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Whether the connection has been released.
    pub fn is_closed(&self) -> bool {
        match self.conn.lock() {
            Ok(slot) => slot.is_none(),
            Err(_) => true,
        }
    }

    /// Address of this end, as reported by the wrapped connection.
    pub fn local_addr(&self) -> io::Result<Addr> {
        self.with_conn(|conn| conn.local_addr())
    }

    /// See [`Connection::set_read_deadline`].
    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.with_conn(|conn| conn.set_read_deadline(deadline))
    }

    /// See [`Connection::set_write_deadline`].
    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.with_conn(|conn| conn.set_write_deadline(deadline))
    }

    /// See [`Connection::set_deadline`].
    pub fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.with_conn(|conn| conn.set_deadline(deadline))
    }

    /// Shut down the write side and release the connection for every handle.
    ///
    /// The connection is released even if the shutdown fails. Closing an
    /// already closed connection is a no-op.
    pub async fn close(&self) -> io::Result<()> {
        let shutdown = poll_fn(|cx| {
            let mut slot = self.lock()?;
            match slot.as_mut() {
                Some(conn) => Pin::new(conn).poll_shutdown(cx),
                None => Poll::Ready(Ok(())),
            }
        })
        .await;
        self.release();
        shutdown
    }

    /// Descriptor of the wrapped connection.
    ///
    /// Only valid while the connection is open; prefer
    /// [`ConnAddr::with_raw_fd`] for anything beyond a quick syscall.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Result<RawFd, RawFdError> {
        let slot = self.conn.lock().map_err(|_| RawFdError::Poisoned)?;
        let conn = slot.as_ref().ok_or(RawFdError::Closed)?;
        conn.raw_fd().ok_or(RawFdError::Unsupported)
    }

    /// Run `f` against the wrapped descriptor.
    ///
    /// The connection is locked for the duration of `f`: reads and writes
    /// through other handles wait until it returns, and `f` must not call
    /// back into any handle of this connection or it deadlocks.
    #[cfg(unix)]
    pub fn with_raw_fd<R>(&self, f: impl FnOnce(BorrowedFd<'_>) -> R) -> Result<R, RawFdError> {
        let slot = self.conn.lock().map_err(|_| RawFdError::Poisoned)?;
        let conn = slot.as_ref().ok_or(RawFdError::Closed)?;
        let fd = conn.raw_fd().ok_or(RawFdError::Unsupported)?;
        // SAFETY: the guard keeps the connection, and with it the descriptor,
        // alive until `f` returns.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        Ok(f(borrowed))
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Option<BoxConn>>> {
        self.conn
            .lock()
            .map_err(|_| io::Error::other("connection lock poisoned"))
    }

    fn with_conn<R>(&self, f: impl FnOnce(&mut BoxConn) -> io::Result<R>) -> io::Result<R> {
        let mut slot = self.lock()?;
        f(slot.as_mut().ok_or_else(not_connected)?)
    }

    fn poll_conn<R>(
        &self,
        f: impl FnOnce(Pin<&mut BoxConn>) -> Poll<io::Result<R>>,
    ) -> Poll<io::Result<R>> {
        let mut slot = self.lock()?;
        match slot.as_mut() {
            Some(conn) => f(Pin::new(conn)),
            None => Poll::Ready(Err(not_connected())),
        }
    }

    // Drops the connection outside the lock.
    fn release(&self) {
        let conn = match self.conn.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(conn);
    }
}

impl Clone for ConnAddr {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            owner: false,
        }
    }
}

impl Drop for ConnAddr {
    fn drop(&mut self) {
        if self.owner {
            self.release();
        }
    }
}

impl PartialEq for ConnAddr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }
}

impl Eq for ConnAddr {}

impl fmt::Display for ConnAddr {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl fmt::Debug for ConnAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnAddr")
            .field("network", &self.network())
            .field("owner", &self.owner)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AsyncRead for ConnAddr {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.poll_conn(|conn| conn.poll_read(cx, buf))
    }
}

impl AsyncWrite for ConnAddr {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.poll_conn(|conn| conn.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_conn(|conn| conn.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_conn(|conn| conn.poll_shutdown(cx))
    }
}

impl Connection for ConnAddr {
    fn local_addr(&self) -> io::Result<Addr> {
        ConnAddr::local_addr(self)
    }

    fn remote_addr(&self) -> io::Result<Addr> {
        Ok(ConnAddr::remote_addr(self))
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        ConnAddr::set_read_deadline(self, deadline)
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        ConnAddr::set_write_deadline(self, deadline)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        ConnAddr::set_deadline(self, deadline)
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        ConnAddr::raw_fd(self).ok()
    }
}
