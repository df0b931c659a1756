//! Raw stream sockets with read and write deadlines.

use std::future::Future;
use std::io;
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::time::{Instant, Sleep};

use super::{Addr, Connection};

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

/// A connected TCP or unix stream socket, before any handshake.
///
/// Deadlines are absolute. Once one passes, every operation in that direction
/// fails with [`io::ErrorKind::TimedOut`] until the deadline is moved or
/// cleared; the socket itself stays usable.
pub struct Socket {
    stream: Stream,
    read_deadline: Option<Pin<Box<Sleep>>>,
    write_deadline: Option<Pin<Box<Sleep>>>,
}

impl Socket {
    fn new(stream: Stream) -> Self {
        Self {
            stream,
            read_deadline: None,
            write_deadline: None,
        }
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Self::new(Stream::Tcp(stream))
    }
}

#[cfg(unix)]
impl From<UnixStream> for Socket {
    fn from(stream: UnixStream) -> Self {
        Self::new(Stream::Unix(stream))
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.stream {
            Stream::Tcp(_) => "tcp",
            #[cfg(unix)]
            Stream::Unix(_) => "unix",
        };
        f.debug_struct("Socket")
            .field("kind", &kind)
            .field("read_deadline", &self.read_deadline.as_ref().map(|s| s.deadline()))
            .field("write_deadline", &self.write_deadline.as_ref().map(|s| s.deadline()))
            .finish()
    }
}

fn arm(slot: &mut Option<Pin<Box<Sleep>>>, deadline: Option<Instant>) {
    let Some(at) = deadline else {
        *slot = None;
        return;
    };
    match slot {
        Some(sleep) => sleep.as_mut().reset(at),
        None => *slot = Some(Box::pin(tokio::time::sleep_until(at))),
    }
}

/// Checks the deadline, registering the waker on the timer if it is still ahead.
fn expired(slot: &mut Option<Pin<Box<Sleep>>>, cx: &mut Context<'_>) -> bool {
    match slot.as_mut() {
        Some(sleep) => sleep.deadline() <= Instant::now() || sleep.as_mut().poll(cx).is_ready(),
        None => false,
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded")
}

impl AsyncRead for Socket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(&mut this.read_deadline, cx) {
            return Poll::Ready(Err(timed_out()));
        }
        match &mut this.stream {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if expired(&mut this.write_deadline, cx) {
            return Poll::Ready(Err(timed_out()));
        }
        match &mut this.stream {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(&mut this.write_deadline, cx) {
            return Poll::Ready(Err(timed_out()));
        }
        match &mut this.stream {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().stream {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

impl Connection for Socket {
    fn local_addr(&self) -> io::Result<Addr> {
        match &self.stream {
            Stream::Tcp(s) => s.local_addr().map(Addr::from),
            #[cfg(unix)]
            Stream::Unix(s) => s.local_addr().map(Addr::from),
        }
    }

    fn remote_addr(&self) -> io::Result<Addr> {
        match &self.stream {
            Stream::Tcp(s) => s.peer_addr().map(Addr::from),
            #[cfg(unix)]
            Stream::Unix(s) => s.peer_addr().map(Addr::from),
        }
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        arm(&mut self.read_deadline, deadline);
        Ok(())
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        arm(&mut self.write_deadline, deadline);
        Ok(())
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        Some(match &self.stream {
            Stream::Tcp(s) => s.as_raw_fd(),
            Stream::Unix(s) => s.as_raw_fd(),
        })
    }
}
