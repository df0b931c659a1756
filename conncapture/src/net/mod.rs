//! Connection and address capability sets.
//!
//! [`Connection`] is the byte-stream side (read, write, close, deadlines,
//! address reporting). [`Addr`] is the address side (network family and
//! string form). [`ConnAddr`] satisfies both at once.

mod addr;
mod capture;
mod socket;

use std::io;
#[cfg(unix)]
use std::os::fd::RawFd;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

pub use addr::Addr;
pub use capture::{capture, ConnAddr, CONN_ADDR_NETWORK};
pub use socket::Socket;

/// A live bidirectional byte stream.
///
/// Reading, writing and closing go through [`AsyncRead`] and [`AsyncWrite`];
/// closing is `poll_shutdown`.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Address of this end of the connection.
    fn local_addr(&self) -> io::Result<Addr>;

    /// Address of the other end of the connection.
    fn remote_addr(&self) -> io::Result<Addr>;

    /// Fail reads with `TimedOut` once `deadline` passes. `None` clears it.
    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    /// Fail writes with `TimedOut` once `deadline` passes. `None` clears it.
    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    /// Set both the read and write deadline.
    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }

    /// The OS-level descriptor backing this connection, if it has one.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// A type-erased connection, as passed through handshakes.
pub type BoxConn = Box<dyn Connection>;

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn local_addr(&self) -> io::Result<Addr> {
        (**self).local_addr()
    }

    fn remote_addr(&self) -> io::Result<Addr> {
        (**self).remote_addr()
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_read_deadline(deadline)
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_write_deadline(deadline)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_deadline(deadline)
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}
