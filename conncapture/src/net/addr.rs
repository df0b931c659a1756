//! Network addresses.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use super::ConnAddr;

/// An endpoint identity: a network family plus a string form.
///
/// The `Conn` variant is a live connection standing in for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addr {
    /// A TCP endpoint.
    Tcp(SocketAddr),
    /// A unix domain socket; unnamed sockets carry no path.
    Unix(Option<PathBuf>),
    /// A captured connection reporting itself as an address.
    Conn(ConnAddr),
}

impl Addr {
    /// Name of the network family (`"tcp"`, `"unix"`).
    pub fn network(&self) -> &str {
        match self {
            Addr::Tcp(_) => "tcp",
            Addr::Unix(_) => "unix",
            Addr::Conn(conn) => conn.network(),
        }
    }

    /// The connection behind this address, if it is one.
    pub fn as_conn(&self) -> Option<&ConnAddr> {
        match self {
            Addr::Conn(conn) => Some(conn),
            _ => None,
        }
    }

    /// Consume the address, returning the connection behind it if any.
    pub fn into_conn(self) -> Option<ConnAddr> {
        match self {
            Addr::Conn(conn) => Some(conn),
            _ => None,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addr::Tcp(addr) => addr.fmt(f),
            Addr::Unix(Some(path)) => path.display().fmt(f),
            Addr::Unix(None) => Ok(()),
            Addr::Conn(conn) => conn.fmt(f),
        }
    }
}

impl From<SocketAddr> for Addr {
    fn from(addr: SocketAddr) -> Self {
        Addr::Tcp(addr)
    }
}

impl From<ConnAddr> for Addr {
    fn from(conn: ConnAddr) -> Self {
        Addr::Conn(conn)
    }
}

#[cfg(unix)]
impl From<tokio::net::unix::SocketAddr> for Addr {
    fn from(addr: tokio::net::unix::SocketAddr) -> Self {
        Addr::Unix(addr.as_pathname().map(|p| p.to_path_buf()))
    }
}
