//! tonic integration.
//!
//! Servers feed [`incoming`] to `Server::serve_with_incoming`; handlers read
//! the captured connection with [`Peer::from_request`]. Clients use
//! [`connect`] and read it back with [`Peer::from_response`].

mod client;
mod peer;
mod server;

pub use client::{connect, CaptureConnector, PeerChannel, PeerService, Target};
pub use peer::{Peer, PeerSlot, PeerStream};
pub use server::{incoming, Listener};
