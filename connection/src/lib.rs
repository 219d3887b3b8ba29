//! Application-facing SSHv2 session (component F): handshake orchestration
//! (`handshake`, internal), user authentication and channel-multiplexing
//! handoff (`session`), configuration (`config`) and the `Transport` trait
//! plus a `TcpStream` implementation (`address`).
//!
//! Everything a caller needs lives behind [`connect_client`]/
//! [`accept_server`] and the methods on the [`Session`] they return; the
//! handshake state machine itself is not part of the public API.

mod address;
mod config;
mod handshake;
mod session;

#[cfg(test)]
mod testing;

pub use address::{accept_one, connect, Transport};
pub use config::{ClientConfig, HostKeyCheck, ServerConfig};
pub use session::{accept_server, connect_client, ChannelHandle, PendingOpen, Session};

pub use userauth::{Credentials, UserAuthorizer, UserDb};
pub use wire::channel::open_failure_reason;
