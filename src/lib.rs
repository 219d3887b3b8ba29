//! An implementation of the SSHv2 transport, key exchange and connection
//! protocol.
//!
//! This crate is a thin front door: the transport/keyex engine lives in
//! `transport`, algorithm negotiation and wire message shapes in `wire`,
//! user authentication in `userauth`, channel multiplexing in `mux`, and
//! the default cryptographic primitives in `crypto`. What a caller needs
//! to drive an SSH connection end to end is re-exported here.
//!
//! ```no_run
//! use sshlib::{connect_client, ClientConfig, Credentials};
//!
//! let transport = sshlib::connect("127.0.0.1:22".parse().unwrap()).unwrap();
//! let config = ClientConfig::new("alice", Credentials::Password("hunter2".into()));
//! let mut session = connect_client(transport, &config).unwrap();
//! let channel = session.open_session_channel().unwrap();
//! session.request_shell(channel).unwrap();
//! ```

pub use common_types::{DisconnectReason, Error};
pub use connection::{
    accept_one, accept_server, connect, connect_client, open_failure_reason, ChannelHandle, ClientConfig, Credentials,
    HostKeyCheck, PendingOpen, ServerConfig, Session, Transport, UserAuthorizer, UserDb,
};
pub use crypto::pubkey::{HostKey, PrivateHostKey, PublicKeyAlgorithm};
pub use wire::AlgorithmPreferences;
