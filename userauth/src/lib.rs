//! The auth engine (component D): `none`/`password`/`publickey`/PAM-style
//! `keyboard-interactive`, driven directly over a [`transport::PacketCodec`]
//! once it has entered the secure state and the `ssh-userauth` service has
//! been requested. Client and server sides are separate
//! state machines sharing the wire message shapes in `wire::userauth`.

pub mod client;
pub mod credentials;
pub mod server;

pub use client::{authenticate, ClientAuthOutcome};
pub use credentials::Credentials;
pub use server::{authenticate_server, ServerAuthOutcome, UserAuthorizer, UserDb};
