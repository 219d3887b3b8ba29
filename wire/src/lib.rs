//! The SSHv2 wire protocol: primitive value encoding, per-message
//! (de)serialization, and the algorithm-negotiator's selection rules
//! (component B). Packet framing, encryption and MAC live in `transport`;
//! this crate only knows about already-decrypted payload bytes.

pub mod channel;
pub mod kex;
pub mod messages;
pub mod msg;
pub mod negotiate;
pub mod primitive;
pub mod userauth;

pub use kex::{AlgorithmPreferences, KexInit};
pub use negotiate::{negotiate, Negotiated};
