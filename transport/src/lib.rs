//! The packet codec (component A) and keyex engine (component C): framing,
//! per-direction MAC/encryption, sequence numbers, identification-string
//! exchange, Diffie-Hellman key exchange (static and group-exchange) and
//! the key schedule derived from it. `wire` owns message shapes; this crate
//! owns the bytes-on-the-wire framing and the cryptographic state machine
//! built on top of it.

pub mod codec;
pub mod config;
pub mod identification;
pub mod keyex;

pub use codec::{PacketBuilder, PacketCodec};
pub use config::Config;
pub use identification::{read_peer_id, own_id_line};
pub use keyex::{derive_keys, ExchangeHashInputs, KeySchedule, KeyScheduleSizes};
