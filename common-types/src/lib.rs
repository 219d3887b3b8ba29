mod disconnect;
mod error;
mod quirks;
mod role;
mod session_id;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use disconnect::DisconnectReason;
pub use error::{sanitize_peer_string, Error};
pub use quirks::PeerQuirks;
pub use role::Role;
pub use session_id::SessionId;

/// Default SSH port.
pub const SSH_PORT: u16 = 22;

/// Maximum size of a single SSH packet, including length field.
pub const MAX_PACKET_SIZE: u32 = 262_144;

/// Default send/receive buffer size used when the caller doesn't override it.
pub const DEFAULT_PACKET_SIZE: u32 = 16384;

/// Minimum accepted `packet_length + padding_length` total, per the wire format.
pub const MIN_PACKET_SIZE: usize = 16;

/// The largest window an endpoint will advertise, used to disable SSH-level
/// flow control in favor of leaning on the transport's own back-pressure.
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

/// Size in bytes of the anti-spoofing cookie carried in `KEXINIT`.
pub const COOKIE_SIZE: usize = 16;

/// Hard cap on simultaneously active channels per connection.
pub const MAX_ACTIVE_CHANNELS: usize = 4;
