//! Default instantiation of the `CryptoProvider` the transport layer treats
//! as an external collaborator: hash, symmetric cipher, MAC, Diffie-Hellman
//! and public-key signature primitives, each behind a small trait rather
//! than one opaque-handle god object.
//!
//! None of this crate's math is novel protocol logic — it exists so the
//! workspace has *some* concrete, swappable implementation to build and
//! test against.

pub mod cipher;
pub mod dh;
pub mod fingerprint;
pub mod hash;
pub mod mac;
pub mod pubkey;
pub mod random;

pub use cipher::{Cipher, CipherAlgorithm};
pub use dh::{DhGroup, DhKeyPair};
pub use hash::{Hash, HashAlgorithm};
pub use mac::{Mac, MacAlgorithm};
pub use pubkey::{HostKey, PrivateHostKey, PublicKeyAlgorithm};
