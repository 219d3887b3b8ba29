//! The keyex engine (component C): static and group-exchange Diffie-Hellman,
//! the exchange hash, and the key schedule derived from it.
//! `wire::kex` owns the message shapes; this module owns the bignum
//! math and hashing built on top of them, re-exported behind `transport`
//! alongside the packet codec so a caller gets both halves of the
//! cryptographic state machine from one crate.

use common_types::SessionId;
use crypto::hash::{Hash, HashAlgorithm};
use num_bigint::BigUint;
use wire::primitive::Writer;

/// The handshake-scratch inputs to one exchange hash computation, in the
/// exact order the exchange hash definition lists them. `gex_request`/`gex_p_g` are only
/// present for a group-exchange keyex; `k` is `None` under the
/// `NO_HASH_SECRET` peer quirk.
pub struct ExchangeHashInputs<'a> {
    pub client_id: &'a [u8],
    pub server_id: &'a [u8],
    pub client_kexinit: &'a [u8],
    pub server_kexinit: &'a [u8],
    pub host_key_blob: &'a [u8],
    pub gex_request: Option<&'a [u8]>,
    pub gex_p_g: Option<(&'a BigUint, &'a BigUint)>,
    pub e: &'a BigUint,
    pub f: &'a BigUint,
    pub k: Option<&'a BigUint>,
}

/// Compute `H` for one keyex (initial or rekey). The result of the first
/// keyex is latched by the caller as the permanent [`SessionId`]; this
/// function itself is agnostic to which keyex produced it.
pub fn compute_exchange_hash(inputs: &ExchangeHashInputs) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(inputs.client_id);
    w.string(inputs.server_id);
    w.string(inputs.client_kexinit);
    w.string(inputs.server_kexinit);
    w.string(inputs.host_key_blob);
    if let Some(req) = inputs.gex_request {
        w.raw(req);
    }
    if let Some((p, g)) = inputs.gex_p_g {
        w.mpi(&p.to_bytes_be());
        w.mpi(&g.to_bytes_be());
    }
    w.mpi(&inputs.e.to_bytes_be());
    w.mpi(&inputs.f.to_bytes_be());
    if let Some(k) = inputs.k {
        w.mpi(&k.to_bytes_be());
    }
    crypto::hash::digest(HashAlgorithm::Sha1, w.as_slice())
}

/// Byte lengths of the six cryptovariables the key schedule derives. IV and
/// cipher-key lengths come from the negotiated cipher; the MAC key length
/// is the algorithm's nominal key size, unless the `HMAC_KEY_SIZE`
/// peer-quirk pins it to a fixed 16 bytes regardless (the caller applies
/// that override before constructing this).
pub struct KeyScheduleSizes {
    pub iv_len: usize,
    pub key_len: usize,
    pub mac_len: usize,
}

/// The six derived cryptovariables for one direction pair.
pub struct KeySchedule {
    pub iv_c2s: Vec<u8>,
    pub iv_s2c: Vec<u8>,
    pub key_c2s: Vec<u8>,
    pub key_s2c: Vec<u8>,
    pub mac_c2s: Vec<u8>,
    pub mac_s2c: Vec<u8>,
}

/// Derive one cryptovariable: `H(K‖H‖label‖session_id)`, extended with
/// `H(K‖H‖already-derived)` blocks until `needed` bytes are available
/// `common_prefix` is a [`Hash`] that has already consumed
/// `K‖H` but not been finished — cloned once per label so that shared work
/// is computed only once.
fn derive_one(common_prefix: &Hash, label: u8, session_id: &SessionId, needed: usize) -> Vec<u8> {
    let mut block0 = common_prefix.clone();
    block0.update(&[label]);
    block0.update(session_id.as_ref());
    let mut result = block0.finish();
    while result.len() < needed {
        let mut next = common_prefix.clone();
        next.update(&result);
        result.extend(next.finish());
    }
    result.truncate(needed);
    result
}

/// Derive the full key schedule for one keyex (initial or rekey). The
/// session id passed in is always the *first* keyex's exchange hash,
/// whether or not this is the first keyex (the "Session
/// identifier"), while `exchange_hash` is always this keyex's own hash.
pub fn derive_keys(
    hash_algo: HashAlgorithm,
    shared_secret: &BigUint,
    exchange_hash: &[u8],
    session_id: &SessionId,
    sizes: &KeyScheduleSizes,
) -> KeySchedule {
    let mut common_prefix = Hash::new(hash_algo);
    let mut w = Writer::new();
    w.mpi(&shared_secret.to_bytes_be());
    common_prefix.update(w.as_slice());
    common_prefix.update(exchange_hash);

    KeySchedule {
        iv_c2s: derive_one(&common_prefix, b'A', session_id, sizes.iv_len),
        iv_s2c: derive_one(&common_prefix, b'B', session_id, sizes.iv_len),
        key_c2s: derive_one(&common_prefix, b'C', session_id, sizes.key_len),
        key_s2c: derive_one(&common_prefix, b'D', session_id, sizes.key_len),
        mac_c2s: derive_one(&common_prefix, b'E', session_id, sizes.mac_len),
        mac_s2c: derive_one(&common_prefix, b'F', session_id, sizes.mac_len),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sizes() -> KeyScheduleSizes {
        KeyScheduleSizes { iv_len: 16, key_len: 16, mac_len: 20 }
    }

    #[test]
    fn derived_directions_are_independent() {
        let k = BigUint::from(12345u32);
        let h = vec![1u8; 20];
        let session_id = SessionId::from(h.clone());
        let schedule = derive_keys(HashAlgorithm::Sha1, &k, &h, &session_id, &sizes());
        assert_ne!(schedule.key_c2s, schedule.key_s2c);
        assert_ne!(schedule.mac_c2s, schedule.mac_s2c);
        assert_eq!(schedule.key_c2s.len(), 16);
        assert_eq!(schedule.mac_c2s.len(), 20);
    }

    #[test]
    fn different_nonces_almost_surely_change_every_key() {
        let h1 = vec![1u8; 20];
        let h2 = vec![2u8; 20];
        let k = BigUint::from(999u32);
        let session_id1 = SessionId::from(h1.clone());
        let session_id2 = SessionId::from(h2.clone());
        let a = derive_keys(HashAlgorithm::Sha1, &k, &h1, &session_id1, &sizes());
        let b = derive_keys(HashAlgorithm::Sha1, &k, &h2, &session_id2, &sizes());
        assert_ne!(a.key_c2s, b.key_c2s);
    }

    #[test]
    fn exchange_hash_changes_when_secret_is_omitted() {
        let e = BigUint::from(7u32);
        let f = BigUint::from(11u32);
        let k = BigUint::from(42u32);
        let base = |k: Option<&BigUint>| ExchangeHashInputs {
            client_id: b"c",
            server_id: b"s",
            client_kexinit: b"ci",
            server_kexinit: b"si",
            host_key_blob: b"hk",
            gex_request: None,
            gex_p_g: None,
            e: &e,
            f: &f,
            k,
        };
        assert_ne!(compute_exchange_hash(&base(Some(&k))), compute_exchange_hash(&base(None)));
    }
}
