use rand::{rngs::OsRng, RngCore};

/// Fill `n` bytes with cryptographically secure random data — the
/// `nonce(n)` operation of the crypto provider, used for the
/// KEXINIT cookie, DH private exponents, and random packet padding.
pub fn nonce(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng::new().expect("OS randomness source must be available").fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nonce_has_requested_length() {
        assert_eq!(nonce(16).len(), 16);
    }

    #[test]
    fn two_nonces_almost_surely_differ() {
        assert_ne!(nonce(32), nonce(32));
    }
}
