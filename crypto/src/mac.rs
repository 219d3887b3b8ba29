use hmac::{Hmac, Mac as _};
use md5::Md5;
use sha1::Sha1;

/// The two MAC algorithms the negotiator can select.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacMd5,
}

impl MacAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hmac-sha1" => Some(MacAlgorithm::HmacSha1),
            "hmac-md5" => Some(MacAlgorithm::HmacMd5),
            _ => None,
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacMd5 => 16,
        }
    }

    /// The MAC key size the protocol nominally wants, before the
    /// `HMAC_KEY_SIZE` peer-quirk override (which pins it to 16 regardless).
    pub fn key_size(self) -> usize {
        self.output_len()
    }
}

enum Inner {
    Sha1(Hmac<Sha1>),
    Md5(Hmac<Md5>),
}

/// A keyed MAC context bound to one direction's MAC key for the life of the
/// current key schedule generation.
pub struct Mac {
    algo: MacAlgorithm,
    inner: Inner,
}

impl Mac {
    pub fn new(algo: MacAlgorithm, key: &[u8]) -> Self {
        let inner = match algo {
            MacAlgorithm::HmacSha1 => Inner::Sha1(Hmac::new_varkey(key).expect("hmac accepts any key length")),
            MacAlgorithm::HmacMd5 => Inner::Md5(Hmac::new_varkey(key).expect("hmac accepts any key length")),
        };
        Mac { algo, inner }
    }

    pub fn algorithm(&self) -> MacAlgorithm {
        self.algo
    }

    pub fn input(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Sha1(m) => m.input(data),
            Inner::Md5(m) => m.input(data),
        }
    }

    pub fn result(self) -> Vec<u8> {
        match self.inner {
            Inner::Sha1(m) => m.result().code().to_vec(),
            Inner::Md5(m) => m.result().code().to_vec(),
        }
    }

    /// Compute `mac(seq32 ‖ length32 ‖ payload_and_padding)` in one call —
    /// this exact concatenation order is the protocol's MAC input.
    pub fn compute(algo: MacAlgorithm, key: &[u8], seq_no: u32, length: u32, plaintext: &[u8]) -> Vec<u8> {
        let mut mac = Mac::new(algo, key);
        mac.input(&seq_no.to_be_bytes());
        mac.input(&length.to_be_bytes());
        mac.input(plaintext);
        mac.result()
    }

    /// Compare against an expected tag without short-circuiting on the
    /// first differing byte — never lets timing distinguish "wrong length
    /// prefix" from "wrong suffix" to a peer on the wire.
    pub fn verify(expected: &[u8], actual: &[u8]) -> bool {
        if expected.len() != actual.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in expected.iter().zip(actual.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compute_and_verify_round_trip() {
        let key = vec![1u8; 20];
        let mac = Mac::compute(MacAlgorithm::HmacSha1, &key, 0, 5, b"hello");
        assert!(Mac::verify(&mac, &mac));
        assert!(!Mac::verify(&mac, &vec![0u8; mac.len()]));
    }
}
