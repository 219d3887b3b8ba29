use crate::hash::{digest, HashAlgorithm};

/// Hash a raw host-key blob for display or comparison against a
/// caller-supplied fingerprint.
/// MD5 by default; a 20-byte caller fingerprint selects SHA-1 instead.
pub fn fingerprint(host_key_blob: &[u8], caller_supplied_len: Option<usize>) -> Vec<u8> {
    let algo = match caller_supplied_len {
        Some(20) => HashAlgorithm::Sha1,
        _ => HashAlgorithm::Md5,
    };
    digest(algo, host_key_blob)
}

/// Compare a freshly computed fingerprint against one the caller supplied
/// (e.g. from a known_hosts-style store).
pub fn matches(host_key_blob: &[u8], caller_supplied: &[u8]) -> bool {
    fingerprint(host_key_blob, Some(caller_supplied.len())) == caller_supplied
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn twenty_byte_caller_fingerprint_selects_sha1() {
        let blob = b"some host key bytes";
        let sha1_fp = fingerprint(blob, Some(20));
        assert_eq!(sha1_fp.len(), 20);
    }

    #[test]
    fn default_is_md5() {
        let blob = b"some host key bytes";
        assert_eq!(fingerprint(blob, None).len(), 16);
    }

    #[test]
    fn matches_round_trips() {
        let blob = b"host key";
        let fp = fingerprint(blob, None);
        assert!(matches(blob, &fp));
    }
}
