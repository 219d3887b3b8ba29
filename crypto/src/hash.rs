use common_types::Error;
use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;

/// The two hash algorithms the negotiator can select (`-sha1` keyex suites,
/// and MD5 for the legacy host-key fingerprint).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashAlgorithm {
    Sha1,
    Md5,
}

impl HashAlgorithm {
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Md5 => 16,
        }
    }
}

#[derive(Clone)]
enum Inner {
    Sha1(Sha1),
    Md5(Md5),
}

/// A running hash context. `clone` snapshots the state so the key-schedule
/// code can compute the common `H(K‖H‖...)` prefix once and fork it per
/// cryptovariable.
#[derive(Clone)]
pub struct Hash {
    algo: HashAlgorithm,
    inner: Inner,
}

impl Hash {
    pub fn new(algo: HashAlgorithm) -> Self {
        let inner = match algo {
            HashAlgorithm::Sha1 => Inner::Sha1(Sha1::new()),
            HashAlgorithm::Md5 => Inner::Md5(Md5::new()),
        };
        Hash { algo, inner }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match &mut self.inner {
            Inner::Sha1(h) => h.input(data),
            Inner::Md5(h) => h.input(data),
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        match self.inner {
            Inner::Sha1(h) => h.result().to_vec(),
            Inner::Md5(h) => h.result().to_vec(),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }
}

/// One-shot convenience: `digest(HashAlgorithm::Sha1, data)`.
pub fn digest(algo: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut h = Hash::new(algo);
    h.update(data);
    h.finish()
}

pub fn sha1(data: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(digest(HashAlgorithm::Sha1, data))
}

pub fn md5(data: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(digest(HashAlgorithm::Md5, data))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sha1_of_empty_matches_known_vector() {
        let out = digest(HashAlgorithm::Sha1, b"");
        assert_eq!(hex::encode(out), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn clone_forks_independent_state() {
        let mut base = Hash::new(HashAlgorithm::Sha1);
        base.update(b"common-prefix");
        let mut a = base.clone();
        let mut b = base.clone();
        a.update(b"A");
        b.update(b"B");
        assert_ne!(a.finish(), b.finish());
    }
}
