use crate::hash::{digest, HashAlgorithm};
use common_types::Error;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rand::Rng;
use rsa::{BigUint as RsaBigUint, PaddingScheme, PublicKey as _, RSAPrivateKey, RSAPublicKey};
use wire::primitive::{Reader, Writer};

/// The two host-key / user-key algorithms the negotiator's default table
/// offers. Signature formatting for each follows `ssh-rsa`/`ssh-dss` as
/// specified, with the `SIG_FORMAT` peer-quirk (raw 40-byte DSA signature,
/// no `ssh-dss` wrapper) isolated to `decode_signature`/`encode_signature`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Dsa,
}

impl PublicKeyAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            PublicKeyAlgorithm::Rsa => "ssh-rsa",
            PublicKeyAlgorithm::Dsa => "ssh-dss",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ssh-rsa" => Some(PublicKeyAlgorithm::Rsa),
            "ssh-dss" => Some(PublicKeyAlgorithm::Dsa),
            _ => None,
        }
    }
}

/// A parsed, algorithm-tagged public key blob — the exact bytes the peer
/// sent are kept alongside (`raw`) because the exchange hash mixes in the
/// host-key blob verbatim, not a re-encoding of it.
#[derive(Clone)]
pub enum HostKey {
    Rsa { e: BigUint, n: BigUint, raw: Vec<u8> },
    Dsa { p: BigUint, q: BigUint, g: BigUint, y: BigUint, raw: Vec<u8> },
}

impl HostKey {
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            HostKey::Rsa { .. } => PublicKeyAlgorithm::Rsa,
            HostKey::Dsa { .. } => PublicKeyAlgorithm::Dsa,
        }
    }

    pub fn raw(&self) -> &[u8] {
        match self {
            HostKey::Rsa { raw, .. } => raw,
            HostKey::Dsa { raw, .. } => raw,
        }
    }

    pub fn parse(blob: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(blob);
        let algo_name = r.utf8_string()?;
        match algo_name.as_str() {
            "ssh-rsa" => {
                let e = BigUint::from_bytes_be(&r.mpi()?);
                let n = BigUint::from_bytes_be(&r.mpi()?);
                Ok(HostKey::Rsa { e, n, raw: blob.to_vec() })
            }
            "ssh-dss" => {
                let p = BigUint::from_bytes_be(&r.mpi()?);
                let q = BigUint::from_bytes_be(&r.mpi()?);
                let g = BigUint::from_bytes_be(&r.mpi()?);
                let y = BigUint::from_bytes_be(&r.mpi()?);
                Ok(HostKey::Dsa { p, q, g, y, raw: blob.to_vec() })
            }
            other => Err(Error::NotAvailable(format!("unsupported host-key algorithm {}", other))),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            HostKey::Rsa { e, n, .. } => {
                w.string(b"ssh-rsa");
                w.mpi(&e.to_bytes_be());
                w.mpi(&n.to_bytes_be());
            }
            HostKey::Dsa { p, q, g, y, .. } => {
                w.string(b"ssh-dss");
                w.mpi(&p.to_bytes_be());
                w.mpi(&q.to_bytes_be());
                w.mpi(&g.to_bytes_be());
                w.mpi(&y.to_bytes_be());
            }
        }
        w.into_bytes()
    }

    /// Verify a signature blob (`string algo-name ‖ string signature`,
    /// except under the `SIG_FORMAT` quirk where DSA sends a raw 40-byte
    /// value) over `message`.
    pub fn verify(&self, message: &[u8], signature_blob: &[u8], sig_format_quirk: bool) -> Result<bool, Error> {
        match self {
            HostKey::Rsa { e, n, .. } => {
                let (algo_name, sig) = split_signature_blob(signature_blob)?;
                if algo_name != "ssh-rsa" {
                    return Err(Error::BadData("signature algorithm mismatch".into()));
                }
                let pubkey = RSAPublicKey::new(RsaBigUint::from_bytes_be(&n.to_bytes_be()), RsaBigUint::from_bytes_be(&e.to_bytes_be()))
                    .map_err(|e| Error::BadData(format!("invalid RSA key: {}", e)))?;
                let digest = digest(HashAlgorithm::Sha1, message);
                Ok(pubkey
                    .verify(PaddingScheme::new_pkcs1v15_sha1(), &digest, &sig)
                    .is_ok())
            }
            HostKey::Dsa { p, q, g, y, .. } => {
                let sig = if sig_format_quirk {
                    signature_blob.to_vec()
                } else {
                    let (algo_name, sig) = split_signature_blob(signature_blob)?;
                    if algo_name != "ssh-dss" {
                        return Err(Error::BadData("signature algorithm mismatch".into()));
                    }
                    sig
                };
                if sig.len() != 40 {
                    return Err(Error::BadData("DSA signature must be 40 raw bytes".into()));
                }
                let r = BigUint::from_bytes_be(&sig[..20]);
                let s = BigUint::from_bytes_be(&sig[20..]);
                Ok(dsa_verify(p, q, g, y, message, &r, &s))
            }
        }
    }
}

fn split_signature_blob(blob: &[u8]) -> Result<(String, Vec<u8>), Error> {
    let mut r = Reader::new(blob);
    let algo_name = r.utf8_string()?;
    let sig = r.string()?.to_vec();
    Ok((algo_name, sig))
}

/// An unlocked private key, used only by a server signing the exchange
/// hash or a client signing a `publickey`-auth request.
pub enum PrivateHostKey {
    Rsa(RSAPrivateKey),
    Dsa { p: BigUint, q: BigUint, g: BigUint, x: BigUint },
}

impl PrivateHostKey {
    /// The public counterpart this private key signs for, blob-encoded the
    /// way a parsed `HostKey` would be (there is no received `raw` to keep,
    /// so `raw` is just `encode()`'s own output).
    pub fn public_host_key(&self) -> HostKey {
        match self {
            PrivateHostKey::Rsa(key) => {
                let public = key.to_public_key();
                let host_key = HostKey::Rsa {
                    e: BigUint::from_bytes_be(&public.e().to_bytes_be()),
                    n: BigUint::from_bytes_be(&public.n().to_bytes_be()),
                    raw: Vec::new(),
                };
                let raw = host_key.encode();
                match host_key {
                    HostKey::Rsa { e, n, .. } => HostKey::Rsa { e, n, raw },
                    HostKey::Dsa { .. } => unreachable!(),
                }
            }
            PrivateHostKey::Dsa { p, q, g, x } => {
                let y = g.modpow(x, p);
                let host_key = HostKey::Dsa { p: p.clone(), q: q.clone(), g: g.clone(), y, raw: Vec::new() };
                let raw = host_key.encode();
                match host_key {
                    HostKey::Dsa { p, q, g, y, .. } => HostKey::Dsa { p, q, g, y, raw },
                    HostKey::Rsa { .. } => unreachable!(),
                }
            }
        }
    }

    pub fn sign(&self, message: &[u8], algo: PublicKeyAlgorithm) -> Result<Vec<u8>, Error> {
        match (self, algo) {
            (PrivateHostKey::Rsa(key), PublicKeyAlgorithm::Rsa) => {
                let digest = digest(HashAlgorithm::Sha1, message);
                let sig = key
                    .sign(PaddingScheme::new_pkcs1v15_sha1(), &digest)
                    .map_err(|_| Error::BadSignature)?;
                let mut w = Writer::new();
                w.string(b"ssh-rsa");
                w.string(&sig);
                Ok(w.into_bytes())
            }
            (PrivateHostKey::Dsa { p, q, g, x }, PublicKeyAlgorithm::Dsa) => {
                let (r, s) = dsa_sign(p, q, g, x, message);
                let mut sig = vec![0u8; 40];
                let r_bytes = r.to_bytes_be();
                let s_bytes = s.to_bytes_be();
                sig[20 - r_bytes.len()..20].copy_from_slice(&r_bytes);
                sig[40 - s_bytes.len()..40].copy_from_slice(&s_bytes);
                let mut w = Writer::new();
                w.string(b"ssh-dss");
                w.string(&sig);
                Ok(w.into_bytes())
            }
            _ => Err(Error::BadData("signature algorithm does not match key type".into())),
        }
    }
}

/// Textbook DSA sign/verify over SHA-1(message), with `k` generated fresh
/// each signature. There is no mainstream DSA crate for this era's
/// ecosystem; this is the workspace's only hand-rolled primitive, built
/// directly on `num-bigint` the way the rest of the finite-field DH math
/// already is.
fn dsa_sign(p: &BigUint, q: &BigUint, g: &BigUint, x: &BigUint, message: &[u8]) -> (BigUint, BigUint) {
    let h = BigUint::from_bytes_be(&digest(HashAlgorithm::Sha1, message));
    let mut rng = rand::thread_rng();
    loop {
        let k = random_below(q, &mut rng);
        if k.is_zero() {
            continue;
        }
        let r = g.modpow(&k, p) % q;
        if r.is_zero() {
            continue;
        }
        let k_inv = match modinv(&k, q) {
            Some(v) => v,
            None => continue,
        };
        let s = (k_inv * (&h + x * &r)) % q;
        if s.is_zero() {
            continue;
        }
        return (r, s);
    }
}

fn dsa_verify(p: &BigUint, q: &BigUint, g: &BigUint, y: &BigUint, message: &[u8], r: &BigUint, s: &BigUint) -> bool {
    if r.is_zero() || r >= q || s.is_zero() || s >= q {
        return false;
    }
    let w = match modinv(s, q) {
        Some(v) => v,
        None => return false,
    };
    let h = BigUint::from_bytes_be(&digest(HashAlgorithm::Sha1, message));
    let u1 = (&h * &w) % q;
    let u2 = (r * &w) % q;
    let v = ((g.modpow(&u1, p) * y.modpow(&u2, p)) % p) % q;
    v == *r
}

fn random_below<R: Rng>(bound: &BigUint, rng: &mut R) -> BigUint {
    let bytes = (bound.bits() + 7) / 8;
    loop {
        let mut buf = vec![0u8; bytes];
        rng.fill_bytes(&mut buf);
        let candidate = BigUint::from_bytes_be(&buf);
        if candidate < *bound {
            return candidate;
        }
    }
}

/// Modular inverse of `a` mod `m` via the extended Euclidean algorithm.
fn modinv(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let (mut old_r, mut r) = (BigInt::from_biguint(Sign::Plus, a.clone()), BigInt::from_biguint(Sign::Plus, m.clone()));
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = r;
        r = new_r;
        let new_s = &old_s - &quotient * &s;
        old_s = s;
        s = new_s;
    }
    if old_r != BigInt::one() {
        return None;
    }
    let m_big = BigInt::from_biguint(Sign::Plus, m.clone());
    let result = ((old_s % &m_big) + &m_big) % &m_big;
    result.to_biguint()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dsa_sign_then_verify_round_trips() {
        // A small toy group; real keys use 1024-bit p / 160-bit q.
        let q = BigUint::from(11u32);
        let p = BigUint::from(23u32);
        let g = BigUint::from(4u32);
        let x = BigUint::from(7u32);
        let y = g.modpow(&x, &p);

        let (r, s) = dsa_sign(&p, &q, &g, &x, b"hello");
        assert!(dsa_verify(&p, &q, &g, &y, b"hello", &r, &s));
        assert!(!dsa_verify(&p, &q, &g, &y, b"tampered", &r, &s));
    }
}
