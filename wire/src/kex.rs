use crate::msg;
use crate::primitive::{Reader, Writer};
use common_types::{Error, COOKIE_SIZE};

/// The ten comma-separated algorithm name-lists carried by one `KEXINIT`
/// message, plus the guess flag and reserved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    pub cookie: [u8; COOKIE_SIZE],
    pub kex_algorithms: Vec<String>,
    pub server_host_key_algorithms: Vec<String>,
    pub encryption_client_to_server: Vec<String>,
    pub encryption_server_to_client: Vec<String>,
    pub mac_client_to_server: Vec<String>,
    pub mac_server_to_client: Vec<String>,
    pub compression_client_to_server: Vec<String>,
    pub compression_server_to_client: Vec<String>,
    pub languages_client_to_server: Vec<String>,
    pub languages_server_to_client: Vec<String>,
    pub first_kex_packet_follows: bool,
    pub reserved: u32,
}

impl KexInit {
    /// Encode the full packet payload, including the leading `KEXINIT`
    /// message type byte — this is exactly the byte string that gets
    /// mixed into the exchange hash, so callers must keep the returned
    /// bytes rather than re-deriving them.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::KEXINIT);
        w.raw(&self.cookie);
        w.name_list(&self.kex_algorithms);
        w.name_list(&self.server_host_key_algorithms);
        w.name_list(&self.encryption_client_to_server);
        w.name_list(&self.encryption_server_to_client);
        w.name_list(&self.mac_client_to_server);
        w.name_list(&self.mac_server_to_client);
        w.name_list(&self.compression_client_to_server);
        w.name_list(&self.compression_server_to_client);
        w.name_list(&self.languages_client_to_server);
        w.name_list(&self.languages_server_to_client);
        w.boolean(self.first_kex_packet_follows);
        w.uint32(self.reserved);
        w.into_bytes()
    }

    /// Decode a full packet payload (including the leading type byte).
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::KEXINIT {
            return Err(Error::BadData(format!("expected KEXINIT, got type {}", msg_type)));
        }
        let mut cookie = [0u8; COOKIE_SIZE];
        cookie.copy_from_slice(r.bytes(COOKIE_SIZE)?);
        Ok(KexInit {
            cookie,
            kex_algorithms: r.name_list()?,
            server_host_key_algorithms: r.name_list()?,
            encryption_client_to_server: r.name_list()?,
            encryption_server_to_client: r.name_list()?,
            mac_client_to_server: r.name_list()?,
            mac_server_to_client: r.name_list()?,
            compression_client_to_server: r.name_list()?,
            compression_server_to_client: r.name_list()?,
            languages_client_to_server: r.name_list()?,
            languages_server_to_client: r.name_list()?,
            first_kex_packet_follows: r.boolean()?,
            reserved: r.uint32()?,
        })
    }

    pub fn new_hello(cookie: [u8; COOKIE_SIZE], prefs: &AlgorithmPreferences) -> Self {
        KexInit {
            cookie,
            kex_algorithms: prefs.kex.clone(),
            server_host_key_algorithms: prefs.host_key.clone(),
            encryption_client_to_server: prefs.cipher.clone(),
            encryption_server_to_client: prefs.cipher.clone(),
            mac_client_to_server: prefs.mac.clone(),
            mac_server_to_client: prefs.mac.clone(),
            compression_client_to_server: prefs.compression.clone(),
            compression_server_to_client: prefs.compression.clone(),
            languages_client_to_server: Vec::new(),
            languages_server_to_client: Vec::new(),
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }

    /// Whether the guessed packet that would follow this hello (per
    /// `first_kex_packet_follows`) can ever be valid against `other`: the
    /// first (most preferred) keyex algorithm and first host-key algorithm
    /// must agree on both sides.
    pub fn guess_matches(&self, other: &KexInit) -> bool {
        self.kex_algorithms.first() == other.kex_algorithms.first()
            && self.server_host_key_algorithms.first() == other.server_host_key_algorithms.first()
    }
}

/// One local preference list per negotiation category. Defaults are the
/// tables the reference implementation ships (`algoStringKeyexTbl` /
/// `algoStringPubkeyTbl` / `algoStringEncrTblClient` / `algoStringMACTbl`
/// in `ssh2.c`), in preferred order.
#[derive(Debug, Clone)]
pub struct AlgorithmPreferences {
    pub kex: Vec<String>,
    pub host_key: Vec<String>,
    pub cipher: Vec<String>,
    pub mac: Vec<String>,
    pub compression: Vec<String>,
}

impl Default for AlgorithmPreferences {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        AlgorithmPreferences {
            kex: names(&[
                "diffie-hellman-group-exchange-sha1",
                "diffie-hellman-group14-sha1",
                "diffie-hellman-group1-sha1",
            ]),
            host_key: names(&["ssh-rsa", "ssh-dss"]),
            cipher: names(&["aes128-cbc", "3des-cbc"]),
            mac: names(&["hmac-sha1", "hmac-md5"]),
            compression: names(&["none"]),
        }
    }
}

/// `SSH_MSG_KEXDH_INIT` / `SSH_MSG_KEXDH_GEX_INIT`: the client's DH public
/// value `e`, an MPI carried as raw big-endian bytes — the `transport`
/// crate's keyex engine owns the bignum math, `wire` only (de)serializes.
#[derive(Debug, Clone)]
pub struct KexDhInit {
    pub e: Vec<u8>,
}

impl KexDhInit {
    pub fn encode(&self, msg_type: u8) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg_type);
        w.mpi(&self.e);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8], expected_type: u8) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let got = r.byte()?;
        if got != expected_type {
            return Err(Error::BadData(format!("expected keyex init type {}, got {}", expected_type, got)));
        }
        Ok(KexDhInit { e: r.mpi()? })
    }
}

/// `SSH_MSG_KEXDH_REPLY` / `SSH_MSG_KEXDH_GEX_REPLY`: the server's host-key
/// blob (kept as the exact bytes received, not re-encoded), its DH
/// public value `f`, and the signature over the exchange hash.
#[derive(Debug, Clone)]
pub struct KexDhReply {
    pub host_key_blob: Vec<u8>,
    pub f: Vec<u8>,
    pub signature: Vec<u8>,
}

impl KexDhReply {
    pub fn encode(&self, msg_type: u8) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg_type);
        w.string(&self.host_key_blob);
        w.mpi(&self.f);
        w.string(&self.signature);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8], expected_type: u8) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let got = r.byte()?;
        if got != expected_type {
            return Err(Error::BadData(format!("expected keyex reply type {}, got {}", expected_type, got)));
        }
        Ok(KexDhReply {
            host_key_blob: r.string()?.to_vec(),
            f: r.mpi()?,
            signature: r.string()?.to_vec(),
        })
    }
}

/// The client's group-exchange size request. Older peers encode only `n`;
/// modern peers send the `{min, n, max}` triple.
/// Which flavor is in play is learned from the message type byte the peer
/// actually sent (`KEXDH_GEX_REQUEST_OLD` vs `KEXDH_GEX_REQUEST`), not from
/// a peer-quirk flag.
#[derive(Debug, Clone, Copy)]
pub enum GexRequest {
    Old { n: u32 },
    Triple { min: u32, n: u32, max: u32 },
}

impl GexRequest {
    pub fn n(&self) -> u32 {
        match self {
            GexRequest::Old { n } => *n,
            GexRequest::Triple { n, .. } => *n,
        }
    }

    /// The exact bytes mixed into the exchange hash, kept verbatim: `n`
    /// alone, or `min ‖ n ‖ max`, with no leading message type or length
    /// wrapper.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            GexRequest::Old { n } => {
                w.uint32(*n);
            }
            GexRequest::Triple { min, n, max } => {
                w.uint32(*min);
                w.uint32(*n);
                w.uint32(*max);
            }
        }
        w.into_bytes()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            GexRequest::Old { n } => {
                w.byte(msg::KEXDH_GEX_REQUEST_OLD);
                w.uint32(*n);
            }
            GexRequest::Triple { min, n, max } => {
                w.byte(msg::KEXDH_GEX_REQUEST);
                w.uint32(*min);
                w.uint32(*n);
                w.uint32(*max);
            }
        }
        w.into_bytes()
    }

    pub fn decode(msg_type: u8, payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let got = r.byte()?;
        if got != msg_type {
            return Err(Error::BadData("unexpected group-exchange request type".into()));
        }
        if msg_type == msg::KEXDH_GEX_REQUEST_OLD {
            Ok(GexRequest::Old { n: r.uint32()? })
        } else {
            let min = r.uint32()?;
            let n = r.uint32()?;
            let max = r.uint32()?;
            Ok(GexRequest::Triple { min, n, max })
        }
    }
}

/// `SSH_MSG_KEXDH_GEX_GROUP`: the server's chosen `p, g`.
#[derive(Debug, Clone)]
pub struct GexGroup {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
}

impl GexGroup {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::KEXDH_GEX_GROUP);
        w.mpi(&self.p);
        w.mpi(&self.g);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let got = r.byte()?;
        if got != msg::KEXDH_GEX_GROUP {
            return Err(Error::BadData("expected KEXDH_GEX_GROUP".into()));
        }
        Ok(GexGroup { p: r.mpi()?, g: r.mpi()? })
    }
}

/// `SSH_MSG_NEWKEYS`: a bare, zero-length-payload marker (see
/// invariant 2's lone exception to "no plaintext after NEWKEYS").
pub fn encode_newkeys() -> Vec<u8> {
    vec![msg::NEWKEYS]
}

pub fn decode_newkeys(msg_type: u8) -> Result<(), Error> {
    if msg_type != msg::NEWKEYS {
        return Err(Error::BadData("expected NEWKEYS".into()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> KexInit {
        KexInit::new_hello([7u8; COOKIE_SIZE], &AlgorithmPreferences::default())
    }

    #[test]
    fn hello_round_trips() {
        let hello = sample();
        let encoded = hello.encode();
        let decoded = KexInit::decode(&encoded).unwrap();
        assert_eq!(hello, decoded);
    }

    #[test]
    fn guess_matches_requires_both_first_entries_equal() {
        let a = sample();
        let mut b = sample();
        assert!(a.guess_matches(&b));

        b.kex_algorithms.swap(0, 1);
        assert!(!a.guess_matches(&b));
    }

    #[test]
    fn kexdh_init_round_trips_mpi() {
        let init = KexDhInit { e: vec![0x01, 0x02, 0x03] };
        let encoded = init.encode(msg::KEXDH_INIT);
        let decoded = KexDhInit::decode(&encoded, msg::KEXDH_INIT).unwrap();
        assert_eq!(decoded.e, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn gex_request_old_vs_triple_hash_bytes_differ_in_length() {
        let old = GexRequest::Old { n: 2048 };
        let triple = GexRequest::Triple { min: 1024, n: 2048, max: 8192 };
        assert_eq!(old.hash_bytes().len(), 4);
        assert_eq!(triple.hash_bytes().len(), 12);
    }

    #[test]
    fn gex_request_round_trips_through_its_own_message_type() {
        let triple = GexRequest::Triple { min: 1024, n: 2048, max: 8192 };
        let encoded = triple.encode();
        let decoded = GexRequest::decode(msg::KEXDH_GEX_REQUEST, &encoded).unwrap();
        assert_eq!(decoded.n(), 2048);
    }

    #[test]
    fn gex_group_round_trips() {
        let group = GexGroup { p: vec![0xff, 0x01], g: vec![0x02] };
        let decoded = GexGroup::decode(&group.encode()).unwrap();
        assert_eq!(decoded.p, vec![0xff, 0x01]);
    }
}
