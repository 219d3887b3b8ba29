//! Handshake orchestration: identification-string exchange, `KEXINIT`
//! negotiation, Diffie-Hellman key exchange (static and group-exchange),
//! the `NEWKEYS` boundary, and the handoff into user authentication
//! Mirrors `brontide::Machine::handshake`'s
//! shape: branch on role once, then a straight-line send/receive sequence
//! over a generic transport with no retries or backtracking.

use std::io::{Read, Write};

use common_types::{Error, PeerQuirks, Role, SessionId, COOKIE_SIZE};
use crypto::cipher::CipherAlgorithm;
use crypto::dh::{self, DhGroup, DhKeyPair};
use crypto::hash::HashAlgorithm;
use crypto::mac::MacAlgorithm;
use crypto::pubkey::{HostKey, PrivateHostKey, PublicKeyAlgorithm};
use num_bigint::BigUint;
use transport::keyex::{self, ExchangeHashInputs, KeySchedule, KeyScheduleSizes};
use transport::{identification, Config as TransportConfig, PacketCodec};
use wire::kex::{GexGroup, GexRequest, KexDhInit, KexDhReply, KexInit};
use wire::{msg, negotiate};

use crate::address::Transport;
use crate::config::HostKeyCheck;

/// How many consecutive `IGNORE`/`DEBUG`/`USERAUTH_BANNER` packets a
/// handshake read loop tolerates before giving up (boundary
/// behavior: the 21st such packet is `Overflow`).
const MAX_HANDSHAKE_NOISE: u32 = 20;

const GEX_MIN_BITS: u32 = 1024;
const GEX_PREFERRED_BITS: u32 = 2048;
const GEX_MAX_BITS: u32 = 8192;

/// What a caller brings to the keyex step beyond the wire protocol itself:
/// a client either checks the server's host key or trusts whatever is
/// offered, a server must have one to sign with.
pub(crate) enum Identity<'a> {
    Client { host_key_check: Option<&'a HostKeyCheck> },
    Server { host_key: &'a PrivateHostKey, host_key_algorithm: PublicKeyAlgorithm },
}

pub(crate) struct HandshakeResult<T> {
    pub codec: PacketCodec<T>,
    pub quirks: PeerQuirks,
    pub session_id: SessionId,
}

/// Run the full handshake over `transport` and hand back a codec already
/// in the secure state on both directions. Does not touch user
/// authentication; the caller dispatches into `userauth` next.
pub(crate) fn run<T: Transport>(
    mut transport: T,
    role: Role,
    cfg: &TransportConfig,
    impl_tag: &str,
    identity: Identity,
) -> Result<HandshakeResult<T>, Error> {
    transport.set_read_timeout(Some(cfg.handshake_timeout))?;

    identification::write_own_id(&mut transport, impl_tag)?;
    let (peer_id, quirks) = identification::read_peer_id(&mut transport)?;

    let own_id_line = identification::own_id_line(impl_tag);
    let own_id = own_id_line[..own_id_line.len() - 2].to_vec();

    let (client_id, server_id): (Vec<u8>, Vec<u8>) = match role {
        Role::Client => (own_id, peer_id),
        Role::Server => (peer_id, own_id),
    };

    let mut codec = PacketCodec::new(transport, cfg.receive_buffer_size as usize);

    let cookie = cookie();
    let our_kexinit = KexInit::new_hello(cookie, &cfg.algorithms);
    let our_kexinit_bytes = our_kexinit.encode();
    send_encoded(&mut codec, our_kexinit_bytes.clone(), false)?;

    let (peer_kexinit, peer_kexinit_bytes) = read_kexinit(&mut codec)?;

    let as_responder = role == Role::Server;
    let negotiated = negotiate::negotiate(&cfg.algorithms, &our_kexinit, &peer_kexinit, as_responder)?;

    if negotiated.discard_guessed_packet {
        // The peer's optimistic guessed keyex packet never matched our
        // first preference; read and throw it away before the real one.
        codec.read_packet()?;
    }

    let (client_kexinit, server_kexinit): (&[u8], &[u8]) = match role {
        Role::Client => (&our_kexinit_bytes, &peer_kexinit_bytes),
        Role::Server => (&peer_kexinit_bytes, &our_kexinit_bytes),
    };

    let is_gex = negotiated.kex == "diffie-hellman-group-exchange-sha1";
    let (shared_secret, exchange_hash, host_key_blob) = if is_gex {
        run_group_exchange(&mut codec, role, &client_id, &server_id, client_kexinit, server_kexinit, &identity, quirks)?
    } else {
        run_static_dh(&mut codec, role, &negotiated.kex, &client_id, &server_id, client_kexinit, server_kexinit, &identity, quirks)?
    };

    if let Identity::Client { host_key_check: Some(check) } = &identity {
        if !check.accepts(&host_key_blob) {
            return Err(Error::Permission("server host key does not match the expected fingerprint".into()));
        }
    }

    let session_id = SessionId::from(exchange_hash.clone());

    let cipher_algo = CipherAlgorithm::from_name(&negotiated.cipher)
        .ok_or_else(|| Error::NotAvailable(format!("unsupported cipher {}", negotiated.cipher)))?;
    let mac_algo = MacAlgorithm::from_name(&negotiated.mac)
        .ok_or_else(|| Error::NotAvailable(format!("unsupported mac {}", negotiated.mac)))?;
    let mac_key_len = if quirks.contains(PeerQuirks::HMAC_KEY_SIZE) { 16 } else { mac_algo.key_size() };

    let sizes = KeyScheduleSizes { iv_len: cipher_algo.block_size(), key_len: cipher_algo.key_size(), mac_len: mac_key_len };
    let schedule = keyex::derive_keys(HashAlgorithm::Sha1, &shared_secret, &exchange_hash, &session_id, &sizes);

    let KeySchedule { iv_c2s, iv_s2c, key_c2s, key_s2c, mac_c2s, mac_s2c } = schedule;
    let (write_key, write_iv, write_mac, read_key, read_iv, read_mac) = if role.is_client() {
        (key_c2s, iv_c2s, mac_c2s, key_s2c, iv_s2c, mac_s2c)
    } else {
        (key_s2c, iv_s2c, mac_s2c, key_c2s, iv_c2s, mac_c2s)
    };

    // NEWKEYS itself goes out under the schedule that was active before it;
    // only packets after it use the freshly derived write keys.
    send_encoded(&mut codec, wire::kex::encode_newkeys(), false)?;
    codec.set_write_keys(cipher_algo, &write_key, &write_iv, mac_algo, write_mac)?;

    wait_for_newkeys(&mut codec)?;
    codec.set_read_keys(cipher_algo, &read_key, &read_iv, mac_algo, read_mac)?;

    Ok(HandshakeResult { codec, quirks, session_id })
}

fn cookie() -> [u8; COOKIE_SIZE] {
    let bytes = crypto::random::nonce(COOKIE_SIZE);
    let mut cookie = [0u8; COOKIE_SIZE];
    cookie.copy_from_slice(&bytes);
    cookie
}

fn send_encoded<T: Read + Write>(codec: &mut PacketCodec<T>, encoded: Vec<u8>, pad_sensitive: bool) -> Result<(), Error> {
    let msg_type = encoded[0];
    let mut pkt = codec.open_packet(msg_type);
    pkt.writer().raw(&encoded[1..]);
    codec.wrap_and_send(pkt, pad_sensitive)
}

fn read_kexinit<T: Read + Write>(codec: &mut PacketCodec<T>) -> Result<(KexInit, Vec<u8>), Error> {
    let mut noise = 0u32;
    loop {
        let (msg_type, payload) = codec.read_packet()?;
        if msg_type == msg::KEXINIT {
            let kexinit = KexInit::decode(&payload)?;
            return Ok((kexinit, payload));
        }
        if msg::is_handshake_noise(msg_type) {
            noise += 1;
            if noise > MAX_HANDSHAKE_NOISE {
                return Err(Error::Overflow);
            }
            continue;
        }
        return Err(Error::BadData(format!("unexpected message {} while awaiting KEXINIT", msg_type)));
    }
}

fn wait_for_newkeys<T: Read + Write>(codec: &mut PacketCodec<T>) -> Result<(), Error> {
    let mut noise = 0u32;
    loop {
        let (msg_type, _payload) = codec.read_packet()?;
        if msg_type == msg::NEWKEYS {
            return wire::kex::decode_newkeys(msg_type);
        }
        if msg::is_handshake_noise(msg_type) {
            noise += 1;
            if noise > MAX_HANDSHAKE_NOISE {
                return Err(Error::Overflow);
            }
            continue;
        }
        return Err(Error::BadData(format!("unexpected message {} while awaiting NEWKEYS", msg_type)));
    }
}

/// Map a CuteFTP peer's mid-DH connection drop to a clearer error than the
/// raw I/O failure it otherwise surfaces as (the `CUTEFTP` quirk).
fn cuteftp_guard<A>(result: Result<A, Error>, quirks: PeerQuirks) -> Result<A, Error> {
    result.map_err(|e| {
        if quirks.contains(PeerQuirks::CUTEFTP) && matches!(e, Error::Read(_) | Error::Complete | Error::Timeout) {
            Error::BadData("peer dropped the connection during DH phase 2 (CuteFTP quirk)".into())
        } else {
            e
        }
    })
}

fn server_identity<'a>(identity: &'a Identity) -> Result<(&'a PrivateHostKey, PublicKeyAlgorithm), Error> {
    match identity {
        Identity::Server { host_key, host_key_algorithm } => Ok((host_key, *host_key_algorithm)),
        Identity::Client { .. } => Err(Error::NotInited("server role requires a server identity".into())),
    }
}

fn static_group(name: &str) -> Result<DhGroup, Error> {
    match name {
        "diffie-hellman-group1-sha1" => Ok(dh::group1()),
        "diffie-hellman-group14-sha1" => Ok(dh::group14()),
        other => Err(Error::NotAvailable(format!("unsupported keyex algorithm {}", other))),
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_hash(
    client_id: &[u8],
    server_id: &[u8],
    client_kexinit: &[u8],
    server_kexinit: &[u8],
    host_key_blob: &[u8],
    gex_request: Option<&[u8]>,
    gex_p_g: Option<(&BigUint, &BigUint)>,
    e: &BigUint,
    f: &BigUint,
    k: &BigUint,
    quirks: PeerQuirks,
) -> Vec<u8> {
    let k = if quirks.contains(PeerQuirks::NO_HASH_SECRET) { None } else { Some(k) };
    let inputs = ExchangeHashInputs { client_id, server_id, client_kexinit, server_kexinit, host_key_blob, gex_request, gex_p_g, e, f, k };
    keyex::compute_exchange_hash(&inputs)
}

#[allow(clippy::too_many_arguments)]
fn run_static_dh<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    role: Role,
    kex_name: &str,
    client_id: &[u8],
    server_id: &[u8],
    client_kexinit: &[u8],
    server_kexinit: &[u8],
    identity: &Identity,
    quirks: PeerQuirks,
) -> Result<(BigUint, Vec<u8>, Vec<u8>), Error> {
    let group = static_group(kex_name)?;
    let mut rng = rand::thread_rng();
    let own = DhKeyPair::generate(group, &mut rng);

    if role.is_client() {
        send_encoded(codec, KexDhInit { e: own.public.to_bytes_be() }.encode(msg::KEXDH_INIT), false)?;
        let (_msg_type, payload) = cuteftp_guard(codec.read_packet(), quirks)?;
        let reply = KexDhReply::decode(&payload, msg::KEXDH_REPLY)?;
        let f = BigUint::from_bytes_be(&reply.f);
        let k = own.derive_shared(&f)?;
        let h = compute_hash(client_id, server_id, client_kexinit, server_kexinit, &reply.host_key_blob, None, None, &own.public, &f, &k, quirks);
        let host_key = HostKey::parse(&reply.host_key_blob)?;
        if !host_key.verify(&h, &reply.signature, quirks.contains(PeerQuirks::SIG_FORMAT))? {
            return Err(Error::BadSignature);
        }
        Ok((k, h, reply.host_key_blob))
    } else {
        let (_msg_type, payload) = codec.read_packet()?;
        let init = KexDhInit::decode(&payload, msg::KEXDH_INIT)?;
        let e = BigUint::from_bytes_be(&init.e);
        let k = own.derive_shared(&e)?;

        let (host_key, host_key_algorithm) = server_identity(identity)?;
        let public = host_key.public_host_key();
        let host_key_blob = public.encode();
        let h = compute_hash(client_id, server_id, client_kexinit, server_kexinit, &host_key_blob, None, None, &e, &own.public, &k, quirks);
        let signature = host_key.sign(&h, host_key_algorithm)?;
        send_encoded(
            codec,
            KexDhReply { host_key_blob: host_key_blob.clone(), f: own.public.to_bytes_be(), signature }.encode(msg::KEXDH_REPLY),
            false,
        )?;
        Ok((k, h, host_key_blob))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_group_exchange<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    role: Role,
    client_id: &[u8],
    server_id: &[u8],
    client_kexinit: &[u8],
    server_kexinit: &[u8],
    identity: &Identity,
    quirks: PeerQuirks,
) -> Result<(BigUint, Vec<u8>, Vec<u8>), Error> {
    if role.is_client() {
        let request = GexRequest::Triple { min: GEX_MIN_BITS, n: GEX_PREFERRED_BITS, max: GEX_MAX_BITS };
        send_encoded(codec, request.encode(), false)?;

        let (msg_type, payload) = cuteftp_guard(codec.read_packet(), quirks)?;
        if msg_type != msg::KEXDH_GEX_GROUP {
            return Err(Error::BadData("expected KEXDH_GEX_GROUP".into()));
        }
        let group_msg = GexGroup::decode(&payload)?;
        let p = BigUint::from_bytes_be(&group_msg.p);
        let g = BigUint::from_bytes_be(&group_msg.g);
        let group = DhGroup { name: "gex-negotiated", bits: p.bits() as u32, p: p.clone(), g: g.clone() };
        let mut rng = rand::thread_rng();
        let own = DhKeyPair::generate(group, &mut rng);

        send_encoded(codec, KexDhInit { e: own.public.to_bytes_be() }.encode(msg::KEXDH_GEX_INIT), false)?;
        let (_msg_type, reply_payload) = codec.read_packet()?;
        let reply = KexDhReply::decode(&reply_payload, msg::KEXDH_GEX_REPLY)?;
        let f = BigUint::from_bytes_be(&reply.f);
        let k = own.derive_shared(&f)?;
        let h = compute_hash(
            client_id,
            server_id,
            client_kexinit,
            server_kexinit,
            &reply.host_key_blob,
            Some(&request.hash_bytes()),
            Some((&p, &g)),
            &own.public,
            &f,
            &k,
            quirks,
        );
        let host_key = HostKey::parse(&reply.host_key_blob)?;
        if !host_key.verify(&h, &reply.signature, quirks.contains(PeerQuirks::SIG_FORMAT))? {
            return Err(Error::BadSignature);
        }
        Ok((k, h, reply.host_key_blob))
    } else {
        let (msg_type, payload) = codec.read_packet()?;
        let request = GexRequest::decode(msg_type, &payload)?;
        let group = dh::pick_group_for_size(request.n())?;
        let p = group.p.clone();
        let g = group.g.clone();
        send_encoded(codec, GexGroup { p: p.to_bytes_be(), g: g.to_bytes_be() }.encode(), false)?;

        let mut rng = rand::thread_rng();
        let own = DhKeyPair::generate(group, &mut rng);

        let (_init_type, init_payload) = codec.read_packet()?;
        let init = KexDhInit::decode(&init_payload, msg::KEXDH_GEX_INIT)?;
        let e = BigUint::from_bytes_be(&init.e);
        let k = own.derive_shared(&e)?;

        let (host_key, host_key_algorithm) = server_identity(identity)?;
        let public = host_key.public_host_key();
        let host_key_blob = public.encode();
        let h = compute_hash(
            client_id,
            server_id,
            client_kexinit,
            server_kexinit,
            &host_key_blob,
            Some(&request.hash_bytes()),
            Some((&p, &g)),
            &e,
            &own.public,
            &k,
            quirks,
        );
        let signature = host_key.sign(&h, host_key_algorithm)?;
        send_encoded(
            codec,
            KexDhReply { host_key_blob: host_key_blob.clone(), f: own.public.to_bytes_be(), signature }.encode(msg::KEXDH_GEX_REPLY),
            false,
        )?;
        Ok((k, h, host_key_blob))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    /// Writes `noise_count` `IGNORE` packets followed by one real
    /// `KEXINIT`, all plaintext, and hands back a codec positioned to
    /// read them — the boundary behavior spec.md §8 calls out: a peer
    /// sending 20 consecutive `IGNORE`/`DEBUG`/`USERAUTH_BANNER` packets
    /// during the handshake is tolerated, a 21st is `Overflow`.
    fn codec_with_noise_then_kexinit(noise_count: u32) -> PacketCodec<Cursor<Vec<u8>>> {
        let mut writer = PacketCodec::new(Cursor::new(Vec::new()), 16384);
        for _ in 0..noise_count {
            let mut pkt = writer.open_packet(msg::IGNORE);
            pkt.writer().string(b"noise");
            writer.wrap_and_send(pkt, false).unwrap();
        }
        let kexinit = KexInit::new_hello([0u8; COOKIE_SIZE], &wire::AlgorithmPreferences::default());
        let bytes = kexinit.encode();
        let mut pkt = writer.open_packet(msg::KEXINIT);
        pkt.writer().raw(&bytes[1..]);
        writer.wrap_and_send(pkt, false).unwrap();

        PacketCodec::new(Cursor::new(writer.into_inner().into_inner()), 16384)
    }

    #[test]
    fn read_kexinit_tolerates_exactly_the_noise_cap() {
        let mut codec = codec_with_noise_then_kexinit(MAX_HANDSHAKE_NOISE);
        assert!(read_kexinit(&mut codec).is_ok());
    }

    #[test]
    fn read_kexinit_rejects_one_more_than_the_noise_cap() {
        let mut codec = codec_with_noise_then_kexinit(MAX_HANDSHAKE_NOISE + 1);
        match read_kexinit(&mut codec) {
            Err(Error::Overflow) => {}
            other => panic!("expected Overflow, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn cuteftp_guard_rewrites_a_dropped_connection_during_dh() {
        let quirks = PeerQuirks::CUTEFTP;
        let result: Result<(), Error> = cuteftp_guard(Err(Error::Complete), quirks);
        match result {
            Err(Error::BadData(msg)) => assert!(msg.contains("CuteFTP")),
            other => panic!("expected a CuteFTP-specific BadData, got {:?}", other),
        }
    }

    #[test]
    fn cuteftp_guard_is_a_no_op_without_the_quirk() {
        let result: Result<(), Error> = cuteftp_guard(Err(Error::Complete), PeerQuirks::empty());
        assert!(matches!(result, Err(Error::Complete)));
    }
}
