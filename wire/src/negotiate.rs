use crate::kex::{AlgorithmPreferences, KexInit};
use common_types::Error;

/// The one algorithm chosen per category, plus the bookkeeping the rest of
/// the handshake needs: whether our first acceptable choice wasn't the
/// peer's own first preference, and whether a guessed keyex packet (per
/// `first_kex_packet_follows`) must be discarded.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub kex: String,
    pub host_key: String,
    pub cipher: String,
    pub mac: String,
    pub compression: String,
    pub preferred_mismatch: bool,
    pub discard_guessed_packet: bool,
}

/// Walk `peer`'s list left-to-right and pick the first entry also present
/// in `local`. Returns the match and whether it was `peer`'s own first
/// entry.
fn pick_as_responder(local: &[String], peer: &[String]) -> Option<(String, bool)> {
    for (i, candidate) in peer.iter().enumerate() {
        if local.iter().any(|l| l == candidate) {
            return Some((candidate.clone(), i == 0));
        }
    }
    None
}

/// Walk `local`'s list left-to-right and pick the first entry the peer also
/// offered — the client picks what's best for *itself*.
fn pick_as_initiator(local: &[String], peer: &[String]) -> Option<String> {
    local.iter().find(|l| peer.contains(l)).cloned()
}

fn category(
    name: &str,
    local: &[String],
    peer: &[String],
    as_responder: bool,
) -> Result<(String, bool), Error> {
    let result = if as_responder {
        pick_as_responder(local, peer)
    } else {
        pick_as_initiator(local, peer).map(|v| (v, true))
    };
    result.ok_or_else(|| Error::NotAvailable(format!("no common {} algorithm", name)))
}

/// Negotiate one full set of algorithms from a local preference table and
/// the peer's `KEXINIT`.
///
/// `as_responder` selects the rule: servers (and, symmetrically, a client
/// validating the server's offer against its own table) walk the peer's
/// list; clients choosing on their own behalf walk their own list. Cipher
/// and MAC are negotiated once and required to match both directions, even
/// though the protocol in principle allows asymmetric choices.
pub fn negotiate(
    local: &AlgorithmPreferences,
    ours: &KexInit,
    peer: &KexInit,
    as_responder: bool,
) -> Result<Negotiated, Error> {
    let (kex, kex_is_peer_first) = category("keyex", &local.kex, &peer.kex_algorithms, as_responder)?;
    let (host_key, host_key_is_peer_first) = category(
        "host-key",
        &local.host_key,
        &peer.server_host_key_algorithms,
        as_responder,
    )?;

    let (cipher_c2s, _) = category(
        "client-to-server cipher",
        &local.cipher,
        &peer.encryption_client_to_server,
        as_responder,
    )?;
    let (cipher_s2c, _) = category(
        "server-to-client cipher",
        &local.cipher,
        &peer.encryption_server_to_client,
        as_responder,
    )?;
    if cipher_c2s != cipher_s2c {
        return Err(Error::NotAvailable("asymmetric cipher choice rejected".into()));
    }

    let (mac_c2s, _) = category("client-to-server MAC", &local.mac, &peer.mac_client_to_server, as_responder)?;
    let (mac_s2c, _) = category("server-to-client MAC", &local.mac, &peer.mac_server_to_client, as_responder)?;
    if mac_c2s != mac_s2c {
        return Err(Error::NotAvailable("asymmetric MAC choice rejected".into()));
    }

    let (compression_c2s, _) = category(
        "client-to-server compression",
        &local.compression,
        &peer.compression_client_to_server,
        as_responder,
    )?;

    let preferred_mismatch = as_responder && !(kex_is_peer_first && host_key_is_peer_first);

    let discard_guessed_packet = peer.first_kex_packet_follows && !ours.guess_matches(peer);

    Ok(Negotiated {
        kex,
        host_key,
        cipher: cipher_c2s,
        mac: mac_c2s,
        compression: compression_c2s,
        preferred_mismatch,
        discard_guessed_packet,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use common_types::COOKIE_SIZE;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn server_side_first_match_flags_preferred_mismatch() {
        let local = AlgorithmPreferences {
            cipher: names(&["3des-cbc", "aes128-cbc"]),
            ..AlgorithmPreferences::default()
        };
        let mut peer = KexInit::new_hello([1u8; COOKIE_SIZE], &AlgorithmPreferences::default());
        peer.encryption_client_to_server = names(&["aes128-cbc", "3des-cbc"]);
        peer.encryption_server_to_client = names(&["aes128-cbc", "3des-cbc"]);

        let ours = KexInit::new_hello([2u8; COOKIE_SIZE], &local);
        let negotiated = negotiate(&local, &ours, &peer, true).unwrap();
        assert_eq!(negotiated.cipher, "3des-cbc");
    }

    #[test]
    fn client_side_picks_best_for_itself() {
        let local = AlgorithmPreferences {
            cipher: names(&["3des-cbc", "aes128-cbc"]),
            ..AlgorithmPreferences::default()
        };
        let mut peer = KexInit::new_hello([1u8; COOKIE_SIZE], &AlgorithmPreferences::default());
        peer.encryption_client_to_server = names(&["aes128-cbc", "3des-cbc"]);
        peer.encryption_server_to_client = names(&["aes128-cbc", "3des-cbc"]);

        let ours = KexInit::new_hello([2u8; COOKIE_SIZE], &local);
        let negotiated = negotiate(&local, &ours, &peer, false).unwrap();
        assert_eq!(negotiated.cipher, "3des-cbc");
    }

    #[test]
    fn no_common_algorithm_is_not_available() {
        let local = AlgorithmPreferences {
            cipher: names(&["3des-cbc"]),
            ..AlgorithmPreferences::default()
        };
        let mut peer = KexInit::new_hello([1u8; COOKIE_SIZE], &AlgorithmPreferences::default());
        peer.encryption_client_to_server = names(&["aes128-cbc"]);
        peer.encryption_server_to_client = names(&["aes128-cbc"]);

        let ours = KexInit::new_hello([2u8; COOKIE_SIZE], &local);
        assert!(negotiate(&local, &ours, &peer, true).is_err());
    }

    #[test]
    fn guessed_packet_discarded_when_first_entries_disagree() {
        let local = AlgorithmPreferences::default();
        let ours = KexInit::new_hello([2u8; COOKIE_SIZE], &local);
        let mut peer = KexInit::new_hello([1u8; COOKIE_SIZE], &local);
        peer.first_kex_packet_follows = true;
        peer.kex_algorithms.swap(0, 1);

        let negotiated = negotiate(&local, &ours, &peer, true).unwrap();
        assert!(negotiated.discard_guessed_packet);
    }
}
