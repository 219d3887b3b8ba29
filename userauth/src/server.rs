use std::io::{Read, Write};

use common_types::{Error, PeerQuirks, SessionId};
use crypto::pubkey::{HostKey, PublicKeyAlgorithm};
use transport::PacketCodec;
use wire::msg;
use wire::primitive::Writer;
use wire::userauth::{
    AuthMethod, InfoRequest, InfoResponse, UserauthFailure, UserauthRequest, CONNECTION_SERVICE_NAME, SERVICE_NAME,
};

/// How many failed `USERAUTH_REQUEST`s a single session tolerates before
/// the connection is torn down as a brute-force attempt.
const MAX_FAILED_ATTEMPTS: u32 = 20;

#[derive(Debug)]
pub struct ServerAuthOutcome {
    pub user: String,
}

/// What a server accepts, decoupled from how credentials are stored: a
/// prebound list (`UserDb`) or an application-supplied policy (anything
/// else implementing this trait, e.g. one backed by PAM or an external
/// directory).
pub trait UserAuthorizer {
    fn approve_password(&self, user: &str, password: &str) -> bool;

    fn approve_public_key(&self, user: &str, algorithm: PublicKeyAlgorithm, blob: &[u8]) -> bool;

    /// `None` means keyboard-interactive is not offered to this user at all.
    fn keyboard_interactive_prompt(&self, user: &str) -> Option<InfoRequest>;

    fn approve_keyboard_interactive(&self, user: &str, responses: &[String]) -> bool;
}

/// An exact-match username/password table, also used to answer
/// keyboard-interactive with a single password prompt. No hashing, no
/// rate limiting beyond `MAX_FAILED_ATTEMPTS` — callers with stronger
/// requirements implement `UserAuthorizer` directly.
pub struct UserDb {
    entries: Vec<(String, String)>,
}

impl UserDb {
    pub fn new() -> Self {
        UserDb { entries: Vec::new() }
    }

    pub fn add_user(&mut self, user: impl Into<String>, password: impl Into<String>) -> &mut Self {
        self.entries.push((user.into(), password.into()));
        self
    }

    fn check(&self, user: &str, password: &str) -> bool {
        self.entries.iter().any(|(u, p)| u == user && p == password)
    }
}

impl Default for UserDb {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAuthorizer for UserDb {
    fn approve_password(&self, user: &str, password: &str) -> bool {
        self.check(user, password)
    }

    fn approve_public_key(&self, _user: &str, _algorithm: PublicKeyAlgorithm, _blob: &[u8]) -> bool {
        false
    }

    fn keyboard_interactive_prompt(&self, user: &str) -> Option<InfoRequest> {
        if self.entries.iter().any(|(u, _)| u == user) {
            Some(InfoRequest {
                name: String::new(),
                instruction: String::new(),
                language: String::new(),
                prompts: vec![("Password: ".to_string(), false)],
            })
        } else {
            None
        }
    }

    fn approve_keyboard_interactive(&self, user: &str, responses: &[String]) -> bool {
        responses.first().map(|p| self.check(user, p)).unwrap_or(false)
    }
}

/// Drive the server side of user authentication to completion: accept the
/// `ssh-userauth` service request, then evaluate `USERAUTH_REQUEST`s one
/// at a time against `authorizer` until one succeeds or the attempt cap
/// is hit.
pub fn authenticate_server<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    authorizer: &dyn UserAuthorizer,
    quirks: PeerQuirks,
    session_id: &SessionId,
) -> Result<ServerAuthOutcome, Error> {
    accept_service(codec)?;

    let mut failed_attempts = 0u32;
    loop {
        let (msg_type, payload) = codec.read_packet()?;
        if msg::is_handshake_noise(msg_type) {
            continue;
        }
        if msg_type != msg::USERAUTH_REQUEST {
            return Err(Error::BadData(format!("unexpected message {} during auth", msg_type)));
        }
        let request = UserauthRequest::decode(&payload)?;
        if request.service != CONNECTION_SERVICE_NAME {
            return Err(Error::BadData("auth request names an unsupported service".into()));
        }

        let approved = match &request.method {
            AuthMethod::None => false,
            AuthMethod::Password { password } => authorizer.approve_password(&request.user, password),
            AuthMethod::PublicKey { algorithm, blob, signature } => {
                approve_public_key(authorizer, &request, algorithm, blob, signature.as_deref(), quirks, session_id)?
            }
            AuthMethod::KeyboardInteractive { .. } => {
                run_keyboard_interactive(codec, authorizer, &request.user)?
            }
        };

        if approved {
            let pkt = codec.open_packet(msg::USERAUTH_SUCCESS);
            codec.wrap_and_send(pkt, false)?;
            return Ok(ServerAuthOutcome { user: request.user });
        }

        failed_attempts += 1;
        if failed_attempts >= MAX_FAILED_ATTEMPTS {
            return Err(Error::Permission("too many failed authentication attempts".into()));
        }
        send_failure(codec, authorizer.keyboard_interactive_prompt(&request.user).is_some())?;
    }
}

fn accept_service<T: Read + Write>(codec: &mut PacketCodec<T>) -> Result<(), Error> {
    let (msg_type, payload) = codec.read_packet()?;
    if msg_type != msg::SERVICE_REQUEST {
        return Err(Error::BadData("expected SERVICE_REQUEST".into()));
    }
    let name = wire::messages::decode_service_name(msg::SERVICE_REQUEST, &payload)?;
    if name != SERVICE_NAME {
        return Err(Error::NotAvailable(format!("unsupported service {}", name)));
    }
    let mut pkt = codec.open_packet(msg::SERVICE_ACCEPT);
    pkt.writer().string(SERVICE_NAME.as_bytes());
    codec.wrap_and_send(pkt, false)
}

fn send_failure<T: Read + Write>(codec: &mut PacketCodec<T>, offer_keyboard_interactive: bool) -> Result<(), Error> {
    let mut methods_continue = vec!["password".to_string(), "publickey".to_string()];
    if offer_keyboard_interactive {
        methods_continue.push("keyboard-interactive".to_string());
    }
    let failure = UserauthFailure { methods_continue, partial_success: false };
    let mut pkt = codec.open_packet(msg::USERAUTH_FAILURE);
    pkt.writer().raw(&failure.encode()[1..]);
    codec.wrap_and_send(pkt, false)
}

fn publickey_signed_message(session_id: &SessionId, request: &UserauthRequest, no_hash_length: bool) -> Vec<u8> {
    let mut w = Writer::new();
    if no_hash_length {
        w.raw(session_id.as_ref());
    } else {
        w.string(session_id.as_ref());
    }
    w.raw(&request.encode_signed_prefix());
    w.into_bytes()
}

fn approve_public_key(
    authorizer: &dyn UserAuthorizer,
    request: &UserauthRequest,
    algorithm_name: &str,
    blob: &[u8],
    signature: Option<&[u8]>,
    quirks: PeerQuirks,
    session_id: &SessionId,
) -> Result<bool, Error> {
    let algorithm = match PublicKeyAlgorithm::from_name(algorithm_name) {
        Some(a) => a,
        None => return Ok(false),
    };
    let signature = match signature {
        Some(s) => s,
        None => return Ok(false),
    };
    if !authorizer.approve_public_key(&request.user, algorithm, blob) {
        return Ok(false);
    }
    let host_key = HostKey::parse(blob)?;
    let message = publickey_signed_message(session_id, request, quirks.contains(PeerQuirks::NO_HASH_LENGTH));
    host_key.verify(&message, signature, quirks.contains(PeerQuirks::SIG_FORMAT))
}

fn run_keyboard_interactive<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    authorizer: &dyn UserAuthorizer,
    user: &str,
) -> Result<bool, Error> {
    let prompt = match authorizer.keyboard_interactive_prompt(user) {
        Some(p) => p,
        None => return Ok(false),
    };
    let mut pkt = codec.open_packet(msg::USERAUTH_INFO_REQUEST);
    pkt.writer().raw(&prompt.encode()[1..]);
    codec.wrap_and_send(pkt, false)?;

    let (msg_type, payload) = codec.read_packet()?;
    if msg_type != msg::USERAUTH_INFO_RESPONSE {
        return Err(Error::BadData("expected USERAUTH_INFO_RESPONSE".into()));
    }
    let response = InfoResponse::decode(&payload)?;
    if response.responses.len() != prompt.prompts.len() {
        return Err(Error::BadData("keyboard-interactive response count mismatch".into()));
    }
    Ok(authorizer.approve_keyboard_interactive(user, &response.responses))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn user_db_checks_exact_password_match() {
        let mut db = UserDb::new();
        db.add_user("alice", "hunter2");
        assert!(db.approve_password("alice", "hunter2"));
        assert!(!db.approve_password("alice", "wrong"));
        assert!(!db.approve_password("bob", "hunter2"));
    }

    #[test]
    fn user_db_offers_keyboard_interactive_only_for_known_users() {
        let mut db = UserDb::new();
        db.add_user("alice", "hunter2");
        assert!(db.keyboard_interactive_prompt("alice").is_some());
        assert!(db.keyboard_interactive_prompt("bob").is_none());
    }

    #[test]
    fn user_db_rejects_public_keys_outright() {
        let db = UserDb::new();
        assert!(!db.approve_public_key("alice", PublicKeyAlgorithm::Rsa, &[]));
    }
}
