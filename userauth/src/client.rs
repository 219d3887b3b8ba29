use std::io::{Read, Write};

use common_types::{Error, PeerQuirks, SessionId};
use transport::PacketCodec;
use wire::msg;
use wire::primitive::Writer;
use wire::userauth::{
    AuthMethod, InfoRequest, InfoResponse, UserauthFailure, UserauthRequest, CONNECTION_SERVICE_NAME,
    SERVICE_NAME,
};

use crate::credentials::Credentials;

/// Maximum number of keyboard-interactive request/response rounds before a
/// PAM exchange is rejected as malformed (a
/// 5-round exchange succeeds, a 6th is `BadData`).
const MAX_PAM_ROUNDS: u32 = 5;

#[derive(Debug)]
pub struct ClientAuthOutcome {
    pub partial_success: bool,
}

/// Drive the client side of user authentication to completion: request the
/// `ssh-userauth` service, probe with `none`, then try `credentials`'
/// method. Returns once `USERAUTH_SUCCESS` arrives.
pub fn authenticate<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    user: &str,
    credentials: &Credentials,
    quirks: PeerQuirks,
    session_id: &SessionId,
) -> Result<ClientAuthOutcome, Error> {
    request_service(codec)?;

    if quirks.contains(PeerQuirks::TECTIA) {
        // Tectia-family servers reject `publickey` outright unless a dummy
        // `none` request precedes any real auth attempt; its reply (almost
        // always FAILURE) is discarded.
        send_request(codec, none_request(user))?;
        let _ = read_userauth_reply(codec)?;
    }

    send_request(codec, none_request(user))?;
    let methods_continue = match read_userauth_reply(codec)? {
        Reply::Success => return Ok(ClientAuthOutcome { partial_success: false }),
        Reply::Failure(f) => f.methods_continue,
    };

    let method_name = credentials.method_name();
    if !methods_continue.iter().any(|m| m == method_name) {
        return Err(Error::NotInited(format!(
            "server only offers {:?}, but we have no credentials for it",
            methods_continue
        )));
    }

    match credentials {
        Credentials::Password(password) => try_password(codec, user, password),
        Credentials::PublicKey { algorithm, public_blob, private } => {
            try_publickey(codec, user, *algorithm, public_blob, private, quirks, session_id)
        }
        Credentials::KeyboardInteractivePassword(password) => try_keyboard_interactive(codec, user, password, quirks),
    }
}

enum Reply {
    Success,
    Failure(UserauthFailure),
}

fn read_userauth_reply<T: Read + Write>(codec: &mut PacketCodec<T>) -> Result<Reply, Error> {
    loop {
        let (msg_type, payload) = codec.read_packet()?;
        match msg_type {
            t if t == msg::USERAUTH_SUCCESS => return Ok(Reply::Success),
            t if t == msg::USERAUTH_FAILURE => return Ok(Reply::Failure(UserauthFailure::decode(&payload)?)),
            t if msg::is_handshake_noise(t) => continue,
            other => return Err(Error::BadData(format!("unexpected message {} during auth", other))),
        }
    }
}

fn request_service<T: Read + Write>(codec: &mut PacketCodec<T>) -> Result<(), Error> {
    let mut pkt = codec.open_packet(msg::SERVICE_REQUEST);
    pkt.writer().string(SERVICE_NAME.as_bytes());
    codec.wrap_and_send(pkt, false)?;

    let (msg_type, payload) = codec.read_packet()?;
    if msg_type != msg::SERVICE_ACCEPT {
        return Err(Error::BadData("expected SERVICE_ACCEPT".into()));
    }
    let name = wire::messages::decode_service_name(msg::SERVICE_ACCEPT, &payload)?;
    if name != SERVICE_NAME {
        return Err(Error::BadData("server accepted the wrong service".into()));
    }
    Ok(())
}

fn none_request(user: &str) -> UserauthRequest {
    UserauthRequest { user: user.to_string(), service: CONNECTION_SERVICE_NAME.to_string(), method: AuthMethod::None }
}

fn send_request<T: Read + Write>(codec: &mut PacketCodec<T>, request: UserauthRequest) -> Result<(), Error> {
    let pad_sensitive = matches!(request.method, AuthMethod::Password { .. });
    let mut pkt = codec.open_packet(msg::USERAUTH_REQUEST);
    pkt.writer().raw(&request.encode()[1..]);
    codec.wrap_and_send(pkt, pad_sensitive)
}

fn try_password<T: Read + Write>(codec: &mut PacketCodec<T>, user: &str, password: &str) -> Result<ClientAuthOutcome, Error> {
    let request = UserauthRequest {
        user: user.to_string(),
        service: CONNECTION_SERVICE_NAME.to_string(),
        method: AuthMethod::Password { password: password.to_string() },
    };
    send_request(codec, request)?;
    match read_userauth_reply(codec)? {
        Reply::Success => Ok(ClientAuthOutcome { partial_success: false }),
        Reply::Failure(f) if f.partial_success => Ok(ClientAuthOutcome { partial_success: true }),
        Reply::Failure(_) => Err(Error::WrongKey("password rejected".into())),
    }
}

/// Build the exact bytes the client signs (and the server re-derives) for
/// a `publickey` request: `session_id ‖ request-fields-up-to-signature`.
/// `NO_HASH_LENGTH` omits the 32-bit length prefix that would normally
/// precede the session id.
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

fn try_publickey<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    user: &str,
    algorithm: crypto::pubkey::PublicKeyAlgorithm,
    public_blob: &[u8],
    private: &crypto::pubkey::PrivateHostKey,
    quirks: PeerQuirks,
    session_id: &SessionId,
) -> Result<ClientAuthOutcome, Error> {
    let unsigned = UserauthRequest {
        user: user.to_string(),
        service: CONNECTION_SERVICE_NAME.to_string(),
        method: AuthMethod::PublicKey { algorithm: algorithm.name().to_string(), blob: public_blob.to_vec(), signature: None },
    };
    let message = publickey_signed_message(session_id, &unsigned, quirks.contains(PeerQuirks::NO_HASH_LENGTH));
    let signature = private.sign(&message, algorithm)?;

    let signed = UserauthRequest {
        user: user.to_string(),
        service: CONNECTION_SERVICE_NAME.to_string(),
        method: AuthMethod::PublicKey {
            algorithm: algorithm.name().to_string(),
            blob: public_blob.to_vec(),
            signature: Some(signature),
        },
    };
    send_request(codec, signed)?;
    match read_userauth_reply(codec)? {
        Reply::Success => Ok(ClientAuthOutcome { partial_success: false }),
        Reply::Failure(f) if f.partial_success => Ok(ClientAuthOutcome { partial_success: true }),
        Reply::Failure(_) => Err(Error::WrongKey("public key rejected".into())),
    }
}

fn try_keyboard_interactive<T: Read + Write>(
    codec: &mut PacketCodec<T>,
    user: &str,
    password: &str,
    quirks: PeerQuirks,
) -> Result<ClientAuthOutcome, Error> {
    let submethods = if quirks.contains(PeerQuirks::PAM_PW) { String::new() } else { "password".to_string() };
    let request = UserauthRequest {
        user: user.to_string(),
        service: CONNECTION_SERVICE_NAME.to_string(),
        method: AuthMethod::KeyboardInteractive { language: String::new(), submethods },
    };
    send_request(codec, request)?;

    let mut info_requests = 0u32;
    loop {
        let (msg_type, payload) = codec.read_packet()?;
        match msg_type {
            t if t == msg::USERAUTH_SUCCESS => return Ok(ClientAuthOutcome { partial_success: false }),
            t if t == msg::USERAUTH_FAILURE => {
                let f = UserauthFailure::decode(&payload)?;
                return if f.partial_success {
                    Ok(ClientAuthOutcome { partial_success: true })
                } else {
                    Err(Error::WrongKey("keyboard-interactive rejected".into()))
                };
            }
            t if t == msg::USERAUTH_INFO_REQUEST => {
                if info_requests >= MAX_PAM_ROUNDS {
                    return Err(Error::BadData("keyboard-interactive exchange exceeded the round limit".into()));
                }
                info_requests += 1;
                let info = InfoRequest::decode(&payload)?;
                if !info.has_password_prompt() {
                    return Err(Error::NotAvailable("keyboard-interactive request has no password prompt".into()));
                }
                let responses = InfoResponse { responses: vec![password.to_string(); info.prompts.len()] };
                let mut pkt = codec.open_packet(msg::USERAUTH_INFO_RESPONSE);
                pkt.writer().raw(&responses.encode()[1..]);
                codec.wrap_and_send(pkt, false)?;
            }
            t if msg::is_handshake_noise(t) => continue,
            other => return Err(Error::BadData(format!("unexpected message {} during keyboard-interactive auth", other))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common_types::testing::duplex_pair;
    use common_types::SessionId;
    use wire::userauth::InfoRequest;

    #[test]
    fn publickey_signed_message_respects_no_hash_length() {
        let session_id = SessionId::from(vec![1u8; 20]);
        let request = UserauthRequest {
            user: "alice".into(),
            service: CONNECTION_SERVICE_NAME.into(),
            method: AuthMethod::PublicKey { algorithm: "ssh-rsa".into(), blob: vec![9, 9], signature: None },
        };
        let with_len = publickey_signed_message(&session_id, &request, false);
        let without_len = publickey_signed_message(&session_id, &request, true);
        assert_eq!(with_len.len(), without_len.len() + 4);
    }

    fn password_prompt() -> InfoRequest {
        InfoRequest { name: String::new(), instruction: String::new(), language: String::new(), prompts: vec![("Password:".into(), false)] }
    }

    fn send_raw<T: Read + Write>(codec: &mut PacketCodec<T>, encoded: Vec<u8>) {
        let mut pkt = codec.open_packet(encoded[0]);
        pkt.writer().raw(&encoded[1..]);
        codec.wrap_and_send(pkt, false).unwrap();
    }

    /// Spec §8's boundary: exactly five `INFO_REQUEST` rounds followed by
    /// `USERAUTH_SUCCESS` succeeds.
    #[test]
    fn five_pam_rounds_then_success_is_accepted() {
        let (client_io, server_io) = duplex_pair();
        let server = std::thread::spawn(move || {
            let mut codec = PacketCodec::new(server_io, 16384);
            for _ in 0..MAX_PAM_ROUNDS {
                send_raw(&mut codec, password_prompt().encode());
            }
            send_raw(&mut codec, wire::userauth::encode_userauth_success());
        });

        let mut client_codec = PacketCodec::new(client_io, 16384);
        let outcome = try_keyboard_interactive(&mut client_codec, "alice", "hunter2", PeerQuirks::empty()).unwrap();
        assert!(!outcome.partial_success);
        server.join().unwrap();
    }

    /// A sixth `INFO_REQUEST` round is rejected as `BadData` rather than
    /// answered.
    #[test]
    fn sixth_pam_round_is_rejected() {
        let (client_io, server_io) = duplex_pair();
        let server = std::thread::spawn(move || {
            let mut codec = PacketCodec::new(server_io, 16384);
            for _ in 0..(MAX_PAM_ROUNDS + 1) {
                send_raw(&mut codec, password_prompt().encode());
            }
        });

        let mut client_codec = PacketCodec::new(client_io, 16384);
        match try_keyboard_interactive(&mut client_codec, "alice", "hunter2", PeerQuirks::empty()) {
            Err(Error::BadData(_)) => {}
            other => panic!("expected BadData, got {:?}", other.map(|_| ())),
        }
        server.join().unwrap();
    }
}
