//! The application-facing session (component F): ties the packet codec,
//! keyex engine, auth engine and channel multiplexer together into the
//! `connect_client`/`accept_server` dispatch loop and the channel API
//! A connection owns exactly one `Session`; there is no
//! connection pool here (mirrors `connection::address::accept_one`'s "this
//! crate's session API handles one connection at a time").

use std::collections::{HashMap, HashSet, VecDeque};

use common_types::{DisconnectReason, Error, PeerQuirks, Role, SessionId};
use mux::{Channel, ChannelState, Multiplexer, RequestOutcome};
use transport::PacketCodec;
use wire::channel::{
    ChannelData, ChannelExtendedData, ChannelOpen, ChannelOpenConfirmation, ChannelOpenFailure, ChannelRequest,
    ChannelResult, ChannelSimple, ChannelWindowAdjust, GlobalRequest,
};
use wire::messages::Disconnect;
use wire::msg;

use crate::address::Transport;
use crate::config::{ClientConfig, ServerConfig};
use crate::handshake::{self, HandshakeResult, Identity};

/// Mixed into the identification string exchanged with the peer
/// (`SSH-2.0-sshlib_0.1`).
const IMPL_TAG: &str = "sshlib_0.1";

/// A channel's local id in the session's arena. Not a borrowed reference
/// into the session — every `Session` method that needs channel state
/// looks it up through `Multiplexer`'s table, which keeps a channel
/// cheap to hand out and avoids a session↔channel cyclic reference
/// rather than a borrowed reference into the session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ChannelHandle(u32);

/// A peer-initiated `CHANNEL_OPEN` the application must accept or reject.
pub struct PendingOpen {
    open: ChannelOpen,
}

impl PendingOpen {
    pub fn channel_type(&self) -> &str {
        &self.open.channel_type
    }
}

/// Drive a client handshake, then user authentication with `config`'s
/// credentials, to a ready session.
pub fn connect_client<T: Transport>(transport: T, config: &ClientConfig) -> Result<Session<T>, Error> {
    let identity = Identity::Client { host_key_check: config.host_key_check.as_ref() };
    let HandshakeResult { mut codec, quirks, session_id } =
        handshake::run(transport, Role::Client, &config.transport, IMPL_TAG, identity)?;

    let outcome = userauth::authenticate(&mut codec, &config.user, &config.credentials, quirks, &session_id)?;
    if outcome.partial_success {
        return Err(Error::Permission(
            "server requires additional authentication methods this client does not support".into(),
        ));
    }

    Ok(Session::new(codec, Role::Client, quirks, session_id, config.transport.receive_buffer_size))
}

/// Drive a server handshake, then user authentication against `config`'s
/// authorizer, to a ready session.
pub fn accept_server<T: Transport>(transport: T, config: &ServerConfig) -> Result<Session<T>, Error> {
    let identity = Identity::Server { host_key: &config.host_key, host_key_algorithm: config.host_key_algorithm };
    let HandshakeResult { mut codec, quirks, session_id } =
        handshake::run(transport, Role::Server, &config.transport, IMPL_TAG, identity)?;

    let outcome = userauth::authenticate_server(&mut codec, config.authorizer, quirks, &session_id)?;
    log::info!("user {:?} authenticated", outcome.user);

    Ok(Session::new(codec, Role::Server, quirks, session_id, config.transport.receive_buffer_size))
}

/// One live SSHv2 connection, past the handshake and user authentication,
/// in the channel phase.
pub struct Session<T> {
    codec: PacketCodec<T>,
    role: Role,
    quirks: PeerQuirks,
    session_id: SessionId,
    mux: Multiplexer,
    /// Bytes received for a channel but not yet drained by `read`.
    incoming: HashMap<u32, VecDeque<u8>>,
    /// Channels that received `CHANNEL_EOF`: no more data is coming, but the
    /// channel isn't destroyed until `CHANNEL_CLOSE`.
    eof: HashSet<u32>,
    /// `CHANNEL_OPEN`s from the peer awaiting `accept_channel`/`reject_channel`.
    pending_opens: VecDeque<ChannelOpen>,
    /// Outcome of the most recent `CHANNEL_SUCCESS`/`CHANNEL_FAILURE` per
    /// channel, for `want_reply=true` channel requests this side sent.
    pending_results: HashMap<u32, bool>,
}

impl<T: Transport> Session<T> {
    fn new(codec: PacketCodec<T>, role: Role, quirks: PeerQuirks, session_id: SessionId, receive_buffer: u32) -> Self {
        Session {
            codec,
            role,
            quirks,
            mux: Multiplexer::new(role, receive_buffer, quirks),
            session_id,
            incoming: HashMap::new(),
            eof: HashSet::new(),
            pending_opens: VecDeque::new(),
            pending_results: HashMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn peer_quirks(&self) -> PeerQuirks {
        self.quirks
    }

    /// Best-effort `MSG_DISCONNECT` followed by an idempotent transport
    /// teardown.
    pub fn disconnect(&mut self, reason: DisconnectReason, description: &str) {
        let _ = self.send_disconnect(reason, description);
        self.codec.stream_mut().disconnect();
    }

    // -- outbound channel requests -----------------------------------

    /// Begin opening a channel of `channel_type` and block (pumping the
    /// read side) until the peer confirms or refuses it.
    pub fn open_channel(&mut self, channel_type: &str, type_specific: Vec<u8>) -> Result<ChannelHandle, Error> {
        let (local_id, open) = self.mux.begin_open(channel_type, type_specific)?;
        self.send_encoded(open.encode())?;
        loop {
            match self.mux.channel(local_id) {
                Ok(channel) if channel.state == ChannelState::Active => return Ok(ChannelHandle(local_id)),
                Ok(_) => self.pump_one()?,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn open_session_channel(&mut self) -> Result<ChannelHandle, Error> {
        self.open_channel("session", Vec::new())
    }

    pub fn open_direct_tcpip(
        &mut self,
        remote_host: &str,
        remote_port: u32,
        originator_ip: &str,
        originator_port: u32,
    ) -> Result<ChannelHandle, Error> {
        let tail = ChannelOpen::encode_direct_tcpip_tail(remote_host, remote_port, originator_ip, originator_port);
        self.open_channel("direct-tcpip", tail)
    }

    /// `pty-req` never asks for a reply.
    pub fn request_pty(&mut self, channel: ChannelHandle, term: &str, cols: u32, rows: u32) -> Result<(), Error> {
        let tail = ChannelRequest::encode_pty_req_tail(term, cols, rows, 0, 0);
        self.send_channel_request(channel, "pty-req", false, tail)
    }

    pub fn request_shell(&mut self, channel: ChannelHandle) -> Result<(), Error> {
        self.send_channel_request(channel, "shell", true, Vec::new())?;
        self.await_channel_result(channel)
    }

    pub fn request_exec(&mut self, channel: ChannelHandle, command: &str) -> Result<(), Error> {
        let tail = ChannelRequest::encode_command_tail(command);
        self.send_channel_request(channel, "exec", true, tail)?;
        self.await_channel_result(channel)
    }

    pub fn request_subsystem(&mut self, channel: ChannelHandle, name: &str) -> Result<(), Error> {
        let tail = ChannelRequest::encode_command_tail(name);
        self.send_channel_request(channel, "subsystem", true, tail)?;
        self.await_channel_result(channel)
    }

    fn send_channel_request(
        &mut self,
        channel: ChannelHandle,
        request_type: &str,
        want_reply: bool,
        type_specific: Vec<u8>,
    ) -> Result<(), Error> {
        let remote_id = self.mux.channel(channel.0)?.remote_id;
        let request = ChannelRequest {
            recipient_channel: remote_id,
            request_type: request_type.to_string(),
            want_reply,
            type_specific,
        };
        self.send_encoded(request.encode())
    }

    fn await_channel_result(&mut self, channel: ChannelHandle) -> Result<(), Error> {
        loop {
            if let Some(success) = self.pending_results.remove(&channel.0) {
                return if success { Ok(()) } else { Err(Error::Permission("channel request was refused".into())) };
            }
            self.pump_one()?;
        }
    }

    // -- inbound channel requests (server role, or a forwarding client) --

    /// Drain exactly one inbound packet, updating channel state and
    /// buffered data. Callers wanting to discover a peer-initiated
    /// `CHANNEL_OPEN` without blocking on `read` call this directly.
    pub fn poll(&mut self) -> Result<(), Error> {
        self.pump_one()
    }

    pub fn next_pending_open(&mut self) -> Option<PendingOpen> {
        self.pending_opens.pop_front().map(|open| PendingOpen { open })
    }

    pub fn accept_channel(&mut self, pending: PendingOpen) -> Result<ChannelHandle, Error> {
        let (local_id, confirmation) = self.mux.accept_open(&pending.open)?;
        self.send_encoded(confirmation.encode())?;
        Ok(ChannelHandle(local_id))
    }

    pub fn reject_channel(&mut self, pending: PendingOpen, reason: u32, message: impl Into<String>) -> Result<(), Error> {
        let failure = Multiplexer::reject_open(reason, message, pending.open.sender_channel);
        self.send_encoded(failure.encode())
    }

    // -- data phase ----------------------------------------------------

    /// Read buffered channel data, pumping the read side as needed.
    /// Returns `0` once the peer has sent `CHANNEL_EOF`/`CHANNEL_CLOSE`
    /// and no buffered bytes remain (EOF on remote close).
    pub fn read(&mut self, channel: ChannelHandle, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            if let Some(queue) = self.incoming.get_mut(&channel.0) {
                if !queue.is_empty() {
                    let n = queue.len().min(buf.len());
                    for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            if self.eof.contains(&channel.0) || self.mux.channel(channel.0).is_err() {
                return Ok(0);
            }
            self.pump_one()?;
        }
    }

    /// Chunk and send as much of `buf` as the peer's advertised window and
    /// `maximum_packet_size` presently allow, returning the byte count
    /// actually sent (a short write is not an error; the caller retries
    /// once more window has been granted for back-pressure).
    pub fn write(&mut self, channel: ChannelHandle, buf: &[u8]) -> Result<usize, Error> {
        let chunks = self.mux.prepare_data(channel.0, buf)?;
        let written = chunks.iter().map(|c| c.data.len()).sum();
        for chunk in chunks {
            self.send_encoded(chunk.encode())?;
        }
        Ok(written)
    }

    /// Send `CHANNEL_CLOSE`. The channel is only fully destroyed once the
    /// peer mirrors it back (handled in `pump_one`).
    pub fn close(&mut self, channel: ChannelHandle) -> Result<(), Error> {
        let msg = self.mux.begin_close(channel.0)?;
        self.send_encoded(msg.encode())
    }

    pub fn channel_info(&self, channel: ChannelHandle) -> Result<&Channel, Error> {
        self.mux.channel(channel.0)
    }

    // -- dispatch --------------------------------------------------------

    fn pump_one(&mut self) -> Result<(), Error> {
        let (msg_type, payload) = self.codec.read_packet()?;
        match msg_type {
            t if msg::is_handshake_noise(t) => Ok(()),
            t if t == msg::KEXINIT => {
                // a mid-stream KEXINIT is
                // fatal rather than silently reinterpreted.
                Err(Error::BadData("rehandshake is not supported once the data phase has started".into()))
            }
            t if t == msg::DISCONNECT => {
                let disconnect = Disconnect::decode(&payload)?;
                log::debug!(
                    "peer sent DISCONNECT reason={} description={}",
                    disconnect.reason,
                    common_types::sanitize_peer_string(disconnect.description.as_bytes())
                );
                Err(Error::Complete)
            }
            t if t == msg::CHANNEL_OPEN => {
                self.pending_opens.push_back(ChannelOpen::decode(&payload)?);
                Ok(())
            }
            t if t == msg::CHANNEL_OPEN_CONFIRMATION => self.mux.on_open_confirmation(ChannelOpenConfirmation::decode(&payload)?),
            t if t == msg::CHANNEL_OPEN_FAILURE => self.mux.on_open_failure(ChannelOpenFailure::decode(&payload)?),
            t if t == msg::CHANNEL_WINDOW_ADJUST => self.mux.on_window_adjust(ChannelWindowAdjust::decode(&payload)?),
            t if t == msg::CHANNEL_DATA => {
                let (local_id, data, adjust) = self.mux.on_data(ChannelData::decode(&payload)?)?;
                self.incoming.entry(local_id).or_default().extend(data);
                if let Some(adjust) = adjust {
                    self.send_encoded(adjust.encode())?;
                }
                Ok(())
            }
            t if t == msg::CHANNEL_EXTENDED_DATA => {
                if let Some(adjust) = self.mux.on_extended_data(ChannelExtendedData::decode(&payload)?)? {
                    self.send_encoded(adjust.encode())?;
                }
                Ok(())
            }
            t if t == msg::CHANNEL_EOF => {
                let msg = ChannelSimple::decode(&payload)?;
                self.mux.on_eof(msg.clone())?;
                self.eof.insert(msg.recipient_channel);
                Ok(())
            }
            t if t == msg::CHANNEL_CLOSE => {
                let msg = ChannelSimple::decode(&payload)?;
                let local_id = msg.recipient_channel;
                let (mirror, was_last) = self.mux.on_close(msg)?;
                self.incoming.remove(&local_id);
                self.eof.remove(&local_id);
                if let Some(mirror) = mirror {
                    self.send_encoded(mirror.encode())?;
                }
                if was_last {
                    self.send_disconnect(Multiplexer::disconnect_reason_on_last_close(), "all channels closed")?;
                    self.codec.stream_mut().disconnect();
                    return Err(Error::Complete);
                }
                Ok(())
            }
            t if t == msg::CHANNEL_REQUEST => match self.mux.on_request(&ChannelRequest::decode(&payload)?)? {
                RequestOutcome::Reply(bytes) => self.send_encoded(bytes),
                RequestOutcome::NoReplyExpected => Ok(()),
            },
            t if t == msg::CHANNEL_SUCCESS || t == msg::CHANNEL_FAILURE => {
                let result = ChannelResult::decode(&payload)?;
                let local_id = result.recipient_channel;
                let success = result.success;
                self.mux.on_result(result)?;
                self.pending_results.insert(local_id, success);
                Ok(())
            }
            t if t == msg::GLOBAL_REQUEST => match self.mux.on_global_request(&GlobalRequest::decode(&payload)?) {
                RequestOutcome::Reply(bytes) => self.send_encoded(bytes),
                RequestOutcome::NoReplyExpected => Ok(()),
            },
            other => Err(Error::BadData(format!("unexpected message {} during the data phase", other))),
        }
    }

    fn send_disconnect(&mut self, reason: DisconnectReason, description: &str) -> Result<(), Error> {
        self.send_encoded(Disconnect::new(reason, description).encode())
    }

    fn send_encoded(&mut self, encoded: Vec<u8>) -> Result<(), Error> {
        let msg_type = encoded[0];
        let mut pkt = self.codec.open_packet(msg_type);
        pkt.writer().raw(&encoded[1..]);
        self.codec.wrap_and_send(pkt, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::duplex_pair;
    use crypto::pubkey::{PrivateHostKey, PublicKeyAlgorithm};
    use num_bigint::BigUint;
    use userauth::{Credentials, UserDb};

    /// A toy DSA group, small enough to sign/verify instantly. The
    /// hand-rolled DSA in `crypto::pubkey` does no bit-size validation, so
    /// this is a faithful stand-in for a real 1024-bit-`p`/160-bit-`q` key
    /// in every test that only cares about the protocol plumbing around
    /// it, not about cryptographic strength.
    fn toy_dsa_host_key() -> PrivateHostKey {
        PrivateHostKey::Dsa { p: BigUint::from(23u32), q: BigUint::from(11u32), g: BigUint::from(4u32), x: BigUint::from(7u32) }
    }

    /// Scenario 4 + 5 from spec.md §8, end to end: a client authenticates
    /// with a password, opens a `session` channel, runs a `shell` request,
    /// exchanges data in both directions, then closes the channel — which,
    /// being the last active one, tears down the whole connection on both
    /// sides.
    #[test]
    fn client_server_session_round_trips_auth_and_channel_data() {
        let (client_io, server_io) = duplex_pair();

        let server = std::thread::spawn(move || {
            let mut db = UserDb::new();
            db.add_user("alice", "hunter2");
            let server_config = ServerConfig::new(toy_dsa_host_key(), PublicKeyAlgorithm::Dsa, &db);
            let mut session = accept_server(server_io, &server_config).expect("server handshake+auth");

            let channel = loop {
                session.poll().expect("server poll for CHANNEL_OPEN");
                if let Some(pending) = session.next_pending_open() {
                    assert_eq!(pending.channel_type(), "session");
                    break session.accept_channel(pending).expect("accept channel");
                }
            };

            let mut buf = [0u8; 64];
            let n = session.read(channel, &mut buf).expect("server read");
            assert_eq!(&buf[..n], b"ls\n");
            session.write(channel, b"file1\n").expect("server write");

            match session.poll() {
                Err(Error::Complete) => {}
                other => panic!("expected Complete once the last channel closed, got {:?}", other.map(|_| ())),
            }
        });

        let config = ClientConfig::new("alice", Credentials::Password("hunter2".to_string()));
        let mut session = connect_client(client_io, &config).expect("client handshake+auth");

        let channel = session.open_session_channel().expect("open session channel");
        session.request_shell(channel).expect("shell request");
        session.write(channel, b"ls\n").expect("client write");

        let mut buf = [0u8; 64];
        let n = session.read(channel, &mut buf).expect("client read");
        assert_eq!(&buf[..n], b"file1\n");

        session.close(channel).expect("close channel");
        match session.poll() {
            Err(Error::Complete) => {}
            other => panic!("expected Complete once the last channel closed, got {:?}", other.map(|_| ())),
        }

        server.join().unwrap();
    }

    /// A client offering a password the server doesn't have on file gets a
    /// caller-visible `WrongKey`, never a connection-fatal error partway
    /// through the handshake (spec.md §7's auth-error propagation policy).
    #[test]
    fn wrong_password_is_reported_without_crashing_the_connection() {
        let (client_io, server_io) = duplex_pair();

        let server = std::thread::spawn(move || {
            let mut db = UserDb::new();
            db.add_user("alice", "hunter2");
            let server_config = ServerConfig::new(toy_dsa_host_key(), PublicKeyAlgorithm::Dsa, &db);
            // The client gives up after its one credential is rejected and
            // disconnects rather than retrying; the server observes that
            // as EOF on its next read, not as a hard `Permission` cutoff
            // (the `MAX_FAILED_ATTEMPTS` cap is for a peer that keeps
            // guessing, which this client does not do).
            match accept_server(server_io, &server_config) {
                Err(Error::Read(_)) => {}
                other => panic!("expected the server to observe the client's disconnect, got {:?}", other.map(|_| ())),
            }
        });

        let config = ClientConfig::new("alice", Credentials::Password("wrong".to_string()));
        match connect_client(client_io, &config) {
            Err(Error::WrongKey(_)) => {}
            other => panic!("expected WrongKey, got {:?}", other.map(|_| ())),
        }

        server.join().unwrap();
    }
}
