//! The channel multiplexer (component E): open/confirm/fail, window
//! accounting, data chunking and request routing for every channel
//! sharing one transport. Wire shapes live in `wire::channel`; this
//! crate owns the channel table and the bookkeeping rules layered on
//! top of it.

pub mod channel;
pub mod response;
pub mod table;

use common_types::{DisconnectReason, Error, PeerQuirks, Role};
use wire::channel::{
    open_failure_reason, ChannelData, ChannelExtendedData, ChannelOpen, ChannelOpenConfirmation, ChannelOpenFailure,
    ChannelRequest, ChannelResult, ChannelSimple, ChannelWindowAdjust, GlobalRequest,
};

pub use channel::{Channel, ChannelState};
pub use response::{EnqueuedResponse, ResponseSlot};
pub use table::ChannelTable;

/// Channel types this multiplexer will open or accept. Anything else is a
/// protocol error (client requests we can't honor) or an open failure
/// (server offered something unsupported).
const KNOWN_CHANNEL_TYPES: &[&str] = &["session", "direct-tcpip"];

pub struct Multiplexer {
    role: Role,
    table: ChannelTable,
    responses: ResponseSlot,
    local_receive_buffer: u32,
    quirks: PeerQuirks,
}

/// What the caller does next after `on_request`/`on_global_request`.
pub enum RequestOutcome {
    Reply(Vec<u8>),
    NoReplyExpected,
}

impl Multiplexer {
    pub fn new(role: Role, local_receive_buffer: u32, quirks: PeerQuirks) -> Self {
        Multiplexer { role, table: ChannelTable::new(), responses: ResponseSlot::new(), local_receive_buffer, quirks }
    }

    pub fn active_channel_count(&self) -> usize {
        self.table.active_count()
    }

    pub fn responses(&mut self) -> &mut ResponseSlot {
        &mut self.responses
    }

    /// Look up a channel by local id, for callers (the connection
    /// dispatcher) that need to know its type/state/remote id without
    /// mutating it — e.g. polling for `Active` after `begin_open`.
    pub fn channel(&self, local_id: u32) -> Result<&Channel, Error> {
        self.table.get(local_id)
    }

    /// Begin opening a channel: reserve a local id, register it as
    /// `Opening`, and return the `CHANNEL_OPEN` to send.
    pub fn begin_open(&mut self, channel_type: &str, type_specific: Vec<u8>) -> Result<(u32, ChannelOpen), Error> {
        let window = channel::initial_window();
        let buffer = self.local_receive_buffer;
        let local_id = self.table.insert_opening(|id| Channel::new_opening(id, channel_type, window, buffer))?;
        let open = ChannelOpen {
            channel_type: channel_type.to_string(),
            sender_channel: local_id,
            initial_window_size: window,
            maximum_packet_size: buffer,
            type_specific,
        };
        Ok((local_id, open))
    }

    pub fn on_open_confirmation(&mut self, msg: ChannelOpenConfirmation) -> Result<(), Error> {
        let channel = self.table.get_mut(msg.recipient_channel)?;
        if channel.state != ChannelState::Opening {
            return Err(Error::BadData("CHANNEL_OPEN_CONFIRMATION for a channel that wasn't opening".into()));
        }
        channel.remote_id = msg.sender_channel;
        channel.remote_window = msg.initial_window_size;
        channel.max_packet_size = msg.maximum_packet_size;
        channel.state = ChannelState::Active;
        Ok(())
    }

    pub fn on_open_failure(&mut self, msg: ChannelOpenFailure) -> Result<(), Error> {
        let channel = self.table.get(msg.recipient_channel)?;
        if channel.state != ChannelState::Opening {
            return Err(Error::BadData("CHANNEL_OPEN_FAILURE for a channel that wasn't opening".into()));
        }
        self.table.remove(msg.recipient_channel);
        Ok(())
    }

    /// Accept a peer-initiated `CHANNEL_OPEN` (server role, or a
    /// forwarding client). Caps `maximum_packet_size` to the local
    /// receive buffer and rejects unknown channel types.
    pub fn accept_open(&mut self, msg: &ChannelOpen) -> Result<(u32, ChannelOpenConfirmation), Error> {
        if !KNOWN_CHANNEL_TYPES.contains(&msg.channel_type.as_str()) {
            return Err(Error::NotAvailable(format!("unsupported channel type {}", msg.channel_type)));
        }
        let window = channel::initial_window();
        let max_packet = self.local_receive_buffer.min(msg.maximum_packet_size);
        let remote_window = msg.initial_window_size;
        let channel_type = msg.channel_type.clone();
        let remote_id = msg.sender_channel;
        let local_id = self
            .table
            .insert_active(|id| Channel::new_active(id, remote_id, channel_type, window, remote_window, max_packet))?;
        Ok((
            local_id,
            ChannelOpenConfirmation {
                recipient_channel: remote_id,
                sender_channel: local_id,
                initial_window_size: window,
                maximum_packet_size: max_packet,
            },
        ))
    }

    pub fn reject_open(reason: u32, message: impl Into<String>, remote_id: u32) -> ChannelOpenFailure {
        ChannelOpenFailure { recipient_channel: remote_id, reason_code: reason, description: message.into(), language: String::new() }
    }

    pub fn unsupported_channel_type_failure(msg: &ChannelOpen) -> ChannelOpenFailure {
        Self::reject_open(
            open_failure_reason::UNKNOWN_CHANNEL_TYPE,
            format!("unsupported channel type {}", msg.channel_type),
            msg.sender_channel,
        )
    }

    pub fn on_window_adjust(&mut self, msg: ChannelWindowAdjust) -> Result<(), Error> {
        let channel = self.table.get_mut(msg.recipient_channel)?;
        channel.remote_window = channel.remote_window.saturating_add(msg.bytes_to_add);
        Ok(())
    }

    /// Record incoming `CHANNEL_DATA`, returning the local channel id, the
    /// payload, and a window top-up to send if one is due.
    pub fn on_data(&mut self, msg: ChannelData) -> Result<(u32, Vec<u8>, Option<ChannelWindowAdjust>), Error> {
        let window_bug = self.quirks.contains(PeerQuirks::WINDOW_BUG);
        let channel = self.table.get_mut(msg.recipient_channel)?;
        if !channel.is_active() {
            return Err(Error::BadData("CHANNEL_DATA on a channel that isn't active".into()));
        }
        let adjust = channel
            .account_incoming(msg.data.len() as u32, window_bug)
            .map(|delta| ChannelWindowAdjust { recipient_channel: channel.remote_id, bytes_to_add: delta });
        Ok((msg.recipient_channel, msg.data, adjust))
    }

    /// `CHANNEL_EXTENDED_DATA` still consumes window but is otherwise
    /// dropped — it never joins the data stream the application reads.
    pub fn on_extended_data(&mut self, msg: ChannelExtendedData) -> Result<Option<ChannelWindowAdjust>, Error> {
        let window_bug = self.quirks.contains(PeerQuirks::WINDOW_BUG);
        let channel = self.table.get_mut(msg.recipient_channel)?;
        Ok(channel
            .account_incoming(msg.data.len() as u32, window_bug)
            .map(|delta| ChannelWindowAdjust { recipient_channel: channel.remote_id, bytes_to_add: delta }))
    }

    /// Chunk `payload` for `local_id` into as many `CHANNEL_DATA` messages
    /// as the peer's `max_packet_size` and remaining send window allow.
    pub fn prepare_data(&mut self, local_id: u32, payload: &[u8]) -> Result<Vec<ChannelData>, Error> {
        let channel = self.table.get_mut(local_id)?;
        if channel.state != ChannelState::Active {
            return Err(Error::BadData("cannot send on a channel that isn't active".into()));
        }
        let remote_id = channel.remote_id;
        let chunks = channel.chunk_for_sending(payload);
        Ok(chunks.into_iter().map(|c| ChannelData { recipient_channel: remote_id, data: c.to_vec() }).collect())
    }

    pub fn on_eof(&mut self, msg: ChannelSimple) -> Result<(), Error> {
        self.table.get(msg.recipient_channel)?;
        Ok(())
    }

    /// `CHANNEL_CLOSE` mirrors and destroys the channel. Returns the mirror
    /// close to send (`None` if we'd already sent our own via
    /// `begin_close` — no need to bounce a second close back at a peer
    /// that may have already forgotten the channel id) and whether this
    /// closed the last active channel (the caller must then disconnect
    /// the whole session).
    pub fn on_close(&mut self, msg: ChannelSimple) -> Result<(Option<ChannelSimple>, bool), Error> {
        let channel = self.table.get(msg.recipient_channel)?;
        let mirror = if channel.state == ChannelState::WriteClosed {
            None
        } else {
            Some(ChannelSimple::close(channel.remote_id))
        };
        self.table.remove(msg.recipient_channel);
        Ok((mirror, self.table.is_empty()))
    }

    pub fn begin_close(&mut self, local_id: u32) -> Result<ChannelSimple, Error> {
        let channel = self.table.get_mut(local_id)?;
        channel.state = ChannelState::WriteClosed;
        Ok(ChannelSimple::close(channel.remote_id))
    }

    pub fn disconnect_reason_on_last_close() -> DisconnectReason {
        DisconnectReason::ConnectionLost
    }

    /// Route an inbound `CHANNEL_REQUEST`. Only `pty-req` (no reply
    /// expected) and the session-opening triad `shell`/`exec`/`subsystem`
    /// are honored; everything else (e.g. `x11-req`) fails.
    pub fn on_request(&mut self, msg: &ChannelRequest) -> Result<RequestOutcome, Error> {
        let channel = self.table.get(msg.recipient_channel)?;
        let accepted = channel.channel_type == "session"
            && matches!(msg.request_type.as_str(), "pty-req" | "shell" | "exec" | "subsystem");
        if !msg.want_reply {
            return Ok(RequestOutcome::NoReplyExpected);
        }
        let result = ChannelResult { success: accepted, recipient_channel: channel.remote_id };
        Ok(RequestOutcome::Reply(result.encode()))
    }

    pub fn on_result(&mut self, msg: ChannelResult) -> Result<(), Error> {
        self.table.get(msg.recipient_channel).map(|_| ())?;
        if !msg.success {
            log::debug!("channel request on {} failed", msg.recipient_channel);
        }
        Ok(())
    }

    /// Global requests (`tcpip-forward` and friends) are parsed but never
    /// wired to a listener; every one that wants a reply gets `FAILURE`.
    pub fn on_global_request(&self, msg: &GlobalRequest) -> RequestOutcome {
        if msg.want_reply {
            RequestOutcome::Reply(wire::channel::encode_global_failure())
        } else {
            RequestOutcome::NoReplyExpected
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mux() -> Multiplexer {
        Multiplexer::new(Role::Client, 16384, PeerQuirks::empty())
    }

    #[test]
    fn begin_open_then_confirm_makes_the_channel_active() {
        let mut m = mux();
        let (local_id, open) = m.begin_open("session", Vec::new()).unwrap();
        assert_eq!(open.sender_channel, local_id);
        m.on_open_confirmation(ChannelOpenConfirmation {
            recipient_channel: local_id,
            sender_channel: 7,
            initial_window_size: 1000,
            maximum_packet_size: 16384,
        })
        .unwrap();
        assert_eq!(m.active_channel_count(), 1);
    }

    #[test]
    fn open_failure_frees_the_channel_slot() {
        let mut m = mux();
        let (local_id, _) = m.begin_open("session", Vec::new()).unwrap();
        m.on_open_failure(ChannelOpenFailure {
            recipient_channel: local_id,
            reason_code: open_failure_reason::CONNECT_FAILED,
            description: String::new(),
            language: String::new(),
        })
        .unwrap();
        assert_eq!(m.active_channel_count(), 0);
    }

    #[test]
    fn closing_the_last_channel_is_reported() {
        let mut m = mux();
        let (local_id, open) = m.begin_open("session", Vec::new()).unwrap();
        m.on_open_confirmation(ChannelOpenConfirmation {
            recipient_channel: local_id,
            sender_channel: open.sender_channel + 1,
            initial_window_size: 1000,
            maximum_packet_size: 16384,
        })
        .unwrap();
        let (_, was_last) = m.on_close(ChannelSimple::close(local_id)).unwrap();
        assert!(was_last);
    }

    #[test]
    fn write_closed_channel_refuses_further_data() {
        let mut m = mux();
        let (local_id, open) = m.begin_open("session", Vec::new()).unwrap();
        m.on_open_confirmation(ChannelOpenConfirmation {
            recipient_channel: local_id,
            sender_channel: open.sender_channel + 1,
            initial_window_size: 1000,
            maximum_packet_size: 16384,
        })
        .unwrap();
        m.begin_close(local_id).unwrap();
        assert!(m.prepare_data(local_id, b"too late").is_err());
    }

    #[test]
    fn unknown_channel_type_is_rejected() {
        let mut m = mux();
        let open = ChannelOpen {
            channel_type: "x11".into(),
            sender_channel: 0,
            initial_window_size: 1000,
            maximum_packet_size: 16384,
            type_specific: Vec::new(),
        };
        assert!(m.accept_open(&open).is_err());
    }
}
