use crate::msg;
use crate::primitive::{Reader, Writer};
use common_types::Error;

/// `SSH_MSG_CHANNEL_OPEN`. The type-specific tail (`session` has none;
/// `direct-tcpip`/`forwarded-tcpip` carry host/port pairs) is kept as raw
/// bytes here — the multiplexer (component E) interprets it per `channel_type`.
#[derive(Debug, Clone)]
pub struct ChannelOpen {
    pub channel_type: String,
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub maximum_packet_size: u32,
    pub type_specific: Vec<u8>,
}

impl ChannelOpen {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_OPEN);
        w.string(self.channel_type.as_bytes());
        w.uint32(self.sender_channel);
        w.uint32(self.initial_window_size);
        w.uint32(self.maximum_packet_size);
        w.raw(&self.type_specific);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_OPEN)?;
        Ok(ChannelOpen {
            channel_type: r.utf8_string()?,
            sender_channel: r.uint32()?,
            initial_window_size: r.uint32()?,
            maximum_packet_size: r.uint32()?,
            type_specific: r.rest().to_vec(),
        })
    }

    /// Encode a `direct-tcpip` tail: `remote_host, remote_port,
    /// originator_ip, originator_port`.
    pub fn encode_direct_tcpip_tail(remote_host: &str, remote_port: u32, originator_ip: &str, originator_port: u32) -> Vec<u8> {
        let mut w = Writer::new();
        w.string(remote_host.as_bytes());
        w.uint32(remote_port);
        w.string(originator_ip.as_bytes());
        w.uint32(originator_port);
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOpenConfirmation {
    pub recipient_channel: u32,
    pub sender_channel: u32,
    pub initial_window_size: u32,
    pub maximum_packet_size: u32,
}

impl ChannelOpenConfirmation {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_OPEN_CONFIRMATION);
        w.uint32(self.recipient_channel);
        w.uint32(self.sender_channel);
        w.uint32(self.initial_window_size);
        w.uint32(self.maximum_packet_size);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_OPEN_CONFIRMATION)?;
        Ok(ChannelOpenConfirmation {
            recipient_channel: r.uint32()?,
            sender_channel: r.uint32()?,
            initial_window_size: r.uint32()?,
            maximum_packet_size: r.uint32()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOpenFailure {
    pub recipient_channel: u32,
    pub reason_code: u32,
    pub description: String,
    pub language: String,
}

impl ChannelOpenFailure {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_OPEN_FAILURE);
        w.uint32(self.recipient_channel);
        w.uint32(self.reason_code);
        w.string(self.description.as_bytes());
        w.string(self.language.as_bytes());
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_OPEN_FAILURE)?;
        Ok(ChannelOpenFailure {
            recipient_channel: r.uint32()?,
            reason_code: r.uint32()?,
            description: r.utf8_string().unwrap_or_default(),
            language: r.utf8_string().unwrap_or_default(),
        })
    }
}

/// Open-failure reason codes (RFC 4254 §5.1).
pub mod open_failure_reason {
    pub const ADMINISTRATIVELY_PROHIBITED: u32 = 1;
    pub const CONNECT_FAILED: u32 = 2;
    pub const UNKNOWN_CHANNEL_TYPE: u32 = 3;
    pub const RESOURCE_SHORTAGE: u32 = 4;
}

#[derive(Debug, Clone)]
pub struct ChannelWindowAdjust {
    pub recipient_channel: u32,
    pub bytes_to_add: u32,
}

impl ChannelWindowAdjust {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_WINDOW_ADJUST);
        w.uint32(self.recipient_channel);
        w.uint32(self.bytes_to_add);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_WINDOW_ADJUST)?;
        Ok(ChannelWindowAdjust { recipient_channel: r.uint32()?, bytes_to_add: r.uint32()? })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelData {
    pub recipient_channel: u32,
    pub data: Vec<u8>,
}

impl ChannelData {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_DATA);
        w.uint32(self.recipient_channel);
        w.string(&self.data);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_DATA)?;
        Ok(ChannelData { recipient_channel: r.uint32()?, data: r.string()?.to_vec() })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelExtendedData {
    pub recipient_channel: u32,
    pub data_type_code: u32,
    pub data: Vec<u8>,
}

impl ChannelExtendedData {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_EXTENDED_DATA)?;
        Ok(ChannelExtendedData {
            recipient_channel: r.uint32()?,
            data_type_code: r.uint32()?,
            data: r.string()?.to_vec(),
        })
    }
}

pub const EXTENDED_DATA_STDERR: u32 = 1;

/// `SSH_MSG_CHANNEL_EOF` / `SSH_MSG_CHANNEL_CLOSE`: both carry only the
/// recipient channel number.
#[derive(Debug, Clone)]
pub struct ChannelSimple {
    pub msg_type: u8,
    pub recipient_channel: u32,
}

impl ChannelSimple {
    pub fn eof(recipient_channel: u32) -> Self {
        ChannelSimple { msg_type: msg::CHANNEL_EOF, recipient_channel }
    }

    pub fn close(recipient_channel: u32) -> Self {
        ChannelSimple { msg_type: msg::CHANNEL_CLOSE, recipient_channel }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(self.msg_type);
        w.uint32(self.recipient_channel);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::CHANNEL_EOF && msg_type != msg::CHANNEL_CLOSE {
            return Err(Error::BadData("expected CHANNEL_EOF or CHANNEL_CLOSE".into()));
        }
        Ok(ChannelSimple { msg_type, recipient_channel: r.uint32()? })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub recipient_channel: u32,
    pub request_type: String,
    pub want_reply: bool,
    pub type_specific: Vec<u8>,
}

impl ChannelRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::CHANNEL_REQUEST);
        w.uint32(self.recipient_channel);
        w.string(self.request_type.as_bytes());
        w.boolean(self.want_reply);
        w.raw(&self.type_specific);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::CHANNEL_REQUEST)?;
        Ok(ChannelRequest {
            recipient_channel: r.uint32()?,
            request_type: r.utf8_string()?,
            want_reply: r.boolean()?,
            type_specific: r.rest().to_vec(),
        })
    }

    /// Encode a `pty-req` tail (terminal type, dims, modes) — the only
    /// channel-request tail format this workspace needs to produce.
    pub fn encode_pty_req_tail(term: &str, cols: u32, rows: u32, width_px: u32, height_px: u32) -> Vec<u8> {
        let mut w = Writer::new();
        w.string(term.as_bytes());
        w.uint32(cols);
        w.uint32(rows);
        w.uint32(width_px);
        w.uint32(height_px);
        w.string(&[]); // empty encoded terminal modes
        w.into_bytes()
    }

    /// Encode an `exec`/`subsystem` tail: a single string argument.
    pub fn encode_command_tail(command: &str) -> Vec<u8> {
        let mut w = Writer::new();
        w.string(command.as_bytes());
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct ChannelResult {
    pub success: bool,
    pub recipient_channel: u32,
}

impl ChannelResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(if self.success { msg::CHANNEL_SUCCESS } else { msg::CHANNEL_FAILURE });
        w.uint32(self.recipient_channel);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        let success = match msg_type {
            t if t == msg::CHANNEL_SUCCESS => true,
            t if t == msg::CHANNEL_FAILURE => false,
            _ => return Err(Error::BadData("expected CHANNEL_SUCCESS or CHANNEL_FAILURE".into())),
        };
        Ok(ChannelResult { success, recipient_channel: r.uint32()? })
    }
}

/// `SSH_MSG_GLOBAL_REQUEST` (e.g. `tcpip-forward`, `cancel-tcpip-forward`) —
/// parsed and validated, never wired to a listener.
#[derive(Debug, Clone)]
pub struct GlobalRequest {
    pub request_type: String,
    pub want_reply: bool,
    pub type_specific: Vec<u8>,
}

impl GlobalRequest {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        expect_type(&mut r, msg::GLOBAL_REQUEST)?;
        Ok(GlobalRequest {
            request_type: r.utf8_string()?,
            want_reply: r.boolean()?,
            type_specific: r.rest().to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::GLOBAL_REQUEST);
        w.string(self.request_type.as_bytes());
        w.boolean(self.want_reply);
        w.raw(&self.type_specific);
        w.into_bytes()
    }
}

pub fn encode_global_failure() -> Vec<u8> {
    vec![msg::GLOBAL_FAILURE]
}

pub fn encode_global_success() -> Vec<u8> {
    vec![msg::GLOBAL_SUCCESS]
}

fn expect_type(r: &mut Reader, expected: u8) -> Result<(), Error> {
    let got = r.byte()?;
    if got != expected {
        return Err(Error::BadData(format!("expected message type {}, got {}", expected, got)));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_open_round_trips_with_type_specific_tail() {
        let tail = ChannelOpen::encode_direct_tcpip_tail("example.com", 80, "127.0.0.1", 54321);
        let open = ChannelOpen {
            channel_type: "direct-tcpip".into(),
            sender_channel: 3,
            initial_window_size: 0x7fff_ffff,
            maximum_packet_size: 16384,
            type_specific: tail,
        };
        let decoded = ChannelOpen::decode(&open.encode()).unwrap();
        assert_eq!(decoded.channel_type, "direct-tcpip");
        assert_eq!(decoded.sender_channel, 3);
    }

    #[test]
    fn channel_data_round_trips() {
        let data = ChannelData { recipient_channel: 17, data: b"ls\n".to_vec() };
        let decoded = ChannelData::decode(&data.encode()).unwrap();
        assert_eq!(decoded.data, b"ls\n");
    }

    #[test]
    fn channel_close_and_eof_share_decoder() {
        let close = ChannelSimple::close(5);
        let decoded = ChannelSimple::decode(&close.encode()).unwrap();
        assert_eq!(decoded.msg_type, msg::CHANNEL_CLOSE);
        assert_eq!(decoded.recipient_channel, 5);
    }

    #[test]
    fn channel_result_round_trips_success_and_failure() {
        let ok = ChannelResult { success: true, recipient_channel: 1 };
        assert!(ChannelResult::decode(&ok.encode()).unwrap().success);
        let fail = ChannelResult { success: false, recipient_channel: 1 };
        assert!(!ChannelResult::decode(&fail.encode()).unwrap().success);
    }
}
