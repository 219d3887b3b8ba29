use crate::msg;
use crate::primitive::{Reader, Writer};
use common_types::{DisconnectReason, Error};

/// `SSH_MSG_DISCONNECT`.
#[derive(Debug, Clone)]
pub struct Disconnect {
    pub reason: u32,
    pub description: String,
    pub language: String,
}

impl Disconnect {
    pub fn new(reason: DisconnectReason, description: impl Into<String>) -> Self {
        Disconnect {
            reason: reason.code(),
            description: description.into(),
            language: String::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::DISCONNECT);
        w.uint32(self.reason);
        w.string(self.description.as_bytes());
        w.string(self.language.as_bytes());
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::DISCONNECT {
            return Err(Error::BadData("expected DISCONNECT".into()));
        }
        Ok(Disconnect {
            reason: r.uint32()?,
            description: r.utf8_string().unwrap_or_default(),
            language: r.utf8_string().unwrap_or_default(),
        })
    }
}

/// `SSH_MSG_SERVICE_REQUEST` / `SSH_MSG_SERVICE_ACCEPT`.
pub fn encode_service_request(service_name: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.byte(msg::SERVICE_REQUEST);
    w.string(service_name.as_bytes());
    w.into_bytes()
}

pub fn decode_service_name(msg_type: u8, payload: &[u8]) -> Result<String, Error> {
    let mut r = Reader::new(payload);
    let got = r.byte()?;
    if got != msg_type {
        return Err(Error::BadData("unexpected service message type".into()));
    }
    r.utf8_string()
}

pub fn encode_service_accept(service_name: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.byte(msg::SERVICE_ACCEPT);
    w.string(service_name.as_bytes());
    w.into_bytes()
}

/// `SSH_MSG_IGNORE`, used e.g. as padding-before-password-guess cover traffic.
pub fn encode_ignore(data: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.byte(msg::IGNORE);
    w.string(data);
    w.into_bytes()
}
