use std::{error, fmt, io};

/// Error kinds shared by every layer of the transport and connection stack.
///
/// The variants mirror the language-neutral error kinds of the protocol
/// design: packet-codec and negotiation failures are always fatal to the
/// connection, auth failures are not, and `Complete` is the peaceful
/// remote-initiated close that surfaces to the application as EOF.
#[derive(Debug)]
pub enum Error {
    /// Not enough bytes arrived within the read timeout.
    Underflow,
    /// A structural/length/framing violation.
    BadData(String),
    /// MAC or signature verification failed. Never refined further for the peer.
    BadSignature,
    /// User-facing credential mismatch.
    WrongKey(String),
    /// Caller did not supply a required credential.
    NotInited(String),
    /// Server refused an otherwise well-formed operation.
    Permission(String),
    /// e.g. a second open on an already-open channel id.
    Duplicate,
    /// Buffer too small, or a send queue is full.
    Overflow,
    /// Negotiation found no common algorithm.
    NotAvailable(String),
    /// The transport timed out.
    Timeout,
    /// Underlying transport read error.
    Read(io::Error),
    /// Underlying transport write error.
    Write(io::Error),
    /// Peaceful remote-initiated close.
    Complete,
}

impl error::Error for Error {
    fn cause(&self) -> Option<&dyn error::Error> {
        match self {
            Error::Read(e) => Some(e),
            Error::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Underflow => write!(f, "underflow: short read within timeout"),
            Error::BadData(msg) => write!(f, "bad data: {}", msg),
            Error::BadSignature => write!(f, "bad message MAC or signature"),
            Error::WrongKey(msg) => write!(f, "wrong key: {}", msg),
            Error::NotInited(msg) => write!(f, "not initialized: {}", msg),
            Error::Permission(msg) => write!(f, "permission denied: {}", msg),
            Error::Duplicate => write!(f, "duplicate"),
            Error::Overflow => write!(f, "overflow"),
            Error::NotAvailable(msg) => write!(f, "not available: {}", msg),
            Error::Timeout => write!(f, "timeout"),
            Error::Read(e) => write!(f, "read error: {}", e),
            Error::Write(e) => write!(f, "write error: {}", e),
            Error::Complete => write!(f, "connection closed"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut {
            Error::Timeout
        } else {
            Error::Read(e)
        }
    }
}

/// Sanitize a peer-controlled string for inclusion in a caller-visible
/// message: strip CR/LF, replace non-printable bytes with `.`, and bound
/// the length so a hostile peer can't flood the caller's logs.
pub fn sanitize_peer_string(raw: &[u8]) -> String {
    const MAX_LEN: usize = 256;

    raw.iter()
        .filter(|&&b| b != b'\r' && b != b'\n')
        .take(MAX_LEN)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}
