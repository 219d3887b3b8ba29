use std::fmt;

/// The exchange hash of the *first* key exchange, latched for the lifetime
/// of the connection. No rekey ever changes it; it is reused verbatim as
/// the hashed prefix of every publickey-auth signature.
#[derive(Clone, Eq, PartialEq)]
pub struct SessionId {
    data: Vec<u8>,
}

impl From<Vec<u8>> for SessionId {
    fn from(data: Vec<u8>) -> Self {
        SessionId { data }
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.data[..]
    }
}

impl SessionId {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionId [ {} ]", hex::encode(&self.data))
    }
}
