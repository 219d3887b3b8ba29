use crypto::pubkey::{PrivateHostKey, PublicKeyAlgorithm};

/// What the client offers the auth engine to try. The engine picks the
/// method name to send from this and the server's advertised
/// `methods_continue` list; it never tries a method the
/// caller didn't supply credentials for.
pub enum Credentials {
    Password(String),
    PublicKey {
        algorithm: PublicKeyAlgorithm,
        public_blob: Vec<u8>,
        private: PrivateHostKey,
    },
    /// Keyboard-interactive carrying a single password, sent in every
    /// prompt slot of a multi-prompt request.
    KeyboardInteractivePassword(String),
}

impl Credentials {
    pub fn method_name(&self) -> &'static str {
        match self {
            Credentials::Password(_) => "password",
            Credentials::PublicKey { .. } => "publickey",
            Credentials::KeyboardInteractivePassword(_) => "keyboard-interactive",
        }
    }
}
