use userauth::Credentials;
use userauth::UserAuthorizer;

/// Settings a client hands to [`crate::connect_client`]: the user to
/// authenticate as, the credential(s) to try, and an optional host-key
/// check. Leaving `host_key_check` unset accepts whatever host key the
/// peer offers, matching an interactive client on first connection.
pub struct ClientConfig {
    pub transport: transport::Config,
    pub user: String,
    pub credentials: Credentials,
    pub host_key_check: Option<HostKeyCheck>,
}

impl ClientConfig {
    pub fn new(user: impl Into<String>, credentials: Credentials) -> Self {
        ClientConfig { transport: transport::Config::default(), user: user.into(), credentials, host_key_check: None }
    }

    pub fn with_host_key_check(mut self, check: HostKeyCheck) -> Self {
        self.host_key_check = Some(check);
        self
    }
}

/// A fingerprint the server's host key must match, or the handshake is
/// refused before user authentication begins.
pub struct HostKeyCheck {
    pub expected_fingerprint: Vec<u8>,
}

impl HostKeyCheck {
    pub fn accepts(&self, host_key_blob: &[u8]) -> bool {
        crypto::fingerprint::matches(host_key_blob, &self.expected_fingerprint)
    }
}

/// Settings a server hands to [`crate::accept_server`]: its host key and
/// the authorizer that decides which users/credentials get in.
pub struct ServerConfig<'a> {
    pub transport: transport::Config,
    pub host_key: crypto::pubkey::PrivateHostKey,
    pub host_key_algorithm: crypto::pubkey::PublicKeyAlgorithm,
    pub authorizer: &'a dyn UserAuthorizer,
}

impl<'a> ServerConfig<'a> {
    pub fn new(
        host_key: crypto::pubkey::PrivateHostKey,
        host_key_algorithm: crypto::pubkey::PublicKeyAlgorithm,
        authorizer: &'a dyn UserAuthorizer,
    ) -> Self {
        ServerConfig { transport: transport::Config::default(), host_key, host_key_algorithm, authorizer }
    }
}
