use std::time::Duration;

use common_types::DEFAULT_PACKET_SIZE;
use wire::AlgorithmPreferences;

/// Session-wide configuration shared by both roles: local algorithm
/// preference order, buffer sizing, and timeouts. `connection::ClientConfig`
/// / `connection::ServerConfig` wrap this with role-specific credentials.
#[derive(Clone)]
pub struct Config {
    pub algorithms: AlgorithmPreferences,
    /// Upper bound on one packet's decrypted payload; also the
    /// `maximum_packet_size` this endpoint advertises when opening channels.
    pub receive_buffer_size: u32,
    /// How long a transport read may block during the data phase before
    /// `Error::Timeout` (recoverable) is returned; `None` blocks forever.
    pub read_timeout: Option<Duration>,
    /// How long the initial identification-string exchange and handshake
    /// may take before timing out fatally.
    pub handshake_timeout: Duration,
    /// Bytes sent on one direction's cipher before this endpoint will
    /// itself *propose* a rekey. An inbound mid-stream `KEXINIT` is treated
    /// as fatal, but an outbound rekey policy is still a useful knob for
    /// long-lived sessions — exposed here, defaulted off (`None`) so the
    /// conservative default behavior is what a caller gets without opting in.
    pub rekey_after_bytes: Option<u64>,
    pub rekey_after: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            algorithms: AlgorithmPreferences::default(),
            receive_buffer_size: DEFAULT_PACKET_SIZE,
            read_timeout: Some(Duration::from_secs(30)),
            handshake_timeout: Duration::from_secs(20),
            rekey_after_bytes: None,
            rekey_after: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_disables_outbound_rekey_policy() {
        let cfg = Config::default();
        assert!(cfg.rekey_after_bytes.is_none());
        assert!(cfg.rekey_after.is_none());
    }
}
