use bitflags::bitflags;

bitflags! {
    /// Peer-quirk flags, detected once from the peer's software-version
    /// substring right after the identification-string exchange.
    ///
    /// Each flag's effect is isolated to a single code path elsewhere in
    /// the workspace (one `if` in the key-derivation hash, one in the
    /// signature parser, and so on) rather than threaded through as a
    /// sprawling set of checks.
    #[derive(Default)]
    pub struct PeerQuirks: u32 {
        /// Omit the length prefix of the session id when hashing publickey-auth signed data.
        const NO_HASH_LENGTH  = 0b0000_0001;
        /// Omit the DH shared secret when hashing key-derivation material.
        const NO_HASH_SECRET  = 0b0000_0010;
        /// Use a fixed 16-byte HMAC key regardless of the MAC's nominal block size.
        const HMAC_KEY_SIZE   = 0b0000_0100;
        /// DSA signature sent as a raw 40-byte value without the `ssh-dss` wrapper.
        const SIG_FORMAT      = 0b0000_1000;
        /// Peer requires a window-adjust for every packet sent.
        const WINDOW_BUG      = 0b0001_0000;
        /// Peer may dump plain-text diagnostics starting with "FATAL: " on errors.
        const TEXT_DIAGS      = 0b0010_0000;
        /// Omit the "password" sub-method hint in keyboard-interactive auth.
        const PAM_PW          = 0b0100_0000;
        /// Peer drops the connection at DH phase two.
        const CUTEFTP         = 0b1000_0000;
        /// Peer requires a dummy `none` auth request before any real auth method.
        const TECTIA          = 0b1_0000_0000;
    }
}

impl PeerQuirks {
    /// Detect quirks from the software-version substring of the peer's
    /// identification line (the part after `SSH-2.0-`).
    ///
    /// The detection table is reproduced verbatim from the reference
    /// implementation's version-string matching: exact substring prefixes,
    /// checked in the same order, with the same "not sure of the exact
    /// versions" caveats preserved as comments where the original carries
    /// them.
    pub fn detect(version_string: &str) -> PeerQuirks {
        let mut flags = PeerQuirks::empty();

        if let Some(sub) = version_string.strip_prefix("OpenSSH_") {
            if sub.starts_with("2.0") {
                flags |= PeerQuirks::NO_HASH_LENGTH;
            }
            if sub.starts_with("3.8") || sub.starts_with("3.9") || sub.starts_with("3.10") {
                flags |= PeerQuirks::PAM_PW;
            }
        }

        if version_string.starts_with('2') && !version_string.contains("VShell") {
            // ssh.com 2.x versions have quite a number of bugs, checked as a group.
            if version_string.starts_with("2.0.0") || version_string.starts_with("2.0.10") {
                flags |= PeerQuirks::NO_HASH_SECRET;
            }
            if version_string.starts_with("2.0") || version_string.starts_with("2.1") {
                flags |= PeerQuirks::SIG_FORMAT;
            }
            if version_string.starts_with("2.0") || version_string.starts_with("2.1") {
                flags |= PeerQuirks::WINDOW_BUG;
            }
            if version_string.starts_with("2.1") || version_string.starts_with("2.2") {
                flags |= PeerQuirks::NO_HASH_LENGTH;
            }
            if version_string.starts_with("2.0")
                || version_string.starts_with("2.1")
                || version_string.starts_with("2.2")
                || version_string.starts_with("2.3.0")
            {
                flags |= PeerQuirks::HMAC_KEY_SIZE;
            }
            // Not sure of the exact versions where this occurs.
            if version_string.starts_with("2.") {
                flags |= PeerQuirks::TEXT_DIAGS;
            }
        }

        if version_string.starts_with("3.0 SecureCRT") || version_string.starts_with("1.7 SecureFX") {
            flags |= PeerQuirks::NO_HASH_LENGTH;
        }
        if version_string.starts_with("1.0") {
            flags |= PeerQuirks::CUTEFTP;
        }
        if version_string.contains("Tectia") {
            flags |= PeerQuirks::TECTIA;
        }

        flags
    }
}

#[cfg(test)]
mod test {
    use super::PeerQuirks;

    #[test]
    fn openssh_2_0_gets_no_hash_length() {
        let q = PeerQuirks::detect("OpenSSH_2.0.1");
        assert!(q.contains(PeerQuirks::NO_HASH_LENGTH));
        assert!(!q.contains(PeerQuirks::PAM_PW));
    }

    #[test]
    fn openssh_3_9_gets_pam_pw() {
        let q = PeerQuirks::detect("OpenSSH_3.9p1");
        assert!(q.contains(PeerQuirks::PAM_PW));
    }

    #[test]
    fn sshcom_2_0_0_gets_the_whole_bug_group() {
        let q = PeerQuirks::detect("2.0.0 SSH Secure Shell");
        assert!(q.contains(PeerQuirks::NO_HASH_SECRET));
        assert!(q.contains(PeerQuirks::SIG_FORMAT));
        assert!(q.contains(PeerQuirks::WINDOW_BUG));
        assert!(q.contains(PeerQuirks::HMAC_KEY_SIZE));
        assert!(q.contains(PeerQuirks::TEXT_DIAGS));
        assert!(!q.contains(PeerQuirks::NO_HASH_LENGTH));
    }

    #[test]
    fn cuteftp_1_0() {
        assert!(PeerQuirks::detect("1.0").contains(PeerQuirks::CUTEFTP));
    }

    #[test]
    fn vshell_is_excluded_from_the_sshcom_group() {
        let q = PeerQuirks::detect("2.0.0 VShell");
        assert!(!q.contains(PeerQuirks::NO_HASH_SECRET));
    }

    #[test]
    fn plain_openssh_has_no_quirks() {
        assert!(PeerQuirks::detect("OpenSSH_8.9").is_empty());
    }
}
