//! Wires the in-memory duplex pipes from `common-types` into this crate's
//! `Transport` trait, so `session`'s tests can drive a full client/server
//! dispatch loop without a real socket.

use std::io;
use std::time::Duration;

use common_types::testing::DuplexPipe;

use crate::address::Transport;

impl Transport for DuplexPipe {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) {
        DuplexPipe::close(self);
    }
}

pub use common_types::testing::duplex_pair;
