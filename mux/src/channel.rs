use common_types::MAX_WINDOW_SIZE;

/// A channel's lifecycle. `Opening` exists only between sending
/// `CHANNEL_OPEN` and receiving confirmation/failure; channels the
/// multiplexer itself confirms (server role) start in `Active`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChannelState {
    Opening,
    Active,
    WriteClosed,
    Closed,
}

/// One multiplexed channel: local/remote ids, its type tag, window
/// accounting in both directions, and the one pending administrative
/// response a channel may owe the peer (e.g. a delayed `CHANNEL_SUCCESS`).
pub struct Channel {
    pub local_id: u32,
    pub remote_id: u32,
    pub channel_type: String,
    pub state: ChannelState,
    pub max_packet_size: u32,
    /// Bytes of local receive window the peer has not yet topped up.
    pub local_window_consumed: u32,
    pub local_window_total: u32,
    /// Remaining bytes this endpoint may send before a `CHANNEL_WINDOW_ADJUST` arrives.
    pub remote_window: u32,
}

impl Channel {
    pub fn new_opening(local_id: u32, channel_type: impl Into<String>, local_window_total: u32, max_packet_size: u32) -> Self {
        Channel {
            local_id,
            remote_id: 0,
            channel_type: channel_type.into(),
            state: ChannelState::Opening,
            max_packet_size,
            local_window_consumed: 0,
            local_window_total,
            remote_window: 0,
        }
    }

    pub fn new_active(
        local_id: u32,
        remote_id: u32,
        channel_type: impl Into<String>,
        local_window_total: u32,
        remote_window: u32,
        max_packet_size: u32,
    ) -> Self {
        Channel {
            local_id,
            remote_id,
            channel_type: channel_type.into(),
            state: ChannelState::Active,
            max_packet_size,
            local_window_consumed: 0,
            local_window_total,
            remote_window,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == ChannelState::Active || self.state == ChannelState::WriteClosed
    }

    /// Account for `len` bytes of incoming `CHANNEL_DATA`/`CHANNEL_EXTENDED_DATA`.
    /// Returns the window top-up due, if the consumed amount crossed the
    /// high-watermark (half the advertised window) or the `window_bug`
    /// quirk demands an adjust after every packet.
    pub fn account_incoming(&mut self, len: u32, window_bug: bool) -> Option<u32> {
        self.local_window_consumed = self.local_window_consumed.saturating_add(len);
        let high_watermark = self.local_window_total / 2;
        if window_bug || self.local_window_consumed >= high_watermark {
            let delta = self.local_window_consumed;
            self.local_window_consumed = 0;
            Some(delta)
        } else {
            None
        }
    }

    /// Split `payload` into `CHANNEL_DATA`-sized chunks honoring both the
    /// peer's advertised `max_packet_size` and the remaining send window,
    /// consuming window as chunks are taken.
    pub fn chunk_for_sending<'a>(&mut self, payload: &'a [u8]) -> Vec<&'a [u8]> {
        const HEADER_OVERHEAD: u32 = 9; // msg type + recipient channel + string length
        let chunk_cap = self.max_packet_size.saturating_sub(HEADER_OVERHEAD).max(1);
        let mut chunks = Vec::new();
        let mut rest = payload;
        while !rest.is_empty() && self.remote_window > 0 {
            let take = chunk_cap.min(self.remote_window) as usize;
            let take = take.min(rest.len());
            if take == 0 {
                break;
            }
            let (chunk, remainder) = rest.split_at(take);
            chunks.push(chunk);
            self.remote_window -= take as u32;
            rest = remainder;
        }
        chunks
    }
}

/// The initial window this endpoint advertises to the peer. Set to the
/// protocol maximum to disable SSH-level flow control on the receive side.
pub fn initial_window() -> u32 {
    MAX_WINDOW_SIZE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn account_incoming_fires_at_half_the_window() {
        let mut c = Channel::new_active(1, 2, "session", 1000, 1000, 16384);
        assert!(c.account_incoming(400, false).is_none());
        assert_eq!(c.account_incoming(200, false), Some(600));
    }

    #[test]
    fn window_bug_forces_an_adjust_every_call() {
        let mut c = Channel::new_active(1, 2, "session", 1000, 1000, 16384);
        assert_eq!(c.account_incoming(1, true), Some(1));
    }

    #[test]
    fn chunk_for_sending_respects_both_caps() {
        let mut c = Channel::new_active(1, 2, "session", 1000, 20, 16);
        let payload = vec![0u8; 50];
        let chunks = c.chunk_for_sending(&payload);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 20);
        assert_eq!(c.remote_window, 0);
    }
}
