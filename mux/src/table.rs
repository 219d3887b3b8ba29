use std::collections::HashMap;

use common_types::{Error, MAX_ACTIVE_CHANNELS};

use crate::channel::{Channel, ChannelState};

/// The live channel set, keyed by local id. Enforces the hard cap on
/// simultaneously active channels and the "at most one outstanding open
/// per local id" invariant (the id is never reused while its entry exists).
#[derive(Default)]
pub struct ChannelTable {
    channels: HashMap<u32, Channel>,
    next_local_id: u32,
}

impl ChannelTable {
    pub fn new() -> Self {
        ChannelTable { channels: HashMap::new(), next_local_id: 0 }
    }

    pub fn active_count(&self) -> usize {
        self.channels.values().filter(|c| c.is_active() || c.state == ChannelState::Opening).count()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_local_id;
        self.next_local_id = self.next_local_id.wrapping_add(1);
        id
    }

    /// Reserve a fresh local id for an outbound `CHANNEL_OPEN`, failing if
    /// the active-channel cap is already reached.
    pub fn insert_opening(&mut self, channel: impl FnOnce(u32) -> Channel) -> Result<u32, Error> {
        if self.active_count() >= MAX_ACTIVE_CHANNELS {
            return Err(Error::Overflow);
        }
        let id = self.allocate_id();
        self.channels.insert(id, channel(id));
        Ok(id)
    }

    /// Register a channel the local side is confirming in response to a
    /// peer-initiated `CHANNEL_OPEN` (server role).
    pub fn insert_active(&mut self, channel: impl FnOnce(u32) -> Channel) -> Result<u32, Error> {
        if self.active_count() >= MAX_ACTIVE_CHANNELS {
            return Err(Error::Overflow);
        }
        let id = self.allocate_id();
        self.channels.insert(id, channel(id));
        Ok(id)
    }

    pub fn get(&self, local_id: u32) -> Result<&Channel, Error> {
        self.channels.get(&local_id).ok_or_else(|| Error::NotAvailable(format!("no such channel {}", local_id)))
    }

    pub fn get_mut(&mut self, local_id: u32) -> Result<&mut Channel, Error> {
        self.channels.get_mut(&local_id).ok_or_else(|| Error::NotAvailable(format!("no such channel {}", local_id)))
    }

    pub fn remove(&mut self, local_id: u32) -> Option<Channel> {
        self.channels.remove(&local_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::Channel;

    #[test]
    fn insert_opening_assigns_increasing_ids() {
        let mut table = ChannelTable::new();
        let a = table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)).unwrap();
        let b = table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn insert_opening_enforces_the_active_cap() {
        let mut table = ChannelTable::new();
        for _ in 0..MAX_ACTIVE_CHANNELS {
            table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)).unwrap();
        }
        match table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)) {
            Err(Error::Overflow) => {}
            other => panic!("expected Overflow, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn remove_frees_the_slot_for_the_cap() {
        let mut table = ChannelTable::new();
        let mut ids = Vec::new();
        for _ in 0..MAX_ACTIVE_CHANNELS {
            ids.push(table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)).unwrap());
        }
        table.remove(ids[0]);
        assert!(table.insert_opening(|id| Channel::new_opening(id, "session", 1000, 16384)).is_ok());
    }
}
