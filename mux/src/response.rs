use common_types::Error;

/// A fully-encoded administrative message (window adjust, open
/// confirmation/failure, channel result, ...) waiting for its turn on the
/// wire. Holding pre-encoded bytes rather than a typed enum keeps this
/// slot usable for every response kind the multiplexer and the session
/// dispatcher above it produce, without a case per message type here.
pub struct EnqueuedResponse {
    bytes: Vec<u8>,
}

impl EnqueuedResponse {
    pub fn new(bytes: Vec<u8>) -> Self {
        EnqueuedResponse { bytes }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A connection holds at most one deferred response at a time; a second
/// enqueue before the first is flushed is a caller bug.
#[derive(Default)]
pub struct ResponseSlot {
    pending: Option<EnqueuedResponse>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        ResponseSlot { pending: None }
    }

    pub fn enqueue(&mut self, response: EnqueuedResponse) -> Result<(), Error> {
        if self.pending.is_some() {
            return Err(Error::Duplicate);
        }
        self.pending = Some(response);
        Ok(())
    }

    pub fn take(&mut self) -> Option<EnqueuedResponse> {
        self.pending.take()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn a_second_enqueue_before_flush_is_rejected() {
        let mut slot = ResponseSlot::new();
        slot.enqueue(EnqueuedResponse::new(vec![1])).unwrap();
        match slot.enqueue(EnqueuedResponse::new(vec![2])) {
            Err(Error::Duplicate) => {}
            other => panic!("expected Duplicate, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn take_frees_the_slot() {
        let mut slot = ResponseSlot::new();
        slot.enqueue(EnqueuedResponse::new(vec![1])).unwrap();
        assert_eq!(slot.take().unwrap().into_bytes(), vec![1]);
        assert!(slot.is_empty());
    }
}
