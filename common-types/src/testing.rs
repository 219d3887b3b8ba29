//! An in-memory duplex byte pipe pair, so the rest of the workspace can
//! drive a full client/server exchange inside one test process instead of
//! binding a real socket. Gated the same way `hash::rand` gates its
//! `Distribution` impl: available to any crate's own tests, and to anyone
//! downstream who opts in with `features = ["testing"]`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

struct Pipe {
    buf: Mutex<VecDeque<u8>>,
    ready: Condvar,
    closed: Mutex<bool>,
}

impl Pipe {
    fn new() -> Self {
        Pipe { buf: Mutex::new(VecDeque::new()), ready: Condvar::new(), closed: Mutex::new(false) }
    }
}

/// One end of an in-memory duplex stream. Blocks on read the way a
/// blocking `TcpStream` does, so handshake and session code written
/// against a real socket runs against this unmodified.
pub struct DuplexPipe {
    read_from: Arc<Pipe>,
    write_to: Arc<Pipe>,
}

/// Builds a connected pair, one end for each side of a test handshake.
pub fn duplex_pair() -> (DuplexPipe, DuplexPipe) {
    let a = Arc::new(Pipe::new());
    let b = Arc::new(Pipe::new());
    (DuplexPipe { read_from: Arc::clone(&a), write_to: Arc::clone(&b) }, DuplexPipe { read_from: b, write_to: a })
}

impl DuplexPipe {
    /// Marks the direction the peer reads from as closed, so its next read
    /// past the end of any buffered bytes returns EOF instead of blocking.
    pub fn close(&self) {
        *self.write_to.closed.lock().unwrap() = true;
        self.write_to.ready.notify_all();
    }
}

impl Drop for DuplexPipe {
    /// Mirrors a real `TcpStream`'s socket-closes-on-drop behavior: an
    /// endpoint that goes out of scope without an explicit `close()` (e.g.
    /// because a handshake returned early on error) still signals EOF to
    /// its peer instead of leaving it blocked on `read` forever.
    fn drop(&mut self) {
        self.close();
    }
}

impl Read for DuplexPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.read_from.buf.lock().unwrap();
        loop {
            if !guard.is_empty() {
                let n = guard.len().min(buf.len());
                for (slot, byte) in buf.iter_mut().zip(guard.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if *self.read_from.closed.lock().unwrap() {
                return Ok(0);
            }
            guard = self.read_from.ready.wait(guard).unwrap();
        }
    }
}

impl Write for DuplexPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.write_to.buf.lock().unwrap();
        guard.extend(buf.iter().copied());
        self.write_to.ready.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bytes_written_on_one_end_are_read_on_the_other() {
        let (mut a, mut b) = duplex_pair();
        a.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn closing_one_end_yields_eof_on_the_other_once_drained() {
        let (a, mut b) = duplex_pair();
        a.close();
        let mut buf = [0u8; 1];
        assert_eq!(b.read(&mut buf).unwrap(), 0);
    }
}
