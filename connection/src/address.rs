use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream as StdTcpStream};
use std::time::Duration;

use common_types::Error;

/// A transport endpoint as the handshake and channel layers need it: a
/// blocking, bidirectional byte stream with a settable read deadline and
/// an idempotent teardown. `std::net::TcpStream` implements this directly;
/// the in-memory duplex pipes the test suite uses implement it too.
pub trait Transport: Read + Write {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Best-effort shutdown of both directions; safe to call more than once.
    fn disconnect(&mut self);
}

impl Transport for StdTcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        StdTcpStream::set_read_timeout(self, timeout)
    }

    fn disconnect(&mut self) {
        let _ = self.shutdown(std::net::Shutdown::Both);
    }
}

/// Open an outbound TCP connection to `addr`, the transport a client hands
/// to [`crate::connect_client`].
pub fn connect(addr: SocketAddr) -> Result<StdTcpStream, Error> {
    StdTcpStream::connect(addr).map_err(Error::from)
}

/// Bind a listening socket and accept one inbound connection, the
/// transport a server hands to [`crate::accept_server`]. Callers wanting
/// to serve more than one client loop over `accept` themselves; this
/// crate's session API handles one connection at a time, mirroring a
/// single dispatcher thread per connection rather than a connection pool.
pub fn accept_one(addr: SocketAddr) -> Result<StdTcpStream, Error> {
    let listener = TcpListener::bind(addr).map_err(Error::from)?;
    let (stream, _peer) = listener.accept().map_err(Error::from)?;
    Ok(stream)
}
