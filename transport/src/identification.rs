use std::io::{Read, Write};

use common_types::{Error, PeerQuirks};

/// Banner lines (RFC 4253 §4.2) the peer may send before its real
/// identification line. The source waits until the connect timeout; this
/// rewrite caps it at a fixed count instead, per the "SHOULD
/// cap at, e.g., 16 banner lines".
pub const MAX_BANNER_LINES: usize = 16;

/// Longest identification/banner line this endpoint will buffer before
/// giving up on a peer that never sends `\n`.
const MAX_LINE_LEN: usize = 1024;

/// This endpoint's own identification line, `SSH-2.0-<impl_tag>\r\n`.
pub fn own_id_line(impl_tag: &str) -> Vec<u8> {
    format!("SSH-2.0-{}\r\n", impl_tag).into_bytes()
}

pub fn write_own_id<W: Write>(stream: &mut W, impl_tag: &str) -> Result<(), Error> {
    stream.write_all(&own_id_line(impl_tag)).map_err(Error::Write)
}

/// Read one `\n`-terminated line, stripping a trailing `\r\n` or `\n`. SSH
/// identification exchange happens before any packet framing is in effect,
/// so this reads one byte at a time rather than through a buffering
/// wrapper that would swallow bytes the packet codec needs afterward.
fn read_raw_line<R: Read>(stream: &mut R) -> Result<Vec<u8>, Error> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).map_err(Error::from)?;
        if n == 0 {
            return Err(Error::Complete);
        }
        if byte[0] == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(line);
        }
        line.push(byte[0]);
        if line.len() > MAX_LINE_LEN {
            return Err(Error::BadData("identification line too long".into()));
        }
    }
}

/// Read the peer's identification line, skipping up to [`MAX_BANNER_LINES`]
/// banner lines that may precede it. Returns the raw ID
/// bytes (without CR/LF — exactly what gets mixed into the exchange hash at
/// step 1/2) and the peer-quirk flags detected from its version substring.
pub fn read_peer_id<R: Read>(stream: &mut R) -> Result<(Vec<u8>, PeerQuirks), Error> {
    for _ in 0..MAX_BANNER_LINES {
        let line = read_raw_line(stream)?;
        if line.starts_with(b"SSH-") {
            let quirks = version_substring(&line).map(PeerQuirks::detect).unwrap_or_default();
            return Ok((line, quirks));
        }
    }
    Err(Error::BadData("too many banner lines before identification string".into()))
}

/// The part of an ID string after `SSH-2.0-` (or `SSH-1.99-`), which is
/// what the peer-quirk table matches against.
fn version_substring(line: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(line).ok()?;
    text.splitn(3, '-').nth(2)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_id_line_stripping_crlf() {
        let mut stream = Cursor::new(b"SSH-2.0-OpenSSH_8.9\r\n".to_vec());
        let (id, _) = read_peer_id(&mut stream).unwrap();
        assert_eq!(id, b"SSH-2.0-OpenSSH_8.9");
    }

    #[test]
    fn skips_banner_lines_before_the_real_id() {
        let mut stream = Cursor::new(b"Welcome to our server\nAuthorized use only\nSSH-2.0-Srv\r\n".to_vec());
        let (id, _) = read_peer_id(&mut stream).unwrap();
        assert_eq!(id, b"SSH-2.0-Srv");
    }

    #[test]
    fn too_many_banner_lines_is_fatal() {
        let mut body = Vec::new();
        for _ in 0..(MAX_BANNER_LINES + 1) {
            body.extend_from_slice(b"banner\n");
        }
        body.extend_from_slice(b"SSH-2.0-Srv\r\n");
        let mut stream = Cursor::new(body);
        assert!(read_peer_id(&mut stream).is_err());
    }

    #[test]
    fn detects_quirks_from_version_substring() {
        let mut stream = Cursor::new(b"SSH-2.0-OpenSSH_3.9p1\r\n".to_vec());
        let (_, quirks) = read_peer_id(&mut stream).unwrap();
        assert!(quirks.contains(PeerQuirks::PAM_PW));
    }

    #[test]
    fn own_id_line_uses_crlf() {
        assert_eq!(own_id_line("sshlib_1.0"), b"SSH-2.0-sshlib_1.0\r\n");
    }
}
