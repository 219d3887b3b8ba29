use byteorder::{BigEndian, ByteOrder};
use common_types::Error;

/// A cursor over a decrypted packet payload, reading the handful of
/// primitive encodings the SSH wire format is built from: `byte`,
/// `boolean`, `uint32`, `uint64`, `string` and `mpint`.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.pos + n > self.data.len() {
            return Err(Error::BadData("unexpected end of payload".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn byte(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.take(n)
    }

    pub fn boolean(&mut self) -> Result<bool, Error> {
        Ok(self.byte()? != 0)
    }

    pub fn uint32(&mut self) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn uint64(&mut self) -> Result<u64, Error> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    /// An SSH `string`: a 32-bit length followed by that many raw bytes.
    pub fn string(&mut self) -> Result<&'a [u8], Error> {
        let len = self.uint32()? as usize;
        self.take(len)
    }

    /// An SSH `string` interpreted as UTF-8.
    pub fn utf8_string(&mut self) -> Result<String, Error> {
        let bytes = self.string()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::BadData("string is not utf-8".into()))
    }

    /// A comma-separated `name-list`, encoded as a `string`.
    pub fn name_list(&mut self) -> Result<Vec<String>, Error> {
        let raw = self.utf8_string()?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(raw.split(',').map(|s| s.to_owned()).collect())
    }

    /// A multi-precision integer: a `string`-encoded big-endian two's
    /// complement value with a leading zero byte when the high bit of the
    /// first byte would otherwise be set.
    pub fn mpi(&mut self) -> Result<Vec<u8>, Error> {
        let raw = self.string()?;
        // Strip a single leading zero byte used only to keep the value
        // non-negative; more than one would indicate a malformed encoding
        // but we tolerate it rather than reject otherwise-valid peers.
        if raw.len() > 1 && raw[0] == 0 && raw[1] & 0x80 == 0 {
            Ok(raw[1..].to_vec())
        } else {
            Ok(raw.to_vec())
        }
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let r = &self.data[self.pos..];
        self.pos = self.data.len();
        r
    }
}

/// An append-only buffer builder for the same primitive encodings `Reader`
/// consumes, used both to build outgoing packet payloads and to build the
/// byte strings that get mixed into the exchange hash.
#[derive(Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn byte(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn boolean(&mut self, v: bool) -> &mut Self {
        self.byte(if v { 1 } else { 0 })
    }

    pub fn uint32(&mut self, v: u32) -> &mut Self {
        let mut tmp = [0u8; 4];
        BigEndian::write_u32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn uint64(&mut self, v: u64) -> &mut Self {
        let mut tmp = [0u8; 8];
        BigEndian::write_u64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn string(&mut self, data: &[u8]) -> &mut Self {
        self.uint32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn name_list(&mut self, names: &[String]) -> &mut Self {
        self.string(names.join(",").as_bytes())
    }

    /// Encode `value` (big-endian, unsigned magnitude) as an SSH `mpint`,
    /// prefixing a zero byte iff the high bit of the first byte is set.
    pub fn mpi(&mut self, value: &[u8]) -> &mut Self {
        let mut v = value;
        while v.len() > 1 && v[0] == 0 {
            v = &v[1..];
        }
        if !v.is_empty() && v[0] & 0x80 != 0 {
            let mut padded = Vec::with_capacity(v.len() + 1);
            padded.push(0);
            padded.extend_from_slice(v);
            self.string(&padded)
        } else {
            self.string(v)
        }
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod test {
    use super::{Reader, Writer};

    #[test]
    fn string_round_trips() {
        let mut w = Writer::new();
        w.string(b"ssh-rsa");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.string().unwrap(), b"ssh-rsa");
        assert!(r.is_empty());
    }

    #[test]
    fn name_list_round_trips_ordered() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut w = Writer::new();
        w.name_list(&names);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.name_list().unwrap(), names);
    }

    #[test]
    fn empty_name_list_round_trips() {
        let mut w = Writer::new();
        w.name_list(&[]);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(r.name_list().unwrap().is_empty());
    }

    #[test]
    fn mpi_adds_leading_zero_for_high_bit() {
        let mut w = Writer::new();
        w.mpi(&[0x80, 0x01]);
        let bytes = w.into_bytes();
        // length(4) + leading zero + two value bytes
        assert_eq!(bytes.len(), 4 + 3);
        let mut r = Reader::new(&bytes);
        assert_eq!(r.mpi().unwrap(), vec![0x80, 0x01]);
    }

    #[test]
    fn mpi_omits_leading_zero_when_not_needed() {
        let mut w = Writer::new();
        w.mpi(&[0x7f]);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 4 + 1);
    }
}
