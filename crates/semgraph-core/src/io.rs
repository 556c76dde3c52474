//! Little-endian binary stream primitives.
//!
//! Shared by the string table, filter files and the graph codec in
//! semgraph-storage, so every on-disk structure uses the same integer and
//! string encoding.

use std::io::{self, Read, Write};

/// Writes fixed-width little-endian integers and length-prefixed strings.
pub struct BinaryWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        BinaryWriter { inner }
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_all(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    /// Raw bytes with no length prefix (tags, pre-sized payloads).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    /// `u32` byte length followed by the UTF-8 bytes.
    pub fn write_str(&mut self, value: &str) -> io::Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
        self.write_u32(len)?;
        self.inner.write_all(value.as_bytes())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads what [`BinaryWriter`] writes.
pub struct BinaryReader<R: Read> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        BinaryReader { inner }
    }

    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Reads exactly `len` bytes without trusting `len` for the allocation.
    pub fn read_bytes(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, stream ended after {}", len, buf.len()),
            ));
        }
        Ok(buf)
    }

    pub fn read_str(&mut self) -> io::Result<String> {
        let len = self.read_u32()?;
        let bytes = self.read_bytes(u64::from(len))?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Consumes `tag.len()` bytes and fails with `InvalidData` unless they
    /// equal `tag`.
    pub fn expect_tag(&mut self, tag: &[u8]) -> io::Result<()> {
        let found = self.read_bytes(tag.len() as u64)?;
        if found != tag {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "expected tag {:?}, found {:?}",
                    String::from_utf8_lossy(tag),
                    String::from_utf8_lossy(&found)
                ),
            ));
        }
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let mut w = BinaryWriter::new(Vec::new());
        w.write_u16(0x0102).unwrap();
        w.write_u32(0x0304_0506).unwrap();
        assert_eq!(w.into_inner(), vec![0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);
    }

    #[test]
    fn mixed_values_read_back() {
        let mut w = BinaryWriter::new(Vec::new());
        w.write_u8(7).unwrap();
        w.write_u64(u64::MAX).unwrap();
        w.write_i64(-42).unwrap();
        w.write_str("héllo").unwrap();
        let mut r = BinaryReader::new(Cursor::new(w.into_inner()));
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
        assert_eq!(r.read_i64().unwrap(), -42);
        assert_eq!(r.read_str().unwrap(), "héllo");
    }

    #[test]
    fn short_payload_is_eof() {
        let mut r = BinaryReader::new(Cursor::new(vec![1, 2, 3]));
        let err = r.read_bytes(10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn wrong_tag_is_invalid_data() {
        let mut r = BinaryReader::new(Cursor::new(b"NOPE".to_vec()));
        let err = r.expect_tag(b"STRT").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
