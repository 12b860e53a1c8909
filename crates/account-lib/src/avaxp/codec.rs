//! Avalanche linear codec: big-endian integers, u32 length-prefixed
//! slices, u16 codec version up front

use crate::{Error, Result};

pub const CODEC_VERSION: u16 = 0;

#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Fixed-size bytes, no prefix
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// u32 length prefix, then the bytes
    pub fn bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.length(bytes.len())?;
        Ok(self.raw(bytes))
    }

    pub fn length(&mut self, len: usize) -> Result<&mut Self> {
        let len = u32::try_from(len)
            .map_err(|_| Error::Serialization(format!("length {} overflows u32", len)))?;
        Ok(self.u32(len))
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::parse(
                field,
                format!("needs {} bytes, {} left", len, self.remaining()),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub fn u16(&mut self, field: &str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    pub fn u32(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub fn u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    /// Element count of a u32-prefixed vector; bounded by what is left
    pub fn count(&mut self, field: &str, min_element: usize) -> Result<usize> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(min_element.max(1)) > self.remaining() {
            return Err(Error::parse(
                field,
                format!("{} elements cannot fit in {} bytes", count, self.remaining()),
            ));
        }
        Ok(count)
    }

    pub fn bytes(&mut self, field: &str) -> Result<&'a [u8]> {
        let len = self.count(field, 1)?;
        self.take(len, field)
    }

    /// Consume a u32 type id, failing unless it equals `expected`
    pub fn type_id(&mut self, field: &str, expected: u32) -> Result<()> {
        let id = self.u32(field)?;
        if id != expected {
            return Err(Error::NotSupported(format!(
                "{} type id {}, expected {}",
                field, id, expected
            )));
        }
        Ok(())
    }

    pub fn finish(&self, field: &str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::parse(field, format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut writer = Writer::new();
        writer.u16(CODEC_VERSION).u32(12).u64(1);
        writer.bytes(b"hi").unwrap();
        let bytes = writer.finish();
        assert_eq!(
            bytes,
            [
                vec![0, 0],
                vec![0, 0, 0, 12],
                vec![0, 0, 0, 0, 0, 0, 0, 1],
                vec![0, 0, 0, 2, b'h', b'i']
            ]
            .concat()
        );

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.u16("version").unwrap(), 0);
        reader.type_id("tx", 12).unwrap();
        assert_eq!(reader.u64("amount").unwrap(), 1);
        assert_eq!(reader.bytes("memo").unwrap(), b"hi");
        reader.finish("tx").unwrap();
    }

    #[test]
    fn test_reader_rejects_bad_counts() {
        let mut reader = Reader::new(&[0xff, 0xff, 0xff, 0xff, 1]);
        assert!(reader.count("outputs", 8).is_err());

        let mut reader = Reader::new(&[0, 0, 0, 9]);
        assert!(matches!(
            reader.type_id("output", 7),
            Err(Error::NotSupported(_))
        ));
    }
}
