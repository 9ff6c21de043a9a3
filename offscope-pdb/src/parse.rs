//! Bounds-checked little-endian cursor over a byte stream.

use offscope_core::{ExportError, Result};

/// Sequential reader with explicit bounds checking. All multi-byte reads are
/// little-endian and safe on unaligned positions.
#[derive(Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(ExportError::read_past_end("stream").into());
        }
        self.position += count;
        Ok(())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(ExportError::read_past_end("stream").into());
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// NUL-terminated string; the terminator is consumed.
    pub fn read_cstr(&mut self) -> Result<String> {
        let rest = &self.data[self.position..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ExportError::read_past_end("string"))?;
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.position += end + 1;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let mut cur = Cursor::new(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(cur.read_u16().unwrap(), 0x0201);
        assert_eq!(cur.read_u8().unwrap(), 0x03);
        assert_eq!(cur.remaining(), 2);
        assert!(cur.read_u32().is_err());
    }

    #[test]
    fn cstr_stops_at_nul() {
        let mut cur = Cursor::new(b"name\0rest");
        assert_eq!(cur.read_cstr().unwrap(), "name");
        assert_eq!(cur.position(), 5);
    }
}
