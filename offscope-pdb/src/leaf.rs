//! CodeView numeric leaf decoding.
//!
//! A numeric leaf starts with a `u16` kind. Values below [`LF_NUMERIC`]
//! are the value itself; values at or above it select an inline integer of
//! 1/2/4/8 bytes that follows the kind. The inline value is not aligned.

use offscope_core::{ExportError, Result};

pub(crate) const LF_NUMERIC: u16 = 0x8000;
pub(crate) const LF_CHAR: u16 = 0x8000;
pub(crate) const LF_SHORT: u16 = 0x8001;
pub(crate) const LF_USHORT: u16 = 0x8002;
pub(crate) const LF_LONG: u16 = 0x8003;
pub(crate) const LF_ULONG: u16 = 0x8004;
pub(crate) const LF_QUADWORD: u16 = 0x8009;
pub(crate) const LF_UQUADWORD: u16 = 0x800a;

/// Total size of the leaf in bytes, kind word included.
pub(crate) fn leaf_size(kind: u16) -> Result<usize> {
    if kind < LF_NUMERIC {
        return Ok(2);
    }
    let inline = match kind {
        LF_CHAR => 1,
        LF_SHORT | LF_USHORT => 2,
        LF_LONG | LF_ULONG => 4,
        LF_QUADWORD | LF_UQUADWORD => 8,
        _ => {
            return Err(
                ExportError::UnsupportedRecord(format!("numeric leaf kind {kind:#06x}")).into(),
            )
        }
    };
    Ok(2 + inline)
}

/// Read the leaf at the start of `data` as an unsigned value.
pub(crate) fn read_unsigned(data: &[u8]) -> Result<u64> {
    let kind = read_u16(data, 0)?;
    if kind < LF_NUMERIC {
        return Ok(u64::from(kind));
    }
    let value = match kind {
        LF_CHAR => u64::from(*data.get(2).ok_or_else(truncated)?),
        LF_SHORT | LF_USHORT => u64::from(read_u16(data, 2)?),
        LF_LONG | LF_ULONG => {
            let bytes = data.get(2..6).ok_or_else(truncated)?;
            u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        LF_QUADWORD | LF_UQUADWORD => {
            let bytes = data.get(2..10).ok_or_else(truncated)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            u64::from_le_bytes(raw)
        }
        _ => {
            return Err(
                ExportError::UnsupportedRecord(format!("numeric leaf kind {kind:#06x}")).into(),
            )
        }
    };
    Ok(value)
}

/// Slice off the leaf, returning what follows it (usually a name).
pub(crate) fn skip(data: &[u8]) -> Result<&[u8]> {
    let kind = read_u16(data, 0)?;
    let size = leaf_size(kind)?;
    data.get(size..).ok_or_else(|| truncated().into())
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or_else(truncated)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn truncated() -> ExportError {
    ExportError::read_past_end("numeric leaf")
}
