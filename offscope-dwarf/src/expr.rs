//! Interpreters for the two location-expression shapes the exporter needs.

use gimli::Reader as _;

use offscope_core::{ExportError, Result};

/// Evaluate a `DW_AT_data_member_location` exprloc to a constant offset.
/// Supports the common single-operation patterns (`DW_OP_constu`,
/// `DW_OP_consts`, `DW_OP_plus_uconst`) with no trailing operations.
pub(crate) fn const_member_offset(bytes: &[u8]) -> Option<u64> {
    let mut rdr = gimli::EndianSlice::new(bytes, gimli::LittleEndian);
    let op = rdr.read_u8().ok()?;
    let value = if op == gimli::constants::DW_OP_constu.0 || op == gimli::constants::DW_OP_plus_uconst.0
    {
        rdr.read_uleb128().ok()?
    } else if op == gimli::constants::DW_OP_consts.0 {
        let signed = rdr.read_sleb128().ok()?;
        if signed < 0 {
            return None;
        }
        signed as u64
    } else {
        return None;
    };
    rdr.slice().is_empty().then_some(value)
}

/// Evaluate a `DW_AT_vtable_elem_location` exprloc to a slot index.
/// The expression must be a single `DW_OP_constu`; anything else is an
/// unsupported record.
pub(crate) fn vtable_slot(bytes: &[u8]) -> Result<u64> {
    let mut rdr = gimli::EndianSlice::new(bytes, gimli::LittleEndian);
    let op = rdr
        .read_u8()
        .map_err(|_| ExportError::CorruptInput("empty v-table location expression".into()))?;
    if op != gimli::constants::DW_OP_constu.0 {
        return Err(ExportError::UnsupportedRecord(format!(
            "v-table location opcode {op:#04x}"
        ))
        .into());
    }
    let slot = rdr
        .read_uleb128()
        .map_err(|_| ExportError::CorruptInput("truncated v-table location expression".into()))?;
    if !rdr.slice().is_empty() {
        return Err(ExportError::UnsupportedRecord(
            "v-table location expression has trailing operations".into(),
        )
        .into());
    }
    Ok(slot)
}
