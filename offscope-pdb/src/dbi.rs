//! DBI stream header validation.

use offscope_core::{ExportError, Result};

use crate::parse::Cursor;

const VERSION_SIGNATURE: i32 = -1;

/// Known DBI header versions (VC4.1 through V110).
const KNOWN_VERSIONS: [u32; 5] = [930803, 19960307, 19970606, 19990903, 20091201];

#[derive(Debug)]
pub(crate) struct DbiHeader {
    pub version: u32,
    pub age: u32,
}

impl DbiHeader {
    /// Validate the fixed header; the substreams themselves are not needed
    /// for type extraction.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let signature = cur.read_i32()?;
        if signature != VERSION_SIGNATURE {
            return Err(ExportError::Format("invalid DBI stream signature".into()).into());
        }
        let version = cur.read_u32()?;
        if !KNOWN_VERSIONS.contains(&version) {
            return Err(
                ExportError::Format(format!("unknown DBI stream version {version}")).into(),
            );
        }
        let age = cur.read_u32()?;
        Ok(Self { version, age })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_v70_header() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&19990903u32.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        let header = DbiHeader::parse(&data).unwrap();
        assert_eq!(header.version, 19990903);
        assert_eq!(header.age, 7);
    }

    #[test]
    fn rejects_a_bad_signature() {
        let mut data = Vec::new();
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&19990903u32.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        assert!(DbiHeader::parse(&data).is_err());
    }
}
