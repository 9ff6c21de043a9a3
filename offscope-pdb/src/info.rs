//! PDB info stream: header, named stream map, feature codes.

use offscope_core::{ExportError, Result};

use crate::parse::Cursor;

const VERSION_VC70: u32 = 20000404;
const VERSION_VC80: u32 = 20030901;
const VERSION_VC110: u32 = 20091201;
const VERSION_VC140: u32 = 20140508;

/// Feature code written by /DEBUG:FASTLINK links.
const FEATURE_MINIMAL_DEBUG_INFO: u32 = 0x494E494D;

#[derive(Debug)]
pub(crate) struct InfoStream {
    pub version: u32,
    pub signature: u32,
    pub age: u32,
    pub guid: [u8; 16],
    features: Vec<u32>,
}

impl InfoStream {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let version = cur.read_u32()?;
        if !matches!(
            version,
            VERSION_VC70 | VERSION_VC80 | VERSION_VC110 | VERSION_VC140
        ) {
            return Err(ExportError::Format(format!(
                "unknown info stream version {version}"
            ))
            .into());
        }
        let signature = cur.read_u32()?;
        let age = cur.read_u32()?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(cur.read_bytes(16)?);

        skip_named_stream_map(&mut cur)?;

        // Whatever follows the named stream map is the feature code list.
        let mut features = Vec::new();
        while cur.remaining() >= 4 {
            features.push(cur.read_u32()?);
        }

        Ok(Self {
            version,
            signature,
            age,
            guid,
            features,
        })
    }

    pub fn uses_fastlink(&self) -> bool {
        self.features.contains(&FEATURE_MINIMAL_DEBUG_INFO)
    }

    pub fn guid_string(&self) -> String {
        let g = &self.guid;
        format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            g[3], g[2], g[1], g[0], g[5], g[4], g[7], g[6],
            g[8], g[9], g[10], g[11], g[12], g[13], g[14], g[15]
        )
    }
}

/// Skip the serialized name table: string buffer, then a hash table of
/// (offset, stream index) pairs with two bit vectors.
fn skip_named_stream_map(cur: &mut Cursor<'_>) -> Result<()> {
    let string_bytes = cur.read_u32()?;
    cur.skip(string_bytes as usize)?;

    let entry_count = cur.read_u32()?;
    let _capacity = cur.read_u32()?;
    skip_bit_vector(cur)?; // present
    skip_bit_vector(cur)?; // deleted
    cur.skip(entry_count as usize * 8)?;
    Ok(())
}

fn skip_bit_vector(cur: &mut Cursor<'_>) -> Result<()> {
    let words = cur.read_u32()?;
    cur.skip(words as usize * 4)
}
