//! MSF 7 multi-stream container decoding.

use std::path::Path;

use anyhow::Context;

use offscope_core::{ExportError, Result};

use crate::parse::Cursor;

const MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";

/// Well-known stream indices.
pub(crate) const STREAM_PDB_INFO: u32 = 1;
pub(crate) const STREAM_TPI: u32 = 2;
pub(crate) const STREAM_DBI: u32 = 3;

/// Parsed MSF container: superblock fields plus the reassembled stream
/// directory. Stream content is copied out of the mapping on demand.
#[derive(Debug)]
pub(crate) struct MsfFile {
    data: memmap2::Mmap,
    block_size: u32,
    streams: Vec<StreamInfo>,
}

#[derive(Debug)]
struct StreamInfo {
    size: u32,
    blocks: Vec<u32>,
}

impl MsfFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let data = unsafe { memmap2::Mmap::map(&file) }
            .with_context(|| format!("cannot memory-map {}", path.display()))?;
        Self::parse(data)
    }

    fn parse(data: memmap2::Mmap) -> Result<Self> {
        let mut cur = Cursor::new(&data);
        let magic = cur.read_bytes(MAGIC.len()).map_err(|_| invalid_superblock())?;
        if magic != MAGIC {
            return Err(invalid_superblock().into());
        }

        let block_size = cur.read_u32()?;
        let free_block_map = cur.read_u32()?;
        let num_blocks = cur.read_u32()?;
        let directory_bytes = cur.read_u32()?;
        let _unknown = cur.read_u32()?;
        let block_map_addr = cur.read_u32()?;

        if !matches!(block_size, 512 | 1024 | 2048 | 4096) {
            return Err(invalid_superblock().into());
        }
        if !matches!(free_block_map, 1 | 2) {
            return Err(ExportError::Format("invalid free block map".into()).into());
        }
        if u64::from(num_blocks) * u64::from(block_size) != data.len() as u64 {
            return Err(invalid_superblock().into());
        }
        if block_map_addr == 0 || block_map_addr >= num_blocks {
            return Err(ExportError::Format("invalid block map".into()).into());
        }

        let directory = Self::read_directory(
            &data,
            block_size,
            num_blocks,
            directory_bytes,
            block_map_addr,
        )?;
        let streams = Self::parse_directory(&directory, block_size, num_blocks)?;

        Ok(Self {
            data,
            block_size,
            streams,
        })
    }

    fn read_directory(
        data: &[u8],
        block_size: u32,
        num_blocks: u32,
        directory_bytes: u32,
        block_map_addr: u32,
    ) -> Result<Vec<u8>> {
        let dir_block_count = directory_bytes.div_ceil(block_size);
        if dir_block_count * 4 > block_size {
            return Err(ExportError::Format("invalid block map".into()).into());
        }

        let map_offset = block_map_addr as usize * block_size as usize;
        let mut map = Cursor::new(
            data.get(map_offset..map_offset + block_size as usize)
                .ok_or_else(|| ExportError::read_past_end("block map"))?,
        );

        let mut directory = Vec::with_capacity(directory_bytes as usize);
        for _ in 0..dir_block_count {
            let block = map.read_u32()?;
            if block >= num_blocks {
                return Err(ExportError::Format("invalid block map".into()).into());
            }
            let start = block as usize * block_size as usize;
            directory.extend_from_slice(&data[start..start + block_size as usize]);
        }
        directory.truncate(directory_bytes as usize);
        Ok(directory)
    }

    fn parse_directory(
        directory: &[u8],
        block_size: u32,
        num_blocks: u32,
    ) -> Result<Vec<StreamInfo>> {
        let mut cur = Cursor::new(directory);
        let stream_count = cur.read_u32()?;

        let mut sizes = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            let size = cur.read_u32()?;
            // A nil stream marker means an absent stream.
            sizes.push(if size == u32::MAX { 0 } else { size });
        }

        let mut streams = Vec::with_capacity(stream_count as usize);
        for size in sizes {
            let block_count = size.div_ceil(block_size);
            let mut blocks = Vec::with_capacity(block_count as usize);
            for _ in 0..block_count {
                let block = cur.read_u32()?;
                if block >= num_blocks {
                    return Err(ExportError::Format("invalid stream".into()).into());
                }
                blocks.push(block);
            }
            streams.push(StreamInfo { size, blocks });
        }
        Ok(streams)
    }

    /// Reassemble one stream's content.
    pub fn stream(&self, index: u32) -> Result<Vec<u8>> {
        let info = self
            .streams
            .get(index as usize)
            .ok_or_else(|| ExportError::Format(format!("invalid stream index {index}")))?;
        let block_size = self.block_size as usize;
        let mut content = Vec::with_capacity(info.size as usize);
        for &block in &info.blocks {
            let start = block as usize * block_size;
            content.extend_from_slice(&self.data[start..start + block_size]);
        }
        content.truncate(info.size as usize);
        Ok(content)
    }
}

fn invalid_superblock() -> ExportError {
    ExportError::Format("invalid superblock".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Minimal two-stream MSF image: superblock in block 0, free block maps
    /// in 1 and 2, block map in 3, directory in 4, stream 1 content in 5.
    fn sample_msf() -> Vec<u8> {
        const BLOCK: usize = 512;
        let mut image = vec![0u8; BLOCK * 6];
        image[..MAGIC.len()].copy_from_slice(MAGIC);
        write_u32(&mut image, 32, 512); // block size
        write_u32(&mut image, 36, 1); // free block map
        write_u32(&mut image, 40, 6); // blocks
        write_u32(&mut image, 44, 20); // directory bytes
        write_u32(&mut image, 52, 3); // block map addr

        // Block map: directory lives in block 4.
        write_u32(&mut image, 3 * BLOCK, 4);

        // Directory: two streams, sizes 0 and 8, stream 1 in block 5.
        let dir = 4 * BLOCK;
        write_u32(&mut image, dir, 2);
        write_u32(&mut image, dir + 4, 0);
        write_u32(&mut image, dir + 8, 8);
        write_u32(&mut image, dir + 12, 5);

        image[5 * BLOCK..5 * BLOCK + 8].copy_from_slice(b"abcdefgh");
        image
    }

    fn parse_bytes(bytes: Vec<u8>) -> Result<MsfFile> {
        let mut map = memmap2::MmapMut::map_anon(bytes.len()).unwrap();
        map.copy_from_slice(&bytes);
        MsfFile::parse(map.make_read_only().unwrap())
    }

    #[test]
    fn reads_streams_from_a_minimal_image() {
        let msf = parse_bytes(sample_msf()).unwrap();
        assert_eq!(msf.stream(1).unwrap(), b"abcdefgh");
        assert!(msf.stream(0).unwrap().is_empty());
        assert!(msf.stream(7).is_err());
    }

    #[test]
    fn rejects_a_bad_magic() {
        let mut image = sample_msf();
        image[0] ^= 0xff;
        let err = parse_bytes(image).unwrap_err();
        assert!(err.to_string().contains("superblock"), "{err}");
    }

    #[test]
    fn rejects_a_bad_block_size() {
        let mut image = sample_msf();
        write_u32(&mut image, 32, 768);
        assert!(parse_bytes(image).is_err());
    }

    #[test]
    fn rejects_a_bad_free_block_map() {
        let mut image = sample_msf();
        write_u32(&mut image, 36, 5);
        let err = parse_bytes(image).unwrap_err();
        assert!(err.to_string().contains("free block map"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_directory_blocks() {
        let mut image = sample_msf();
        write_u32(&mut image, 3 * 512, 99);
        let err = parse_bytes(image).unwrap_err();
        assert!(err.to_string().contains("block map"), "{err}");
    }
}
