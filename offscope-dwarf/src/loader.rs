//! Memory mapping and DWARF section loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use object::{Object, ObjectSection};

use offscope_core::{ExportError, Result};

pub(crate) type Reader = gimli::EndianSlice<'static, gimli::LittleEndian>;

/// Memory mapped input file, kept alive for the backend session.
#[derive(Debug)]
pub(crate) struct MappedFile {
    pub data: memmap2::Mmap,
    pub path: PathBuf,
}

pub(crate) fn map_file(path: &Path) -> Result<MappedFile> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let data = unsafe { memmap2::Mmap::map(&file) }
        .with_context(|| format!("cannot memory-map {}", path.display()))?;
    Ok(MappedFile {
        data,
        path: path.to_path_buf(),
    })
}

/// Parse the object container and wire its DWARF sections into gimli.
///
/// `data` is the mapped file content; the caller guarantees it outlives the
/// returned `Dwarf` by keeping the [`MappedFile`] alive alongside it.
pub(crate) fn load_dwarf(data: &'static [u8]) -> Result<gimli::Dwarf<Reader>> {
    let object = object::File::parse(data)
        .map_err(|e| ExportError::Format(format!("cannot parse object file: {e}")))?;

    if !object.is_little_endian() {
        return Err(ExportError::Format("big-endian objects are not supported".into()).into());
    }
    if object
        .section_by_name(".debug_info")
        .and_then(|s| s.data().ok())
        .map_or(true, |d| d.is_empty())
    {
        return Err(ExportError::Format("object carries no DWARF debug info".into()).into());
    }

    let dwarf = gimli::Dwarf::load(|id| -> std::result::Result<Reader, gimli::Error> {
        let bytes = object
            .section_by_name(id.name())
            .and_then(|section| section.data().ok())
            .unwrap_or(&[]);
        Ok(gimli::EndianSlice::new(bytes, gimli::LittleEndian))
    })?;
    Ok(dwarf)
}
