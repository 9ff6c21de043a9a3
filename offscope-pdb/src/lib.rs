//! PDB backend: reads class layouts out of a Microsoft PDB 7 file.
//!
//! Decodes the MSF multi-stream container, validates the info and DBI
//! streams, walks the TPI type records and exposes them through the
//! [`offscope_core::DebugInfoBackend`] contract. Type references are TPI
//! type indices; indices below the TPI first-index form the builtin
//! partition.

pub(crate) mod dbi;
pub(crate) mod info;
pub(crate) mod leaf;
pub(crate) mod msf;
pub(crate) mod parse;
pub(crate) mod records;
pub(crate) mod tpi;

mod backend;

pub use backend::PdbBackend;
