//! Backend-agnostic core of the class layout exporter.
//!
//! Debug formats describe types as a graph of records connected by reference
//! indices. This crate walks that graph through the [`DebugInfoBackend`]
//! abstraction and turns the classes on an allow-list into
//! [`ClassDefinition`] records: base class, members with byte offsets, C
//! spellings and scripting-runtime type tags, and the ordered v-table.

pub mod backend;
pub mod class_list;
pub mod emit;
pub mod errors;
pub mod extract;
pub mod map;
pub mod model;
pub mod normalise;
pub mod spell;

pub use backend::{ClassHandle, DebugInfoBackend};
pub use class_list::read_class_list;
pub use emit::Document;
pub use errors::{ExportError, Result};
pub use extract::{ClassExtractor, ExtractOptions};
pub use map::RuntimeType;
pub use model::{
    ArrayExtent, ClassDefinition, Encoding, EnumRepr, Field, PointerKind, Qualifiers, RawMember,
    RawVirtualMethod, TypeKind, TypeRef, VTableEntry,
};

#[cfg(test)]
pub(crate) mod testutil;
