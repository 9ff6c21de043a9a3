//! Uniform reader interface over one debug format.

use crate::errors::Result;
use crate::model::{RawMember, RawVirtualMethod, TypeKind, TypeRef};

/// Handle to a class-like definition record. Shares the [`TypeRef`] identity
/// space of the issuing backend.
pub type ClassHandle = TypeRef;

/// Abstract reader over one debug format.
///
/// Two implementations exist (DWARF over ELF shared objects, PDB over MSF
/// containers); both expose the same type-graph contract so the normaliser,
/// speller, mapper and extractor stay format-agnostic.
///
/// All graph state lives for the duration of one backend session; handles
/// are invalidated when the backend is dropped.
pub trait DebugInfoBackend {
    /// Enumerate class-like definition records in the backend's natural
    /// order. Forward-declaration records are not yielded.
    fn classes(&self) -> Box<dyn Iterator<Item = ClassHandle> + '_>;

    fn class_name(&self, class: ClassHandle) -> Result<String>;

    fn is_forward_declaration(&self, class: ClassHandle) -> Result<bool>;

    /// Raw member descriptors in layout order. Static members are reported
    /// with `offset: None`.
    fn members(&self, class: ClassHandle) -> Result<Vec<RawMember>>;

    /// Non-virtual base class references, in declaration order.
    fn base_classes(&self, class: ClassHandle) -> Result<Vec<TypeRef>>;

    /// Introducing virtual methods with their v-table slot indices, in the
    /// backend's natural order.
    fn virtual_methods(&self, class: ClassHandle) -> Result<Vec<RawVirtualMethod>>;

    /// Classify the record behind a handle.
    fn lookup(&self, r: TypeRef) -> Result<TypeKind>;

    /// Size of the referenced type in bytes, or an error when unknown.
    fn byte_size(&self, r: TypeRef) -> Result<u64>;

    /// For a forward-declared class or struct, find a same-named non-forward
    /// definition. Returns the argument unchanged when none exists.
    fn resolve_forward(&self, r: TypeRef) -> Result<TypeRef>;

    /// Whether the handle lies in the backend's builtin partition.
    fn is_builtin_ref(&self, r: TypeRef) -> bool;
}
