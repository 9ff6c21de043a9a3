//! Core data types shared by the backends and the extractor.

use std::fmt;

/// Opaque handle into a backend's type graph.
///
/// Equality and hashing follow the backend's identity semantics: the DWARF
/// backend uses global `.debug_info` offsets, the PDB backend uses TPI type
/// indices. Handles are only meaningful for the backend session that issued
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub u64);

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Base-type interpretation of the underlying bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Signed,
    Unsigned,
    SignedChar,
    UnsignedChar,
    Boolean,
    Float,
    Ascii,
    Ucs,
    Utf,
    Address,
}

/// Set of cv-style qualifiers carried by one modifier or pointer record.
///
/// A CodeView `LF_MODIFIER` combines flags in a single record; DWARF chains
/// one wrapper DIE per flag, each populating a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
    pub is_unaligned: bool,
}

impl Qualifiers {
    pub const fn none() -> Self {
        Self {
            is_const: false,
            is_volatile: false,
            is_restrict: false,
            is_unaligned: false,
        }
    }

    pub const fn const_only() -> Self {
        Self {
            is_const: true,
            is_volatile: false,
            is_restrict: false,
            is_unaligned: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_volatile || self.is_restrict || self.is_unaligned)
    }

    /// Declarator prefix, e.g. `"const volatile "`. Empty when no flag is set.
    pub fn spell_prefix(&self) -> String {
        let mut out = String::new();
        for (set, word) in [
            (self.is_const, "const "),
            (self.is_volatile, "volatile "),
            (self.is_restrict, "restrict "),
            (self.is_unaligned, "unaligned "),
        ] {
            if set {
                out.push_str(word);
            }
        }
        out
    }
}

/// Flavour of a pointer-like record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Raw,
    Reference,
    RvalueReference,
    /// Pointer to member (data or function).
    Member,
}

/// How an array record describes its extent.
///
/// PDB arrays carry a total byte size; DWARF arrays carry the subrange upper
/// bound. `None` at the use site means the extent is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayExtent {
    ByteSize(u64),
    UpperBound(u64),
}

/// Underlying representation of an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRepr {
    Ref(TypeRef),
    Bits(u32),
}

/// Classified view of one type record.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Base {
        name: String,
        encoding: Encoding,
        bits: u32,
    },
    Modifier {
        quals: Qualifiers,
        inner: TypeRef,
    },
    Typedef {
        name: String,
        inner: TypeRef,
    },
    Pointer {
        pointee: TypeRef,
        kind: PointerKind,
        /// Width in bytes; 0 when the record does not state one.
        width: u32,
        quals: Qualifiers,
    },
    Array {
        element: TypeRef,
        extent: Option<ArrayExtent>,
    },
    /// Class, struct or union.
    Record {
        name: String,
        forward: bool,
    },
    Enumeration {
        name: String,
        repr: EnumRepr,
    },
    /// Plain or member function signature.
    Subroutine {
        ret: Option<TypeRef>,
        params: Vec<TypeRef>,
    },
    Bitfield {
        inner: TypeRef,
        width: u32,
    },
    /// Record kind the backend has no classification for. Spelled as
    /// `unk_<kind>`; the mapper rejects it.
    Unknown {
        kind: String,
    },
}

/// Raw member descriptor as yielded by a backend, in layout order.
#[derive(Debug, Clone)]
pub struct RawMember {
    pub name: String,
    /// Byte offset within the enclosing class; `None` for static members.
    pub offset: Option<u64>,
    pub type_ref: TypeRef,
    pub artificial: bool,
}

/// Virtual method descriptor as yielded by a backend.
///
/// Backends only yield introducing methods; overrides reuse a slot and are
/// filtered out at the source.
#[derive(Debug, Clone)]
pub struct RawVirtualMethod {
    pub name: String,
    pub link_name: Option<String>,
    pub slot: u64,
    pub introducing: bool,
}

/// One emitted data member.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub offset: u64,
    pub array_size: Option<u64>,
    pub spelling: String,
    pub runtime_type: crate::map::RuntimeType,
    pub unsigned: Option<bool>,
}

/// One emitted v-table entry.
#[derive(Debug, Clone)]
pub struct VTableEntry {
    pub name: String,
    pub link_name: Option<String>,
    pub index: u64,
}

/// Fully assembled description of one class.
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    pub name: String,
    pub base_class: Option<String>,
    pub fields: Vec<Field>,
    pub vtable: Vec<VTableEntry>,
}
