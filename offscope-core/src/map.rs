//! Mapping of normalised types onto the scripting-runtime tag set.

use crate::backend::DebugInfoBackend;
use crate::errors::{ExportError, Result};
use crate::model::{Encoding, EnumRepr, PointerKind, TypeKind, TypeRef};
use crate::normalise::{self, ChainOptions, MAX_WRAPPER_DEPTH};

/// Closed set of native types the scripting runtime understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    Void,
    Character,
    Short,
    Integer,
    LongLong,
    Float,
    Double,
    Pointer,
    StringPtr,
    String,
    StringInt,
    ClassPtr,
    Function,
    Structure,
    Vector,
    EHandle,
    EntVars,
    Edict,
}

impl RuntimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeType::Void => "void",
            RuntimeType::Character => "character",
            RuntimeType::Short => "short",
            RuntimeType::Integer => "integer",
            RuntimeType::LongLong => "long long",
            RuntimeType::Float => "float",
            RuntimeType::Double => "double",
            RuntimeType::Pointer => "pointer",
            RuntimeType::StringPtr => "stringptr",
            RuntimeType::String => "string",
            RuntimeType::StringInt => "stringint",
            RuntimeType::ClassPtr => "classptr",
            RuntimeType::Function => "function",
            RuntimeType::Structure => "structure",
            RuntimeType::Vector => "vector",
            RuntimeType::EHandle => "ehandle",
            RuntimeType::EntVars => "entvars",
            RuntimeType::Edict => "edict",
        }
    }

    /// Tags for which signedness is never reported.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            RuntimeType::String | RuntimeType::StringPtr | RuntimeType::StringInt
        )
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a type onto its runtime tag.
///
/// The rules run on the modifier-stripped head; typedefs are preserved so
/// the named-typedef rules (`string_t`, `entvars_t`, `edict_t`) can fire
/// before falling through to the wrapped type.
pub fn map_type<B: DebugInfoBackend + ?Sized>(backend: &B, r: TypeRef) -> Result<RuntimeType> {
    map_layer(backend, r, 0)
}

fn map_layer<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    r: TypeRef,
    depth: usize,
) -> Result<RuntimeType> {
    if depth > MAX_WRAPPER_DEPTH {
        return Err(ExportError::CorruptInput(format!(
            "type classification at {r} exceeds {MAX_WRAPPER_DEPTH} levels"
        ))
        .into());
    }

    let head = normalise::strip_modifiers(backend, r)?;
    match backend.lookup(head)? {
        TypeKind::Void => Ok(RuntimeType::Void),
        TypeKind::Base { encoding, bits, name } => map_base(encoding, bits, &name),
        TypeKind::Typedef { name, inner } => {
            if name == "string_t" {
                Ok(RuntimeType::StringInt)
            } else {
                map_layer(backend, inner, depth + 1)
            }
        }
        TypeKind::Pointer {
            kind: PointerKind::Member,
            ..
        } => Ok(RuntimeType::Function),
        TypeKind::Pointer { pointee, .. } => {
            let pointee = normalise::strip_modifiers(backend, pointee)?;
            Ok(match backend.lookup(pointee)? {
                TypeKind::Typedef { name, .. } if name == "entvars_t" => RuntimeType::EntVars,
                TypeKind::Typedef { name, .. } if name == "edict_t" => RuntimeType::Edict,
                kind if is_char_base(&kind) => RuntimeType::StringPtr,
                TypeKind::Record { name, .. } => match name.as_str() {
                    "entvars_s" => RuntimeType::EntVars,
                    "edict_s" => RuntimeType::Edict,
                    _ if name.starts_with('C') => RuntimeType::ClassPtr,
                    _ => RuntimeType::Pointer,
                },
                TypeKind::Subroutine { .. } => RuntimeType::Function,
                _ => RuntimeType::Pointer,
            })
        }
        TypeKind::Array { element, .. } => {
            let stripped = normalise::strip_wrappers(backend, element)?;
            if is_char_base(&backend.lookup(stripped)?) {
                Ok(RuntimeType::String)
            } else {
                map_layer(backend, element, depth + 1)
            }
        }
        TypeKind::Record { name, .. } => Ok(match name.as_str() {
            "Vector" => RuntimeType::Vector,
            "EHANDLE" => RuntimeType::EHandle,
            _ => RuntimeType::Structure,
        }),
        TypeKind::Enumeration { repr, .. } => match repr {
            EnumRepr::Bits(bits) => integer_by_bits(bits)
                .ok_or_else(|| unsupported_bits("enumeration", bits))
                .map_err(Into::into),
            EnumRepr::Ref(underlying) => map_layer(backend, underlying, depth + 1),
        },
        TypeKind::Subroutine { .. } => Ok(RuntimeType::Function),
        // strip_modifiers already unwrapped these
        TypeKind::Modifier { inner, .. } => map_layer(backend, inner, depth + 1),
        TypeKind::Bitfield { .. } => {
            Err(ExportError::UnsupportedRecord(format!("bitfield member at {head}")).into())
        }
        TypeKind::Unknown { kind } => {
            Err(ExportError::UnsupportedRecord(format!("record kind {kind} at {head}")).into())
        }
    }
}

/// Signedness for the member, if defined.
///
/// Resolves modifiers, typedefs, pointers and arrays down to the innermost
/// head and answers only for plain signed/unsigned integer and char
/// encodings; booleans, wide chars and floats stay undefined.
pub fn signedness<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    r: TypeRef,
) -> Result<Option<bool>> {
    let innermost = normalise::resolve_chain(backend, r, ChainOptions::innermost())?;
    Ok(match backend.lookup(innermost)? {
        TypeKind::Base {
            encoding: Encoding::Signed | Encoding::SignedChar,
            ..
        } => Some(false),
        TypeKind::Base {
            encoding: Encoding::Unsigned | Encoding::UnsignedChar,
            ..
        } => Some(true),
        _ => None,
    })
}

fn is_char_base(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Base {
            encoding: Encoding::SignedChar | Encoding::Ascii,
            bits: 8,
            ..
        }
    )
}

fn map_base(encoding: Encoding, bits: u32, name: &str) -> Result<RuntimeType> {
    let tag = match encoding {
        Encoding::SignedChar | Encoding::UnsignedChar | Encoding::Ascii | Encoding::Boolean => {
            Some(RuntimeType::Character)
        }
        Encoding::Signed | Encoding::Unsigned | Encoding::Ucs | Encoding::Utf => {
            integer_by_bits(bits)
        }
        Encoding::Float => match bits {
            32 => Some(RuntimeType::Float),
            64 => Some(RuntimeType::Double),
            _ => None,
        },
        Encoding::Address => Some(RuntimeType::Pointer),
    };
    tag.ok_or_else(|| unsupported_bits(name, bits)).map_err(Into::into)
}

fn integer_by_bits(bits: u32) -> Option<RuntimeType> {
    match bits {
        8 => Some(RuntimeType::Character),
        16 => Some(RuntimeType::Short),
        32 => Some(RuntimeType::Integer),
        64 => Some(RuntimeType::LongLong),
        _ => None,
    }
}

fn unsupported_bits(what: &str, bits: u32) -> ExportError {
    ExportError::UnsupportedRecord(format!("no runtime tag for {bits}-bit {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestGraph;

    fn base_tag(encoding: Encoding, bits: u32) -> Result<RuntimeType> {
        let mut g = TestGraph::new();
        let b = g.base("b", encoding, bits);
        map_type(&g, b)
    }

    #[test]
    fn base_types_map_by_encoding_and_width() {
        assert_eq!(base_tag(Encoding::Signed, 8).unwrap(), RuntimeType::Character);
        assert_eq!(base_tag(Encoding::Signed, 16).unwrap(), RuntimeType::Short);
        assert_eq!(base_tag(Encoding::Signed, 32).unwrap(), RuntimeType::Integer);
        assert_eq!(base_tag(Encoding::Unsigned, 64).unwrap(), RuntimeType::LongLong);
        assert_eq!(base_tag(Encoding::Float, 32).unwrap(), RuntimeType::Float);
        assert_eq!(base_tag(Encoding::Float, 64).unwrap(), RuntimeType::Double);
        assert_eq!(base_tag(Encoding::Boolean, 8).unwrap(), RuntimeType::Character);
        assert_eq!(base_tag(Encoding::SignedChar, 8).unwrap(), RuntimeType::Character);
        assert_eq!(base_tag(Encoding::Utf, 16).unwrap(), RuntimeType::Short);
        assert_eq!(base_tag(Encoding::Address, 32).unwrap(), RuntimeType::Pointer);
    }

    #[test]
    fn eighty_bit_float_is_unsupported() {
        assert!(base_tag(Encoding::Float, 80).is_err());
    }

    #[test]
    fn char_pointer_is_stringptr() {
        let mut g = TestGraph::new();
        let ch = g.base("char", Encoding::SignedChar, 8);
        let ptr = g.pointer(ch, 4);
        assert_eq!(map_type(&g, ptr).unwrap(), RuntimeType::StringPtr);
    }

    #[test]
    fn char_array_is_string() {
        let mut g = TestGraph::new();
        let ch = g.base("char", Encoding::SignedChar, 8);
        let arr = g.array_upper_bound(ch, 15);
        assert_eq!(map_type(&g, arr).unwrap(), RuntimeType::String);
    }

    #[test]
    fn pointer_to_c_class_is_classptr() {
        let mut g = TestGraph::new();
        let class = g.record("CBaseEntity", false);
        let ptr = g.pointer(class, 4);
        assert_eq!(map_type(&g, ptr).unwrap(), RuntimeType::ClassPtr);
    }

    #[test]
    fn pointer_to_engine_structs() {
        let mut g = TestGraph::new();
        let entvars = g.record("entvars_s", false);
        let edict = g.record("edict_s", false);
        let plain = g.record("link_s", false);
        let p_entvars = g.pointer(entvars, 4);
        let p_edict = g.pointer(edict, 4);
        let p_plain = g.pointer(plain, 4);
        assert_eq!(map_type(&g, p_entvars).unwrap(), RuntimeType::EntVars);
        assert_eq!(map_type(&g, p_edict).unwrap(), RuntimeType::Edict);
        assert_eq!(map_type(&g, p_plain).unwrap(), RuntimeType::Pointer);
    }

    #[test]
    fn pointee_typedef_rules() {
        let mut g = TestGraph::new();
        let entvars = g.record("entvars_s", true);
        let td = g.typedef("entvars_t", entvars);
        let ptr = g.pointer(td, 4);
        assert_eq!(map_type(&g, ptr).unwrap(), RuntimeType::EntVars);
    }

    #[test]
    fn string_t_typedef_is_stringint() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        let td = g.typedef("string_t", int);
        assert_eq!(map_type(&g, td).unwrap(), RuntimeType::StringInt);
    }

    #[test]
    fn other_typedefs_recurse() {
        let mut g = TestGraph::new();
        let f = g.base("float", Encoding::Float, 32);
        let td = g.typedef("vec_t", f);
        assert_eq!(map_type(&g, td).unwrap(), RuntimeType::Float);
    }

    #[test]
    fn named_records() {
        let mut g = TestGraph::new();
        let vector = g.record("Vector", false);
        let ehandle = g.record("EHANDLE", false);
        let other = g.record("plane_t", false);
        assert_eq!(map_type(&g, vector).unwrap(), RuntimeType::Vector);
        assert_eq!(map_type(&g, ehandle).unwrap(), RuntimeType::EHandle);
        assert_eq!(map_type(&g, other).unwrap(), RuntimeType::Structure);
    }

    #[test]
    fn function_pointers_and_subroutines() {
        let mut g = TestGraph::new();
        let subr = g.subroutine(None, vec![]);
        let fptr = g.pointer(subr, 4);
        let pmf = g.member_pointer(subr, 4);
        assert_eq!(map_type(&g, fptr).unwrap(), RuntimeType::Function);
        assert_eq!(map_type(&g, pmf).unwrap(), RuntimeType::Function);
        assert_eq!(map_type(&g, subr).unwrap(), RuntimeType::Function);
    }

    #[test]
    fn enums_map_by_underlying_width() {
        let mut g = TestGraph::new();
        let e8 = g.enum_bits("flags8_t", 8);
        let e32 = g.enum_bits("state_t", 32);
        let int = g.base("int", Encoding::Signed, 32);
        let er = g.enum_ref("kind_t", int);
        assert_eq!(map_type(&g, e8).unwrap(), RuntimeType::Character);
        assert_eq!(map_type(&g, e32).unwrap(), RuntimeType::Integer);
        assert_eq!(map_type(&g, er).unwrap(), RuntimeType::Integer);
    }

    #[test]
    fn modifiers_are_transparent() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        let konst = g.modifier(crate::model::Qualifiers::const_only(), int);
        assert_eq!(map_type(&g, konst).unwrap(), RuntimeType::Integer);
    }

    #[test]
    fn signedness_follows_innermost_encoding() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        let uns = g.base("unsigned", Encoding::Unsigned, 32);
        let boolean = g.base("bool", Encoding::Boolean, 8);
        let ptr = g.pointer(int, 4);
        assert_eq!(signedness(&g, int).unwrap(), Some(false));
        assert_eq!(signedness(&g, uns).unwrap(), Some(true));
        assert_eq!(signedness(&g, boolean).unwrap(), None);
        // Resolves through pointers to the innermost builtin.
        assert_eq!(signedness(&g, ptr).unwrap(), Some(false));
    }

    #[test]
    fn signedness_of_class_pointers_is_undefined() {
        let mut g = TestGraph::new();
        let class = g.record("CBaseEntity", false);
        let ptr = g.pointer(class, 4);
        assert_eq!(signedness(&g, ptr).unwrap(), None);
    }
}
