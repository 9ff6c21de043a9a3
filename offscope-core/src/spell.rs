//! Canonical C-style spelling of a type attached to a declarator.

use crate::backend::DebugInfoBackend;
use crate::errors::{ExportError, Result};
use crate::model::{PointerKind, TypeKind, TypeRef};
use crate::normalise::{self, MAX_WRAPPER_DEPTH};

/// Spell `r` as the type of `declarator`, following C's declarator syntax.
///
/// The declarator accumulates pointer/reference decoration, qualifiers and
/// array extents while unwrapping; a named leaf (base, record, enumeration,
/// typedef) terminates the recursion as `"<leaf> <declarator>"`. Unknown
/// record kinds spell as `unk_<kind>` instead of failing, so the emitter
/// never crashes on exotic input; classification decides acceptability.
pub fn spell_type<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    r: TypeRef,
    declarator: &str,
) -> Result<String> {
    spell_layer(backend, r, declarator.to_string(), 0)
}

fn join_leaf(leaf: &str, declarator: &str) -> String {
    if declarator.is_empty() {
        leaf.to_string()
    } else {
        format!("{leaf} {declarator}")
    }
}

fn spell_layer<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    r: TypeRef,
    declarator: String,
    depth: usize,
) -> Result<String> {
    if depth > MAX_WRAPPER_DEPTH {
        return Err(ExportError::CorruptInput(format!(
            "type spelling at {r} exceeds {MAX_WRAPPER_DEPTH} levels"
        ))
        .into());
    }

    match backend.lookup(r)? {
        TypeKind::Void => Ok(join_leaf("void", &declarator)),
        TypeKind::Base { name, .. }
        | TypeKind::Record { name, .. }
        | TypeKind::Enumeration { name, .. }
        | TypeKind::Typedef { name, .. } => Ok(join_leaf(&name, &declarator)),
        TypeKind::Modifier { quals, inner } => {
            let wrapped = format!("{}{declarator}", quals.spell_prefix());
            spell_layer(backend, inner, wrapped, depth + 1)
        }
        TypeKind::Pointer {
            pointee,
            kind,
            quals,
            ..
        } => {
            let decoration = match kind {
                PointerKind::Raw => "*",
                PointerKind::Reference => "&",
                PointerKind::RvalueReference => "&&",
                PointerKind::Member => "__member_func *",
            };
            let wrapped = format!("{decoration}{}{declarator}", quals.spell_prefix());
            spell_layer(backend, pointee, wrapped, depth + 1)
        }
        TypeKind::Array { element, .. } => {
            // The speller tolerates an unknown extent; positions where a
            // count is demanded go through the normaliser instead.
            let extent = match normalise::array_element_count(backend, r) {
                Ok(count) => format!("[{count}]"),
                Err(_) => "[]".to_string(),
            };
            spell_layer(backend, element, format!("{declarator}{extent}"), depth + 1)
        }
        TypeKind::Subroutine { ret, params } => {
            let ret_spelling = match ret {
                Some(ret) => spell_layer(backend, ret, String::new(), depth + 1)?,
                None => "void".to_string(),
            };
            let mut args = Vec::with_capacity(params.len());
            for param in params {
                args.push(spell_layer(backend, param, String::new(), depth + 1)?);
            }
            Ok(format!("{ret_spelling} ({declarator})({})", args.join(", ")))
        }
        TypeKind::Bitfield { inner, .. } => spell_layer(backend, inner, declarator, depth + 1),
        TypeKind::Unknown { kind } => Ok(join_leaf(&format!("unk_{kind}"), &declarator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Encoding, Qualifiers};
    use crate::testutil::TestGraph;

    #[test]
    fn primitive_member() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        assert_eq!(spell_type(&g, int, "count").unwrap(), "int count");
    }

    #[test]
    fn bare_type_has_no_trailing_space() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        assert_eq!(spell_type(&g, int, "").unwrap(), "int");
    }

    #[test]
    fn char_array() {
        let mut g = TestGraph::new();
        let ch = g.base("char", Encoding::SignedChar, 8);
        let arr = g.array_upper_bound(ch, 15);
        assert_eq!(spell_type(&g, arr, "name").unwrap(), "char name[16]");
    }

    #[test]
    fn array_with_unknown_extent() {
        let mut g = TestGraph::new();
        let ch = g.base("char", Encoding::SignedChar, 8);
        let arr = g.array_unknown(ch);
        assert_eq!(spell_type(&g, arr, "buf").unwrap(), "char buf[]");
    }

    #[test]
    fn pointer_to_class() {
        let mut g = TestGraph::new();
        let class = g.record("CBaseEntity", false);
        let ptr = g.pointer(class, 4);
        assert_eq!(
            spell_type(&g, ptr, "m_pOwner").unwrap(),
            "CBaseEntity *m_pOwner"
        );
    }

    #[test]
    fn typedef_terminates_spelling() {
        let mut g = TestGraph::new();
        let int = g.base("int", Encoding::Signed, 32);
        let td = g.typedef("string_t", int);
        assert_eq!(spell_type(&g, td, "m_iName").unwrap(), "string_t m_iName");
    }

    #[test]
    fn const_pointer_to_const_char() {
        let mut g = TestGraph::new();
        let ch = g.base("char", Encoding::SignedChar, 8);
        let const_char = g.modifier(Qualifiers::const_only(), ch);
        let ptr = g.pointer_with_quals(const_char, 4, Qualifiers::const_only());
        assert_eq!(spell_type(&g, ptr, "p").unwrap(), "char const *const p");
    }

    #[test]
    fn reference_spelling() {
        let mut g = TestGraph::new();
        let class = g.record("Vector", false);
        let re = g.reference(class, 4);
        assert_eq!(spell_type(&g, re, "origin").unwrap(), "Vector &origin");
    }

    #[test]
    fn member_function_pointer() {
        let mut g = TestGraph::new();
        let void_ref = g.void();
        let int = g.base("int", Encoding::Signed, 32);
        let subr = g.subroutine(Some(void_ref), vec![int]);
        let pmf = g.member_pointer(subr, 4);
        assert_eq!(
            spell_type(&g, pmf, "m_pfnThink").unwrap(),
            "void (__member_func *m_pfnThink)(int)"
        );
    }

    #[test]
    fn unknown_record_spelling() {
        let mut g = TestGraph::new();
        let unk = g.unknown("vtshape");
        assert_eq!(spell_type(&g, unk, "x").unwrap(), "unk_vtshape x");
    }
}
