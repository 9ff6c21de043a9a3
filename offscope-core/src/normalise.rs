//! Pure helpers that strip wrapper chains and compute array extents.

use crate::backend::DebugInfoBackend;
use crate::errors::{ExportError, Result};
use crate::model::{ArrayExtent, TypeKind, TypeRef};

/// Wrapper chains in well-formed debug info are short; anything deeper than
/// this is treated as a cycle.
pub const MAX_WRAPPER_DEPTH: usize = 64;

/// Which wrapper layers [`resolve_chain`] unwraps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainOptions {
    pub modifiers: bool,
    pub typedefs: bool,
    pub pointers: bool,
    pub arrays: bool,
}

impl ChainOptions {
    /// Modifier and typedef wrappers only.
    pub fn wrappers() -> Self {
        Self {
            modifiers: true,
            typedefs: true,
            ..Self::default()
        }
    }

    /// Everything down to the innermost head, pointers and arrays included.
    pub fn innermost() -> Self {
        Self {
            modifiers: true,
            typedefs: true,
            pointers: true,
            arrays: true,
        }
    }
}

/// Repeatedly unwrap the selected layers until the head is none of them.
///
/// Well-formed chains stay far below [`MAX_WRAPPER_DEPTH`]; hitting the
/// bound means the graph contains a cycle.
pub fn resolve_chain<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    r: TypeRef,
    opts: ChainOptions,
) -> Result<TypeRef> {
    let mut cur = r;
    for _ in 0..MAX_WRAPPER_DEPTH {
        cur = match backend.lookup(cur)? {
            TypeKind::Modifier { inner, .. } if opts.modifiers => inner,
            TypeKind::Typedef { inner, .. } if opts.typedefs => inner,
            TypeKind::Pointer { pointee, .. } if opts.pointers => pointee,
            TypeKind::Array { element, .. } if opts.arrays => element,
            _ => return Ok(cur),
        };
    }
    Err(ExportError::CorruptInput(format!(
        "wrapper chain at {r} exceeds {MAX_WRAPPER_DEPTH} levels"
    ))
    .into())
}

/// Strip modifier wrappers only.
pub fn strip_modifiers<B: DebugInfoBackend + ?Sized>(backend: &B, r: TypeRef) -> Result<TypeRef> {
    resolve_chain(
        backend,
        r,
        ChainOptions {
            modifiers: true,
            ..ChainOptions::default()
        },
    )
}

/// Strip modifier and typedef wrappers.
pub fn strip_wrappers<B: DebugInfoBackend + ?Sized>(backend: &B, r: TypeRef) -> Result<TypeRef> {
    resolve_chain(backend, r, ChainOptions::wrappers())
}

/// Element count of the array record behind `array`.
///
/// The caller passes the array head itself (wrappers already stripped). An
/// unknown or zero extent is corrupt input, never a silent zero.
pub fn array_element_count<B: DebugInfoBackend + ?Sized>(
    backend: &B,
    array: TypeRef,
) -> Result<u64> {
    match backend.lookup(array)? {
        TypeKind::Array { element, extent } => match extent {
            Some(ArrayExtent::UpperBound(upper)) => Ok(upper + 1),
            Some(ArrayExtent::ByteSize(total)) if total > 0 => {
                let element_size = backend.byte_size(element)?;
                if element_size == 0 {
                    return Err(ExportError::CorruptInput(format!(
                        "array {array} has zero-sized element"
                    ))
                    .into());
                }
                Ok(total / element_size)
            }
            Some(ArrayExtent::ByteSize(_)) | None => Err(ExportError::CorruptInput(format!(
                "array {array} has no known extent"
            ))
            .into()),
        },
        other => Err(ExportError::CorruptInput(format!(
            "expected an array record at {array}, found {other:?}"
        ))
        .into()),
    }
}
