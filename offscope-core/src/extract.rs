//! Drives normalisation, spelling and mapping for every allow-listed class.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::backend::{ClassHandle, DebugInfoBackend};
use crate::errors::{ExportError, Result};
use crate::map::{self, RuntimeType};
use crate::model::{ClassDefinition, Field, TypeKind, VTableEntry};
use crate::{normalise, spell};

/// Extraction knobs that differ between the two front-ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Rewrite `integer` members whose names mark interned strings
    /// (`m_str*`, `m_isz*`, ...) as `stringint`. Enabled by the PDB driver
    /// only; DWARF keeps the `string_t` typedef, which the mapper catches
    /// directly.
    pub string_intern_heuristic: bool,
}

/// Streams class definitions out of a backend, one allow-listed class at a
/// time. Owns the allow-list and the already-emitted set; there is no
/// process-wide state.
pub struct ClassExtractor {
    allow_list: HashSet<String>,
    processed: HashSet<String>,
    options: ExtractOptions,
}

impl ClassExtractor {
    pub fn new(allow_list: HashSet<String>, options: ExtractOptions) -> Self {
        Self {
            allow_list,
            processed: HashSet::new(),
            options,
        }
    }

    /// Single streaming pass over the backend's class enumeration.
    ///
    /// Duplicate names silently collapse to the first definition; every
    /// other failure aborts the run.
    pub fn extract_all<B: DebugInfoBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<Vec<ClassDefinition>> {
        let mut definitions = Vec::new();
        for class in backend.classes() {
            if backend.is_forward_declaration(class)? {
                continue;
            }
            let name = backend.class_name(class)?;
            if !self.allow_list.contains(&name) {
                continue;
            }
            if !self.processed.insert(name.clone()) {
                debug!("class {name} already extracted, skipping duplicate");
                continue;
            }
            let definition = self.extract_class(backend, class, name)?;
            info!(
                "class {}: {} fields, {} v-table entries",
                definition.name,
                definition.fields.len(),
                definition.vtable.len()
            );
            definitions.push(definition);
        }
        Ok(definitions)
    }

    fn extract_class<B: DebugInfoBackend + ?Sized>(
        &self,
        backend: &B,
        class: ClassHandle,
        name: String,
    ) -> Result<ClassDefinition> {
        let base_class = match backend.base_classes(class)?.first() {
            Some(&base) => {
                let definition = backend.resolve_forward(base)?;
                match backend.lookup(definition)? {
                    TypeKind::Record { name, .. } => Some(name),
                    other => {
                        return Err(ExportError::UnsupportedRecord(format!(
                            "base of {name} resolves to {other:?}"
                        ))
                        .into())
                    }
                }
            }
            None => None,
        };

        let mut fields = Vec::new();
        for member in backend.members(class)? {
            if member.artificial {
                continue;
            }
            let Some(offset) = member.offset else {
                // Static member, not part of the layout.
                continue;
            };

            let mut spelling = spell::spell_type(backend, member.type_ref, &member.name)?;
            let mut tag = map::map_type(backend, member.type_ref)?;
            if self.options.string_intern_heuristic
                && tag == RuntimeType::Integer
                && is_interned_string_name(&member.name)
            {
                tag = RuntimeType::StringInt;
                spelling = format!("string_t {}", member.name);
            }

            let head = normalise::strip_wrappers(backend, member.type_ref)?;
            let array_size = match backend.lookup(head)? {
                TypeKind::Array { .. } => Some(normalise::array_element_count(backend, head)?),
                _ => None,
            };

            let unsigned = if tag.is_string_like() {
                None
            } else {
                map::signedness(backend, member.type_ref)?
            };

            debug!("  [{offset:#06x}] {spelling} -> {tag}");
            fields.push(Field {
                name: member.name,
                offset,
                array_size,
                spelling,
                runtime_type: tag,
                unsigned,
            });
        }

        let mut vtable: Vec<VTableEntry> = backend
            .virtual_methods(class)?
            .into_iter()
            .filter(|method| method.introducing)
            .map(|method| VTableEntry {
                name: method.name,
                link_name: method.link_name,
                index: method.slot,
            })
            .collect();
        // Emit in slot order; the stable sort keeps backend order on ties.
        vtable.sort_by_key(|entry| entry.index);

        Ok(ClassDefinition {
            name,
            base_class,
            fields,
            vtable,
        })
    }
}

/// Member names the reference code base uses for interned engine strings.
fn is_interned_string_name(name: &str) -> bool {
    name.starts_with("m_str")
        || name.starts_with("m_isz")
        || name == "m_sMaster"
        || name == "m_globalstate"
        || name == "m_altName"
}
