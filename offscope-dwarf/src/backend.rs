//! `DebugInfoBackend` over the DIE tree of a shared object.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use gimli::AttributeValue;
use tracing::{debug, info};

use offscope_core::{
    ArrayExtent, ClassHandle, DebugInfoBackend, Encoding, EnumRepr, ExportError, PointerKind,
    Qualifiers, RawMember, RawVirtualMethod, Result, TypeKind, TypeRef,
};

use crate::expr;
use crate::loader::{self, MappedFile, Reader};

/// Reserved handle for the builtin `void`; every other handle is a global
/// `.debug_info` offset.
const VOID_REF: TypeRef = TypeRef(u64::MAX);

struct UnitData {
    /// Start of the unit in `.debug_info`.
    offset: u64,
    /// Unit length including the header.
    size: u64,
    unit: gimli::Unit<Reader>,
}

/// DWARF reader session over one ELF shared object.
pub struct DwarfBackend {
    dwarf: gimli::Dwarf<Reader>,
    units: Vec<UnitData>,
    classes: Vec<ClassHandle>,
    /// Class/struct name -> first non-forward definition.
    definitions: HashMap<String, TypeRef>,
    /// Keeps the mapping alive for the session.
    _mapped: MappedFile,
}

impl DwarfBackend {
    /// Map the file, parse the DWARF sections and index every named class
    /// and structure definition.
    pub fn open(path: &Path) -> Result<Self> {
        info!("opening shared object {}", path.display());
        let mapped = loader::map_file(path)?;

        // SAFETY: the mapping is owned by the backend and outlives every
        // reader borrowed from it; `_mapped` is dropped last.
        let static_data: &'static [u8] = unsafe { std::mem::transmute(&mapped.data[..]) };
        let dwarf = loader::load_dwarf(static_data)?;

        let mut units = Vec::new();
        let mut iter = dwarf.units();
        while let Some(header) = iter.next()? {
            let Some(offset) = header.offset().as_debug_info_offset() else {
                continue;
            };
            let size = header.length_including_self() as u64;
            let unit = dwarf.unit(header)?;
            units.push(UnitData {
                offset: offset.0 as u64,
                size,
                unit,
            });
        }

        let mut backend = Self {
            dwarf,
            units,
            classes: Vec::new(),
            definitions: HashMap::new(),
            _mapped: mapped,
        };
        backend.index_classes()?;
        info!(
            "indexed {} class definitions in {} compilation units",
            backend.classes.len(),
            backend.units.len()
        );
        Ok(backend)
    }

    fn index_classes(&mut self) -> Result<()> {
        let mut classes = Vec::new();
        let mut definitions = HashMap::new();
        for unit_data in &self.units {
            let unit = &unit_data.unit;
            let mut entries = unit.entries();
            while let Some((_, entry)) = entries.next_dfs()? {
                if !matches!(
                    entry.tag(),
                    gimli::DW_TAG_class_type | gimli::DW_TAG_structure_type
                ) {
                    continue;
                }
                if flag(entry, gimli::DW_AT_declaration)? {
                    continue;
                }
                // Anonymous records cannot appear on the allow-list.
                let Some(name) = self.die_name(unit, entry)? else {
                    continue;
                };
                let handle = TypeRef(unit_data.offset + entry.offset().0 as u64);
                classes.push(handle);
                definitions.entry(name).or_insert(handle);
            }
        }
        self.classes = classes;
        self.definitions = definitions;
        Ok(())
    }

    fn locate(&self, r: TypeRef) -> Result<(&UnitData, gimli::UnitOffset)> {
        let index = self.units.partition_point(|u| u.offset <= r.0);
        let unit_data = index
            .checked_sub(1)
            .map(|i| &self.units[i])
            .filter(|u| r.0 < u.offset + u.size)
            .ok_or(ExportError::DanglingReference(r.0))?;
        Ok((unit_data, gimli::UnitOffset((r.0 - unit_data.offset) as usize)))
    }

    fn entry_at<'a>(
        &self,
        unit: &'a gimli::Unit<Reader>,
        local: gimli::UnitOffset,
        r: TypeRef,
    ) -> Result<gimli::DebuggingInformationEntry<'a, 'a, Reader>> {
        unit.entry(local)
            .map_err(|_| ExportError::DanglingReference(r.0).into())
    }

    fn die_name(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<Option<String>> {
        match entry.attr_value(gimli::DW_AT_name)? {
            Some(value) => Ok(Some(
                self.dwarf
                    .attr_string(unit, value)?
                    .to_string_lossy()
                    .into_owned(),
            )),
            None => Ok(None),
        }
    }

    /// Resolve a reference-valued attribute to a global type handle.
    fn ref_attr(
        &self,
        unit_data: &UnitData,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        attr: gimli::DwAt,
    ) -> Result<Option<TypeRef>> {
        Ok(match entry.attr_value(attr)? {
            Some(AttributeValue::UnitRef(local)) => {
                Some(TypeRef(unit_data.offset + local.0 as u64))
            }
            Some(AttributeValue::DebugInfoRef(global)) => Some(TypeRef(global.0 as u64)),
            _ => None,
        })
    }

    /// `DW_AT_type`, or the builtin `void` handle when absent.
    fn type_or_void(
        &self,
        unit_data: &UnitData,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<TypeRef> {
        Ok(self
            .ref_attr(unit_data, entry, gimli::DW_AT_type)?
            .unwrap_or(VOID_REF))
    }

    fn base_type_kind(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<TypeKind> {
        let name = self
            .die_name(unit, entry)?
            .unwrap_or_else(|| "unnamed_base_type".to_string());
        let bits = match udata(entry, gimli::DW_AT_byte_size)? {
            Some(bytes) => (bytes * 8) as u32,
            None => udata(entry, gimli::DW_AT_bit_size)?.unwrap_or(0) as u32,
        };
        let Some(AttributeValue::Encoding(ate)) = entry.attr_value(gimli::DW_AT_encoding)? else {
            return Ok(TypeKind::Unknown {
                kind: format!("base_type_{name}"),
            });
        };
        let encoding = match ate {
            gimli::DW_ATE_signed => Encoding::Signed,
            gimli::DW_ATE_unsigned => Encoding::Unsigned,
            gimli::DW_ATE_signed_char => Encoding::SignedChar,
            gimli::DW_ATE_unsigned_char => Encoding::UnsignedChar,
            gimli::DW_ATE_boolean => Encoding::Boolean,
            gimli::DW_ATE_float => Encoding::Float,
            gimli::DW_ATE_ASCII => Encoding::Ascii,
            gimli::DW_ATE_UCS => Encoding::Ucs,
            gimli::DW_ATE_UTF => Encoding::Utf,
            gimli::DW_ATE_address => Encoding::Address,
            other => {
                return Ok(TypeKind::Unknown {
                    kind: format!("base_encoding_{:#04x}", other.0),
                })
            }
        };
        Ok(TypeKind::Base {
            name,
            encoding,
            bits,
        })
    }

    fn pointer_kind(
        &self,
        unit_data: &UnitData,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        kind: PointerKind,
    ) -> Result<TypeKind> {
        let pointee = self.type_or_void(unit_data, entry)?;
        let width = udata(entry, gimli::DW_AT_byte_size)?.unwrap_or(8) as u32;
        Ok(TypeKind::Pointer {
            pointee,
            kind,
            width,
            quals: Qualifiers::none(),
        })
    }

    fn array_kind(
        &self,
        unit_data: &UnitData,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        local: gimli::UnitOffset,
    ) -> Result<TypeKind> {
        let element = self
            .ref_attr(unit_data, entry, gimli::DW_AT_type)?
            .ok_or_else(|| {
                ExportError::CorruptInput(format!(
                    "array record at {:#x} has no element type",
                    unit_data.offset + local.0 as u64
                ))
            })?;

        // Upper bound lives on the DW_TAG_subrange_type child; element
        // count is upper bound + 1. A missing bound leaves the extent
        // unknown and surfaces as corrupt input when a count is demanded.
        let unit = &unit_data.unit;
        let mut extent = None;
        let mut tree = unit.entries_tree(Some(local))?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let child = node.entry();
            if child.tag() != gimli::DW_TAG_subrange_type {
                continue;
            }
            if let Some(upper) = udata(child, gimli::DW_AT_upper_bound)? {
                extent = Some(ArrayExtent::UpperBound(upper));
            }
            break;
        }
        Ok(TypeKind::Array { element, extent })
    }

    fn subroutine_kind(
        &self,
        unit_data: &UnitData,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        local: gimli::UnitOffset,
    ) -> Result<TypeKind> {
        let ret = self.ref_attr(unit_data, entry, gimli::DW_AT_type)?;
        let mut params = Vec::new();
        let unit = &unit_data.unit;
        let mut tree = unit.entries_tree(Some(local))?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let child = node.entry();
            if child.tag() != gimli::DW_TAG_formal_parameter {
                continue;
            }
            if let Some(param) = self.ref_attr(unit_data, child, gimli::DW_AT_type)? {
                params.push(param);
            }
        }
        Ok(TypeKind::Subroutine { ret, params })
    }

    fn member_offset(
        &self,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<Option<u64>> {
        match entry.attr_value(gimli::DW_AT_data_member_location)? {
            None => Ok(None),
            Some(AttributeValue::Exprloc(expression)) => {
                let bytes = expression.0.slice();
                expr::const_member_offset(bytes)
                    .map(Some)
                    .ok_or_else(|| {
                        ExportError::UnsupportedRecord(
                            "member location expression is not a constant".into(),
                        )
                        .into()
                    })
            }
            Some(value) => value.udata_value().map(Some).ok_or_else(|| {
                ExportError::UnsupportedRecord("member location attribute form".into()).into()
            }),
        }
    }
}

fn flag(
    entry: &gimli::DebuggingInformationEntry<Reader>,
    attr: gimli::DwAt,
) -> std::result::Result<bool, gimli::Error> {
    Ok(matches!(
        entry.attr_value(attr)?,
        Some(AttributeValue::Flag(true))
    ))
}

fn udata(
    entry: &gimli::DebuggingInformationEntry<Reader>,
    attr: gimli::DwAt,
) -> std::result::Result<Option<u64>, gimli::Error> {
    Ok(entry.attr_value(attr)?.and_then(|value| value.udata_value()))
}

fn virtuality(
    entry: &gimli::DebuggingInformationEntry<Reader>,
) -> std::result::Result<u64, gimli::Error> {
    Ok(match entry.attr_value(gimli::DW_AT_virtuality)? {
        Some(AttributeValue::Virtuality(v)) => u64::from(v.0),
        Some(value) => value.udata_value().unwrap_or(0),
        None => 0,
    })
}

impl DebugInfoBackend for DwarfBackend {
    fn classes(&self) -> Box<dyn Iterator<Item = ClassHandle> + '_> {
        Box::new(self.classes.iter().copied())
    }

    fn class_name(&self, class: ClassHandle) -> Result<String> {
        let (unit_data, local) = self.locate(class)?;
        let entry = self.entry_at(&unit_data.unit, local, class)?;
        self.die_name(&unit_data.unit, &entry)?
            .ok_or_else(|| ExportError::CorruptInput(format!("class {class} has no name")).into())
    }

    fn is_forward_declaration(&self, class: ClassHandle) -> Result<bool> {
        let (unit_data, local) = self.locate(class)?;
        let entry = self.entry_at(&unit_data.unit, local, class)?;
        Ok(flag(&entry, gimli::DW_AT_declaration)?)
    }

    fn members(&self, class: ClassHandle) -> Result<Vec<RawMember>> {
        let (unit_data, local) = self.locate(class)?;
        let unit = &unit_data.unit;
        let mut members = Vec::new();
        let mut tree = unit.entries_tree(Some(local))?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let entry = node.entry();
            if entry.tag() != gimli::DW_TAG_member {
                continue;
            }
            let name = self
                .die_name(unit, entry)?
                .unwrap_or_else(|| format!("member_{}", members.len()));
            let type_ref = self
                .ref_attr(unit_data, entry, gimli::DW_AT_type)?
                .ok_or(ExportError::DanglingReference(class.0))?;
            // Missing data member location means a static member.
            let offset = self.member_offset(entry)?;
            members.push(RawMember {
                name,
                offset,
                type_ref,
                artificial: flag(entry, gimli::DW_AT_artificial)?,
            });
        }
        Ok(members)
    }

    fn base_classes(&self, class: ClassHandle) -> Result<Vec<TypeRef>> {
        let (unit_data, local) = self.locate(class)?;
        let unit = &unit_data.unit;
        let mut bases = Vec::new();
        let mut tree = unit.entries_tree(Some(local))?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let entry = node.entry();
            if entry.tag() != gimli::DW_TAG_inheritance {
                continue;
            }
            if virtuality(entry)? != 0 {
                // Virtual bases are not part of the flat layout.
                continue;
            }
            if let Some(base) = self.ref_attr(unit_data, entry, gimli::DW_AT_type)? {
                bases.push(base);
            }
        }
        Ok(bases)
    }

    fn virtual_methods(&self, class: ClassHandle) -> Result<Vec<RawVirtualMethod>> {
        let (unit_data, local) = self.locate(class)?;
        let unit = &unit_data.unit;
        let mut methods = Vec::new();
        let mut seen_slots = HashSet::new();
        let mut tree = unit.entries_tree(Some(local))?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let entry = node.entry();
            if entry.tag() != gimli::DW_TAG_subprogram || virtuality(entry)? == 0 {
                continue;
            }
            let Some(name) = self.die_name(unit, entry)? else {
                debug!("virtual method without a name in class {class}, skipping");
                continue;
            };
            let slot = match entry.attr_value(gimli::DW_AT_vtable_elem_location)? {
                Some(AttributeValue::Exprloc(expression)) => {
                    expr::vtable_slot(expression.0.slice())?
                }
                Some(_) => {
                    return Err(ExportError::UnsupportedRecord(format!(
                        "v-table location of {name} is not an expression"
                    ))
                    .into())
                }
                None => {
                    debug!("virtual method {name} has no v-table location, skipping");
                    continue;
                }
            };
            // The first record for a slot is its introduction; later ones
            // are overrides reusing the slot.
            if !seen_slots.insert(slot) {
                continue;
            }
            let link_name = match entry.attr_value(gimli::DW_AT_linkage_name)? {
                Some(value) => Some(
                    self.dwarf
                        .attr_string(unit, value)?
                        .to_string_lossy()
                        .into_owned(),
                ),
                None => None,
            };
            methods.push(RawVirtualMethod {
                name,
                link_name,
                slot,
                introducing: true,
            });
        }
        Ok(methods)
    }

    fn lookup(&self, r: TypeRef) -> Result<TypeKind> {
        if r == VOID_REF {
            return Ok(TypeKind::Void);
        }
        let (unit_data, local) = self.locate(r)?;
        let unit = &unit_data.unit;
        let entry = self.entry_at(unit, local, r)?;

        match entry.tag() {
            gimli::DW_TAG_base_type => self.base_type_kind(unit, &entry),
            gimli::DW_TAG_const_type => Ok(TypeKind::Modifier {
                quals: Qualifiers::const_only(),
                inner: self.type_or_void(unit_data, &entry)?,
            }),
            gimli::DW_TAG_volatile_type => Ok(TypeKind::Modifier {
                quals: Qualifiers {
                    is_volatile: true,
                    ..Qualifiers::none()
                },
                inner: self.type_or_void(unit_data, &entry)?,
            }),
            gimli::DW_TAG_restrict_type => Ok(TypeKind::Modifier {
                quals: Qualifiers {
                    is_restrict: true,
                    ..Qualifiers::none()
                },
                inner: self.type_or_void(unit_data, &entry)?,
            }),
            gimli::DW_TAG_typedef => {
                let name = self
                    .die_name(unit, &entry)?
                    .unwrap_or_else(|| "unnamed_typedef".to_string());
                Ok(TypeKind::Typedef {
                    name,
                    inner: self.type_or_void(unit_data, &entry)?,
                })
            }
            gimli::DW_TAG_pointer_type => self.pointer_kind(unit_data, &entry, PointerKind::Raw),
            gimli::DW_TAG_reference_type => {
                self.pointer_kind(unit_data, &entry, PointerKind::Reference)
            }
            gimli::DW_TAG_rvalue_reference_type => {
                self.pointer_kind(unit_data, &entry, PointerKind::RvalueReference)
            }
            gimli::DW_TAG_ptr_to_member_type => {
                self.pointer_kind(unit_data, &entry, PointerKind::Member)
            }
            gimli::DW_TAG_array_type => self.array_kind(unit_data, &entry, local),
            gimli::DW_TAG_class_type
            | gimli::DW_TAG_structure_type
            | gimli::DW_TAG_union_type => {
                let name = self
                    .die_name(unit, &entry)?
                    .unwrap_or_else(|| "anonymous_struct".to_string());
                Ok(TypeKind::Record {
                    name,
                    forward: flag(&entry, gimli::DW_AT_declaration)?,
                })
            }
            gimli::DW_TAG_enumeration_type => {
                let name = self
                    .die_name(unit, &entry)?
                    .unwrap_or_else(|| "anonymous_enum".to_string());
                let repr = match self.ref_attr(unit_data, &entry, gimli::DW_AT_type)? {
                    Some(underlying) => EnumRepr::Ref(underlying),
                    None => {
                        let bytes = udata(&entry, gimli::DW_AT_byte_size)?.unwrap_or(4);
                        EnumRepr::Bits((bytes * 8) as u32)
                    }
                };
                Ok(TypeKind::Enumeration { name, repr })
            }
            gimli::DW_TAG_subroutine_type => self.subroutine_kind(unit_data, &entry, local),
            tag => Ok(TypeKind::Unknown {
                kind: tag
                    .static_string()
                    .map(|s| s.trim_start_matches("DW_TAG_").to_string())
                    .unwrap_or_else(|| format!("tag_{:#06x}", tag.0)),
            }),
        }
    }

    fn byte_size(&self, r: TypeRef) -> Result<u64> {
        let mut cur = r;
        for _ in 0..offscope_core::normalise::MAX_WRAPPER_DEPTH {
            match self.lookup(cur)? {
                TypeKind::Base { bits, .. } if bits > 0 => return Ok(u64::from(bits) / 8),
                TypeKind::Pointer { width, .. } if width > 0 => return Ok(u64::from(width)),
                TypeKind::Modifier { inner, .. } | TypeKind::Typedef { inner, .. } => cur = inner,
                TypeKind::Record { forward: true, .. } => {
                    let definition = self.resolve_forward(cur)?;
                    if definition == cur {
                        break;
                    }
                    cur = definition;
                }
                TypeKind::Record { .. } | TypeKind::Enumeration { .. } | TypeKind::Array { .. } => {
                    let (unit_data, local) = self.locate(cur)?;
                    let entry = self.entry_at(&unit_data.unit, local, cur)?;
                    match udata(&entry, gimli::DW_AT_byte_size)? {
                        Some(size) => return Ok(size),
                        None => break,
                    }
                }
                _ => break,
            }
        }
        Err(ExportError::CorruptInput(format!("no byte size known for {r}")).into())
    }

    fn resolve_forward(&self, r: TypeRef) -> Result<TypeRef> {
        let TypeKind::Record {
            name,
            forward: true,
        } = self.lookup(r)?
        else {
            return Ok(r);
        };
        Ok(self.definitions.get(&name).copied().unwrap_or(r))
    }

    fn is_builtin_ref(&self, r: TypeRef) -> bool {
        r == VOID_REF
    }
}
