//! `DebugInfoBackend` over the TPI type table.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use offscope_core::{
    ArrayExtent, ClassHandle, DebugInfoBackend, Encoding, EnumRepr, ExportError, PointerKind,
    Qualifiers, RawMember, RawVirtualMethod, Result, TypeKind, TypeRef,
};

use crate::dbi::DbiHeader;
use crate::info::InfoStream;
use crate::msf::{MsfFile, STREAM_DBI, STREAM_PDB_INFO, STREAM_TPI};
use crate::records::{self, Field, FieldIter};
use crate::tpi::{TypeRecord, TypeTable};

/// PDB reader session. Type references are TPI type indices; indices below
/// the table's first index form the builtin partition.
pub struct PdbBackend {
    table: TypeTable,
    classes: Vec<ClassHandle>,
    /// Class/struct name -> first non-forward definition index.
    definitions: HashMap<String, u32>,
}

impl PdbBackend {
    /// Open and validate the MSF container, reject FASTLINK output, check
    /// the DBI header and index the TPI class definitions.
    pub fn open(path: &Path) -> Result<Self> {
        info!("opening PDB file {}", path.display());
        let msf = MsfFile::open(path)?;

        let pdb_info = InfoStream::parse(&msf.stream(STREAM_PDB_INFO)?)?;
        if pdb_info.uses_fastlink() {
            return Err(ExportError::Format(
                "PDB was linked using unsupported option /DEBUG:FASTLINK".into(),
            )
            .into());
        }
        info!(
            "version {}, signature {}, age {}, GUID {}",
            pdb_info.version,
            pdb_info.signature,
            pdb_info.age,
            pdb_info.guid_string()
        );

        let dbi = DbiHeader::parse(&msf.stream(STREAM_DBI)?)?;
        info!("DBI stream version {}, age {}", dbi.version, dbi.age);

        let table = TypeTable::parse(msf.stream(STREAM_TPI)?)?;
        Ok(Self::from_table(table))
    }

    fn from_table(table: TypeTable) -> Self {
        let mut classes = Vec::new();
        let mut definitions = HashMap::new();
        for (type_index, record) in table.iter() {
            if !is_class_kind(record.kind) {
                continue;
            }
            let Ok(class) = records::parse_class(record.kind, record.data) else {
                continue;
            };
            if class.forward {
                continue;
            }
            definitions.entry(class.name).or_insert(type_index);
            // A definition without a field list has nothing to extract.
            if class.field_list != 0 && table.record(class.field_list).is_ok() {
                classes.push(TypeRef(u64::from(type_index)));
            }
        }
        Self {
            table,
            classes,
            definitions,
        }
    }

    fn type_index(&self, r: TypeRef) -> Result<u32> {
        u32::try_from(r.0).map_err(|_| ExportError::DanglingReference(r.0).into())
    }

    fn record(&self, r: TypeRef) -> Result<TypeRecord<'_>> {
        self.table.record(self.type_index(r)?)
    }

    fn class_record(&self, class: ClassHandle) -> Result<records::ClassRecord> {
        let record = self.record(class)?;
        if !is_class_kind(record.kind) {
            return Err(ExportError::UnsupportedRecord(format!(
                "expected a class record at {class}, found kind {:#06x}",
                record.kind
            ))
            .into());
        }
        records::parse_class(record.kind, record.data)
    }

    /// Field-list payload of a class, or `None` when the class has none.
    fn field_list(&self, class: ClassHandle) -> Result<Option<TypeRecord<'_>>> {
        let class = self.class_record(class)?;
        if class.field_list == 0 {
            return Ok(None);
        }
        let record = self.table.record(class.field_list)?;
        if record.kind != records::LF_FIELDLIST {
            return Err(ExportError::UnsupportedRecord(format!(
                "field list of {} has kind {:#06x}",
                class.name, record.kind
            ))
            .into());
        }
        Ok(Some(record))
    }

    fn subroutine_kind(&self, kind: u16, data: &[u8]) -> Result<TypeKind> {
        let procedure = records::parse_procedure(kind, data)?;
        let ret = match procedure.return_type {
            0 => None, // T_NOTYPE
            index => Some(TypeRef(u64::from(index))),
        };
        let arguments = self.table.record(procedure.argument_list)?;
        if arguments.kind != records::LF_ARGLIST {
            return Err(ExportError::UnsupportedRecord(format!(
                "argument list has kind {:#06x}",
                arguments.kind
            ))
            .into());
        }
        let params = records::parse_argument_list(arguments.data)?
            .into_iter()
            .map(|index| TypeRef(u64::from(index)))
            .collect();
        Ok(TypeKind::Subroutine { ret, params })
    }

    fn builtin_kind(&self, type_index: u32) -> TypeKind {
        let mode = (type_index >> 8) & 0xf;
        if mode != 0 {
            let width = match mode {
                // 16-bit era and 32-bit pointer modes
                1..=5 => 4,
                6 => 8,
                7 => 16,
                _ => {
                    return TypeKind::Unknown {
                        kind: format!("t_{type_index:04x}"),
                    }
                }
            };
            return TypeKind::Pointer {
                pointee: TypeRef(u64::from(type_index & 0xff)),
                kind: PointerKind::Raw,
                width,
                quals: Qualifiers::none(),
            };
        }
        builtin_base(type_index)
    }

    fn builtin_byte_size(&self, type_index: u32) -> Result<u64> {
        let mode = (type_index >> 8) & 0xf;
        if mode != 0 {
            return Ok(match mode {
                6 => 8,
                7 => 16,
                _ => 4,
            });
        }
        match builtin_base(type_index) {
            TypeKind::Base { bits, .. } if bits > 0 => Ok(u64::from(bits) / 8),
            _ => Err(ExportError::CorruptInput(format!(
                "no byte size for builtin {type_index:#06x}"
            ))
            .into()),
        }
    }
}

fn is_class_kind(kind: u16) -> bool {
    matches!(
        kind,
        records::LF_CLASS | records::LF_STRUCTURE | records::LF_CLASS2 | records::LF_STRUCTURE2
    )
}

/// Direct (non-pointer) builtin type indices.
fn builtin_base(type_index: u32) -> TypeKind {
    let base = |name: &str, encoding, bits| TypeKind::Base {
        name: name.to_string(),
        encoding,
        bits,
    };
    match type_index & 0xff {
        0x03 => TypeKind::Void,
        0x08 => base("HRESULT", Encoding::Signed, 32),
        // T_CHAR and the "really a char" T_RCHAR
        0x10 | 0x70 => base("char", Encoding::SignedChar, 8),
        0x11 => base("short", Encoding::Signed, 16),
        0x12 => base("long", Encoding::Signed, 32),
        0x13 | 0x76 => base("int64_t", Encoding::Signed, 64),
        0x14 => base("OCTAL", Encoding::Signed, 128),
        0x20 => base("byte", Encoding::UnsignedChar, 8),
        0x21 => base("unsigned short", Encoding::Unsigned, 16),
        0x22 => base("unsigned long", Encoding::Unsigned, 32),
        0x23 | 0x77 => base("uint64_t", Encoding::Unsigned, 64),
        0x24 => base("UOCTAL", Encoding::Unsigned, 128),
        0x30 => base("bool", Encoding::Boolean, 8),
        0x31 => base("BOOL16", Encoding::Boolean, 16),
        0x32 => base("BOOL", Encoding::Boolean, 32),
        0x33 => base("BOOL64", Encoding::Boolean, 64),
        0x40 => base("float", Encoding::Float, 32),
        0x41 => base("double", Encoding::Float, 64),
        0x42 => base("long double", Encoding::Float, 80),
        0x71 => base("wchar_t", Encoding::Utf, 16),
        0x74 => base("int", Encoding::Signed, 32),
        0x75 => base("unsigned", Encoding::Unsigned, 32),
        0x7a => base("CHAR16", Encoding::Utf, 16),
        0x7b => base("CHAR32", Encoding::Utf, 32),
        0x7c => base("CHAR8", Encoding::Utf, 8),
        _ => TypeKind::Unknown {
            kind: format!("t_{type_index:04x}"),
        },
    }
}

impl DebugInfoBackend for PdbBackend {
    fn classes(&self) -> Box<dyn Iterator<Item = ClassHandle> + '_> {
        Box::new(self.classes.iter().copied())
    }

    fn class_name(&self, class: ClassHandle) -> Result<String> {
        Ok(self.class_record(class)?.name)
    }

    fn is_forward_declaration(&self, class: ClassHandle) -> Result<bool> {
        Ok(self.class_record(class)?.forward)
    }

    fn members(&self, class: ClassHandle) -> Result<Vec<RawMember>> {
        let Some(field_list) = self.field_list(class)? else {
            return Ok(Vec::new());
        };
        let mut members = Vec::new();
        for field in FieldIter::new(field_list.data) {
            match field? {
                Field::Member {
                    type_index,
                    offset,
                    name,
                } => members.push(RawMember {
                    name,
                    offset: Some(offset),
                    type_ref: TypeRef(u64::from(type_index)),
                    artificial: false,
                }),
                Field::StaticMember { type_index, name } => members.push(RawMember {
                    name,
                    offset: None,
                    type_ref: TypeRef(u64::from(type_index)),
                    artificial: false,
                }),
                _ => {}
            }
        }
        Ok(members)
    }

    fn base_classes(&self, class: ClassHandle) -> Result<Vec<TypeRef>> {
        let Some(field_list) = self.field_list(class)? else {
            return Ok(Vec::new());
        };
        let mut bases = Vec::new();
        for field in FieldIter::new(field_list.data) {
            // Virtual bases (LF_VBCLASS/LF_IVBCLASS) are skipped silently.
            if let Field::BaseClass { type_index } = field? {
                bases.push(TypeRef(u64::from(type_index)));
            }
        }
        Ok(bases)
    }

    fn virtual_methods(&self, class: ClassHandle) -> Result<Vec<RawVirtualMethod>> {
        let Some(field_list) = self.field_list(class)? else {
            return Ok(Vec::new());
        };
        let mut methods = Vec::new();
        for field in FieldIter::new(field_list.data) {
            match field? {
                Field::OneMethod {
                    vtable_offset: Some(offset),
                    name,
                } => methods.push(RawVirtualMethod {
                    name,
                    link_name: None,
                    // The v-table offset is in bytes of a 32-bit image.
                    slot: u64::from(offset) / 4,
                    introducing: true,
                }),
                Field::Method { method_list, name } => {
                    let list = self.table.record(method_list)?;
                    if list.kind != records::LF_METHODLIST {
                        return Err(ExportError::UnsupportedRecord(format!(
                            "method list of {name} has kind {:#06x}",
                            list.kind
                        ))
                        .into());
                    }
                    for entry in records::parse_method_list(list.data)? {
                        if let Some(offset) = entry.vtable_offset {
                            methods.push(RawVirtualMethod {
                                name: name.clone(),
                                link_name: None,
                                slot: u64::from(offset) / 4,
                                introducing: true,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(methods)
    }

    fn lookup(&self, r: TypeRef) -> Result<TypeKind> {
        let type_index = self.type_index(r)?;
        if type_index < self.table.first_index() {
            return Ok(self.builtin_kind(type_index));
        }
        let record = self.record(r)?;
        match record.kind {
            records::LF_MODIFIER => {
                let modifier = records::parse_modifier(record.data)?;
                Ok(TypeKind::Modifier {
                    quals: Qualifiers {
                        is_const: modifier.is_const(),
                        is_volatile: modifier.is_volatile(),
                        is_unaligned: modifier.is_unaligned(),
                        is_restrict: false,
                    },
                    inner: TypeRef(u64::from(modifier.underlying)),
                })
            }
            records::LF_POINTER => {
                let pointer = records::parse_pointer(record.data)?;
                let kind = match pointer.pointer_mode() {
                    1 => PointerKind::Reference,
                    2 | 3 => PointerKind::Member,
                    4 => PointerKind::RvalueReference,
                    _ => PointerKind::Raw,
                };
                Ok(TypeKind::Pointer {
                    pointee: TypeRef(u64::from(pointer.underlying)),
                    kind,
                    width: pointer.width(),
                    quals: Qualifiers {
                        is_const: pointer.is_const(),
                        is_volatile: pointer.is_volatile(),
                        is_unaligned: pointer.is_unaligned(),
                        is_restrict: pointer.is_restrict(),
                    },
                })
            }
            records::LF_ARRAY => {
                let array = records::parse_array(record.data)?;
                Ok(TypeKind::Array {
                    element: TypeRef(u64::from(array.element)),
                    extent: (array.byte_size > 0).then_some(ArrayExtent::ByteSize(array.byte_size)),
                })
            }
            kind if is_class_kind(kind) => {
                let class = records::parse_class(kind, record.data)?;
                Ok(TypeKind::Record {
                    name: class.name,
                    forward: class.forward,
                })
            }
            records::LF_UNION => {
                let union = records::parse_union(record.data)?;
                Ok(TypeKind::Record {
                    name: union.name,
                    forward: union.forward,
                })
            }
            records::LF_ENUM => {
                let record = records::parse_enum(record.data)?;
                Ok(TypeKind::Enumeration {
                    name: record.name,
                    repr: EnumRepr::Ref(TypeRef(u64::from(record.underlying))),
                })
            }
            records::LF_PROCEDURE | records::LF_MFUNCTION => {
                self.subroutine_kind(record.kind, record.data)
            }
            records::LF_BITFIELD => {
                let bitfield = records::parse_bitfield(record.data)?;
                Ok(TypeKind::Bitfield {
                    inner: TypeRef(u64::from(bitfield.underlying)),
                    width: u32::from(bitfield.length),
                })
            }
            other => Ok(TypeKind::Unknown {
                kind: format!("lf_{other:04x}"),
            }),
        }
    }

    fn byte_size(&self, r: TypeRef) -> Result<u64> {
        let type_index = self.type_index(r)?;
        if type_index < self.table.first_index() {
            return self.builtin_byte_size(type_index);
        }
        let record = self.record(r)?;
        match record.kind {
            records::LF_MODIFIER => {
                let modifier = records::parse_modifier(record.data)?;
                self.byte_size(TypeRef(u64::from(modifier.underlying)))
            }
            records::LF_POINTER => {
                let pointer = records::parse_pointer(record.data)?;
                match pointer.width() {
                    0 => Err(ExportError::CorruptInput(format!(
                        "pointer {r} has unknown width"
                    ))
                    .into()),
                    width => Ok(u64::from(width)),
                }
            }
            records::LF_ARRAY => Ok(records::parse_array(record.data)?.byte_size),
            kind if is_class_kind(kind) => {
                let definition = self.resolve_forward(r)?;
                Ok(self.class_record(definition)?.size)
            }
            records::LF_UNION => Ok(records::parse_union(record.data)?.size),
            records::LF_ENUM => {
                let record = records::parse_enum(record.data)?;
                self.byte_size(TypeRef(u64::from(record.underlying)))
            }
            other => Err(ExportError::CorruptInput(format!(
                "no byte size for record kind {other:#06x} at {r}"
            ))
            .into()),
        }
    }

    fn resolve_forward(&self, r: TypeRef) -> Result<TypeRef> {
        if self.is_builtin_ref(r) {
            return Ok(r);
        }
        let record = self.record(r)?;
        if !is_class_kind(record.kind) {
            return Ok(r);
        }
        let class = records::parse_class(record.kind, record.data)?;
        if !class.forward {
            return Ok(r);
        }
        Ok(self
            .definitions
            .get(&class.name)
            .map(|&index| TypeRef(u64::from(index)))
            .unwrap_or(r))
    }

    fn is_builtin_ref(&self, r: TypeRef) -> bool {
        u32::try_from(r.0).is_ok_and(|index| index < self.table.first_index())
    }
}
