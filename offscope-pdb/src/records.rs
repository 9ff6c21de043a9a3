//! CodeView type record layouts and the field-list walker.

use offscope_core::{ExportError, Result};

use crate::leaf;
use crate::parse::Cursor;

pub(crate) const LF_MODIFIER: u16 = 0x1001;
pub(crate) const LF_POINTER: u16 = 0x1002;
pub(crate) const LF_PROCEDURE: u16 = 0x1008;
pub(crate) const LF_MFUNCTION: u16 = 0x1009;
pub(crate) const LF_ARGLIST: u16 = 0x1201;
pub(crate) const LF_FIELDLIST: u16 = 0x1203;
pub(crate) const LF_BITFIELD: u16 = 0x1205;
pub(crate) const LF_METHODLIST: u16 = 0x1206;
pub(crate) const LF_BCLASS: u16 = 0x1400;
pub(crate) const LF_VBCLASS: u16 = 0x1401;
pub(crate) const LF_IVBCLASS: u16 = 0x1402;
pub(crate) const LF_INDEX: u16 = 0x1404;
pub(crate) const LF_VFUNCTAB: u16 = 0x1409;
pub(crate) const LF_ENUMERATE: u16 = 0x1502;
pub(crate) const LF_ARRAY: u16 = 0x1503;
pub(crate) const LF_CLASS: u16 = 0x1504;
pub(crate) const LF_STRUCTURE: u16 = 0x1505;
pub(crate) const LF_UNION: u16 = 0x1506;
pub(crate) const LF_ENUM: u16 = 0x1507;
pub(crate) const LF_MEMBER: u16 = 0x150d;
pub(crate) const LF_STMEMBER: u16 = 0x150e;
pub(crate) const LF_METHOD: u16 = 0x150f;
pub(crate) const LF_NESTTYPE: u16 = 0x1510;
pub(crate) const LF_ONEMETHOD: u16 = 0x1511;
pub(crate) const LF_CLASS2: u16 = 0x1608;
pub(crate) const LF_STRUCTURE2: u16 = 0x1609;

/// Forward-reference bit of the class/union property word.
const PROPERTY_FWDREF: u32 = 0x80;

/// Intro and pure-intro method properties, bits 2..5 of the attribute word.
pub(crate) fn is_intro(attr: u16) -> bool {
    matches!((attr >> 2) & 0x7, 4 | 6)
}

fn cstr_at(data: &[u8]) -> Result<String> {
    Cursor::new(data).read_cstr()
}

#[derive(Debug)]
pub(crate) struct ClassRecord {
    pub field_list: u32,
    pub size: u64,
    pub name: String,
    pub forward: bool,
}

/// `LF_CLASS` / `LF_STRUCTURE` and their 2-variants; the 2-variants front
/// the property word and trail the member count.
pub(crate) fn parse_class(kind: u16, data: &[u8]) -> Result<ClassRecord> {
    let mut cur = Cursor::new(data);
    let (property, field_list) = match kind {
        LF_CLASS | LF_STRUCTURE => {
            let _count = cur.read_u16()?;
            let property = u32::from(cur.read_u16()?);
            let field_list = cur.read_u32()?;
            let _derived = cur.read_u32()?;
            let _vshape = cur.read_u32()?;
            (property, field_list)
        }
        LF_CLASS2 | LF_STRUCTURE2 => {
            let property = cur.read_u32()?;
            let field_list = cur.read_u32()?;
            let _derived = cur.read_u32()?;
            let _vshape = cur.read_u32()?;
            let _count = cur.read_u16()?;
            (property, field_list)
        }
        other => {
            return Err(
                ExportError::UnsupportedRecord(format!("class record kind {other:#06x}")).into(),
            )
        }
    };
    let rest = &data[cur.position()..];
    let size = leaf::read_unsigned(rest)?;
    let name = cstr_at(leaf::skip(rest)?)?;
    Ok(ClassRecord {
        field_list,
        size,
        name,
        forward: property & PROPERTY_FWDREF != 0,
    })
}

pub(crate) fn parse_union(data: &[u8]) -> Result<ClassRecord> {
    let mut cur = Cursor::new(data);
    let _count = cur.read_u16()?;
    let property = u32::from(cur.read_u16()?);
    let field_list = cur.read_u32()?;
    let rest = &data[cur.position()..];
    let size = leaf::read_unsigned(rest)?;
    let name = cstr_at(leaf::skip(rest)?)?;
    Ok(ClassRecord {
        field_list,
        size,
        name,
        forward: property & PROPERTY_FWDREF != 0,
    })
}

#[derive(Debug)]
pub(crate) struct EnumRecord {
    pub underlying: u32,
    pub name: String,
}

pub(crate) fn parse_enum(data: &[u8]) -> Result<EnumRecord> {
    let mut cur = Cursor::new(data);
    let _count = cur.read_u16()?;
    let _property = cur.read_u16()?;
    let underlying = cur.read_u32()?;
    let _field_list = cur.read_u32()?;
    let name = cur.read_cstr()?;
    Ok(EnumRecord { underlying, name })
}

#[derive(Debug)]
pub(crate) struct ModifierRecord {
    pub underlying: u32,
    pub attributes: u16,
}

impl ModifierRecord {
    pub fn is_const(&self) -> bool {
        self.attributes & 0x1 != 0
    }
    pub fn is_volatile(&self) -> bool {
        self.attributes & 0x2 != 0
    }
    pub fn is_unaligned(&self) -> bool {
        self.attributes & 0x4 != 0
    }
}

pub(crate) fn parse_modifier(data: &[u8]) -> Result<ModifierRecord> {
    let mut cur = Cursor::new(data);
    let underlying = cur.read_u32()?;
    let attributes = cur.read_u16()?;
    Ok(ModifierRecord {
        underlying,
        attributes,
    })
}

#[derive(Debug)]
pub(crate) struct PointerRecord {
    pub underlying: u32,
    pub attributes: u32,
}

impl PointerRecord {
    /// CV_ptrtype, lower five bits.
    pub fn pointer_type(&self) -> u32 {
        self.attributes & 0x1f
    }
    /// CV_ptrmode, bits 5..8.
    pub fn pointer_mode(&self) -> u32 {
        (self.attributes >> 5) & 0x7
    }
    pub fn is_volatile(&self) -> bool {
        self.attributes & (1 << 9) != 0
    }
    pub fn is_const(&self) -> bool {
        self.attributes & (1 << 10) != 0
    }
    pub fn is_unaligned(&self) -> bool {
        self.attributes & (1 << 11) != 0
    }
    pub fn is_restrict(&self) -> bool {
        self.attributes & (1 << 12) != 0
    }

    /// Pointer width in bytes; 0 when the pointer type is not a near/far
    /// 32-bit or 64-bit one.
    pub fn width(&self) -> u32 {
        match self.pointer_type() {
            0x0a | 0x0b => 4, // near32 / far32
            0x0c => 8,        // 64
            _ => 0,
        }
    }
}

pub(crate) fn parse_pointer(data: &[u8]) -> Result<PointerRecord> {
    let mut cur = Cursor::new(data);
    let underlying = cur.read_u32()?;
    let attributes = cur.read_u32()?;
    Ok(PointerRecord {
        underlying,
        attributes,
    })
}

#[derive(Debug)]
pub(crate) struct ArrayRecord {
    pub element: u32,
    pub byte_size: u64,
}

pub(crate) fn parse_array(data: &[u8]) -> Result<ArrayRecord> {
    let mut cur = Cursor::new(data);
    let element = cur.read_u32()?;
    let _index_type = cur.read_u32()?;
    let byte_size = leaf::read_unsigned(&data[cur.position()..])?;
    Ok(ArrayRecord { element, byte_size })
}

#[derive(Debug)]
pub(crate) struct ProcedureRecord {
    pub return_type: u32,
    pub argument_list: u32,
}

pub(crate) fn parse_procedure(kind: u16, data: &[u8]) -> Result<ProcedureRecord> {
    let mut cur = Cursor::new(data);
    let return_type = cur.read_u32()?;
    if kind == LF_MFUNCTION {
        let _class_type = cur.read_u32()?;
        let _this_type = cur.read_u32()?;
    }
    let _calling_convention = cur.read_u8()?;
    let _attributes = cur.read_u8()?;
    let _parameter_count = cur.read_u16()?;
    let argument_list = cur.read_u32()?;
    Ok(ProcedureRecord {
        return_type,
        argument_list,
    })
}

pub(crate) fn parse_argument_list(data: &[u8]) -> Result<Vec<u32>> {
    let mut cur = Cursor::new(data);
    let count = cur.read_u32()?;
    let mut arguments = Vec::with_capacity(count as usize);
    for _ in 0..count {
        arguments.push(cur.read_u32()?);
    }
    Ok(arguments)
}

#[derive(Debug)]
pub(crate) struct BitfieldRecord {
    pub underlying: u32,
    pub length: u8,
}

pub(crate) fn parse_bitfield(data: &[u8]) -> Result<BitfieldRecord> {
    let mut cur = Cursor::new(data);
    let underlying = cur.read_u32()?;
    let length = cur.read_u8()?;
    let _position = cur.read_u8()?;
    Ok(BitfieldRecord { underlying, length })
}

/// One entry of an `LF_METHODLIST`; intro entries carry the v-table offset.
#[derive(Debug)]
pub(crate) struct MethodListEntry {
    pub vtable_offset: Option<u32>,
}

pub(crate) fn parse_method_list(data: &[u8]) -> Result<Vec<MethodListEntry>> {
    let mut cur = Cursor::new(data);
    let mut entries = Vec::new();
    while !cur.is_empty() {
        let attributes = cur.read_u16()?;
        let _padding = cur.read_u16()?;
        let _type_index = cur.read_u32()?;
        let vtable_offset = if is_intro(attributes) {
            Some(cur.read_u32()?)
        } else {
            None
        };
        entries.push(MethodListEntry { vtable_offset });
    }
    Ok(entries)
}

/// One entry of an `LF_FIELDLIST`.
#[derive(Debug)]
pub(crate) enum Field {
    Member {
        type_index: u32,
        offset: u64,
        name: String,
    },
    StaticMember {
        type_index: u32,
        name: String,
    },
    BaseClass {
        type_index: u32,
    },
    VirtualBaseClass,
    Method {
        method_list: u32,
        name: String,
    },
    OneMethod {
        vtable_offset: Option<u32>,
        name: String,
    },
    NestedType,
    Enumerate,
    VFuncTable,
    /// `LF_INDEX` continuation, skipped like the reference does.
    Continuation,
}

/// Walks the packed field records of an `LF_FIELDLIST` payload, consuming
/// the CodeView trailing-pad bytes between entries.
pub(crate) struct FieldIter<'a> {
    cur: Cursor<'a>,
}

impl<'a> FieldIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(data),
        }
    }

    fn read_field(&mut self) -> Result<Field> {
        let kind = self.cur.read_u16()?;
        match kind {
            LF_MEMBER => {
                let _attributes = self.cur.read_u16()?;
                let type_index = self.cur.read_u32()?;
                let offset = self.read_leaf()?;
                let name = self.cur.read_cstr()?;
                Ok(Field::Member {
                    type_index,
                    offset,
                    name,
                })
            }
            LF_STMEMBER => {
                let _attributes = self.cur.read_u16()?;
                let type_index = self.cur.read_u32()?;
                let name = self.cur.read_cstr()?;
                Ok(Field::StaticMember { type_index, name })
            }
            LF_BCLASS => {
                let _attributes = self.cur.read_u16()?;
                let type_index = self.cur.read_u32()?;
                let _offset = self.read_leaf()?;
                Ok(Field::BaseClass { type_index })
            }
            LF_VBCLASS | LF_IVBCLASS => {
                let _attributes = self.cur.read_u16()?;
                let _base_type = self.cur.read_u32()?;
                let _vbptr_type = self.cur.read_u32()?;
                let _vbptr_offset = self.read_leaf()?;
                let _vbtable_offset = self.read_leaf()?;
                Ok(Field::VirtualBaseClass)
            }
            LF_METHOD => {
                let _count = self.cur.read_u16()?;
                let method_list = self.cur.read_u32()?;
                let name = self.cur.read_cstr()?;
                Ok(Field::Method { method_list, name })
            }
            LF_ONEMETHOD => {
                let attributes = self.cur.read_u16()?;
                let _type_index = self.cur.read_u32()?;
                let vtable_offset = if is_intro(attributes) {
                    Some(self.cur.read_u32()?)
                } else {
                    None
                };
                let name = self.cur.read_cstr()?;
                Ok(Field::OneMethod {
                    vtable_offset,
                    name,
                })
            }
            LF_NESTTYPE => {
                let _padding = self.cur.read_u16()?;
                let _type_index = self.cur.read_u32()?;
                let _name = self.cur.read_cstr()?;
                Ok(Field::NestedType)
            }
            LF_ENUMERATE => {
                let _attributes = self.cur.read_u16()?;
                let _value = self.read_leaf()?;
                let _name = self.cur.read_cstr()?;
                Ok(Field::Enumerate)
            }
            LF_INDEX => {
                let _padding = self.cur.read_u16()?;
                let _continuation = self.cur.read_u32()?;
                Ok(Field::Continuation)
            }
            LF_VFUNCTAB => {
                let _padding = self.cur.read_u16()?;
                let _type_index = self.cur.read_u32()?;
                Ok(Field::VFuncTable)
            }
            other => Err(ExportError::UnsupportedRecord(format!(
                "field record kind {other:#06x}"
            ))
            .into()),
        }
    }

    /// Numeric leaf at the cursor; advances past it.
    fn read_leaf(&mut self) -> Result<u64> {
        let kind = self.cur.clone().read_u16()?;
        let size = leaf::leaf_size(kind)?;
        let bytes = self.cur.read_bytes(size)?;
        leaf::read_unsigned(bytes)
    }
}

impl Iterator for FieldIter<'_> {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        while matches!(self.cur.peek_u8(), Some(b) if b >= 0xf0) {
            if self.cur.skip(1).is_err() {
                return None;
            }
        }
        if self.cur.is_empty() {
            return None;
        }
        Some(self.read_field())
    }
}
