//! In-memory type graph used by the unit tests.

use std::collections::HashMap;

use crate::backend::{ClassHandle, DebugInfoBackend};
use crate::errors::{ExportError, Result};
use crate::model::{
    ArrayExtent, Encoding, EnumRepr, PointerKind, Qualifiers, RawMember, RawVirtualMethod,
    TypeKind, TypeRef,
};

/// Hand-built type graph implementing the backend contract.
#[derive(Default)]
pub(crate) struct TestGraph {
    kinds: Vec<TypeKind>,
    members: HashMap<u64, Vec<RawMember>>,
    bases: HashMap<u64, Vec<TypeRef>>,
    methods: HashMap<u64, Vec<RawVirtualMethod>>,
    class_order: Vec<ClassHandle>,
}

pub(crate) struct ClassBuilder<'a> {
    graph: &'a mut TestGraph,
    handle: u64,
}

impl ClassBuilder<'_> {
    pub fn member(&mut self, name: &str, offset: u64, type_ref: TypeRef) {
        self.push(RawMember {
            name: name.to_string(),
            offset: Some(offset),
            type_ref,
            artificial: false,
        });
    }

    pub fn static_member(&mut self, name: &str, type_ref: TypeRef) {
        self.push(RawMember {
            name: name.to_string(),
            offset: None,
            type_ref,
            artificial: false,
        });
    }

    pub fn artificial_member(&mut self, name: &str, offset: u64, type_ref: TypeRef) {
        self.push(RawMember {
            name: name.to_string(),
            offset: Some(offset),
            type_ref,
            artificial: true,
        });
    }

    pub fn virtual_method(&mut self, method: RawVirtualMethod) {
        self.graph
            .methods
            .entry(self.handle)
            .or_default()
            .push(method);
    }

    fn push(&mut self, member: RawMember) {
        self.graph
            .members
            .entry(self.handle)
            .or_default()
            .push(member);
    }
}

impl TestGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: TypeKind) -> TypeRef {
        self.kinds.push(kind);
        TypeRef(self.kinds.len() as u64 - 1)
    }

    pub fn void(&mut self) -> TypeRef {
        self.add(TypeKind::Void)
    }

    pub fn base(&mut self, name: &str, encoding: Encoding, bits: u32) -> TypeRef {
        self.add(TypeKind::Base {
            name: name.to_string(),
            encoding,
            bits,
        })
    }

    pub fn typedef(&mut self, name: &str, inner: TypeRef) -> TypeRef {
        self.add(TypeKind::Typedef {
            name: name.to_string(),
            inner,
        })
    }

    pub fn modifier(&mut self, quals: Qualifiers, inner: TypeRef) -> TypeRef {
        self.add(TypeKind::Modifier { quals, inner })
    }

    /// Modifier node that wraps itself.
    pub fn cyclic_modifier(&mut self) -> TypeRef {
        let next = TypeRef(self.kinds.len() as u64);
        self.add(TypeKind::Modifier {
            quals: Qualifiers::const_only(),
            inner: next,
        })
    }

    pub fn pointer(&mut self, pointee: TypeRef, width: u32) -> TypeRef {
        self.add(TypeKind::Pointer {
            pointee,
            kind: PointerKind::Raw,
            width,
            quals: Qualifiers::none(),
        })
    }

    pub fn pointer_with_quals(&mut self, pointee: TypeRef, width: u32, quals: Qualifiers) -> TypeRef {
        self.add(TypeKind::Pointer {
            pointee,
            kind: PointerKind::Raw,
            width,
            quals,
        })
    }

    pub fn reference(&mut self, pointee: TypeRef, width: u32) -> TypeRef {
        self.add(TypeKind::Pointer {
            pointee,
            kind: PointerKind::Reference,
            width,
            quals: Qualifiers::none(),
        })
    }

    pub fn member_pointer(&mut self, pointee: TypeRef, width: u32) -> TypeRef {
        self.add(TypeKind::Pointer {
            pointee,
            kind: PointerKind::Member,
            width,
            quals: Qualifiers::none(),
        })
    }

    pub fn array_upper_bound(&mut self, element: TypeRef, upper: u64) -> TypeRef {
        self.add(TypeKind::Array {
            element,
            extent: Some(ArrayExtent::UpperBound(upper)),
        })
    }

    pub fn array_byte_size(&mut self, element: TypeRef, total: u64) -> TypeRef {
        self.add(TypeKind::Array {
            element,
            extent: Some(ArrayExtent::ByteSize(total)),
        })
    }

    pub fn array_unknown(&mut self, element: TypeRef) -> TypeRef {
        self.add(TypeKind::Array {
            element,
            extent: None,
        })
    }

    pub fn record(&mut self, name: &str, forward: bool) -> TypeRef {
        self.add(TypeKind::Record {
            name: name.to_string(),
            forward,
        })
    }

    pub fn enum_bits(&mut self, name: &str, bits: u32) -> TypeRef {
        self.add(TypeKind::Enumeration {
            name: name.to_string(),
            repr: EnumRepr::Bits(bits),
        })
    }

    pub fn enum_ref(&mut self, name: &str, underlying: TypeRef) -> TypeRef {
        self.add(TypeKind::Enumeration {
            name: name.to_string(),
            repr: EnumRepr::Ref(underlying),
        })
    }

    pub fn subroutine(&mut self, ret: Option<TypeRef>, params: Vec<TypeRef>) -> TypeRef {
        self.add(TypeKind::Subroutine { ret, params })
    }

    pub fn unknown(&mut self, kind: &str) -> TypeRef {
        self.add(TypeKind::Unknown {
            kind: kind.to_string(),
        })
    }

    pub fn class(&mut self, name: &str, build: impl FnOnce(&mut ClassBuilder<'_>)) -> ClassHandle {
        let handle = self.record(name, false);
        self.class_order.push(handle);
        let mut builder = ClassBuilder {
            graph: self,
            handle: handle.0,
        };
        build(&mut builder);
        handle
    }

    pub fn class_with_base(
        &mut self,
        name: &str,
        base: TypeRef,
        build: impl FnOnce(&mut ClassBuilder<'_>),
    ) -> ClassHandle {
        let handle = self.class(name, build);
        self.bases.insert(handle.0, vec![base]);
        handle
    }
}

impl DebugInfoBackend for TestGraph {
    fn classes(&self) -> Box<dyn Iterator<Item = ClassHandle> + '_> {
        Box::new(self.class_order.iter().copied())
    }

    fn class_name(&self, class: ClassHandle) -> Result<String> {
        match self.lookup(class)? {
            TypeKind::Record { name, .. } => Ok(name),
            other => Err(ExportError::UnsupportedRecord(format!("{other:?}")).into()),
        }
    }

    fn is_forward_declaration(&self, class: ClassHandle) -> Result<bool> {
        match self.lookup(class)? {
            TypeKind::Record { forward, .. } => Ok(forward),
            other => Err(ExportError::UnsupportedRecord(format!("{other:?}")).into()),
        }
    }

    fn members(&self, class: ClassHandle) -> Result<Vec<RawMember>> {
        Ok(self.members.get(&class.0).cloned().unwrap_or_default())
    }

    fn base_classes(&self, class: ClassHandle) -> Result<Vec<TypeRef>> {
        Ok(self.bases.get(&class.0).cloned().unwrap_or_default())
    }

    fn virtual_methods(&self, class: ClassHandle) -> Result<Vec<RawVirtualMethod>> {
        Ok(self.methods.get(&class.0).cloned().unwrap_or_default())
    }

    fn lookup(&self, r: TypeRef) -> Result<TypeKind> {
        self.kinds
            .get(r.0 as usize)
            .cloned()
            .ok_or_else(|| ExportError::DanglingReference(r.0).into())
    }

    fn byte_size(&self, r: TypeRef) -> Result<u64> {
        match self.lookup(r)? {
            TypeKind::Base { bits, .. } => Ok(u64::from(bits) / 8),
            TypeKind::Pointer { width, .. } => Ok(u64::from(width)),
            TypeKind::Modifier { inner, .. } | TypeKind::Typedef { inner, .. } => {
                self.byte_size(inner)
            }
            TypeKind::Array {
                extent: Some(ArrayExtent::ByteSize(total)),
                ..
            } => Ok(total),
            TypeKind::Enumeration {
                repr: EnumRepr::Bits(bits),
                ..
            } => Ok(u64::from(bits) / 8),
            other => {
                Err(ExportError::CorruptInput(format!("no byte size for {other:?}")).into())
            }
        }
    }

    fn resolve_forward(&self, r: TypeRef) -> Result<TypeRef> {
        let TypeKind::Record {
            name,
            forward: true,
        } = self.lookup(r)?
        else {
            return Ok(r);
        };
        for (index, kind) in self.kinds.iter().enumerate() {
            if let TypeKind::Record {
                name: candidate,
                forward: false,
            } = kind
            {
                if *candidate == name {
                    return Ok(TypeRef(index as u64));
                }
            }
        }
        Ok(r)
    }

    fn is_builtin_ref(&self, _r: TypeRef) -> bool {
        false
    }
}
