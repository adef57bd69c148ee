//! Component-level type descriptors.
//!
//! Every descriptor knows its linear-memory footprint (size and
//! alignment), the flat machine-type signature it takes when passed by
//! value, and composes with child descriptors: a list, record, tuple,
//! variant, option, result or flags type derives its own attributes
//! deterministically from its children. All attributes are computed at
//! construction and immutable afterwards, so descriptors are cheap to
//! clone and safe to share.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::abi::buffer::align_to;
use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::FlatType;
use crate::func::FunctionType;

/// The enumerated kind tag of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    Char,
    String,
    List,
    Record,
    Tuple,
    Variant,
    Enum,
    Flags,
    Option,
    Result,
    Resource,
    Own,
    Borrow,
}

/// The numeric element shape of a typed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
}

impl NumericKind {
    /// Size in bytes of one element.
    pub fn elem_size(&self) -> u32 {
        match self {
            NumericKind::U8 | NumericKind::S8 => 1,
            NumericKind::U16 | NumericKind::S16 => 2,
            NumericKind::U32 | NumericKind::S32 | NumericKind::F32 => 4,
            NumericKind::U64 | NumericKind::S64 | NumericKind::F64 => 8,
        }
    }

    /// Alignment of one element.
    pub fn alignment(&self) -> u32 {
        self.elem_size()
    }
}

/// Width of a variant discriminant, chosen by case count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscriminantSize {
    Size1,
    Size2,
    Size4,
}

impl DiscriminantSize {
    /// The discriminant width for a variant with `count` cases, or
    /// `None` when the count is zero or exceeds 2^32.
    pub fn from_count(count: usize) -> Option<Self> {
        let count = count as u64;
        if count == 0 {
            None
        } else if count <= 1 << 8 {
            Some(DiscriminantSize::Size1)
        } else if count <= 1 << 16 {
            Some(DiscriminantSize::Size2)
        } else if count <= 1 << 32 {
            Some(DiscriminantSize::Size4)
        } else {
            None
        }
    }

    /// Size in bytes.
    pub fn byte_size(&self) -> u32 {
        match self {
            DiscriminantSize::Size1 => 1,
            DiscriminantSize::Size2 => 2,
            DiscriminantSize::Size4 => 4,
        }
    }

    /// Alignment, equal to the size.
    pub fn alignment(&self) -> u32 {
        self.byte_size()
    }
}

/// Storage shape of a flags type, chosen by flag count at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsRepr {
    /// No flags: zero bytes, zero flat slots.
    Empty,
    /// 1–8 flags in a single byte.
    U8,
    /// 9–16 flags in a 16-bit word.
    U16,
    /// 17–32 flags in a 32-bit word.
    U32,
    /// More than 32 flags in an array of 32-bit words.
    Words(u32),
}

impl FlagsRepr {
    /// The representation for `count` flags.
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => FlagsRepr::Empty,
            1..=8 => FlagsRepr::U8,
            9..=16 => FlagsRepr::U16,
            17..=32 => FlagsRepr::U32,
            n => FlagsRepr::Words(n.div_ceil(32) as u32),
        }
    }

    /// Size in bytes.
    pub fn byte_size(&self) -> u32 {
        match self {
            FlagsRepr::Empty => 0,
            FlagsRepr::U8 => 1,
            FlagsRepr::U16 => 2,
            FlagsRepr::U32 => 4,
            FlagsRepr::Words(n) => n * 4,
        }
    }

    /// Alignment.
    pub fn alignment(&self) -> u32 {
        match self {
            FlagsRepr::Empty | FlagsRepr::U8 => 1,
            FlagsRepr::U16 => 2,
            FlagsRepr::U32 | FlagsRepr::Words(_) => 4,
        }
    }

    /// Number of 32-bit words in the native bit storage.
    pub fn word_count(&self) -> usize {
        match self {
            FlagsRepr::Empty => 0,
            FlagsRepr::U8 | FlagsRepr::U16 | FlagsRepr::U32 => 1,
            FlagsRepr::Words(n) => *n as usize,
        }
    }

    /// Number of `i32` flat slots.
    pub fn flat_count(&self) -> usize {
        match self {
            FlagsRepr::Empty => 0,
            FlagsRepr::U8 | FlagsRepr::U16 | FlagsRepr::U32 => 1,
            FlagsRepr::Words(n) => *n as usize,
        }
    }
}

/// A component-level type descriptor.
///
/// Primitive descriptors are unit variants; composite descriptors carry
/// their shape behind an [`Arc`] so cloning a descriptor tree is cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum ValType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    Char,
    String,
    List(Arc<ListType>),
    /// Typed-buffer shortcut for `list<numeric>`: same wire layout as the
    /// generic list, bulk-copied and surfaced as a contiguous array.
    Buffer(NumericKind),
    Record(Arc<RecordType>),
    Tuple(Arc<TupleType>),
    Variant(Arc<VariantType>),
    Enum(Arc<EnumType>),
    Flags(Arc<FlagsType>),
    Option(Arc<OptionType>),
    Result(Arc<ResultType>),
    Own(Arc<ResourceType>),
    Borrow(Arc<ResourceType>),
    Resource(Arc<ResourceType>),
}

impl ValType {
    /// A `list<element>` descriptor.
    pub fn list(element: ValType) -> Self {
        ValType::List(Arc::new(ListType { element }))
    }

    /// A typed-buffer descriptor over the given numeric shape.
    pub fn buffer(kind: NumericKind) -> Self {
        ValType::Buffer(kind)
    }

    /// A positional tuple descriptor.
    pub fn tuple(items: impl IntoIterator<Item = ValType>) -> Self {
        ValType::Tuple(Arc::new(TupleType::new(items.into_iter().collect())))
    }

    /// A record descriptor with named fields in declaration order.
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, ValType)>) -> Self {
        ValType::Record(Arc::new(RecordType::new(
            fields
                .into_iter()
                .map(|(name, ty)| RecordField {
                    name: name.into(),
                    ty,
                })
                .collect(),
        )))
    }

    /// A variant descriptor over positional cases, `None` marking a
    /// payload-less case.
    pub fn variant(cases: impl IntoIterator<Item = Option<ValType>>) -> Result<Self> {
        Ok(ValType::Variant(Arc::new(VariantType::new(
            cases.into_iter().collect(),
        )?)))
    }

    /// An enum descriptor with `case_count` payload-less cases.
    pub fn enumeration(case_count: u32) -> Result<Self> {
        Ok(ValType::Enum(Arc::new(EnumType::new(case_count)?)))
    }

    /// A flags descriptor over the given names in declaration order.
    pub fn flags<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        ValType::Flags(Arc::new(FlagsType::new(names)))
    }

    /// An `option<payload>` descriptor.
    pub fn option(payload: ValType) -> Self {
        ValType::Option(Arc::new(OptionType::new(payload)))
    }

    /// A `result<ok, err>` descriptor; either payload may be absent.
    pub fn result(ok: Option<ValType>, err: Option<ValType>) -> Self {
        ValType::Result(Arc::new(ResultType::new(ok, err)))
    }

    /// An owned handle to `resource`.
    pub fn own(resource: Arc<ResourceType>) -> Self {
        ValType::Own(resource)
    }

    /// A borrowed handle to `resource`.
    pub fn borrow(resource: Arc<ResourceType>) -> Self {
        ValType::Borrow(resource)
    }

    /// The enumerated kind tag.
    pub fn kind(&self) -> TypeKind {
        match self {
            ValType::Bool => TypeKind::Bool,
            ValType::U8 => TypeKind::U8,
            ValType::U16 => TypeKind::U16,
            ValType::U32 => TypeKind::U32,
            ValType::U64 => TypeKind::U64,
            ValType::S8 => TypeKind::S8,
            ValType::S16 => TypeKind::S16,
            ValType::S32 => TypeKind::S32,
            ValType::S64 => TypeKind::S64,
            ValType::F32 => TypeKind::F32,
            ValType::F64 => TypeKind::F64,
            ValType::Char => TypeKind::Char,
            ValType::String => TypeKind::String,
            ValType::List(_) | ValType::Buffer(_) => TypeKind::List,
            ValType::Record(_) => TypeKind::Record,
            ValType::Tuple(_) => TypeKind::Tuple,
            ValType::Variant(_) => TypeKind::Variant,
            ValType::Enum(_) => TypeKind::Enum,
            ValType::Flags(_) => TypeKind::Flags,
            ValType::Option(_) => TypeKind::Option,
            ValType::Result(_) => TypeKind::Result,
            ValType::Own(_) => TypeKind::Own,
            ValType::Borrow(_) => TypeKind::Borrow,
            ValType::Resource(_) => TypeKind::Resource,
        }
    }

    /// Footprint in linear memory, in bytes, including internal padding.
    pub fn byte_size(&self) -> u32 {
        match self {
            ValType::Bool | ValType::U8 | ValType::S8 => 1,
            ValType::U16 | ValType::S16 => 2,
            ValType::U32 | ValType::S32 | ValType::F32 | ValType::Char => 4,
            ValType::U64 | ValType::S64 | ValType::F64 => 8,
            ValType::String | ValType::List(_) | ValType::Buffer(_) => 8,
            ValType::Record(r) => r.size,
            ValType::Tuple(t) => t.size,
            ValType::Variant(v) => v.layout.size,
            ValType::Enum(e) => e.disc.byte_size(),
            ValType::Flags(f) => f.repr.byte_size(),
            ValType::Option(o) => o.layout.size,
            ValType::Result(r) => r.layout.size,
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => 4,
        }
    }

    /// Alignment in linear memory; a power of two in `{1, 2, 4, 8}`.
    pub fn alignment(&self) -> u32 {
        match self {
            ValType::Bool | ValType::U8 | ValType::S8 => 1,
            ValType::U16 | ValType::S16 => 2,
            ValType::U32 | ValType::S32 | ValType::F32 | ValType::Char => 4,
            ValType::U64 | ValType::S64 | ValType::F64 => 8,
            ValType::String | ValType::List(_) | ValType::Buffer(_) => 4,
            ValType::Record(r) => r.align,
            ValType::Tuple(t) => t.align,
            ValType::Variant(v) => v.layout.align,
            ValType::Enum(e) => e.disc.alignment(),
            ValType::Flags(f) => f.repr.alignment(),
            ValType::Option(o) => o.layout.align,
            ValType::Result(r) => r.layout.align,
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => 4,
        }
    }

    /// Append this type's flat machine types to `out`.
    pub(crate) fn push_flat(&self, out: &mut Vec<FlatType>) {
        match self {
            ValType::Bool
            | ValType::U8
            | ValType::U16
            | ValType::U32
            | ValType::S8
            | ValType::S16
            | ValType::S32
            | ValType::Char
            | ValType::Own(_)
            | ValType::Borrow(_)
            | ValType::Resource(_) => out.push(FlatType::I32),
            ValType::U64 | ValType::S64 => out.push(FlatType::I64),
            ValType::F32 => out.push(FlatType::F32),
            ValType::F64 => out.push(FlatType::F64),
            ValType::String | ValType::List(_) | ValType::Buffer(_) => {
                out.extend([FlatType::I32, FlatType::I32])
            }
            ValType::Record(r) => out.extend(&r.flat),
            ValType::Tuple(t) => out.extend(&t.flat),
            ValType::Variant(v) => out.extend(&v.layout.flat),
            ValType::Enum(_) => out.push(FlatType::I32),
            ValType::Flags(f) => {
                out.extend(std::iter::repeat(FlatType::I32).take(f.repr.flat_count()))
            }
            ValType::Option(o) => out.extend(&o.layout.flat),
            ValType::Result(r) => out.extend(&r.layout.flat),
        }
    }

    /// The ordered flat machine-type signature of this type.
    pub fn flat_types(&self) -> Vec<FlatType> {
        let mut out = Vec::new();
        self.push_flat(&mut out);
        out
    }

    /// The number of flat slots this type occupies.
    pub fn flat_count(&self) -> usize {
        match self {
            ValType::Record(r) => r.flat.len(),
            ValType::Tuple(t) => t.flat.len(),
            ValType::Variant(v) => v.layout.flat.len(),
            ValType::Flags(f) => f.repr.flat_count(),
            ValType::Option(o) => o.layout.flat.len(),
            ValType::Result(r) => r.layout.flat.len(),
            ValType::String | ValType::List(_) | ValType::Buffer(_) => 2,
            _ => 1,
        }
    }
}

/// A generic `list<T>` descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ListType {
    pub(crate) element: ValType,
}

impl ListType {
    /// The element descriptor.
    pub fn element(&self) -> &ValType {
        &self.element
    }
}

/// One named record field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub ty: ValType,
}

/// A record descriptor: named fields at padded offsets in declaration
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    fields: Vec<RecordField>,
    offsets: Vec<u32>,
    size: u32,
    align: u32,
    flat: Vec<FlatType>,
}

impl RecordType {
    pub fn new(fields: Vec<RecordField>) -> Self {
        let (offsets, size, align) = layout_fields(fields.iter().map(|f| &f.ty));
        let mut flat = Vec::new();
        for field in &fields {
            field.ty.push_flat(&mut flat);
        }
        Self {
            fields,
            offsets,
            size,
            align,
            flat,
        }
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    /// The byte offset of each field, parallel to [`fields`].
    ///
    /// [`fields`]: RecordType::fields
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }
}

/// A tuple descriptor: a record without field names.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleType {
    items: Vec<ValType>,
    offsets: Vec<u32>,
    size: u32,
    align: u32,
    flat: Vec<FlatType>,
}

impl TupleType {
    pub fn new(items: Vec<ValType>) -> Self {
        let (offsets, size, align) = layout_fields(items.iter());
        let mut flat = Vec::new();
        for item in &items {
            item.push_flat(&mut flat);
        }
        Self {
            items,
            offsets,
            size,
            align,
            flat,
        }
    }

    /// The item descriptors in order.
    pub fn items(&self) -> &[ValType] {
        &self.items
    }

    /// The byte offset of each item, parallel to [`items`].
    ///
    /// [`items`]: TupleType::items
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Total size in bytes.
    pub fn byte_size(&self) -> u32 {
        self.size
    }

    /// Alignment in bytes.
    pub fn alignment(&self) -> u32 {
        self.align
    }
}

/// Assign offsets in declaration order: round each up to the field's
/// alignment, then consume its size. Returns `(offsets, size, align)`.
fn layout_fields<'a>(types: impl Iterator<Item = &'a ValType>) -> (Vec<u32>, u32, u32) {
    let mut offsets = Vec::new();
    let mut offset = 0u32;
    let mut align = 1u32;
    for ty in types {
        let a = ty.alignment();
        align = align.max(a);
        offset = align_to(offset, a);
        offsets.push(offset);
        offset += ty.byte_size();
    }
    (offsets, offset, align)
}

/// A named-boolean set descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagsType {
    names: Vec<String>,
    repr: FlagsRepr,
}

impl FlagsType {
    pub fn new<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let repr = FlagsRepr::from_count(names.len());
        Self { names, repr }
    }

    /// The flag names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The storage representation chosen by flag count.
    pub fn repr(&self) -> FlagsRepr {
        self.repr
    }

    /// The declared position of `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A payload-less case set descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    case_count: u32,
    pub(crate) disc: DiscriminantSize,
}

impl EnumType {
    pub fn new(case_count: u32) -> Result<Self> {
        let disc = DiscriminantSize::from_count(case_count as usize)
            .ok_or_else(|| CanonicalAbiError::abi("enum must have at least one case"))?;
        Ok(Self { case_count, disc })
    }

    /// Number of cases.
    pub fn case_count(&self) -> u32 {
        self.case_count
    }
}

/// A tagged union descriptor over positional cases.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantType {
    cases: Vec<Option<ValType>>,
    pub(crate) layout: VariantLayout,
}

impl VariantType {
    pub fn new(cases: Vec<Option<ValType>>) -> Result<Self> {
        let layout = VariantLayout::compute(&cases)?;
        Ok(Self { cases, layout })
    }

    /// The case payload descriptors in declaration order.
    pub fn cases(&self) -> &[Option<ValType>] {
        &self.cases
    }
}

/// An `option<T>` descriptor: a two-case variant `none | some(T)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionType {
    payload: ValType,
    pub(crate) layout: VariantLayout,
}

impl OptionType {
    pub fn new(payload: ValType) -> Self {
        let layout =
            VariantLayout::with_disc(DiscriminantSize::Size1, &[None, Some(payload.clone())]);
        Self { payload, layout }
    }

    /// The `some` payload descriptor.
    pub fn payload(&self) -> &ValType {
        &self.payload
    }
}

/// A `result<O, E>` descriptor: a two-case variant `ok(O?) | err(E?)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultType {
    ok: Option<ValType>,
    err: Option<ValType>,
    pub(crate) layout: VariantLayout,
}

impl ResultType {
    pub fn new(ok: Option<ValType>, err: Option<ValType>) -> Self {
        let layout = VariantLayout::with_disc(DiscriminantSize::Size1, &[ok.clone(), err.clone()]);
        Self { ok, err, layout }
    }

    /// The `ok` payload descriptor, if any.
    pub fn ok(&self) -> Option<&ValType> {
        self.ok.as_ref()
    }

    /// The `err` payload descriptor, if any.
    pub fn err(&self) -> Option<&ValType> {
        self.err.as_ref()
    }
}

/// The derived layout shared by variant, option and result descriptors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VariantLayout {
    pub disc: DiscriminantSize,
    /// Byte offset of the payload region: the discriminant size rounded
    /// up to the maximum case alignment.
    pub payload_offset: u32,
    pub size: u32,
    pub align: u32,
    /// `[i32 discriminant]` followed by the per-slot join of the cases.
    pub flat: Vec<FlatType>,
    /// Each case's own slot types, before joining.
    pub case_flats: Vec<Vec<FlatType>>,
}

impl VariantLayout {
    fn compute(cases: &[Option<ValType>]) -> Result<Self> {
        let disc = DiscriminantSize::from_count(cases.len()).ok_or_else(|| {
            CanonicalAbiError::abi(format!(
                "variant case count {} outside 1..=2^32",
                cases.len()
            ))
        })?;
        let layout = Self::with_disc(disc, cases);
        for flats in &layout.case_flats {
            for (i, ft) in flats.iter().enumerate() {
                let joined = layout.flat[i + 1];
                if !widens_to(*ft, joined) {
                    return Err(CanonicalAbiError::abi(format!(
                        "case slot {i} of type {ft:?} does not fit joined slot {joined:?}"
                    )));
                }
            }
        }
        Ok(layout)
    }

    fn with_disc(disc: DiscriminantSize, cases: &[Option<ValType>]) -> Self {
        let payloads = || cases.iter().filter_map(|c| c.as_ref());
        let max_align = payloads().map(ValType::alignment).max().unwrap_or(1);
        let max_payload = payloads().map(ValType::byte_size).max().unwrap_or(0);
        let payload_offset = align_to(disc.byte_size(), max_align);

        let case_flats: Vec<Vec<FlatType>> = cases
            .iter()
            .map(|c| c.as_ref().map(ValType::flat_types).unwrap_or_default())
            .collect();
        let mut joined: Vec<FlatType> = Vec::new();
        for flats in &case_flats {
            for (i, ft) in flats.iter().enumerate() {
                match joined.get_mut(i) {
                    Some(j) => *j = join(*j, *ft),
                    None => joined.push(*ft),
                }
            }
        }

        let mut flat = vec![FlatType::I32];
        flat.extend(joined);

        Self {
            disc,
            payload_offset,
            size: payload_offset + max_payload,
            align: disc.alignment().max(max_align),
            flat,
            case_flats,
        }
    }
}

/// Join two slot needs at the same position: equal types stay, `i32`
/// with `f32` becomes `i32`, anything else becomes `i64`.
fn join(a: FlatType, b: FlatType) -> FlatType {
    if a == b {
        a
    } else if matches!(
        (a, b),
        (FlatType::I32, FlatType::F32) | (FlatType::F32, FlatType::I32)
    ) {
        FlatType::I32
    } else {
        FlatType::I64
    }
}

/// Whether a case slot of type `want` can be widened into a joined slot
/// of type `joined` by the reinterpret rules.
fn widens_to(want: FlatType, joined: FlatType) -> bool {
    want == joined
        || matches!(
            (want, joined),
            (FlatType::F32, FlatType::I32)
                | (FlatType::I32, FlatType::I64)
                | (FlatType::F32, FlatType::I64)
                | (FlatType::F64, FlatType::I64)
        )
}

/// A named resource whose instances travel as opaque 32-bit handles.
///
/// The descriptor carries the functions associated with the resource
/// (constructors, methods, statics); the host and service factories
/// enumerate them when building call tables. The function table is
/// attached once after construction so methods can reference handle
/// types of the resource they belong to.
#[derive(Debug)]
pub struct ResourceType {
    name: String,
    wire_name: String,
    functions: OnceCell<Vec<Arc<FunctionType>>>,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, wire_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            wire_name: wire_name.into(),
            functions: OnceCell::new(),
        })
    }

    /// The native-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ABI-side name.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// Attach the associated functions. Fails if already attached.
    pub fn define_functions(&self, functions: Vec<Arc<FunctionType>>) -> Result<()> {
        self.functions.set(functions).map_err(|_| {
            CanonicalAbiError::abi(format!("functions of resource `{}` already defined", self.name))
        })
    }

    /// The associated functions, empty until defined.
    pub fn functions(&self) -> &[Arc<FunctionType>] {
        self.functions.get().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.wire_name == other.wire_name
    }
}
