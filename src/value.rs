//! Owned native values produced by loading/lifting and consumed by
//! storing/lowering.
//!
//! [`Value`] spans every decodable shape: scalar numerics, strings,
//! lists and typed buffers, records and tuples, positional variants,
//! enums, flags, options, results and resource handles. Values created
//! by `load`/`lift` are freshly owned by the caller.

use std::sync::Arc;

use crate::abi::error::{CanonicalAbiError, Result};
use crate::types::{FlagsType, NumericKind};

/// An owned component-level value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    Buffer(Buffer),
    /// Named fields in the record's declaration order.
    Record(Vec<(String, Value)>),
    Tuple(Vec<Value>),
    Variant {
        case: u32,
        payload: Option<Box<Value>>,
    },
    /// A case index into the enum's declared cases.
    Enum(u32),
    Flags(FlagsValue),
    /// The tagged option form.
    Option(Option<Box<Value>>),
    Result(std::result::Result<Option<Box<Value>>, Option<Box<Value>>>),
    /// An opaque resource handle (`own` or `borrow`).
    Resource(u32),
    /// The absent case of an option marshaled in the unpacked form.
    Null,
}

impl Value {
    /// `some(value)` in the tagged option form.
    pub fn some(value: Value) -> Value {
        Value::Option(Some(Box::new(value)))
    }

    /// `none` in the tagged option form.
    pub fn none() -> Value {
        Value::Option(None)
    }

    /// `ok(value)` of a result.
    pub fn ok(value: Value) -> Value {
        Value::Result(Ok(Some(Box::new(value))))
    }

    /// `err(value)` of a result.
    pub fn err(value: Value) -> Value {
        Value::Result(Err(Some(Box::new(value))))
    }

    /// A variant case with an optional payload.
    pub fn variant(case: u32, payload: Option<Value>) -> Value {
        Value::Variant {
            case,
            payload: payload.map(Box::new),
        }
    }

    /// A short tag naming the value's shape, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::S8(_) => "s8",
            Value::S16(_) => "s16",
            Value::S32(_) => "s32",
            Value::S64(_) => "s64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Buffer(_) => "buffer",
            Value::Record(_) => "record",
            Value::Tuple(_) => "tuple",
            Value::Variant { .. } => "variant",
            Value::Enum(_) => "enum",
            Value::Flags(_) => "flags",
            Value::Option(_) => "option",
            Value::Result(_) => "result",
            Value::Resource(_) => "resource",
            Value::Null => "null",
        }
    }

    fn mismatch(&self, expected: &str) -> CanonicalAbiError {
        CanonicalAbiError::mismatch(expected, self.kind_name())
    }

    pub fn expect_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn expect_u8(&self) -> Result<u8> {
        match self {
            Value::U8(v) => Ok(*v),
            other => Err(other.mismatch("u8")),
        }
    }

    pub fn expect_u16(&self) -> Result<u16> {
        match self {
            Value::U16(v) => Ok(*v),
            other => Err(other.mismatch("u16")),
        }
    }

    pub fn expect_u32(&self) -> Result<u32> {
        match self {
            Value::U32(v) => Ok(*v),
            other => Err(other.mismatch("u32")),
        }
    }

    pub fn expect_u64(&self) -> Result<u64> {
        match self {
            Value::U64(v) => Ok(*v),
            other => Err(other.mismatch("u64")),
        }
    }

    pub fn expect_s8(&self) -> Result<i8> {
        match self {
            Value::S8(v) => Ok(*v),
            other => Err(other.mismatch("s8")),
        }
    }

    pub fn expect_s16(&self) -> Result<i16> {
        match self {
            Value::S16(v) => Ok(*v),
            other => Err(other.mismatch("s16")),
        }
    }

    pub fn expect_s32(&self) -> Result<i32> {
        match self {
            Value::S32(v) => Ok(*v),
            other => Err(other.mismatch("s32")),
        }
    }

    pub fn expect_s64(&self) -> Result<i64> {
        match self {
            Value::S64(v) => Ok(*v),
            other => Err(other.mismatch("s64")),
        }
    }

    pub fn expect_f32(&self) -> Result<f32> {
        match self {
            Value::F32(v) => Ok(*v),
            other => Err(other.mismatch("f32")),
        }
    }

    pub fn expect_f64(&self) -> Result<f64> {
        match self {
            Value::F64(v) => Ok(*v),
            other => Err(other.mismatch("f64")),
        }
    }

    pub fn expect_char(&self) -> Result<char> {
        match self {
            Value::Char(v) => Ok(*v),
            other => Err(other.mismatch("char")),
        }
    }

    pub fn expect_str(&self) -> Result<&str> {
        match self {
            Value::String(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn expect_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn expect_buffer(&self) -> Result<&Buffer> {
        match self {
            Value::Buffer(v) => Ok(v),
            other => Err(other.mismatch("buffer")),
        }
    }

    pub fn expect_record(&self) -> Result<&[(String, Value)]> {
        match self {
            Value::Record(v) => Ok(v),
            other => Err(other.mismatch("record")),
        }
    }

    pub fn expect_tuple(&self) -> Result<&[Value]> {
        match self {
            Value::Tuple(v) => Ok(v),
            other => Err(other.mismatch("tuple")),
        }
    }

    pub fn expect_variant(&self) -> Result<(u32, Option<&Value>)> {
        match self {
            Value::Variant { case, payload } => Ok((*case, payload.as_deref())),
            other => Err(other.mismatch("variant")),
        }
    }

    pub fn expect_enum(&self) -> Result<u32> {
        match self {
            Value::Enum(v) => Ok(*v),
            other => Err(other.mismatch("enum")),
        }
    }

    pub fn expect_flags(&self) -> Result<&FlagsValue> {
        match self {
            Value::Flags(v) => Ok(v),
            other => Err(other.mismatch("flags")),
        }
    }

    pub fn expect_result(
        &self,
    ) -> Result<&std::result::Result<Option<Box<Value>>, Option<Box<Value>>>> {
        match self {
            Value::Result(v) => Ok(v),
            other => Err(other.mismatch("result")),
        }
    }

    pub fn expect_resource(&self) -> Result<u32> {
        match self {
            Value::Resource(v) => Ok(*v),
            other => Err(other.mismatch("resource")),
        }
    }
}

/// A contiguous numeric array, the native form of a typed buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    S8(Vec<i8>),
    S16(Vec<i16>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Buffer {
    /// The numeric shape of the elements.
    pub fn kind(&self) -> NumericKind {
        match self {
            Buffer::U8(_) => NumericKind::U8,
            Buffer::U16(_) => NumericKind::U16,
            Buffer::U32(_) => NumericKind::U32,
            Buffer::U64(_) => NumericKind::U64,
            Buffer::S8(_) => NumericKind::S8,
            Buffer::S16(_) => NumericKind::S16,
            Buffer::S32(_) => NumericKind::S32,
            Buffer::S64(_) => NumericKind::S64,
            Buffer::F32(_) => NumericKind::F32,
            Buffer::F64(_) => NumericKind::F64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Buffer::U8(v) => v.len(),
            Buffer::U16(v) => v.len(),
            Buffer::U32(v) => v.len(),
            Buffer::U64(v) => v.len(),
            Buffer::S8(v) => v.len(),
            Buffer::S16(v) => v.len(),
            Buffer::S32(v) => v.len(),
            Buffer::S64(v) => v.len(),
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
        }
    }

    /// Whether the buffer has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The native form of a flags value: named booleans over packed bit
/// words, mutated in place.
///
/// Equality compares both the declared flag names and the underlying
/// bits, so two values with identical bits under different declarations
/// are unequal. Iteration follows the descriptor's declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagsValue {
    ty: Arc<FlagsType>,
    words: Vec<u32>,
}

impl FlagsValue {
    /// All flags cleared.
    pub fn new(ty: &Arc<FlagsType>) -> Self {
        Self {
            ty: ty.clone(),
            words: vec![0; ty.repr().word_count()],
        }
    }

    /// Build from wire words, clearing any bits past the declared flags.
    pub(crate) fn from_words(ty: &Arc<FlagsType>, mut words: Vec<u32>) -> Self {
        let len = words.len();
        if let Some(last) = words.last_mut() {
            let used = ty.names().len() - (len - 1) * 32;
            if used < 32 {
                *last &= (1u32 << used) - 1;
            }
        }
        Self {
            ty: ty.clone(),
            words,
        }
    }

    /// The flags descriptor this value belongs to.
    pub fn ty(&self) -> &Arc<FlagsType> {
        &self.ty
    }

    /// The packed bit words, least-significant flag first.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Whether `name` is set; `None` for an undeclared name.
    pub fn get(&self, name: &str) -> Option<bool> {
        let i = self.ty.index_of(name)?;
        Some(self.words[i >> 5] & (1 << (i & 31)) != 0)
    }

    /// Set or clear `name`, mutating the underlying bits.
    pub fn set(&mut self, name: &str, on: bool) -> Result<()> {
        let i = self.ty.index_of(name).ok_or_else(|| {
            CanonicalAbiError::validation("flags", format!("unknown flag `{name}`"))
        })?;
        let mask = 1u32 << (i & 31);
        if on {
            self.words[i >> 5] |= mask;
        } else {
            self.words[i >> 5] &= !mask;
        }
        Ok(())
    }

    /// Iterate `(name, set)` pairs in declared order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.ty.names().iter().enumerate().map(|(i, name)| {
            let set = self.words[i >> 5] & (1 << (i & 31)) != 0;
            (name.as_str(), set)
        })
    }
}
