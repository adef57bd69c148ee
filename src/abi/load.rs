//! Decoding values from linear memory.

use crate::abi::buffer::{read_u16, read_u32, read_u64, read_u8};
use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::memory::GuestMemory;
use crate::abi::string;
use crate::abi::CanonOptions;
use crate::types::{DiscriminantSize, FlagsRepr, NumericKind, ValType};
use crate::value::{Buffer, FlagsValue, Value};

impl ValType {
    /// Load a value of this type from linear memory at `ptr`.
    ///
    /// `ptr` is assumed aligned to [`alignment`]; callers align by
    /// rounding up. The returned value is freshly owned.
    ///
    /// [`alignment`]: ValType::alignment
    pub fn load<M: GuestMemory + ?Sized>(
        &self,
        mem: &M,
        ptr: u32,
        opts: &CanonOptions,
    ) -> Result<Value> {
        let data = mem.data();
        match self {
            ValType::Bool => Ok(Value::Bool(read_u8(data, ptr)? != 0)),
            ValType::U8 => Ok(Value::U8(read_u8(data, ptr)?)),
            ValType::U16 => Ok(Value::U16(read_u16(data, ptr)?)),
            ValType::U32 => Ok(Value::U32(read_u32(data, ptr)?)),
            ValType::U64 => Ok(Value::U64(read_u64(data, ptr)?)),
            ValType::S8 => Ok(Value::S8(read_u8(data, ptr)? as i8)),
            ValType::S16 => Ok(Value::S16(read_u16(data, ptr)? as i16)),
            ValType::S32 => Ok(Value::S32(read_u32(data, ptr)? as i32)),
            ValType::S64 => Ok(Value::S64(read_u64(data, ptr)? as i64)),
            ValType::F32 => Ok(Value::F32(f32::from_bits(read_u32(data, ptr)?))),
            ValType::F64 => Ok(Value::F64(f64::from_bits(read_u64(data, ptr)?))),
            ValType::Char => Ok(Value::Char(char_from_code(read_u32(data, ptr)?)?)),
            ValType::String => {
                let body = read_u32(data, ptr)?;
                let units = read_u32(data, ptr + 4)?;
                Ok(Value::String(string::decode(
                    data,
                    body,
                    units,
                    opts.string_encoding,
                )?))
            }
            ValType::List(l) => {
                let body = read_u32(data, ptr)?;
                let len = read_u32(data, ptr + 4)?;
                load_list(mem, l.element(), body, len, opts)
            }
            ValType::Buffer(kind) => {
                let body = read_u32(data, ptr)?;
                let len = read_u32(data, ptr + 4)?;
                Ok(Value::Buffer(load_buffer(data, *kind, body, len)?))
            }
            ValType::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields().len());
                for (field, offset) in r.fields().iter().zip(r.offsets()) {
                    let value = field.ty.load(mem, ptr + offset, opts)?;
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::Record(fields))
            }
            ValType::Tuple(t) => {
                let mut items = Vec::with_capacity(t.items().len());
                for (item, offset) in t.items().iter().zip(t.offsets()) {
                    items.push(item.load(mem, ptr + offset, opts)?);
                }
                Ok(Value::Tuple(items))
            }
            ValType::Variant(v) => {
                let disc = read_discriminant(data, ptr, v.layout.disc)?;
                let case = v.cases().get(disc as usize).ok_or_else(|| {
                    CanonicalAbiError::validation(
                        "variant",
                        format!("discriminant {disc} out of range for {} cases", v.cases().len()),
                    )
                })?;
                let payload = match case {
                    Some(ty) => Some(Box::new(ty.load(
                        mem,
                        ptr + v.layout.payload_offset,
                        opts,
                    )?)),
                    None => None,
                };
                Ok(Value::Variant {
                    case: disc,
                    payload,
                })
            }
            ValType::Enum(e) => {
                let disc = read_discriminant(data, ptr, e.disc)?;
                if disc >= e.case_count() {
                    return Err(CanonicalAbiError::validation(
                        "enum",
                        format!("discriminant {disc} out of range for {} cases", e.case_count()),
                    ));
                }
                Ok(Value::Enum(disc))
            }
            ValType::Flags(f) => {
                let repr = f.repr();
                let mut words = Vec::with_capacity(repr.word_count());
                match repr {
                    FlagsRepr::Empty => {}
                    FlagsRepr::U8 => words.push(read_u8(data, ptr)? as u32),
                    FlagsRepr::U16 => words.push(read_u16(data, ptr)? as u32),
                    FlagsRepr::U32 => words.push(read_u32(data, ptr)?),
                    FlagsRepr::Words(n) => {
                        for i in 0..n {
                            words.push(read_u32(data, ptr + i * 4)?);
                        }
                    }
                }
                Ok(Value::Flags(FlagsValue::from_words(f, words)))
            }
            ValType::Option(o) => {
                let disc = read_u8(data, ptr)?;
                match disc {
                    0 => Ok(none_value(opts)),
                    1 => {
                        let payload =
                            o.payload().load(mem, ptr + o.layout.payload_offset, opts)?;
                        Ok(some_value(payload, opts))
                    }
                    other => Err(CanonicalAbiError::validation(
                        "option",
                        format!("discriminant {other} out of range"),
                    )),
                }
            }
            ValType::Result(r) => {
                let disc = read_u8(data, ptr)?;
                let payload_at = ptr + r.layout.payload_offset;
                match disc {
                    0 => {
                        let ok = match r.ok() {
                            Some(ty) => Some(Box::new(ty.load(mem, payload_at, opts)?)),
                            None => None,
                        };
                        Ok(Value::Result(Ok(ok)))
                    }
                    1 => {
                        let err = match r.err() {
                            Some(ty) => Some(Box::new(ty.load(mem, payload_at, opts)?)),
                            None => None,
                        };
                        Ok(Value::Result(Err(err)))
                    }
                    other => Err(CanonicalAbiError::validation(
                        "result",
                        format!("discriminant {other} out of range"),
                    )),
                }
            }
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => {
                Ok(Value::Resource(read_u32(data, ptr)?))
            }
        }
    }
}

/// The tagged or collapsed `none`, per the option policy.
pub(crate) fn none_value(opts: &CanonOptions) -> Value {
    if opts.keep_option {
        Value::Option(None)
    } else {
        Value::Null
    }
}

/// The tagged or collapsed `some(payload)`, per the option policy.
pub(crate) fn some_value(payload: Value, opts: &CanonOptions) -> Value {
    if opts.keep_option {
        Value::Option(Some(Box::new(payload)))
    } else {
        payload
    }
}

/// Validate a code point: surrogates and values past the scalar range
/// are rejected.
pub(crate) fn char_from_code(code: u32) -> Result<char> {
    char::from_u32(code).ok_or_else(|| {
        CanonicalAbiError::validation("char", format!("code point {code:#x} is not a scalar value"))
    })
}

pub(crate) fn read_discriminant(data: &[u8], ptr: u32, disc: DiscriminantSize) -> Result<u32> {
    match disc {
        DiscriminantSize::Size1 => Ok(read_u8(data, ptr)? as u32),
        DiscriminantSize::Size2 => Ok(read_u16(data, ptr)? as u32),
        DiscriminantSize::Size4 => read_u32(data, ptr),
    }
}

/// Load `len` elements of `elem` starting at `ptr`.
pub(crate) fn load_list<M: GuestMemory + ?Sized>(
    mem: &M,
    elem: &ValType,
    ptr: u32,
    len: u32,
    opts: &CanonOptions,
) -> Result<Value> {
    let size = elem.byte_size();
    check_region(mem.data(), ptr, len, size)?;
    let mut items = Vec::with_capacity(len as usize);
    for i in 0..len {
        items.push(elem.load(mem, ptr + i * size, opts)?);
    }
    Ok(Value::List(items))
}

/// Bulk-decode `len` numeric elements starting at `ptr`.
pub(crate) fn load_buffer(data: &[u8], kind: NumericKind, ptr: u32, len: u32) -> Result<Buffer> {
    let elem = kind.elem_size();
    check_region(data, ptr, len, elem)?;
    let bytes = crate::abi::buffer::read_bytes(data, ptr, len * elem)?;
    let buffer = match kind {
        NumericKind::U8 => Buffer::U8(bytes.to_vec()),
        NumericKind::S8 => Buffer::S8(bytes.iter().map(|b| *b as i8).collect()),
        NumericKind::U16 => Buffer::U16(le_chunks(bytes, u16::from_le_bytes)),
        NumericKind::S16 => Buffer::S16(le_chunks(bytes, i16::from_le_bytes)),
        NumericKind::U32 => Buffer::U32(le_chunks(bytes, u32::from_le_bytes)),
        NumericKind::S32 => Buffer::S32(le_chunks(bytes, i32::from_le_bytes)),
        NumericKind::U64 => Buffer::U64(le_chunks(bytes, u64::from_le_bytes)),
        NumericKind::S64 => Buffer::S64(le_chunks(bytes, i64::from_le_bytes)),
        NumericKind::F32 => Buffer::F32(le_chunks(bytes, f32::from_le_bytes)),
        NumericKind::F64 => Buffer::F64(le_chunks(bytes, f64::from_le_bytes)),
    };
    Ok(buffer)
}

fn le_chunks<T, const N: usize>(bytes: &[u8], decode: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut array = [0u8; N];
            array.copy_from_slice(chunk);
            decode(array)
        })
        .collect()
}

/// Reject `ptr + len * elem_size` regions that overflow the 32-bit
/// address space or reach past the end of memory.
fn check_region(data: &[u8], ptr: u32, len: u32, elem_size: u32) -> Result<()> {
    let total = len as u64 * elem_size as u64;
    let end = ptr as u64 + total;
    if end > u32::MAX as u64 || end > data.len() as u64 {
        return Err(CanonicalAbiError::MemoryAccess {
            ptr,
            len: total.min(u32::MAX as u64) as u32,
            size: data.len(),
        });
    }
    Ok(())
}
