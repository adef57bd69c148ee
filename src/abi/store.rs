//! Encoding values into linear memory.

use crate::abi::buffer::{write_u16, write_u32, write_u64, write_u8};
use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::memory::GuestMemory;
use crate::abi::string;
use crate::abi::CanonOptions;
use crate::types::{DiscriminantSize, FlagsRepr, ValType};
use crate::value::{Buffer, Value};

impl ValType {
    /// Store `value` into linear memory at `ptr`.
    ///
    /// `ptr` is assumed aligned to [`alignment`] with at least
    /// [`byte_size`] writable bytes. Variable-length bodies (string
    /// bytes, list elements) are placed in freshly allocated ranges
    /// which the core never reclaims.
    ///
    /// [`alignment`]: ValType::alignment
    /// [`byte_size`]: ValType::byte_size
    pub fn store<M: GuestMemory + ?Sized>(
        &self,
        mem: &mut M,
        ptr: u32,
        value: &Value,
        opts: &CanonOptions,
    ) -> Result<()> {
        match self {
            ValType::Bool => write_u8(mem.data_mut(), ptr, value.expect_bool()? as u8),
            ValType::U8 => write_u8(mem.data_mut(), ptr, value.expect_u8()?),
            ValType::U16 => write_u16(mem.data_mut(), ptr, value.expect_u16()?),
            ValType::U32 => write_u32(mem.data_mut(), ptr, value.expect_u32()?),
            ValType::U64 => write_u64(mem.data_mut(), ptr, value.expect_u64()?),
            ValType::S8 => write_u8(mem.data_mut(), ptr, value.expect_s8()? as u8),
            ValType::S16 => write_u16(mem.data_mut(), ptr, value.expect_s16()? as u16),
            ValType::S32 => write_u32(mem.data_mut(), ptr, value.expect_s32()? as u32),
            ValType::S64 => write_u64(mem.data_mut(), ptr, value.expect_s64()? as u64),
            ValType::F32 => write_u32(mem.data_mut(), ptr, value.expect_f32()?.to_bits()),
            ValType::F64 => write_u64(mem.data_mut(), ptr, value.expect_f64()?.to_bits()),
            ValType::Char => write_u32(mem.data_mut(), ptr, value.expect_char()? as u32),
            ValType::String => {
                let (body, units) = string::store(mem, value.expect_str()?, opts.string_encoding)?;
                write_u32(mem.data_mut(), ptr, body)?;
                write_u32(mem.data_mut(), ptr + 4, units)
            }
            ValType::List(l) => {
                let (body, len) = store_list(mem, l.element(), value.expect_list()?, opts)?;
                write_u32(mem.data_mut(), ptr, body)?;
                write_u32(mem.data_mut(), ptr + 4, len)
            }
            ValType::Buffer(kind) => {
                let buffer = value.expect_buffer()?;
                if buffer.kind() != *kind {
                    return Err(CanonicalAbiError::mismatch(
                        format!("{kind:?} buffer"),
                        format!("{:?} buffer", buffer.kind()),
                    ));
                }
                let (body, len) = store_buffer(mem, buffer)?;
                write_u32(mem.data_mut(), ptr, body)?;
                write_u32(mem.data_mut(), ptr + 4, len)
            }
            ValType::Record(r) => {
                let fields = value.expect_record()?;
                for (field, offset) in r.fields().iter().zip(r.offsets()) {
                    let (_, field_value) = fields
                        .iter()
                        .find(|(name, _)| name == &field.name)
                        .ok_or_else(|| {
                            CanonicalAbiError::mismatch(
                                format!("record field `{}`", field.name),
                                "missing",
                            )
                        })?;
                    field.ty.store(mem, ptr + offset, field_value, opts)?;
                }
                Ok(())
            }
            ValType::Tuple(t) => {
                let items = value.expect_tuple()?;
                if items.len() != t.items().len() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("tuple of {} items", t.items().len()),
                        format!("tuple of {} items", items.len()),
                    ));
                }
                for ((item_ty, offset), item) in t.items().iter().zip(t.offsets()).zip(items) {
                    item_ty.store(mem, ptr + offset, item, opts)?;
                }
                Ok(())
            }
            ValType::Variant(v) => {
                let (case, payload) = value.expect_variant()?;
                let case_ty = v.cases().get(case as usize).ok_or_else(|| {
                    CanonicalAbiError::validation(
                        "variant",
                        format!("case {case} out of range for {} cases", v.cases().len()),
                    )
                })?;
                write_discriminant(mem.data_mut(), ptr, v.layout.disc, case)?;
                store_payload(mem, case_ty.as_ref(), payload, ptr + v.layout.payload_offset, opts)
            }
            ValType::Enum(e) => {
                let case = value.expect_enum()?;
                if case >= e.case_count() {
                    return Err(CanonicalAbiError::validation(
                        "enum",
                        format!("case {case} out of range for {} cases", e.case_count()),
                    ));
                }
                write_discriminant(mem.data_mut(), ptr, e.disc, case)
            }
            ValType::Flags(f) => {
                let flags = value.expect_flags()?;
                if flags.ty().names() != f.names() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("flags over {:?}", f.names()),
                        format!("flags over {:?}", flags.ty().names()),
                    ));
                }
                let words = flags.words();
                match f.repr() {
                    FlagsRepr::Empty => Ok(()),
                    FlagsRepr::U8 => write_u8(mem.data_mut(), ptr, words[0] as u8),
                    FlagsRepr::U16 => write_u16(mem.data_mut(), ptr, words[0] as u16),
                    FlagsRepr::U32 => write_u32(mem.data_mut(), ptr, words[0]),
                    FlagsRepr::Words(n) => {
                        for i in 0..n {
                            write_u32(mem.data_mut(), ptr + i * 4, words[i as usize])?;
                        }
                        Ok(())
                    }
                }
            }
            ValType::Option(o) => {
                let (disc, payload) = option_parts(value, opts)?;
                write_u8(mem.data_mut(), ptr, disc)?;
                match payload {
                    Some(payload) => o.payload().store(
                        mem,
                        ptr + o.layout.payload_offset,
                        payload,
                        opts,
                    ),
                    None => Ok(()),
                }
            }
            ValType::Result(r) => {
                let payload_at = ptr + r.layout.payload_offset;
                match value.expect_result()? {
                    Ok(ok) => {
                        write_u8(mem.data_mut(), ptr, 0)?;
                        store_payload(mem, r.ok(), ok.as_deref(), payload_at, opts)
                    }
                    Err(err) => {
                        write_u8(mem.data_mut(), ptr, 1)?;
                        store_payload(mem, r.err(), err.as_deref(), payload_at, opts)
                    }
                }
            }
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => {
                write_u32(mem.data_mut(), ptr, value.expect_resource()?)
            }
        }
    }
}

/// Split a native option into `(discriminant, payload)` according to the
/// representation policy, rejecting the mismatched form.
pub(crate) fn option_parts<'v>(
    value: &'v Value,
    opts: &CanonOptions,
) -> Result<(u8, Option<&'v Value>)> {
    if opts.keep_option {
        match value {
            Value::Option(Some(payload)) => Ok((1, Some(payload))),
            Value::Option(None) => Ok((0, None)),
            _ => Err(CanonicalAbiError::OptionRepresentation {
                expected: "tagged",
                got: "unpacked",
            }),
        }
    } else {
        match value {
            Value::Option(_) => Err(CanonicalAbiError::OptionRepresentation {
                expected: "unpacked",
                got: "tagged",
            }),
            Value::Null => Ok((0, None)),
            payload => Ok((1, Some(payload))),
        }
    }
}

/// Store a variant/result payload, insisting the descriptor and the
/// value agree on its presence.
fn store_payload<M: GuestMemory + ?Sized>(
    mem: &mut M,
    ty: Option<&ValType>,
    payload: Option<&Value>,
    ptr: u32,
    opts: &CanonOptions,
) -> Result<()> {
    match (ty, payload) {
        (Some(ty), Some(payload)) => ty.store(mem, ptr, payload, opts),
        (None, None) => Ok(()),
        (Some(_), None) => Err(CanonicalAbiError::mismatch("case payload", "missing")),
        (None, Some(payload)) => {
            Err(CanonicalAbiError::mismatch("no payload", payload.kind_name()))
        }
    }
}

pub(crate) fn write_discriminant(
    data: &mut [u8],
    ptr: u32,
    disc: DiscriminantSize,
    value: u32,
) -> Result<()> {
    match disc {
        DiscriminantSize::Size1 => write_u8(data, ptr, value as u8),
        DiscriminantSize::Size2 => write_u16(data, ptr, value as u16),
        DiscriminantSize::Size4 => write_u32(data, ptr, value),
    }
}

/// Allocate and fill a list body, returning `(pointer, length)`.
pub(crate) fn store_list<M: GuestMemory + ?Sized>(
    mem: &mut M,
    elem: &ValType,
    items: &[Value],
    opts: &CanonOptions,
) -> Result<(u32, u32)> {
    let len = u32::try_from(items.len())
        .map_err(|_| CanonicalAbiError::validation("list", "length exceeds u32"))?;
    let size = elem.byte_size();
    let total = (len as u64) * (size as u64);
    let total = u32::try_from(total)
        .map_err(|_| CanonicalAbiError::validation("list", "byte length exceeds u32"))?;
    let ptr = mem.alloc(elem.alignment(), total);
    for (i, item) in items.iter().enumerate() {
        elem.store(mem, ptr + i as u32 * size, item, opts)?;
    }
    Ok((ptr, len))
}

/// Allocate and bulk-fill a typed-buffer body, returning
/// `(pointer, length)`.
pub(crate) fn store_buffer<M: GuestMemory + ?Sized>(
    mem: &mut M,
    buffer: &Buffer,
) -> Result<(u32, u32)> {
    let len = u32::try_from(buffer.len())
        .map_err(|_| CanonicalAbiError::validation("list", "length exceeds u32"))?;
    let elem = buffer.kind().elem_size();
    let total = u32::try_from(len as u64 * elem as u64)
        .map_err(|_| CanonicalAbiError::validation("list", "byte length exceeds u32"))?;
    let mut bytes = Vec::with_capacity(total as usize);
    match buffer {
        Buffer::U8(v) => bytes.extend_from_slice(v),
        Buffer::S8(v) => bytes.extend(v.iter().map(|x| *x as u8)),
        Buffer::U16(v) => le_extend(&mut bytes, v, u16::to_le_bytes),
        Buffer::S16(v) => le_extend(&mut bytes, v, i16::to_le_bytes),
        Buffer::U32(v) => le_extend(&mut bytes, v, u32::to_le_bytes),
        Buffer::S32(v) => le_extend(&mut bytes, v, i32::to_le_bytes),
        Buffer::U64(v) => le_extend(&mut bytes, v, u64::to_le_bytes),
        Buffer::S64(v) => le_extend(&mut bytes, v, i64::to_le_bytes),
        Buffer::F32(v) => le_extend(&mut bytes, v, f32::to_le_bytes),
        Buffer::F64(v) => le_extend(&mut bytes, v, f64::to_le_bytes),
    }
    let ptr = mem.alloc(buffer.kind().alignment(), total);
    mem.write(ptr, &bytes)?;
    Ok((ptr, len))
}

fn le_extend<T: Copy, const N: usize>(bytes: &mut Vec<u8>, values: &[T], encode: fn(T) -> [u8; N]) {
    for value in values {
        bytes.extend_from_slice(&encode(*value));
    }
}
