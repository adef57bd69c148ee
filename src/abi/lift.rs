//! Decoding values from a flat stream.

use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::{CoercingReader, FlatSource};
use crate::abi::load::{char_from_code, load_buffer, load_list, none_value, some_value};
use crate::abi::memory::GuestMemory;
use crate::abi::string;
use crate::abi::CanonOptions;
use crate::types::{FlagsRepr, ValType, VariantLayout};
use crate::value::{FlagsValue, Value};

impl ValType {
    /// Lift a value of this type from a flat stream.
    ///
    /// Consumes exactly [`flat_count`] slots from `src`. Variable-length
    /// bodies (string bytes, list elements) are read through `mem`.
    ///
    /// [`flat_count`]: ValType::flat_count
    pub fn lift<M: GuestMemory + ?Sized>(
        &self,
        mem: &M,
        src: &mut dyn FlatSource,
        opts: &CanonOptions,
    ) -> Result<Value> {
        match self {
            ValType::Bool => {
                let v = src.next_i32()?;
                if v < 0 {
                    return Err(CanonicalAbiError::validation(
                        "bool",
                        format!("negative wire value {v}"),
                    ));
                }
                Ok(Value::Bool(v != 0))
            }
            ValType::U8 => Ok(Value::U8(lift_unsigned(src, 8, "u8")? as u8)),
            ValType::U16 => Ok(Value::U16(lift_unsigned(src, 16, "u16")? as u16)),
            ValType::U32 => Ok(Value::U32(src.next_i32()? as u32)),
            ValType::U64 => Ok(Value::U64(src.next_i64()? as u64)),
            ValType::S8 => Ok(Value::S8(lift_signed(src, 8, "s8")? as i8)),
            ValType::S16 => Ok(Value::S16(lift_signed(src, 16, "s16")? as i16)),
            ValType::S32 => Ok(Value::S32(src.next_i32()?)),
            ValType::S64 => Ok(Value::S64(src.next_i64()?)),
            ValType::F32 => Ok(Value::F32(canonical_f32(src.next_f32()?))),
            ValType::F64 => Ok(Value::F64(canonical_f64(src.next_f64()?))),
            ValType::Char => Ok(Value::Char(char_from_code(src.next_i32()? as u32)?)),
            ValType::String => {
                let ptr = src.next_i32()? as u32;
                let units = src.next_i32()? as u32;
                Ok(Value::String(string::decode(
                    mem.data(),
                    ptr,
                    units,
                    opts.string_encoding,
                )?))
            }
            ValType::List(l) => {
                let ptr = src.next_i32()? as u32;
                let len = src.next_i32()? as u32;
                load_list(mem, l.element(), ptr, len, opts)
            }
            ValType::Buffer(kind) => {
                let ptr = src.next_i32()? as u32;
                let len = src.next_i32()? as u32;
                Ok(Value::Buffer(load_buffer(mem.data(), *kind, ptr, len)?))
            }
            ValType::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields().len());
                for field in r.fields() {
                    fields.push((field.name.clone(), field.ty.lift(mem, src, opts)?));
                }
                Ok(Value::Record(fields))
            }
            ValType::Tuple(t) => {
                let mut items = Vec::with_capacity(t.items().len());
                for item in t.items() {
                    items.push(item.lift(mem, src, opts)?);
                }
                Ok(Value::Tuple(items))
            }
            ValType::Variant(v) => {
                let disc = lift_discriminant(src, v.cases().len(), "variant")?;
                let case_ty = v.cases()[disc as usize].as_ref();
                let payload = lift_payload(mem, src, case_ty, &v.layout, disc, opts)?;
                Ok(Value::Variant {
                    case: disc,
                    payload: payload.map(Box::new),
                })
            }
            ValType::Enum(e) => {
                let disc = lift_discriminant(src, e.case_count() as usize, "enum")?;
                Ok(Value::Enum(disc))
            }
            ValType::Flags(f) => {
                let mut words = Vec::with_capacity(f.repr().word_count());
                match f.repr() {
                    FlagsRepr::Empty => {}
                    FlagsRepr::U8 | FlagsRepr::U16 | FlagsRepr::U32 => {
                        words.push(src.next_i32()? as u32);
                    }
                    FlagsRepr::Words(n) => {
                        for _ in 0..n {
                            words.push(src.next_i32()? as u32);
                        }
                    }
                }
                Ok(Value::Flags(FlagsValue::from_words(f, words)))
            }
            ValType::Option(o) => {
                let disc = lift_discriminant(src, 2, "option")?;
                let payload = lift_payload(
                    mem,
                    src,
                    (disc == 1).then_some(o.payload()),
                    &o.layout,
                    disc,
                    opts,
                )?;
                match payload {
                    Some(payload) => Ok(some_value(payload, opts)),
                    None => Ok(none_value(opts)),
                }
            }
            ValType::Result(r) => {
                let disc = lift_discriminant(src, 2, "result")?;
                let case_ty = if disc == 0 { r.ok() } else { r.err() };
                let payload = lift_payload(mem, src, case_ty, &r.layout, disc, opts)?;
                let payload = payload.map(Box::new);
                Ok(Value::Result(if disc == 0 {
                    Ok(payload)
                } else {
                    Err(payload)
                }))
            }
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => {
                Ok(Value::Resource(src.next_i32()? as u32))
            }
        }
    }
}

/// Lift a discriminant slot and validate its range.
fn lift_discriminant(src: &mut dyn FlatSource, cases: usize, ty: &'static str) -> Result<u32> {
    let v = src.next_i32()?;
    if v < 0 || v as u64 >= cases as u64 {
        return Err(CanonicalAbiError::validation(
            ty,
            format!("discriminant {v} out of range for {cases} cases"),
        ));
    }
    Ok(v as u32)
}

/// Lift one case's payload through the coercion reader, consuming the
/// full joined payload region regardless of the case's own width.
fn lift_payload<M: GuestMemory + ?Sized>(
    mem: &M,
    src: &mut dyn FlatSource,
    case_ty: Option<&ValType>,
    layout: &VariantLayout,
    case: u32,
    opts: &CanonOptions,
) -> Result<Option<Value>> {
    let joined = &layout.flat[1..];
    let want = &layout.case_flats[case as usize];
    let mut coercing = CoercingReader::new(src, joined, want);
    let payload = match case_ty {
        Some(ty) => Some(ty.lift(mem, &mut coercing, opts)?),
        None => None,
    };
    coercing.finish()?;
    Ok(payload)
}

/// Lift an unsigned integer of `bits` width from an `i32` slot,
/// accepting `[0, 2^bits)` and rejecting negatives.
fn lift_unsigned(src: &mut dyn FlatSource, bits: u32, ty: &'static str) -> Result<u32> {
    let v = src.next_i32()?;
    if v < 0 || v as i64 >= 1i64 << bits {
        return Err(CanonicalAbiError::validation(
            ty,
            format!("wire value {v} outside [0, 2^{bits})"),
        ));
    }
    Ok(v as u32)
}

/// Lift a signed integer of `bits` width from its unsigned wire
/// pattern: values above the positive half-range are reinterpreted by
/// subtracting `2^bits`.
fn lift_signed(src: &mut dyn FlatSource, bits: u32, ty: &'static str) -> Result<i32> {
    let v = lift_unsigned(src, bits, ty)? as i32;
    if v >= 1 << (bits - 1) {
        Ok(v - (1 << bits))
    } else {
        Ok(v)
    }
}

/// The canonical quiet-NaN pattern `0x7fc00000`, applied on lift and
/// lower; other values pass through untouched.
pub(crate) fn canonical_f32(v: f32) -> f32 {
    if v.is_nan() {
        f32::from_bits(0x7fc0_0000)
    } else {
        v
    }
}

/// The canonical quiet-NaN pattern `0x7ff8000000000000`.
pub(crate) fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::from_bits(0x7ff8_0000_0000_0000)
    } else {
        v
    }
}
