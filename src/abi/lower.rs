//! Encoding values into a flat sink.

use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::{widen, FlatValue};
use crate::abi::lift::{canonical_f32, canonical_f64};
use crate::abi::memory::GuestMemory;
use crate::abi::store::{option_parts, store_buffer, store_list};
use crate::abi::string;
use crate::abi::CanonOptions;
use crate::types::{FlagsRepr, ValType, VariantLayout};
use crate::value::Value;

impl ValType {
    /// Lower `value` into the flat sink `dst`.
    ///
    /// Appends exactly [`flat_count`] slots. Variable-length bodies
    /// (string bytes, list elements) are allocated in `mem` and
    /// referenced by pointer slots.
    ///
    /// [`flat_count`]: ValType::flat_count
    pub fn lower<M: GuestMemory + ?Sized>(
        &self,
        mem: &mut M,
        value: &Value,
        dst: &mut Vec<FlatValue>,
        opts: &CanonOptions,
    ) -> Result<()> {
        match self {
            ValType::Bool => dst.push(FlatValue::I32(value.expect_bool()? as i32)),
            ValType::U8 => dst.push(FlatValue::I32(value.expect_u8()? as i32)),
            ValType::U16 => dst.push(FlatValue::I32(value.expect_u16()? as i32)),
            ValType::U32 => dst.push(FlatValue::I32(value.expect_u32()? as i32)),
            ValType::U64 => dst.push(FlatValue::I64(value.expect_u64()? as i64)),
            // Signed integers travel as their unsigned wire pattern.
            ValType::S8 => dst.push(FlatValue::I32(value.expect_s8()? as u8 as i32)),
            ValType::S16 => dst.push(FlatValue::I32(value.expect_s16()? as u16 as i32)),
            ValType::S32 => dst.push(FlatValue::I32(value.expect_s32()?)),
            ValType::S64 => dst.push(FlatValue::I64(value.expect_s64()?)),
            ValType::F32 => dst.push(FlatValue::F32(canonical_f32(value.expect_f32()?))),
            ValType::F64 => dst.push(FlatValue::F64(canonical_f64(value.expect_f64()?))),
            ValType::Char => dst.push(FlatValue::I32(value.expect_char()? as u32 as i32)),
            ValType::String => {
                let (body, units) =
                    string::store(mem, value.expect_str()?, opts.string_encoding)?;
                dst.push(FlatValue::I32(body as i32));
                dst.push(FlatValue::I32(units as i32));
            }
            ValType::List(l) => {
                let (body, len) = store_list(mem, l.element(), value.expect_list()?, opts)?;
                dst.push(FlatValue::I32(body as i32));
                dst.push(FlatValue::I32(len as i32));
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
                dst.push(FlatValue::I32(body as i32));
                dst.push(FlatValue::I32(len as i32));
            }
            ValType::Record(r) => {
                let fields = value.expect_record()?;
                for field in r.fields() {
                    let (_, field_value) = fields
                        .iter()
                        .find(|(name, _)| name == &field.name)
                        .ok_or_else(|| {
                            CanonicalAbiError::mismatch(
                                format!("record field `{}`", field.name),
                                "missing",
                            )
                        })?;
                    field.ty.lower(mem, field_value, dst, opts)?;
                }
            }
            ValType::Tuple(t) => {
                let items = value.expect_tuple()?;
                if items.len() != t.items().len() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("tuple of {} items", t.items().len()),
                        format!("tuple of {} items", items.len()),
                    ));
                }
                for (item_ty, item) in t.items().iter().zip(items) {
                    item_ty.lower(mem, item, dst, opts)?;
                }
            }
            ValType::Variant(v) => {
                let (case, payload) = value.expect_variant()?;
                let case_ty = v.cases().get(case as usize).ok_or_else(|| {
                    CanonicalAbiError::validation(
                        "variant",
                        format!("case {case} out of range for {} cases", v.cases().len()),
                    )
                })?;
                dst.push(FlatValue::I32(case as i32));
                lower_payload(mem, case_ty.as_ref(), payload, &v.layout, dst, opts)?;
            }
            ValType::Enum(e) => {
                let case = value.expect_enum()?;
                if case >= e.case_count() {
                    return Err(CanonicalAbiError::validation(
                        "enum",
                        format!("case {case} out of range for {} cases", e.case_count()),
                    ));
                }
                dst.push(FlatValue::I32(case as i32));
            }
            ValType::Flags(f) => {
                let flags = value.expect_flags()?;
                if flags.ty().names() != f.names() {
                    return Err(CanonicalAbiError::mismatch(
                        format!("flags over {:?}", f.names()),
                        format!("flags over {:?}", flags.ty().names()),
                    ));
                }
                if f.repr() != FlagsRepr::Empty {
                    for word in flags.words() {
                        dst.push(FlatValue::I32(*word as i32));
                    }
                }
            }
            ValType::Option(o) => {
                let (disc, payload) = option_parts(value, opts)?;
                dst.push(FlatValue::I32(disc as i32));
                let case_ty = payload.is_some().then_some(o.payload());
                lower_payload(mem, case_ty, payload, &o.layout, dst, opts)?;
            }
            ValType::Result(r) => match value.expect_result()? {
                Ok(ok) => {
                    dst.push(FlatValue::I32(0));
                    lower_payload(mem, r.ok(), ok.as_deref(), &r.layout, dst, opts)?;
                }
                Err(err) => {
                    dst.push(FlatValue::I32(1));
                    lower_payload(mem, r.err(), err.as_deref(), &r.layout, dst, opts)?;
                }
            },
            ValType::Own(_) | ValType::Borrow(_) | ValType::Resource(_) => {
                dst.push(FlatValue::I32(value.expect_resource()? as i32))
            }
        }
        Ok(())
    }
}

/// Lower one case's payload to its own slot types, widen each slot to
/// the joined type, and pad the unused tail with typed zeros.
fn lower_payload<M: GuestMemory + ?Sized>(
    mem: &mut M,
    case_ty: Option<&ValType>,
    payload: Option<&Value>,
    layout: &VariantLayout,
    dst: &mut Vec<FlatValue>,
    opts: &CanonOptions,
) -> Result<()> {
    let mut own_slots = Vec::new();
    match (case_ty, payload) {
        (Some(ty), Some(payload)) => ty.lower(mem, payload, &mut own_slots, opts)?,
        (None, None) => {}
        (Some(_), None) => return Err(CanonicalAbiError::mismatch("case payload", "missing")),
        (None, Some(payload)) => {
            return Err(CanonicalAbiError::mismatch("no payload", payload.kind_name()))
        }
    }
    for (i, joined) in layout.flat[1..].iter().enumerate() {
        match own_slots.get(i) {
            Some(slot) => dst.push(widen(*slot, *joined)?),
            None => dst.push(FlatValue::zero(*joined)),
        }
    }
    Ok(())
}
