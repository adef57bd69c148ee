//! Flat machine values and the streams they travel through.
//!
//! A flattened value is a sequence of primitive machine values over
//! `i32 | i64 | f32 | f64`, the shape a component-level value takes
//! when passed by value on the core stack. Lowering appends slots to a
//! `Vec<FlatValue>` sink; lifting consumes them through a single-pass
//! [`FlatSource`]. [`CoercingReader`] adapts a variant's joined slot
//! shape back to one case's natural shape during lift.

use super::error::{CanonicalAbiError, Result};

/// The four core machine types a value can flatten to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatType {
    I32,
    I64,
    F32,
    F64,
}

/// A single flat machine value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl FlatValue {
    /// The machine type of this slot.
    pub fn ty(&self) -> FlatType {
        match self {
            FlatValue::I32(_) => FlatType::I32,
            FlatValue::I64(_) => FlatType::I64,
            FlatValue::F32(_) => FlatType::F32,
            FlatValue::F64(_) => FlatType::F64,
        }
    }

    /// The zero slot of the given machine type, used to pad unused
    /// variant payload slots.
    pub fn zero(ty: FlatType) -> FlatValue {
        match ty {
            FlatType::I32 => FlatValue::I32(0),
            FlatType::I64 => FlatValue::I64(0),
            FlatType::F32 => FlatValue::F32(0.0),
            FlatType::F64 => FlatValue::F64(0.0),
        }
    }
}

/// A single-pass stream of flat values.
///
/// Each `next` consumes one slot; descriptors consume exactly as many
/// slots as their flat signature declares.
pub trait FlatSource {
    /// Consume the next slot.
    fn next(&mut self) -> Result<FlatValue>;

    /// Consume the next slot, which must be an `i32`.
    fn next_i32(&mut self) -> Result<i32> {
        match self.next()? {
            FlatValue::I32(v) => Ok(v),
            other => Err(slot_mismatch(FlatType::I32, other.ty())),
        }
    }

    /// Consume the next slot, which must be an `i64`.
    fn next_i64(&mut self) -> Result<i64> {
        match self.next()? {
            FlatValue::I64(v) => Ok(v),
            other => Err(slot_mismatch(FlatType::I64, other.ty())),
        }
    }

    /// Consume the next slot, which must be an `f32`.
    fn next_f32(&mut self) -> Result<f32> {
        match self.next()? {
            FlatValue::F32(v) => Ok(v),
            other => Err(slot_mismatch(FlatType::F32, other.ty())),
        }
    }

    /// Consume the next slot, which must be an `f64`.
    fn next_f64(&mut self) -> Result<f64> {
        match self.next()? {
            FlatValue::F64(v) => Ok(v),
            other => Err(slot_mismatch(FlatType::F64, other.ty())),
        }
    }
}

fn slot_mismatch(want: FlatType, have: FlatType) -> CanonicalAbiError {
    CanonicalAbiError::abi(format!("expected {want:?} slot, found {have:?}"))
}

/// A [`FlatSource`] over a slice of slots.
#[derive(Debug)]
pub struct FlatReader<'a> {
    slots: &'a [FlatValue],
    pos: usize,
}

impl<'a> FlatReader<'a> {
    /// Read slots from the front of `slots`.
    pub fn new(slots: &'a [FlatValue]) -> Self {
        Self { slots, pos: 0 }
    }

    /// How many slots remain unconsumed.
    pub fn remaining(&self) -> usize {
        self.slots.len() - self.pos
    }
}

impl FlatSource for FlatReader<'_> {
    fn next(&mut self) -> Result<FlatValue> {
        let slot = self.slots.get(self.pos).copied().ok_or_else(|| {
            CanonicalAbiError::abi(format!("flat stream exhausted after {} slots", self.pos))
        })?;
        self.pos += 1;
        Ok(slot)
    }
}

/// Widen a case slot to a variant's joined slot type.
///
/// The supported pairs are exactly the canonical ABI's reinterprets:
/// `f32` bits into `i32`, sign-converted `i32` into `i64`, `f32` bits
/// zero-extended into `i64`, and `f64` bits into `i64`.
pub fn widen(value: FlatValue, to: FlatType) -> Result<FlatValue> {
    match (value, to) {
        (v, t) if v.ty() == t => Ok(v),
        (FlatValue::F32(v), FlatType::I32) => Ok(FlatValue::I32(v.to_bits() as i32)),
        (FlatValue::I32(v), FlatType::I64) => Ok(FlatValue::I64(v as i64)),
        (FlatValue::F32(v), FlatType::I64) => Ok(FlatValue::I64(v.to_bits() as i64)),
        (FlatValue::F64(v), FlatType::I64) => Ok(FlatValue::I64(v.to_bits() as i64)),
        (v, t) => Err(CanonicalAbiError::abi(format!(
            "cannot widen {:?} slot to {t:?}",
            v.ty()
        ))),
    }
}

/// Undo [`widen`]: reinterpret a joined slot as the type one case wants.
pub fn narrow(value: FlatValue, want: FlatType) -> Result<FlatValue> {
    match (value, want) {
        (v, t) if v.ty() == t => Ok(v),
        (FlatValue::I32(v), FlatType::F32) => Ok(FlatValue::F32(f32::from_bits(v as u32))),
        (FlatValue::I64(v), FlatType::I32) => {
            let narrowed = i32::try_from(v).map_err(|_| CanonicalAbiError::BigIntOverflow {
                value: v,
                target: "i32",
            })?;
            Ok(FlatValue::I32(narrowed))
        }
        (FlatValue::I64(v), FlatType::F32) => {
            let bits = u32::try_from(v).map_err(|_| CanonicalAbiError::BigIntOverflow {
                value: v,
                target: "f32 bits",
            })?;
            Ok(FlatValue::F32(f32::from_bits(bits)))
        }
        (FlatValue::I64(v), FlatType::F64) => Ok(FlatValue::F64(f64::from_bits(v as u64))),
        (v, t) => Err(CanonicalAbiError::abi(format!(
            "cannot narrow {:?} slot to {t:?}",
            v.ty()
        ))),
    }
}

/// A one-slot-ahead adapter that reinterprets a variant's joined payload
/// slots back to the active case's natural slot types during lift.
///
/// After the case payload has been lifted, [`finish`] consumes the
/// leftover padding slots so the stream stays aligned.
///
/// [`finish`]: CoercingReader::finish
pub struct CoercingReader<'a> {
    inner: &'a mut dyn FlatSource,
    joined: &'a [FlatType],
    want: &'a [FlatType],
    pos: usize,
}

impl<'a> CoercingReader<'a> {
    pub fn new(inner: &'a mut dyn FlatSource, joined: &'a [FlatType], want: &'a [FlatType]) -> Self {
        Self {
            inner,
            joined,
            want,
            pos: 0,
        }
    }

    /// Consume the joined slots the case did not use.
    pub fn finish(mut self) -> Result<()> {
        while self.pos < self.joined.len() {
            self.inner.next()?;
            self.pos += 1;
        }
        Ok(())
    }
}

impl FlatSource for CoercingReader<'_> {
    fn next(&mut self) -> Result<FlatValue> {
        let want = self.want.get(self.pos).copied().ok_or_else(|| {
            CanonicalAbiError::abi(format!(
                "variant case consumed more than its {} payload slots",
                self.want.len()
            ))
        })?;
        self.pos += 1;
        narrow(self.inner.next()?, want)
    }
}
