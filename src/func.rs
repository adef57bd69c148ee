//! Function descriptors and the host/guest call conventions.
//!
//! A [`FunctionType`] bundles a native name, a wire name (the ABI
//! symbol), an ordered parameter list and an optional return type. Its
//! two entry points translate a typed call across the boundary:
//!
//! - [`call_service`]: the guest called the host; lift the guest's flat
//!   parameters, invoke the native implementation, lower the result.
//! - [`call_wasm`]: the host calls the guest; lower native arguments to
//!   flat values, invoke the guest function, lift what comes back.
//!
//! When a signature's flat arity exceeds the limits, the indirect
//! conventions apply: parameters pack into a caller-allocated tuple
//! passed as one `i32`, and a multi-slot return is written through a
//! caller-allocated out-pointer appended as the last parameter.
//!
//! [`call_service`]: FunctionType::call_service
//! [`call_wasm`]: FunctionType::call_wasm

use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::{FlatReader, FlatType, FlatValue};
use crate::abi::memory::GuestMemory;
use crate::abi::CanonOptions;
use crate::logging::debug;
use crate::types::{TupleType, ValType};
use crate::value::Value;

/// Parameters flatten directly up to this many slots; beyond it they
/// pack into a single pointer.
pub const MAX_FLAT_PARAMS: usize = 16;

/// Returns flatten directly up to this many slots; beyond it they go
/// through an out-pointer.
pub const MAX_FLAT_RESULTS: usize = 1;

/// A typed function signature crossing the host/guest boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    name: String,
    wire_name: String,
    params: Vec<(String, ValType)>,
    result: Option<ValType>,
    param_flat: Vec<FlatType>,
    return_flat: Vec<FlatType>,
    /// The parameter tuple layout, present when parameters go indirect.
    indirect_params: Option<TupleType>,
}

impl FunctionType {
    pub fn new(
        name: impl Into<String>,
        wire_name: impl Into<String>,
        params: Vec<(String, ValType)>,
        result: Option<ValType>,
    ) -> Self {
        let mut param_flat = Vec::new();
        for (_, ty) in &params {
            ty.push_flat(&mut param_flat);
        }
        let return_flat = result.as_ref().map(ValType::flat_types).unwrap_or_default();
        let indirect_params = (param_flat.len() > MAX_FLAT_PARAMS)
            .then(|| TupleType::new(params.iter().map(|(_, ty)| ty.clone()).collect()));
        Self {
            name: name.into(),
            wire_name: wire_name.into(),
            params,
            result,
            param_flat,
            return_flat,
            indirect_params,
        }
    }

    /// The native-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ABI symbol name.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[(String, ValType)] {
        &self.params
    }

    /// The return type, if any.
    pub fn result(&self) -> Option<&ValType> {
        self.result.as_ref()
    }

    /// Total flat slots across all parameters.
    pub fn param_flat_count(&self) -> usize {
        self.param_flat.len()
    }

    /// Flat slots of the return type.
    pub fn return_flat_count(&self) -> usize {
        self.return_flat.len()
    }

    /// Number of flat values the guest actually passes or receives for
    /// parameters, after the indirect convention is applied.
    fn wire_param_slots(&self) -> usize {
        if self.indirect_params.is_some() {
            1
        } else {
            self.param_flat.len()
        }
    }

    fn has_indirect_return(&self) -> bool {
        self.return_flat.len() > MAX_FLAT_RESULTS
    }

    /// Handle a guest-to-host call: lift `flat_params`, invoke `native`,
    /// lower its result back to at most one flat value or through the
    /// out-pointer.
    pub fn call_service<M: GuestMemory + ?Sized>(
        &self,
        mem: &mut M,
        flat_params: &[FlatValue],
        opts: &CanonOptions,
        native: &mut dyn FnMut(Vec<Value>) -> Result<Option<Value>>,
    ) -> Result<Option<FlatValue>> {
        debug!(function = self.wire_name.as_str(), "service call");
        let expected = self.wire_param_slots() + usize::from(self.has_indirect_return());
        if flat_params.len() != expected {
            return Err(CanonicalAbiError::abi(format!(
                "`{}` takes {expected} flat parameters, got {}",
                self.wire_name,
                flat_params.len()
            )));
        }

        let mut args = Vec::with_capacity(self.params.len());
        if let Some(tuple) = &self.indirect_params {
            let ptr = expect_pointer_slot(flat_params[0], "indirect parameter pointer")?;
            for ((_, ty), offset) in self.params.iter().zip(tuple.offsets()) {
                args.push(ty.load(mem, ptr + offset, opts)?);
            }
        } else {
            let mut reader = FlatReader::new(&flat_params[..self.wire_param_slots()]);
            for (_, ty) in &self.params {
                args.push(ty.lift(mem, &mut reader, opts)?);
            }
        }

        let result = native(args)?;
        match (&self.result, result) {
            (None, None) => Ok(None),
            (None, Some(value)) => Err(CanonicalAbiError::mismatch(
                "no result",
                value.kind_name(),
            )),
            (Some(_), None) => Err(CanonicalAbiError::mismatch("result value", "none")),
            (Some(ty), Some(value)) => {
                if self.has_indirect_return() {
                    let out = expect_pointer_slot(
                        flat_params[flat_params.len() - 1],
                        "indirect return pointer",
                    )?;
                    ty.store(mem, out, &value, opts)?;
                    Ok(None)
                } else {
                    let mut sink = Vec::with_capacity(self.return_flat.len());
                    ty.lower(mem, &value, &mut sink, opts)?;
                    Ok(sink.pop())
                }
            }
        }
    }

    /// Drive a host-to-guest call: lower `args`, invoke `guest` with the
    /// flat values, lift its return.
    pub fn call_wasm<M: GuestMemory + ?Sized>(
        &self,
        mem: &mut M,
        args: &[Value],
        opts: &CanonOptions,
        guest: &mut dyn FnMut(&mut M, &[FlatValue]) -> Result<Option<FlatValue>>,
    ) -> Result<Option<Value>> {
        debug!(function = self.wire_name.as_str(), "wasm call");
        if args.len() != self.params.len() {
            return Err(CanonicalAbiError::abi(format!(
                "`{}` takes {} arguments, got {}",
                self.wire_name,
                self.params.len(),
                args.len()
            )));
        }

        let mut flat = Vec::with_capacity(self.wire_param_slots() + 1);
        if let Some(tuple) = &self.indirect_params {
            let ptr = mem.alloc(tuple.alignment(), tuple.byte_size());
            for (((_, ty), offset), arg) in self.params.iter().zip(tuple.offsets()).zip(args) {
                ty.store(mem, ptr + offset, arg, opts)?;
            }
            flat.push(FlatValue::I32(ptr as i32));
        } else {
            for ((_, ty), arg) in self.params.iter().zip(args) {
                ty.lower(mem, arg, &mut flat, opts)?;
            }
        }

        let mut ret_ptr = None;
        if self.has_indirect_return() {
            if let Some(ty) = &self.result {
                let ptr = mem.alloc(ty.alignment(), ty.byte_size());
                flat.push(FlatValue::I32(ptr as i32));
                ret_ptr = Some(ptr);
            }
        }

        let returned = guest(mem, &flat)?;
        let ty = match &self.result {
            None => {
                return match returned {
                    None => Ok(None),
                    Some(slot) => Err(CanonicalAbiError::abi(format!(
                        "`{}` returns nothing but the guest produced a {:?} slot",
                        self.wire_name,
                        slot.ty()
                    ))),
                }
            }
            Some(ty) => ty,
        };
        if let Some(ptr) = ret_ptr {
            if returned.is_some() {
                return Err(CanonicalAbiError::abi(format!(
                    "`{}` returns indirectly but the guest produced a flat value",
                    self.wire_name
                )));
            }
            return Ok(Some(ty.load(mem, ptr, opts)?));
        }
        let slots = match returned {
            Some(slot) if self.return_flat.len() == 1 => vec![slot],
            None if self.return_flat.is_empty() => Vec::new(),
            Some(_) => {
                return Err(CanonicalAbiError::abi(format!(
                    "`{}` has no flat return slot but the guest produced one",
                    self.wire_name
                )))
            }
            None => {
                return Err(CanonicalAbiError::abi(format!(
                    "`{}` expects a flat return value, got none",
                    self.wire_name
                )))
            }
        };
        let mut reader = FlatReader::new(&slots);
        Ok(Some(ty.lift(mem, &mut reader, opts)?))
    }
}

fn expect_pointer_slot(slot: FlatValue, what: &str) -> Result<u32> {
    match slot {
        FlatValue::I32(ptr) => Ok(ptr as u32),
        other => Err(CanonicalAbiError::abi(format!(
            "{what} must be an i32 slot, found {:?}",
            other.ty()
        ))),
    }
}
