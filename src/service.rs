//! The service factory: expose a guest instance as a native service.
//!
//! The mirror of [`Host`](crate::host::Host): [`ServiceBinding::create`]
//! indexes the same descriptors by native name, and
//! [`ServiceBinding::call`] routes a native invocation through
//! [`call_wasm`] onto a wire-side function table. Functions of a
//! resource are addressed as `"{resource}.{function}"`.
//!
//! [`call_wasm`]: crate::func::FunctionType::call_wasm

use std::collections::HashMap;
use std::sync::Arc;

use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::FlatValue;
use crate::abi::memory::GuestMemory;
use crate::abi::CanonOptions;
use crate::func::FunctionType;
use crate::types::ResourceType;
use crate::value::Value;

/// The wire-side function table exported by a guest instance.
pub trait WireTable<M: GuestMemory + ?Sized> {
    /// Invoke the guest function exported under `wire_name`.
    fn invoke(
        &mut self,
        mem: &mut M,
        wire_name: &str,
        params: &[FlatValue],
    ) -> Result<Option<FlatValue>>;
}

impl<M: GuestMemory + ?Sized, F> WireTable<M> for F
where
    F: FnMut(&mut M, &str, &[FlatValue]) -> Result<Option<FlatValue>>,
{
    fn invoke(
        &mut self,
        mem: &mut M,
        wire_name: &str,
        params: &[FlatValue],
    ) -> Result<Option<FlatValue>> {
        self(mem, wire_name, params)
    }
}

/// A native-shaped view of a guest's exports.
pub struct ServiceBinding {
    entries: HashMap<String, Arc<FunctionType>>,
}

impl ServiceBinding {
    /// Index free functions by native name and resource functions as
    /// `"{resource}.{function}"`. Duplicate names fail.
    pub fn create(
        functions: &[Arc<FunctionType>],
        resources: &[Arc<ResourceType>],
    ) -> Result<Self> {
        let mut entries = HashMap::new();
        for func in functions {
            insert_entry(&mut entries, func.name().to_owned(), func.clone())?;
        }
        for resource in resources {
            for func in resource.functions() {
                let name = format!("{}.{}", resource.name(), func.name());
                insert_entry(&mut entries, name, func.clone())?;
            }
        }
        Ok(Self { entries })
    }

    /// The descriptor behind a native name.
    pub fn function(&self, name: &str) -> Option<&Arc<FunctionType>> {
        self.entries.get(name)
    }

    /// The exposed native names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Call the guest function known natively as `name` with native
    /// arguments, returning its native result.
    pub fn call<M: GuestMemory + ?Sized>(
        &self,
        name: &str,
        mem: &mut M,
        wire: &mut dyn WireTable<M>,
        args: &[Value],
        opts: &CanonOptions,
    ) -> Result<Option<Value>> {
        let func = self
            .entries
            .get(name)
            .ok_or_else(|| CanonicalAbiError::abi(format!("no function named `{name}`")))?;
        func.call_wasm(mem, args, opts, &mut |mem, params| {
            wire.invoke(mem, func.wire_name(), params)
        })
    }
}

fn insert_entry(
    entries: &mut HashMap<String, Arc<FunctionType>>,
    name: String,
    func: Arc<FunctionType>,
) -> Result<()> {
    if entries.insert(name.clone(), func).is_some() {
        return Err(CanonicalAbiError::abi(format!(
            "duplicate function name `{name}`"
        )));
    }
    Ok(())
}
