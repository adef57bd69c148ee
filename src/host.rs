//! The host factory: expose a native service to a guest instance.
//!
//! [`Host::create`] turns a set of function and resource descriptors
//! into a table keyed by wire name; [`Host::dispatch`] routes a guest
//! call through [`call_service`] onto a [`Service`] implementation.
//! Functions of a resource are invoked on the sub-service named by that
//! resource.
//!
//! [`call_service`]: crate::func::FunctionType::call_service

use std::collections::HashMap;
use std::sync::Arc;

use crate::abi::error::{CanonicalAbiError, Result};
use crate::abi::flat::FlatValue;
use crate::abi::memory::GuestMemory;
use crate::abi::CanonOptions;
use crate::func::FunctionType;
use crate::types::ResourceType;
use crate::value::Value;

/// A native implementation the guest can call into.
pub trait Service {
    /// Invoke the function with the given native name.
    fn invoke(&mut self, function: &str, args: Vec<Value>) -> Result<Option<Value>>;

    /// The sub-service implementing the named resource's functions.
    fn resource(&mut self, _name: &str) -> Option<&mut dyn Service> {
        None
    }
}

impl<F> Service for F
where
    F: FnMut(&str, Vec<Value>) -> Result<Option<Value>>,
{
    fn invoke(&mut self, function: &str, args: Vec<Value>) -> Result<Option<Value>> {
        self(function, args)
    }
}

struct HostEntry {
    func: Arc<FunctionType>,
    /// The owning resource's native name, for sub-service lookup.
    resource: Option<String>,
}

/// A wire-name table of guest-callable functions backed by a native
/// service.
pub struct Host {
    entries: HashMap<String, HostEntry>,
}

impl Host {
    /// Build the dispatch table from free functions and the functions
    /// attached to each resource. Duplicate wire names fail.
    pub fn create(
        functions: &[Arc<FunctionType>],
        resources: &[Arc<ResourceType>],
    ) -> Result<Self> {
        let mut entries = HashMap::new();
        for func in functions {
            insert_entry(&mut entries, func.clone(), None)?;
        }
        for resource in resources {
            for func in resource.functions() {
                insert_entry(&mut entries, func.clone(), Some(resource.name().to_owned()))?;
            }
        }
        Ok(Self { entries })
    }

    /// Whether a function with this wire name is exposed.
    pub fn contains(&self, wire_name: &str) -> bool {
        self.entries.contains_key(wire_name)
    }

    /// The exposed wire names, in no particular order.
    pub fn wire_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The descriptor behind a wire name.
    pub fn function(&self, wire_name: &str) -> Option<&Arc<FunctionType>> {
        self.entries.get(wire_name).map(|entry| &entry.func)
    }

    /// Route a guest call to the native service and marshal the result
    /// back.
    pub fn dispatch<M: GuestMemory + ?Sized>(
        &self,
        wire_name: &str,
        mem: &mut M,
        flat_params: &[FlatValue],
        opts: &CanonOptions,
        service: &mut dyn Service,
    ) -> Result<Option<FlatValue>> {
        let entry = self.entries.get(wire_name).ok_or_else(|| {
            CanonicalAbiError::abi(format!("no function exported as `{wire_name}`"))
        })?;
        let target = match &entry.resource {
            Some(resource) => service.resource(resource).ok_or_else(|| {
                CanonicalAbiError::abi(format!("service has no resource `{resource}`"))
            })?,
            None => service,
        };
        entry.func.call_service(mem, flat_params, opts, &mut |args| {
            target.invoke(entry.func.name(), args)
        })
    }
}

fn insert_entry(
    entries: &mut HashMap<String, HostEntry>,
    func: Arc<FunctionType>,
    resource: Option<String>,
) -> Result<()> {
    let wire_name = func.wire_name().to_owned();
    if entries
        .insert(wire_name.clone(), HostEntry { func, resource })
        .is_some()
    {
        return Err(CanonicalAbiError::abi(format!(
            "duplicate wire name `{wire_name}`"
        )));
    }
    Ok(())
}
