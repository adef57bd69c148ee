//! Convenient re-exports for common usage patterns.
//!
//! # Example
//!
//! ```
//! use canon_abi::prelude::*;
//!
//! let mut mem = LinearMemory::new();
//! let opts = CanonOptions::default();
//! let mut sink = Vec::new();
//! ValType::U32
//!     .lower(&mut mem, &Value::U32(7), &mut sink, &opts)
//!     .unwrap();
//! assert_eq!(sink, vec![FlatValue::I32(7)]);
//! ```

pub use crate::abi::{
    CanonOptions, CanonicalAbiError, FlatReader, FlatSource, FlatType, FlatValue, GuestMemory,
    LinearMemory, Result, StringEncoding,
};
pub use crate::func::{FunctionType, MAX_FLAT_PARAMS, MAX_FLAT_RESULTS};
pub use crate::host::{Host, Service};
pub use crate::service::{ServiceBinding, WireTable};
pub use crate::types::{FlagsType, NumericKind, ResourceType, TypeKind, ValType};
pub use crate::value::{Buffer, FlagsValue, Value};
