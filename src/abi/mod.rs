//! Canonical ABI marshaling for component-level values.
//!
//! Every type descriptor supports four operations, implemented here:
//!
//! - [`load`]/[`store`]: decode from / encode into linear memory at a
//!   pointer (pass-by-reference ABI)
//! - [`lift`]/[`lower`]: decode from / encode into a flat stream of
//!   machine values (pass-by-value ABI)
//!
//! # Module Organization
//!
//! - [`error`]: the error taxonomy for all marshaling operations
//! - [`memory`]: guest linear memory and its allocator hooks
//! - [`buffer`]: checked little-endian read/write helpers
//! - [`flat`]: flat machine values, streams and reinterpret coercions
//! - [`string`]: wire string codecs
//! - `load` / `store` / `lift` / `lower`: the four operations, one
//!   file each
//!
//! [`load`]: crate::types::ValType::load
//! [`store`]: crate::types::ValType::store
//! [`lift`]: crate::types::ValType::lift
//! [`lower`]: crate::types::ValType::lower

pub mod buffer;
pub mod error;
pub mod flat;
pub mod memory;
pub mod string;

mod lift;
mod load;
mod lower;
mod store;

pub use error::{CanonicalAbiError, Result};
pub use flat::{CoercingReader, FlatReader, FlatSource, FlatType, FlatValue};
pub use memory::{GuestMemory, LinearMemory};
pub use string::StringEncoding;

/// The context carried through every marshaling operation.
///
/// # Example
///
/// ```
/// use canon_abi::{CanonOptions, StringEncoding};
///
/// let opts = CanonOptions::new().with_encoding(StringEncoding::Utf16);
/// assert!(opts.keep_option);
/// ```
#[derive(Debug, Clone)]
pub struct CanonOptions {
    /// The string codec for wire strings.
    pub string_encoding: StringEncoding,
    /// When `true`, an `option<T>` surfaces as the tagged
    /// [`Value::Option`](crate::value::Value::Option); when `false`, it
    /// collapses to the payload value itself, with
    /// [`Value::Null`](crate::value::Value::Null) standing in for the
    /// absent case.
    pub keep_option: bool,
}

impl CanonOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the wire string codec.
    pub fn with_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    /// Select the option representation policy.
    pub fn with_keep_option(mut self, keep: bool) -> Self {
        self.keep_option = keep;
        self
    }
}

impl Default for CanonOptions {
    fn default() -> Self {
        Self {
            string_encoding: StringEncoding::Utf8,
            keep_option: true,
        }
    }
}
