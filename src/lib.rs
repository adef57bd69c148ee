//! Type-directed marshaling for the WebAssembly Component Model
//! canonical ABI.
//!
//! This library bridges a host runtime operating on rich native values
//! and a guest instance operating on a linear byte buffer plus a flat
//! stack of `i32 | i64 | f32 | f64`. For every component-level type, a
//! [`ValType`] descriptor knows its size, alignment and flat signature,
//! and supports four operations: `load`/`store` against linear memory
//! and `lift`/`lower` through a flat value stream. [`FunctionType`]
//! composes descriptors into call adapters, and the [`host`] and
//! [`service`] factories bind whole interfaces in either direction.
//!
//! ```
//! use canon_abi::{CanonOptions, GuestMemory, LinearMemory, ValType, Value};
//!
//! let opts = CanonOptions::default();
//! let mut mem = LinearMemory::new();
//! let ty = ValType::record([("name", ValType::String), ("age", ValType::U32)]);
//!
//! let ptr = mem.alloc(ty.alignment(), ty.byte_size());
//! let person = Value::Record(vec![
//!     ("name".into(), Value::String("a".into())),
//!     ("age".into(), Value::U32(7)),
//! ]);
//! ty.store(&mut mem, ptr, &person, &opts).unwrap();
//! assert_eq!(ty.load(&mem, ptr, &opts).unwrap(), person);
//! ```

mod logging;

pub mod abi;
pub mod func;
pub mod host;
pub mod prelude;
pub mod service;
pub mod types;
pub mod value;

pub use abi::{
    CanonOptions, CanonicalAbiError, CoercingReader, FlatReader, FlatSource, FlatType, FlatValue,
    GuestMemory, LinearMemory, Result, StringEncoding,
};
pub use func::{FunctionType, MAX_FLAT_PARAMS, MAX_FLAT_RESULTS};
pub use host::{Host, Service};
pub use service::{ServiceBinding, WireTable};
pub use types::{
    DiscriminantSize, EnumType, FlagsRepr, FlagsType, ListType, NumericKind, OptionType,
    RecordField, RecordType, ResourceType, ResultType, TupleType, TypeKind, ValType, VariantType,
};
pub use value::{Buffer, FlagsValue, Value};
