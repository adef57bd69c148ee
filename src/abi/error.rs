//! Error types for canonical ABI operations.

use thiserror::Error;

/// Errors raised while loading, storing, lifting or lowering values.
///
/// Every failure is raised eagerly at the operation where it occurs;
/// nothing is retried or masked. Call adapters propagate these verbatim
/// to their callers.
#[derive(Error, Debug)]
pub enum CanonicalAbiError {
    /// A wire value is outside the domain of its type.
    #[error("invalid {ty} value: {reason}")]
    Validation { ty: &'static str, reason: String },

    /// The flat stream or call shape disagrees with the descriptor.
    #[error("ABI violation: {0}")]
    AbiViolation(String),

    /// The requested string encoding is not implemented.
    #[error("unsupported string encoding: {0}")]
    UnsupportedEncoding(&'static str),

    /// The option representation policy and the supplied value disagree.
    #[error("option representation mismatch: expected the {expected} form, got the {got} form")]
    OptionRepresentation {
        expected: &'static str,
        got: &'static str,
    },

    /// A 64-bit-carried value does not fit the narrower slot or index it
    /// must convert to.
    #[error("value {value} does not fit in {target}")]
    BigIntOverflow { value: i64, target: &'static str },

    /// A native value does not match the shape its descriptor expects.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// A pointer/length pair reaches past the end of linear memory.
    #[error("invalid memory access: pointer {ptr} with length {len} exceeds memory size {size}")]
    MemoryAccess { ptr: u32, len: u32, size: usize },
}

impl CanonicalAbiError {
    /// Build a [`CanonicalAbiError::Validation`] for the given type tag.
    pub fn validation(ty: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            ty,
            reason: reason.into(),
        }
    }

    /// Build a [`CanonicalAbiError::AbiViolation`] from a message.
    pub fn abi(reason: impl Into<String>) -> Self {
        Self::AbiViolation(reason.into())
    }

    /// Build a [`CanonicalAbiError::TypeMismatch`].
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// A `Result` alias using [`CanonicalAbiError`].
pub type Result<T> = std::result::Result<T, CanonicalAbiError>;
