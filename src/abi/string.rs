//! String codecs for the wire encodings.
//!
//! A string travels as a `(data_pointer, code_units)` pair; the body is
//! allocated in guest memory at the codec's own alignment, independent
//! of the pair's. `code_units` counts bytes for UTF-8 and 16-bit units
//! for UTF-16.

use super::buffer::read_bytes;
use super::error::{CanonicalAbiError, Result};
use super::memory::GuestMemory;

/// The string codec selected through the options context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    #[default]
    Utf8,
    Utf16,
    /// Reserved; currently fails with
    /// [`CanonicalAbiError::UnsupportedEncoding`].
    Latin1Utf16,
}

/// Decode `code_units` units starting at `ptr`.
pub(crate) fn decode(
    data: &[u8],
    ptr: u32,
    code_units: u32,
    encoding: StringEncoding,
) -> Result<String> {
    match encoding {
        StringEncoding::Utf8 => {
            let bytes = read_bytes(data, ptr, code_units)?;
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| CanonicalAbiError::validation("string", "invalid utf-8 body"))
        }
        StringEncoding::Utf16 => {
            let byte_len = code_units.checked_mul(2).ok_or_else(|| {
                CanonicalAbiError::validation("string", "utf-16 length exceeds memory")
            })?;
            let bytes = read_bytes(data, ptr, byte_len)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units)
                .map_err(|_| CanonicalAbiError::validation("string", "invalid utf-16 body"))
        }
        StringEncoding::Latin1Utf16 => {
            Err(CanonicalAbiError::UnsupportedEncoding("latin1+utf-16"))
        }
    }
}

/// Encode `s` into freshly allocated guest memory, returning the body
/// pointer and the code-unit count.
pub(crate) fn store<M: GuestMemory + ?Sized>(
    mem: &mut M,
    s: &str,
    encoding: StringEncoding,
) -> Result<(u32, u32)> {
    match encoding {
        StringEncoding::Utf8 => {
            let bytes = s.as_bytes();
            let len = u32::try_from(bytes.len()).map_err(|_| {
                CanonicalAbiError::validation("string", "utf-8 length exceeds u32")
            })?;
            let ptr = mem.alloc(1, len);
            mem.write(ptr, bytes)?;
            Ok((ptr, len))
        }
        StringEncoding::Utf16 => {
            let units: Vec<u16> = s.encode_utf16().collect();
            let count = u32::try_from(units.len()).map_err(|_| {
                CanonicalAbiError::validation("string", "utf-16 length exceeds u32")
            })?;
            let mut bytes = Vec::with_capacity(units.len() * 2);
            for unit in &units {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            let ptr = mem.alloc(2, count * 2);
            mem.write(ptr, &bytes)?;
            Ok((ptr, count))
        }
        StringEncoding::Latin1Utf16 => {
            Err(CanonicalAbiError::UnsupportedEncoding("latin1+utf-16"))
        }
    }
}
