//! Type marshaling - Rust ↔ C conversions at the native boundary
//!
//! Provides:
//! - `MarshalContext::to_c()`: convert a `NativeArg` to its C representation for the
//!   generic call path, keeping any allocated text alive until the context drops
//! - `StackCStr`: NUL-terminated text encoded into an on-stack buffer, for call sites
//!   that run every frame
//! - `read_c_string()`: decode text the native side hands back
//!
//! # Memory Safety
//!
//! - Text pointers produced here are valid only while their owner (`MarshalContext`
//!   or `StackCStr`) is alive
//! - Interior NUL bytes are rejected with `InvalidText` instead of truncating

use crate::error::{BindingError, BindingResult};
use crate::ffi::types::{CType, ExternType};
use std::ffi::{c_char, c_void, CStr, CString};
use std::ops::Deref;

/// An argument on the generic call path, before marshaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeArg<'a> {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Pointer(*mut c_void),
    Text(&'a str),
}

impl NativeArg<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeArg::Int(_) => "int",
            NativeArg::Long(_) => "long",
            NativeArg::Float(_) => "float",
            NativeArg::Double(_) => "double",
            NativeArg::Pointer(_) => "pointer",
            NativeArg::Text(_) => "text",
        }
    }
}

impl From<i32> for NativeArg<'_> {
    fn from(value: i32) -> Self {
        NativeArg::Int(value)
    }
}

impl From<i64> for NativeArg<'_> {
    fn from(value: i64) -> Self {
        NativeArg::Long(value)
    }
}

impl From<f32> for NativeArg<'_> {
    fn from(value: f32) -> Self {
        NativeArg::Float(value)
    }
}

impl From<f64> for NativeArg<'_> {
    fn from(value: f64) -> Self {
        NativeArg::Double(value)
    }
}

impl<'a> From<&'a str> for NativeArg<'a> {
    fn from(value: &'a str) -> Self {
        NativeArg::Text(value)
    }
}

/// Marshal context for the generic call path
///
/// Owns every C string created while marshaling one call.
pub struct MarshalContext {
    allocated_strings: Vec<CString>,
}

impl MarshalContext {
    /// Create a new marshal context
    pub fn new() -> Self {
        Self {
            allocated_strings: Vec::new(),
        }
    }

    /// Marshal an argument to the C type the signature declares
    ///
    /// Integer and float arguments widen (`int` → `long`, `float` → `double`); every
    /// other pairing must match exactly.
    pub fn to_c(&mut self, arg: &NativeArg<'_>, target: ExternType) -> BindingResult<CType> {
        match (arg, target) {
            (NativeArg::Int(i), ExternType::CInt) => Ok(CType::Int(*i)),
            (NativeArg::Int(i), ExternType::CLong) => Ok(CType::Long(i64::from(*i))),
            (NativeArg::Long(l), ExternType::CLong) => Ok(CType::Long(*l)),
            (NativeArg::Float(f), ExternType::CFloat) => Ok(CType::Float(*f)),
            (NativeArg::Float(f), ExternType::CDouble) => Ok(CType::Double(f64::from(*f))),
            (NativeArg::Double(d), ExternType::CDouble) => Ok(CType::Double(*d)),
            (NativeArg::Pointer(p), ExternType::CPointer) => Ok(CType::Pointer(*p)),
            (NativeArg::Pointer(p), ExternType::CCharPtr) => {
                Ok(CType::CharPtr(p.cast_const().cast::<c_char>()))
            }
            (NativeArg::Text(s), ExternType::CCharPtr) => {
                let c_string = encode_text(s)?;
                // The heap buffer does not move when the CString moves into the vec.
                let ptr = c_string.as_ptr();
                self.allocated_strings.push(c_string);
                Ok(CType::CharPtr(ptr))
            }
            _ => Err(BindingError::TypeMismatch {
                expected: target,
                got: arg.type_name(),
            }),
        }
    }

    /// Number of C strings kept alive by this context
    pub fn allocated_count(&self) -> usize {
        self.allocated_strings.len()
    }
}

impl Default for MarshalContext {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_text(text: &str) -> BindingResult<CString> {
    CString::new(text).map_err(|e| BindingError::InvalidText(e.nul_position()))
}

/// Default inline capacity for short text, including the terminator
pub const SHORT_TEXT_CAPACITY: usize = 256;

/// Text sized for typical command names, dataref paths and log lines
pub type ShortText = StackCStr<SHORT_TEXT_CAPACITY>;

/// NUL-terminated text stored inline when it fits in `N` bytes
///
/// Text of `N - 1` bytes or fewer never touches the allocator. Longer text spills
/// into a heap `CString`.
pub struct StackCStr<const N: usize> {
    storage: Storage<N>,
}

enum Storage<const N: usize> {
    Inline { buf: [u8; N], len: usize },
    Heap(CString),
}

impl<const N: usize> StackCStr<N> {
    /// Encode `text`, failing on an interior NUL byte
    pub fn new(text: &str) -> BindingResult<Self> {
        let bytes = text.as_bytes();
        if let Some(pos) = bytes.iter().position(|&b| b == 0) {
            return Err(BindingError::InvalidText(pos));
        }

        let storage = if bytes.len() < N {
            let mut buf = [0u8; N];
            buf[..bytes.len()].copy_from_slice(bytes);
            Storage::Inline {
                buf,
                len: bytes.len(),
            }
        } else {
            Storage::Heap(encode_text(text)?)
        };

        Ok(Self { storage })
    }

    /// Pointer for a native call; valid while `self` is alive and not moved
    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        match &self.storage {
            Storage::Inline { buf, .. } => buf.as_ptr().cast::<c_char>(),
            Storage::Heap(c_string) => c_string.as_ptr(),
        }
    }

    pub fn as_c_str(&self) -> &CStr {
        match &self.storage {
            // The inline buffer was checked for interior NULs and is terminated at `len`.
            Storage::Inline { buf, len } => unsafe {
                CStr::from_bytes_with_nul_unchecked(&buf[..=*len])
            },
            Storage::Heap(c_string) => c_string.as_c_str(),
        }
    }

    /// Check whether the text fit in the inline buffer
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline { .. })
    }
}

impl<const N: usize> Deref for StackCStr<N> {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        self.as_c_str()
    }
}

impl<const N: usize> std::fmt::Debug for StackCStr<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StackCStr").field(&self.as_c_str()).finish()
    }
}

/// Decode NUL-terminated text owned by the native side
///
/// Returns `None` for a null pointer. Invalid UTF-8 is replaced, not rejected.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated buffer that stays valid for the
/// duration of this call.
pub unsafe fn read_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
