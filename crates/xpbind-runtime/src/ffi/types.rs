//! FFI type system - C-compatible types for the native boundary
//!
//! Defines:
//! - `ExternType`: descriptor of a C parameter or return type
//! - `CType`: runtime representation of a C value on the generic call path
//! - `NativeType`: maps Rust types used in typed signatures to their descriptor
//!
//! Type mapping:
//! - ExternType::CInt → CType::Int(i32)
//! - ExternType::CLong → CType::Long(i64)
//! - ExternType::CFloat → CType::Float(f32)
//! - ExternType::CDouble → CType::Double(f64)
//! - ExternType::CPointer → CType::Pointer(*mut c_void)
//! - ExternType::CCharPtr → CType::CharPtr(*const c_char)
//! - ExternType::CVoid → CType::Void

use std::ffi::{c_char, c_void};

/// C types that may appear in a native signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// C int (i32 on every supported platform)
    CInt,
    /// 64-bit integer
    CLong,
    /// C float
    CFloat,
    /// C double
    CDouble,
    /// Opaque pointer, including handles and parameter blocks
    CPointer,
    /// Null-terminated text
    CCharPtr,
    /// No value (return position only)
    CVoid,
}

impl ExternType {
    /// Get a display name for this extern type
    pub fn display_name(&self) -> &'static str {
        match self {
            ExternType::CInt => "c_int",
            ExternType::CLong => "c_long",
            ExternType::CFloat => "c_float",
            ExternType::CDouble => "c_double",
            ExternType::CPointer => "c_void_ptr",
            ExternType::CCharPtr => "c_char_ptr",
            ExternType::CVoid => "c_void",
        }
    }

    /// Check if floating-point registers carry this type
    pub fn is_float(&self) -> bool {
        matches!(self, ExternType::CFloat | ExternType::CDouble)
    }
}

/// C value representation for the generic call path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CType {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Pointer(*mut c_void),
    /// Null-terminated text. Must stay valid for the duration of the call;
    /// `MarshalContext` owns the buffer.
    CharPtr(*const c_char),
    Void,
}

impl CType {
    /// Descriptor of the value's type
    pub fn extern_type(&self) -> ExternType {
        match self {
            CType::Int(_) => ExternType::CInt,
            CType::Long(_) => ExternType::CLong,
            CType::Float(_) => ExternType::CFloat,
            CType::Double(_) => ExternType::CDouble,
            CType::Pointer(_) => ExternType::CPointer,
            CType::CharPtr(_) => ExternType::CCharPtr,
            CType::Void => ExternType::CVoid,
        }
    }

    /// Name used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        self.extern_type().display_name()
    }
}

/// Rust types that can travel through a typed native signature
///
/// Implemented for the scalar types the SDK uses, raw pointers and every opaque handle.
pub trait NativeType: Copy {
    const EXTERN: ExternType;
}

impl NativeType for () {
    const EXTERN: ExternType = ExternType::CVoid;
}

impl NativeType for i32 {
    const EXTERN: ExternType = ExternType::CInt;
}

impl NativeType for i64 {
    const EXTERN: ExternType = ExternType::CLong;
}

impl NativeType for f32 {
    const EXTERN: ExternType = ExternType::CFloat;
}

impl NativeType for f64 {
    const EXTERN: ExternType = ExternType::CDouble;
}

impl<T> NativeType for *mut T {
    const EXTERN: ExternType = ExternType::CPointer;
}

impl<T> NativeType for *const T {
    const EXTERN: ExternType = ExternType::CPointer;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{CommandRef, PluginId};

    #[test]
    fn test_extern_type_display_names() {
        assert_eq!(ExternType::CInt.display_name(), "c_int");
        assert_eq!(ExternType::CFloat.display_name(), "c_float");
        assert_eq!(ExternType::CCharPtr.display_name(), "c_char_ptr");
        assert_eq!(ExternType::CVoid.display_name(), "c_void");
    }

    #[test]
    fn test_ctype_reports_its_type() {
        assert_eq!(CType::Int(3).extern_type(), ExternType::CInt);
        assert_eq!(CType::Float(1.5).type_name(), "c_float");
        assert_eq!(
            CType::Pointer(std::ptr::null_mut()).extern_type(),
            ExternType::CPointer
        );
    }

    #[test]
    fn test_native_type_descriptors() {
        assert_eq!(<() as NativeType>::EXTERN, ExternType::CVoid);
        assert_eq!(<f32 as NativeType>::EXTERN, ExternType::CFloat);
        assert_eq!(<*const c_char as NativeType>::EXTERN, ExternType::CPointer);
        assert_eq!(<CommandRef as NativeType>::EXTERN, ExternType::CPointer);
        assert_eq!(<PluginId as NativeType>::EXTERN, ExternType::CInt);
    }

    #[test]
    fn test_float_classification() {
        assert!(ExternType::CFloat.is_float());
        assert!(ExternType::CDouble.is_float());
        assert!(!ExternType::CPointer.is_float());
    }
}
