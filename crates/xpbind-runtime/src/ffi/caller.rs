//! Native function calling through resolved export addresses
//!
//! Two paths reach a native function:
//!
//! - [`NativeFn`] is the typed direct-invoke path. The signature is a Rust
//!   `unsafe extern "C" fn` type, the address is cast once at bind time and every
//!   call afterwards is a plain indirect call with no marshaling step. Wrapper
//!   modules and per-frame paths use this.
//! - [`ExternFunction`] carries its signature as data (`ExternType` descriptors) and
//!   dispatches over the set of shapes it knows. It exists for signatures that are
//!   only known at run time.
//!
//! Both check the address before calling and fail with `NullExport` instead of
//! jumping through an unresolved export.

use crate::error::{BindingError, BindingResult};
use crate::ffi::loader::{ExportAddr, NativeLibrary};
use crate::ffi::marshal::{MarshalContext, NativeArg};
use crate::ffi::safety::check_export;
use crate::ffi::types::{CType, ExternType, NativeType};
use std::ffi::{c_char, c_void};

/// Calling convention of a native export
///
/// The SDK exports only the platform C convention; the tag exists so a signature
/// states it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallingConvention {
    #[default]
    C,
}

/// A native function pointer type usable with [`NativeFn`]
///
/// Implemented for `unsafe extern "C" fn(A, ..) -> R` up to eight parameters, where
/// every parameter and the return type implement [`NativeType`].
pub trait Signature: Copy + Send + Sync + 'static {
    /// Parameters as a tuple
    type Args;
    /// Return type, `()` for void
    type Output: NativeType;

    const CONVENTION: CallingConvention = CallingConvention::C;
    const PARAMS: &'static [ExternType];
    const RETURN: ExternType = <Self::Output as NativeType>::EXTERN;

    /// Reinterpret a resolved address as this function type
    ///
    /// # Safety
    ///
    /// `addr` must be a non-null export whose native signature is exactly `Self`.
    unsafe fn from_addr(addr: ExportAddr) -> Self;

    /// Call the function
    ///
    /// # Safety
    ///
    /// The arguments must satisfy the native function's own preconditions.
    unsafe fn invoke(self, args: Self::Args) -> Self::Output;
}

macro_rules! impl_signature {
    ($($arg:ident),*) => {
        impl<R: NativeType + 'static, $($arg: NativeType + 'static),*> Signature
            for unsafe extern "C" fn($($arg),*) -> R
        {
            type Args = ($($arg,)*);
            type Output = R;

            const PARAMS: &'static [ExternType] = &[$(<$arg as NativeType>::EXTERN),*];

            #[inline]
            unsafe fn from_addr(addr: ExportAddr) -> Self {
                std::mem::transmute_copy::<*const c_void, Self>(&addr.as_ptr())
            }

            #[inline]
            #[allow(non_snake_case)]
            unsafe fn invoke(self, args: Self::Args) -> R {
                let ($($arg,)*) = args;
                (self)($($arg),*)
            }
        }
    };
}

impl_signature!();
impl_signature!(A);
impl_signature!(A, B);
impl_signature!(A, B, C);
impl_signature!(A, B, C, D);
impl_signature!(A, B, C, D, E);
impl_signature!(A, B, C, D, E, F);
impl_signature!(A, B, C, D, E, F, G);
impl_signature!(A, B, C, D, E, F, G, H);

/// A native export bound to a fixed signature
///
/// Built once per export and reused. An export that did not resolve still produces
/// a `NativeFn`; calling it returns `NullExport` and never reaches native code.
#[derive(Clone, Copy)]
pub struct NativeFn<F: Signature> {
    name: &'static str,
    func: Option<F>,
}

impl<F: Signature> NativeFn<F> {
    /// Resolve `name` in `library` and bind it to `F`
    ///
    /// # Safety
    ///
    /// If the export exists, its native signature must be exactly `F`. A mismatch is
    /// silent stack or register corruption, not a catchable error.
    pub unsafe fn bind(library: &NativeLibrary, name: &'static str) -> Self {
        Self::from_addr(name, library.resolve(name))
    }

    /// Bind an already-resolved address
    ///
    /// # Safety
    ///
    /// Same contract as [`NativeFn::bind`].
    pub unsafe fn from_addr(name: &'static str, addr: ExportAddr) -> Self {
        let func = if addr.is_resolved() {
            Some(F::from_addr(addr))
        } else {
            None
        };
        Self { name, func }
    }

    /// A binding with no address behind it
    pub fn unresolved(name: &'static str) -> Self {
        Self { name, func: None }
    }

    /// Export name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether the export resolved
    #[inline]
    pub fn is_available(&self) -> bool {
        self.func.is_some()
    }

    /// The typed function pointer, or `NullExport`
    #[inline]
    pub fn get(&self) -> BindingResult<F> {
        self.func
            .ok_or_else(|| BindingError::NullExport(self.name.to_string()))
    }

    /// Call the export
    ///
    /// # Safety
    ///
    /// The arguments must satisfy the native function's preconditions (valid
    /// pointers, live handles, NUL-terminated text).
    #[inline]
    pub unsafe fn call(&self, args: F::Args) -> BindingResult<F::Output> {
        let func = self.get()?;
        Ok(func.invoke(args))
    }
}

impl<F: Signature> std::fmt::Debug for NativeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("available", &self.is_available())
            .field("params", &F::PARAMS)
            .field("return", &F::RETURN)
            .finish()
    }
}

/// A native export whose signature is described at run time
#[derive(Debug, Clone)]
pub struct ExternFunction {
    name: String,
    addr: ExportAddr,
    param_types: Vec<ExternType>,
    return_type: ExternType,
}

impl ExternFunction {
    /// Describe a native function
    ///
    /// # Safety
    ///
    /// If `addr` is resolved, the native function's signature must match
    /// `param_types` and `return_type` exactly.
    pub unsafe fn new(
        name: impl Into<String>,
        addr: ExportAddr,
        param_types: Vec<ExternType>,
        return_type: ExternType,
    ) -> Self {
        Self {
            name: name.into(),
            addr,
            param_types,
            return_type,
        }
    }

    /// Resolve `name` in `library` and describe it
    ///
    /// # Safety
    ///
    /// Same contract as [`ExternFunction::new`].
    pub unsafe fn bind(
        library: &NativeLibrary,
        name: &str,
        param_types: Vec<ExternType>,
        return_type: ExternType,
    ) -> Self {
        Self::new(name, library.resolve(name), param_types, return_type)
    }

    /// Marshal `args`, call the function and return the raw C result
    ///
    /// Text arguments are copied into NUL-terminated buffers that live until the
    /// call returns. A `CCharPtr` result points into native memory; read it with
    /// [`read_c_string`](crate::ffi::read_c_string).
    ///
    /// # Safety
    ///
    /// The arguments must satisfy the native function's preconditions.
    pub unsafe fn call(&self, args: &[NativeArg<'_>]) -> BindingResult<CType> {
        let addr = check_export(&self.name, self.addr)?;

        if args.len() != self.param_types.len() {
            return Err(BindingError::ArityMismatch {
                expected: self.param_types.len(),
                got: args.len(),
            });
        }

        let mut ctx = MarshalContext::new();
        let c_args = args
            .iter()
            .zip(self.param_types.iter())
            .map(|(arg, ty)| ctx.to_c(arg, *ty))
            .collect::<BindingResult<Vec<_>>>()?;

        self.call_with_signature(addr, &c_args)
    }

    /// Dispatch on the argument shapes and return type
    unsafe fn call_with_signature(&self, addr: ExportAddr, args: &[CType]) -> BindingResult<CType> {
        macro_rules! call_as {
            (fn($($ty:ty),*) -> $ret:ty, ($($arg:expr),*)) => {{
                let f = <unsafe extern "C" fn($($ty),*) -> $ret as Signature>::from_addr(addr);
                f($($arg),*)
            }};
        }

        use CType::*;

        let result = match (args, self.return_type) {
            // No parameters
            ([], ExternType::CVoid) => {
                call_as!(fn() -> (), ());
                Void
            }
            ([], ExternType::CInt) => Int(call_as!(fn() -> i32, ())),
            ([], ExternType::CLong) => Long(call_as!(fn() -> i64, ())),
            ([], ExternType::CFloat) => Float(call_as!(fn() -> f32, ())),
            ([], ExternType::CDouble) => Double(call_as!(fn() -> f64, ())),
            ([], ExternType::CPointer) => Pointer(call_as!(fn() -> *mut c_void, ())),

            // One parameter
            ([Int(a)], ExternType::CVoid) => {
                call_as!(fn(i32) -> (), (*a));
                Void
            }
            ([Int(a)], ExternType::CInt) => Int(call_as!(fn(i32) -> i32, (*a))),
            ([Double(a)], ExternType::CDouble) => Double(call_as!(fn(f64) -> f64, (*a))),
            ([Pointer(a)], ExternType::CVoid) => {
                call_as!(fn(*mut c_void) -> (), (*a));
                Void
            }
            ([Pointer(a)], ExternType::CInt) => Int(call_as!(fn(*mut c_void) -> i32, (*a))),
            ([Pointer(a)], ExternType::CFloat) => Float(call_as!(fn(*mut c_void) -> f32, (*a))),
            ([Pointer(a)], ExternType::CDouble) => {
                Double(call_as!(fn(*mut c_void) -> f64, (*a)))
            }
            ([CharPtr(a)], ExternType::CVoid) => {
                call_as!(fn(*const c_char) -> (), (*a));
                Void
            }
            ([CharPtr(a)], ExternType::CInt) => Int(call_as!(fn(*const c_char) -> i32, (*a))),
            ([CharPtr(a)], ExternType::CPointer) => {
                Pointer(call_as!(fn(*const c_char) -> *mut c_void, (*a)))
            }

            // Two parameters
            ([Int(a), Int(b)], ExternType::CInt) => Int(call_as!(fn(i32, i32) -> i32, (*a, *b))),
            ([Double(a), Double(b)], ExternType::CDouble) => {
                Double(call_as!(fn(f64, f64) -> f64, (*a, *b)))
            }
            ([Pointer(a), Int(b)], ExternType::CVoid) => {
                call_as!(fn(*mut c_void, i32) -> (), (*a, *b));
                Void
            }
            ([Pointer(a), Int(b)], ExternType::CInt) => {
                Int(call_as!(fn(*mut c_void, i32) -> i32, (*a, *b)))
            }
            ([Pointer(a), Float(b)], ExternType::CVoid) => {
                call_as!(fn(*mut c_void, f32) -> (), (*a, *b));
                Void
            }
            ([Pointer(a), Double(b)], ExternType::CVoid) => {
                call_as!(fn(*mut c_void, f64) -> (), (*a, *b));
                Void
            }
            ([CharPtr(a), CharPtr(b)], ExternType::CPointer) => {
                Pointer(call_as!(fn(*const c_char, *const c_char) -> *mut c_void, (*a, *b)))
            }

            // Three parameters
            ([Pointer(a), Float(b), Int(c)], ExternType::CVoid) => {
                call_as!(fn(*mut c_void, f32, i32) -> (), (*a, *b, *c));
                Void
            }

            _ => return Err(BindingError::UnsupportedSignature(self.signature_key())),
        };

        Ok(result)
    }

    /// Signature rendered for diagnostics, e.g. `(c_int,c_int)->c_int`
    pub fn signature_key(&self) -> String {
        let params: Vec<&str> = self.param_types.iter().map(|t| t.display_name()).collect();
        format!("({})->{}", params.join(","), self.return_type.display_name())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.addr.is_resolved()
    }

    pub fn param_types(&self) -> &[ExternType] {
        &self.param_types
    }

    pub fn return_type(&self) -> ExternType {
        self.return_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{CommandRef, PluginId};
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    extern "C" fn test_add(a: i32, b: i32) -> i32 {
        a + b
    }

    extern "C" fn test_double(x: f64) -> f64 {
        x * 2.0
    }

    extern "C" fn test_no_args() -> i32 {
        42
    }

    extern "C" fn test_text_len(text: *const c_char) -> i32 {
        unsafe { CStr::from_ptr(text) }.to_bytes().len() as i32
    }

    static SIDE_EFFECTS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn test_count() {
        SIDE_EFFECTS.fetch_add(1, Ordering::SeqCst);
    }

    fn addr_of(ptr: *const c_void) -> ExportAddr {
        ExportAddr::from_ptr(ptr)
    }

    extern "C" fn test_echo_plugin(_command: CommandRef, _name: *const c_char, id: i32) -> PluginId {
        PluginId::from_raw(id)
    }

    #[test]
    fn test_handles_and_pointers_in_signatures() {
        type EchoFn = unsafe extern "C" fn(CommandRef, *const c_char, i32) -> PluginId;

        assert_eq!(
            <EchoFn as Signature>::PARAMS,
            &[ExternType::CPointer, ExternType::CPointer, ExternType::CInt]
        );
        assert_eq!(<EchoFn as Signature>::RETURN, ExternType::CInt);

        let echo: NativeFn<EchoFn> =
            unsafe { NativeFn::from_addr("test_echo_plugin", addr_of(test_echo_plugin as *const c_void)) };
        let command = CommandRef::from_raw(0x10 as *mut c_void);
        let result = unsafe { echo.call((command, c_text().as_ptr(), 9)) }.unwrap();
        assert_eq!(result, PluginId::from_raw(9));
    }

    fn c_text() -> &'static CStr {
        CStr::from_bytes_with_nul(b"sim/operation/pause_toggle\0").unwrap()
    }

    #[test]
    fn test_native_fn_direct_invoke() {
        let add: NativeFn<unsafe extern "C" fn(i32, i32) -> i32> =
            unsafe { NativeFn::from_addr("test_add", addr_of(test_add as *const c_void)) };

        assert!(add.is_available());
        assert_eq!(unsafe { add.call((3, 4)) }.unwrap(), 7);
        assert_eq!(unsafe { add.call((-10, 4)) }.unwrap(), -6);
    }

    #[test]
    fn test_native_fn_reports_signature() {
        type AddFn = unsafe extern "C" fn(i32, i32) -> i32;
        assert_eq!(<AddFn as Signature>::PARAMS, &[ExternType::CInt, ExternType::CInt]);
        assert_eq!(<AddFn as Signature>::RETURN, ExternType::CInt);
        assert_eq!(<AddFn as Signature>::CONVENTION, CallingConvention::C);

        type VoidFn = unsafe extern "C" fn();
        assert!(<VoidFn as Signature>::PARAMS.is_empty());
        assert_eq!(<VoidFn as Signature>::RETURN, ExternType::CVoid);
    }

    #[test]
    fn test_unresolved_native_fn_never_calls() {
        let before = SIDE_EFFECTS.load(Ordering::SeqCst);
        let count: NativeFn<unsafe extern "C" fn()> =
            unsafe { NativeFn::from_addr("test_count", ExportAddr::UNRESOLVED) };

        assert!(!count.is_available());
        match unsafe { count.call(()) } {
            Err(BindingError::NullExport(name)) => assert_eq!(name, "test_count"),
            other => panic!("expected NullExport, got {:?}", other),
        }
        assert_eq!(SIDE_EFFECTS.load(Ordering::SeqCst), before);

        let resolved: NativeFn<unsafe extern "C" fn()> =
            unsafe { NativeFn::from_addr("test_count", addr_of(test_count as *const c_void)) };
        unsafe { resolved.call(()) }.unwrap();
        assert_eq!(SIDE_EFFECTS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_extern_function_call_add() {
        let func = unsafe {
            ExternFunction::new(
                "test_add",
                addr_of(test_add as *const c_void),
                vec![ExternType::CInt, ExternType::CInt],
                ExternType::CInt,
            )
        };

        let result = unsafe { func.call(&[NativeArg::Int(10), NativeArg::Int(20)]) }.unwrap();
        assert_eq!(result, CType::Int(30));
    }

    #[test]
    fn test_extern_function_call_double() {
        let func = unsafe {
            ExternFunction::new(
                "test_double",
                addr_of(test_double as *const c_void),
                vec![ExternType::CDouble],
                ExternType::CDouble,
            )
        };

        let result = unsafe { func.call(&[NativeArg::Double(21.0)]) }.unwrap();
        assert_eq!(result, CType::Double(42.0));
    }

    #[test]
    fn test_extern_function_no_args() {
        let func = unsafe {
            ExternFunction::new(
                "test_no_args",
                addr_of(test_no_args as *const c_void),
                vec![],
                ExternType::CInt,
            )
        };

        assert_eq!(unsafe { func.call(&[]) }.unwrap(), CType::Int(42));
    }

    #[test]
    fn test_extern_function_text_argument() {
        let func = unsafe {
            ExternFunction::new(
                "test_text_len",
                addr_of(test_text_len as *const c_void),
                vec![ExternType::CCharPtr],
                ExternType::CInt,
            )
        };

        let result = unsafe { func.call(&[NativeArg::Text("sim/operation/pause")]) }.unwrap();
        assert_eq!(result, CType::Int(19));
    }

    #[test]
    fn test_extern_function_arity_mismatch() {
        let func = unsafe {
            ExternFunction::new(
                "test_add",
                addr_of(test_add as *const c_void),
                vec![ExternType::CInt, ExternType::CInt],
                ExternType::CInt,
            )
        };

        let result = unsafe { func.call(&[NativeArg::Int(10)]) };
        assert!(matches!(
            result,
            Err(BindingError::ArityMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_extern_function_null_checked_first() {
        let func = unsafe {
            ExternFunction::new(
                "XPLMMissing",
                ExportAddr::UNRESOLVED,
                vec![ExternType::CInt],
                ExternType::CInt,
            )
        };

        assert!(!func.is_available());
        assert!(matches!(
            unsafe { func.call(&[]) },
            Err(BindingError::NullExport(_))
        ));
    }

    #[test]
    fn test_unsupported_signature() {
        let func = unsafe {
            ExternFunction::new(
                "test_add",
                addr_of(test_add as *const c_void),
                vec![ExternType::CLong, ExternType::CLong, ExternType::CLong],
                ExternType::CLong,
            )
        };

        let result = unsafe {
            func.call(&[NativeArg::Long(1), NativeArg::Long(2), NativeArg::Long(3)])
        };
        match result {
            Err(BindingError::UnsupportedSignature(sig)) => {
                assert_eq!(sig, "(c_long,c_long,c_long)->c_long")
            }
            other => panic!("expected UnsupportedSignature, got {:?}", other),
        }
    }

    #[test]
    fn test_signature_key_generation() {
        let func = unsafe {
            ExternFunction::new(
                "test_add",
                ExportAddr::UNRESOLVED,
                vec![ExternType::CInt, ExternType::CInt],
                ExternType::CInt,
            )
        };

        assert_eq!(func.signature_key(), "(c_int,c_int)->c_int");
    }
}
