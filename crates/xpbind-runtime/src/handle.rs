//! Opaque native handles
//!
//! Every identifier the simulator hands out gets its own nominal type so a window id
//! cannot be passed where a menu id is expected, even though both are a pointer on
//! the wire. Handles carry identity only:
//!
//! - equality and hashing compare the wrapped scalar and nothing else
//! - conversion to and from the scalar is explicit (`from_raw` / `into_raw`)
//! - a handle never owns what it names; the native side creates and destroys it
//!
//! A handle is dangling once its destroying call returns. The binding cannot detect
//! this and does not try to.

use std::ffi::c_void;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident(pointer)) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*mut c_void);

        // The pointer is an identifier, never dereferenced on this side.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            /// Wrap a native-issued value
            #[inline]
            pub const fn from_raw(raw: *mut c_void) -> Self {
                Self(raw)
            }

            /// Unwrap to the native scalar
            #[inline]
            pub const fn into_raw(self) -> *mut c_void {
                self.0
            }

            /// Native lookups report "no such object" with a null handle
            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl $crate::ffi::NativeType for $name {
            const EXTERN: $crate::ffi::ExternType = $crate::ffi::ExternType::CPointer;
        }
    };

    ($(#[$meta:meta])* $name:ident(i32)) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a native-issued value
            #[inline]
            pub const fn from_raw(raw: i32) -> Self {
                Self(raw)
            }

            /// Unwrap to the native scalar
            #[inline]
            pub const fn into_raw(self) -> i32 {
                self.0
            }
        }

        impl $crate::ffi::NativeType for $name {
            const EXTERN: $crate::ffi::ExternType = $crate::ffi::ExternType::CInt;
        }
    };
}

opaque_handle!(
    /// An X-Plane command. Stable for the life of the plugin, not across sessions.
    CommandRef(pointer)
);
opaque_handle!(
    /// A published dataref
    DataRef(pointer)
);
opaque_handle!(WindowId(pointer));
opaque_handle!(MenuId(pointer));
opaque_handle!(HotKeyId(pointer));
opaque_handle!(
    /// A flight loop created through `XPLMCreateFlightLoop`
    FlightLoopId(pointer)
);
opaque_handle!(MapLayerId(pointer));
opaque_handle!(
    /// An object instance created from a loaded scenery object
    InstanceRef(pointer)
);
opaque_handle!(
    /// A terrain probe
    ProbeRef(pointer)
);
opaque_handle!(
    /// A loaded plugin. 32-bit on the wire.
    PluginId(i32)
);
opaque_handle!(
    /// An entry in the navigation database. 32-bit on the wire.
    NavRef(i32)
);

impl PluginId {
    /// `XPLM_NO_PLUGIN_ID`
    pub const NONE: PluginId = PluginId(-1);
    /// `XPLM_PLUGIN_XPLANE`, the simulator itself
    pub const XPLANE: PluginId = PluginId(0);
}

impl NavRef {
    /// `XPLM_NAV_NOT_FOUND`
    pub const NOT_FOUND: NavRef = NavRef(-1);
}
