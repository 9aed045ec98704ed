//! Identity laws for opaque handles

use proptest::prelude::*;
use std::collections::HashSet;
use std::ffi::c_void;
use xpbind_runtime::ffi::{ExternType, NativeType};
use xpbind_runtime::{CommandRef, FlightLoopId, NavRef, PluginId, WindowId};

fn ptr(raw: usize) -> *mut c_void {
    raw as *mut c_void
}

proptest! {
    #[test]
    fn pointer_handles_round_trip(raw in any::<usize>()) {
        prop_assert_eq!(WindowId::from_raw(ptr(raw)).into_raw(), ptr(raw));
        prop_assert_eq!(CommandRef::from_raw(ptr(raw)).is_null(), raw == 0);
    }

    #[test]
    fn equality_follows_the_wrapped_value(a in any::<usize>(), b in any::<usize>()) {
        prop_assert_eq!(FlightLoopId::from_raw(ptr(a)) == FlightLoopId::from_raw(ptr(b)), a == b);
        prop_assert_eq!(PluginId::from_raw(a as i32) == PluginId::from_raw(b as i32), a as i32 == b as i32);
    }

    #[test]
    fn hashing_agrees_with_equality(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let handles: HashSet<NavRef> = values.iter().copied().map(NavRef::from_raw).collect();
        let raw: HashSet<i32> = values.iter().copied().collect();
        prop_assert_eq!(handles.len(), raw.len());
    }
}

#[test]
fn test_sentinels() {
    assert_eq!(PluginId::NONE.into_raw(), -1);
    assert_eq!(PluginId::XPLANE.into_raw(), 0);
    assert_eq!(NavRef::NOT_FOUND, NavRef::from_raw(-1));
    assert!(WindowId::from_raw(std::ptr::null_mut()).is_null());
}

#[test]
fn test_handles_travel_as_their_scalar() {
    assert_eq!(<WindowId as NativeType>::EXTERN, ExternType::CPointer);
    assert_eq!(<PluginId as NativeType>::EXTERN, ExternType::CInt);
    assert_eq!(std::mem::size_of::<CommandRef>(), std::mem::size_of::<*mut c_void>());
    assert_eq!(std::mem::size_of::<NavRef>(), std::mem::size_of::<i32>());
}
