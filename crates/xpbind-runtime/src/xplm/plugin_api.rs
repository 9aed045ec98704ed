//! Plugin identity and SDK features (`XPLMPlugin`)

use crate::error::BindingResult;
use crate::ffi::{NativeFn, NativeLibrary, ShortText};
use crate::handle::PluginId;
use crate::session;
use std::ffi::c_char;
use std::sync::OnceLock;

type GetMyIdFn = unsafe extern "C" fn() -> PluginId;
type CountPluginsFn = unsafe extern "C" fn() -> i32;
type FindPluginBySignatureFn = unsafe extern "C" fn(*const c_char) -> PluginId;
type FeatureQueryFn = unsafe extern "C" fn(*const c_char) -> i32;
type EnableFeatureFn = unsafe extern "C" fn(*const c_char, i32);

/// Plugin exports, bound once
#[derive(Debug)]
pub struct PluginApi {
    get_my_id: NativeFn<GetMyIdFn>,
    count_plugins: NativeFn<CountPluginsFn>,
    find_plugin_by_signature: NativeFn<FindPluginBySignatureFn>,
    has_feature: NativeFn<FeatureQueryFn>,
    is_feature_enabled: NativeFn<FeatureQueryFn>,
    enable_feature: NativeFn<EnableFeatureFn>,
}

static API: OnceLock<PluginApi> = OnceLock::new();

impl PluginApi {
    pub fn bind(library: &NativeLibrary) -> Self {
        unsafe {
            Self {
                get_my_id: NativeFn::bind(library, "XPLMGetMyID"),
                count_plugins: NativeFn::bind(library, "XPLMCountPlugins"),
                find_plugin_by_signature: NativeFn::bind(library, "XPLMFindPluginBySignature"),
                has_feature: NativeFn::bind(library, "XPLMHasFeature"),
                is_feature_enabled: NativeFn::bind(library, "XPLMIsFeatureEnabled"),
                enable_feature: NativeFn::bind(library, "XPLMEnableFeature"),
            }
        }
    }

    /// Bound against the global session
    pub fn global() -> BindingResult<&'static Self> {
        if let Some(api) = API.get() {
            return Ok(api);
        }
        let session = session::get()?;
        Ok(API.get_or_init(|| Self::bind(session.xplm())))
    }

    /// Id of the calling plugin
    pub fn my_id(&self) -> BindingResult<PluginId> {
        unsafe { self.get_my_id.call(()) }
    }

    pub fn count_plugins(&self) -> BindingResult<i32> {
        unsafe { self.count_plugins.call(()) }
    }

    /// Find a loaded plugin by its signature; `None` if no plugin has it
    pub fn find_plugin_by_signature(&self, signature: &str) -> BindingResult<Option<PluginId>> {
        let signature = ShortText::new(signature)?;
        let id = unsafe { self.find_plugin_by_signature.call((signature.as_ptr(),)) }?;
        Ok((id != PluginId::NONE).then_some(id))
    }

    /// Check whether the running simulator knows `feature`
    pub fn has_feature(&self, feature: &str) -> BindingResult<bool> {
        let feature = ShortText::new(feature)?;
        let result = unsafe { self.has_feature.call((feature.as_ptr(),)) }?;
        Ok(result != 0)
    }

    pub fn is_feature_enabled(&self, feature: &str) -> BindingResult<bool> {
        let feature = ShortText::new(feature)?;
        let result = unsafe { self.is_feature_enabled.call((feature.as_ptr(),)) }?;
        Ok(result != 0)
    }

    pub fn enable_feature(&self, feature: &str, enable: bool) -> BindingResult<()> {
        let feature = ShortText::new(feature)?;
        unsafe {
            self.enable_feature
                .call((feature.as_ptr(), i32::from(enable)))
        }
    }
}

/// Id of the calling plugin, through the global session
pub fn my_id() -> BindingResult<PluginId> {
    PluginApi::global()?.my_id()
}
