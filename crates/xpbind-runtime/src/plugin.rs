//! Plugin lifecycle
//!
//! The simulator drives a plugin through start, enable, disable and stop, and
//! delivers inter-plugin messages in between. [`PluginLifecycle`] forwards those calls
//! to an application [`Plugin`], keeps application panics from reaching the
//! simulator, and on stop releases every callback anchor the plugin still holds.

use crate::ffi::absorb_panic;
use crate::handle::PluginId;
use crate::logging;
use crate::xplm;
use std::ffi::{c_char, c_void};

/// Size of each text buffer the simulator passes to a plugin's start entry point
pub const PLUGIN_INFO_BUFFER_LEN: usize = 256;

/// Application plugin
pub trait Plugin: Send {
    /// Human-readable name
    fn name(&self) -> &str;
    /// Unique reverse-DNS style signature
    fn signature(&self) -> &str;
    fn description(&self) -> &str;

    /// Acquire resources; `false` refuses to load
    fn on_start(&mut self) -> bool;
    fn on_enable(&mut self) -> bool;
    fn on_disable(&mut self);
    fn on_stop(&mut self);

    fn on_receive_message(&mut self, _from: PluginId, _message: i32, _param: *mut c_void) {}
}

/// Where a plugin is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Started,
    Enabled,
}

/// Drives a [`Plugin`] through the simulator's entry points
pub struct PluginLifecycle<P: Plugin> {
    plugin: P,
    state: LifecycleState,
}

impl<P: Plugin> PluginLifecycle<P> {
    pub fn new(plugin: P) -> Self {
        Self {
            plugin,
            state: LifecycleState::Stopped,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn plugin_mut(&mut self) -> &mut P {
        &mut self.plugin
    }

    pub fn start(&mut self) -> bool {
        if self.state != LifecycleState::Stopped {
            tracing::warn!(state = ?self.state, "start requested twice");
            return true;
        }

        let plugin = &mut self.plugin;
        let started = absorb_panic("plugin start", false, || plugin.on_start());
        if started {
            self.state = LifecycleState::Started;
            tracing::info!(plugin = self.plugin.name(), "plugin started");
        } else {
            // Anything the plugin registered before refusing is released now.
            xplm::release_all_callbacks();
        }
        started
    }

    pub fn enable(&mut self) -> bool {
        match self.state {
            LifecycleState::Enabled => return true,
            LifecycleState::Stopped => {
                tracing::warn!("enable requested before start");
                return false;
            }
            LifecycleState::Started => {}
        }

        let plugin = &mut self.plugin;
        let enabled = absorb_panic("plugin enable", false, || plugin.on_enable());
        if enabled {
            self.state = LifecycleState::Enabled;
        }
        enabled
    }

    pub fn disable(&mut self) {
        if self.state != LifecycleState::Enabled {
            return;
        }
        let plugin = &mut self.plugin;
        absorb_panic("plugin disable", (), || plugin.on_disable());
        self.state = LifecycleState::Started;
    }

    /// Stop the plugin and release every callback anchor it still holds
    ///
    /// The release happens even if the application's stop handler panics.
    pub fn stop(&mut self) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        self.disable();

        let plugin = &mut self.plugin;
        absorb_panic("plugin stop", (), || plugin.on_stop());
        self.state = LifecycleState::Stopped;

        let released = xplm::release_all_callbacks();
        tracing::info!(plugin = self.plugin.name(), released, "plugin stopped");
        logging::flush();
    }

    pub fn receive_message(&mut self, from: PluginId, message: i32, param: *mut c_void) {
        let plugin = &mut self.plugin;
        absorb_panic("plugin message", (), || {
            plugin.on_receive_message(from, message, param)
        });
    }

    /// Fill the name, signature and description buffers of the start entry point
    ///
    /// Text longer than the buffer is truncated on a character boundary.
    ///
    /// # Safety
    ///
    /// Each pointer must be null or point to at least [`PLUGIN_INFO_BUFFER_LEN`]
    /// writable bytes.
    pub unsafe fn write_info(&self, name: *mut c_char, signature: *mut c_char, description: *mut c_char) {
        write_out_text(self.plugin.name(), name);
        write_out_text(self.plugin.signature(), signature);
        write_out_text(self.plugin.description(), description);
    }
}

unsafe fn write_out_text(text: &str, out: *mut c_char) {
    if out.is_null() {
        return;
    }

    let mut len = text
        .bytes()
        .position(|b| b == 0)
        .unwrap_or(text.len())
        .min(PLUGIN_INFO_BUFFER_LEN - 1);
    while !text.is_char_boundary(len) {
        len -= 1;
    }

    std::ptr::copy_nonoverlapping(text.as_ptr(), out.cast::<u8>(), len);
    *out.add(len) = 0;
}
