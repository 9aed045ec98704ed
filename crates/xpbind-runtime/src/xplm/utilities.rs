//! Commands and the simulator log (`XPLMUtilities`)

use crate::error::BindingResult;
use crate::ffi::callbacks::{CallbackKind, CallbackRegistry, CallbackState, RegistrationId};
use crate::ffi::{NativeFn, NativeLibrary, ShortText};
use crate::handle::CommandRef;
use crate::session;
use std::ffi::{c_char, c_void, CStr};
use std::sync::OnceLock;

/// Native command callback: `int (XPLMCommandRef, XPLMCommandPhase, void*)`
pub type CommandCallback = unsafe extern "C" fn(CommandRef, i32, *mut c_void) -> i32;

type FindCommandFn = unsafe extern "C" fn(*const c_char) -> CommandRef;
type CreateCommandFn = unsafe extern "C" fn(*const c_char, *const c_char) -> CommandRef;
type CommandActionFn = unsafe extern "C" fn(CommandRef);
type CommandHandlerFn = unsafe extern "C" fn(CommandRef, *const c_void, i32, *mut c_void);
type DebugStringFn = unsafe extern "C" fn(*const c_char);

/// Phase of a command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandPhase {
    Begin = 0,
    Continue = 1,
    End = 2,
}

impl CommandPhase {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(CommandPhase::Begin),
            1 => Some(CommandPhase::Continue),
            2 => Some(CommandPhase::End),
            _ => None,
        }
    }
}

/// Utilities exports, bound once
#[derive(Debug)]
pub struct UtilitiesApi {
    find_command: NativeFn<FindCommandFn>,
    create_command: NativeFn<CreateCommandFn>,
    command_once: NativeFn<CommandActionFn>,
    command_begin: NativeFn<CommandActionFn>,
    command_end: NativeFn<CommandActionFn>,
    register_command_handler: NativeFn<CommandHandlerFn>,
    unregister_command_handler: NativeFn<CommandHandlerFn>,
    debug_string: NativeFn<DebugStringFn>,
}

static API: OnceLock<UtilitiesApi> = OnceLock::new();

impl UtilitiesApi {
    pub fn bind(library: &NativeLibrary) -> Self {
        // Signatures follow XPLMUtilities.h.
        unsafe {
            Self {
                find_command: NativeFn::bind(library, "XPLMFindCommand"),
                create_command: NativeFn::bind(library, "XPLMCreateCommand"),
                command_once: NativeFn::bind(library, "XPLMCommandOnce"),
                command_begin: NativeFn::bind(library, "XPLMCommandBegin"),
                command_end: NativeFn::bind(library, "XPLMCommandEnd"),
                register_command_handler: NativeFn::bind(library, "XPLMRegisterCommandHandler"),
                unregister_command_handler: NativeFn::bind(library, "XPLMUnregisterCommandHandler"),
                debug_string: NativeFn::bind(library, "XPLMDebugString"),
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

    /// Bind the global API against `library` unless already bound
    pub(crate) fn bind_global(library: &NativeLibrary) -> &'static Self {
        API.get_or_init(|| Self::bind(library))
    }

    /// The global binding, only if something already created it
    pub fn try_global() -> Option<&'static Self> {
        API.get()
    }

    /// Look up a command by name; `None` if it does not exist
    pub fn find_command(&self, name: &str) -> BindingResult<Option<CommandRef>> {
        let name = ShortText::new(name)?;
        let command = unsafe { self.find_command.call((name.as_ptr(),)) }?;
        Ok((!command.is_null()).then_some(command))
    }

    /// Create a command, or return the existing one with that name
    pub fn create_command(&self, name: &str, description: &str) -> BindingResult<CommandRef> {
        let name = ShortText::new(name)?;
        let description = ShortText::new(description)?;
        unsafe {
            self.create_command
                .call((name.as_ptr(), description.as_ptr()))
        }
    }

    pub fn command_once(&self, command: CommandRef) -> BindingResult<()> {
        unsafe { self.command_once.call((command,)) }
    }

    /// Start holding a command down; balance with [`UtilitiesApi::command_end`]
    pub fn command_begin(&self, command: CommandRef) -> BindingResult<()> {
        unsafe { self.command_begin.call((command,)) }
    }

    pub fn command_end(&self, command: CommandRef) -> BindingResult<()> {
        unsafe { self.command_end.call((command,)) }
    }

    /// Write text to the simulator log
    pub fn debug_string(&self, text: &str) -> BindingResult<()> {
        let text = ShortText::new(text)?;
        self.debug_string_raw(&text)
    }

    /// Write already-encoded text to the simulator log
    pub fn debug_string_raw(&self, text: &CStr) -> BindingResult<()> {
        unsafe { self.debug_string.call((text.as_ptr(),)) }
    }

    /// Attach `handler` to `command`
    ///
    /// With `before` set the handler runs ahead of the simulator's own handling.
    /// The handler returns `true` to let processing continue, `false` to consume the
    /// command. The registration lasts until the returned guard is dropped.
    pub fn register_command_handler<H>(
        &'static self,
        command: CommandRef,
        before: bool,
        handler: H,
    ) -> BindingResult<CommandHandler>
    where
        H: FnMut(CommandRef, CommandPhase) -> bool + Send + 'static,
    {
        let register = self.register_command_handler.get()?;
        self.unregister_command_handler.get()?;

        let pending = CommandHandlerKind::registry().begin(Box::new(handler));
        unsafe {
            register(
                command,
                command_trampoline_ptr(),
                i32::from(before),
                pending.refcon(),
            );
        }
        let registration = pending.activate();

        tracing::debug!(command = ?command, before, registration = registration.get(), "command handler registered");
        Ok(CommandHandler {
            command,
            before,
            registration,
            api: self,
        })
    }
}

/// Callback family for `XPLMRegisterCommandHandler`
pub struct CommandHandlerKind;

impl CallbackKind for CommandHandlerKind {
    type Handler = dyn FnMut(CommandRef, CommandPhase) -> bool + Send;
    const NAME: &'static str = "command handler";

    fn registry() -> &'static CallbackRegistry<Self> {
        static REGISTRY: CallbackRegistry<CommandHandlerKind> = CallbackRegistry::new();
        &REGISTRY
    }
}

// A dropped invocation returns 1 so other handlers still see the command.
extern "C" fn command_trampoline(command: CommandRef, phase: i32, refcon: *mut c_void) -> i32 {
    let Some(phase) = CommandPhase::from_raw(phase) else {
        tracing::debug!(phase, "unknown command phase");
        return 1;
    };
    CommandHandlerKind::registry().dispatch(refcon, 1, |handler| {
        i32::from(handler(command, phase))
    })
}

// The native side identifies a handler by (command, callback, before, refcon), so
// registration and unregistration must pass the same callback address.
fn command_trampoline_ptr() -> *const c_void {
    command_trampoline as CommandCallback as *const c_void
}

/// A registered command handler; unregistered when dropped
#[derive(Debug)]
pub struct CommandHandler {
    command: CommandRef,
    before: bool,
    registration: RegistrationId,
    api: &'static UtilitiesApi,
}

impl CommandHandler {
    /// Register through the global session
    pub fn register<H>(command: CommandRef, before: bool, handler: H) -> BindingResult<Self>
    where
        H: FnMut(CommandRef, CommandPhase) -> bool + Send + 'static,
    {
        UtilitiesApi::global()?.register_command_handler(command, before, handler)
    }

    pub fn command(&self) -> CommandRef {
        self.command
    }

    pub fn registration(&self) -> RegistrationId {
        self.registration
    }
}

impl Drop for CommandHandler {
    fn drop(&mut self) {
        let registry = CommandHandlerKind::registry();
        if registry.state(self.registration) == CallbackState::Unregistered {
            return;
        }

        let result = unsafe {
            self.api.unregister_command_handler.call((
                self.command,
                command_trampoline_ptr(),
                i32::from(self.before),
                self.registration.refcon(),
            ))
        };
        if let Err(error) = result {
            tracing::warn!(%error, "command handler could not be unregistered natively");
        }
        registry.unregister(self.registration);
    }
}

/// Look up a command through the global session
pub fn find_command(name: &str) -> BindingResult<Option<CommandRef>> {
    UtilitiesApi::global()?.find_command(name)
}

/// Write to the simulator log through the global session
pub fn debug_string(text: &str) -> BindingResult<()> {
    UtilitiesApi::global()?.debug_string(text)
}
