//! Callbacks from native code into application handlers
//!
//! Every callback kind the SDK offers (flight loops, command handlers, ...) gets a
//! static `extern "C"` trampoline and a [`CallbackRegistry`]. Registering a handler
//! stores it in an anchor owned by the registry and hands native code the
//! registration id as its opaque `refcon`. When native code calls the trampoline,
//! the trampoline looks the id up and forwards to the handler.
//!
//! ```text
//! Unregistered ──begin()──▶ Pending ──activate()──▶ Active
//!       ▲                      │                       │
//!       └──── drop (rollback) ─┘    unregister() /     │
//!       └──────────────────────────── release_all() ───┘
//! ```
//!
//! The anchor is the only strong reference to the handler. Native memory holds
//! nothing but an integer, so nothing dangles when an anchor goes away: a late
//! invocation finds no anchor and is dropped.
//!
//! Invocations that cannot be delivered (unknown id, registration not active, or
//! the handler already running on this registration) are dropped and logged as
//! `InvalidCallbackState`. Panics raised by handlers are caught before they reach
//! the trampoline's native caller.

use crate::error::{BindingError, BindingResult};
use crate::ffi::safety::absorb_panic;
use std::collections::BTreeMap;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// A family of native callbacks sharing one trampoline signature
pub trait CallbackKind: Sized + 'static {
    /// Application handler type, usually a boxed closure
    type Handler: ?Sized + Send + 'static;

    /// Name used in diagnostics
    const NAME: &'static str;

    /// The process-wide registry for this kind
    fn registry() -> &'static CallbackRegistry<Self>;
}

/// Lifecycle state of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallbackState {
    Unregistered = 0,
    Pending = 1,
    Active = 2,
}

impl CallbackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CallbackState::Pending,
            2 => CallbackState::Active,
            _ => CallbackState::Unregistered,
        }
    }
}

/// Identifies one registration; travels through native code as the `refcon`
///
/// Ids are allocated within `usize` so every id survives the round trip through a
/// pointer-sized `refcon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Value handed to native code as the user context pointer
    #[inline]
    pub fn refcon(self) -> *mut c_void {
        self.0 as usize as *mut c_void
    }

    /// Recover an id from a native `refcon`; null is never a valid id
    #[inline]
    pub fn from_refcon(refcon: *mut c_void) -> Option<Self> {
        match refcon as usize as u64 {
            0 => None,
            id => Some(RegistrationId(id)),
        }
    }
}

struct Anchor<K: CallbackKind> {
    state: AtomicU8,
    handler: Mutex<Box<K::Handler>>,
}

impl<K: CallbackKind> Anchor<K> {
    fn state(&self) -> CallbackState {
        CallbackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CallbackState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Keep-alive table for the handlers of one callback kind
///
/// Constructible in a `static`; each kind owns exactly one.
pub struct CallbackRegistry<K: CallbackKind> {
    anchors: Mutex<BTreeMap<u64, Arc<Anchor<K>>>>,
    next_id: AtomicUsize,
    dropped: AtomicU64,
    _kind: PhantomData<fn() -> K>,
}

impl<K: CallbackKind> CallbackRegistry<K> {
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    const fn starting_at(next_id: usize) -> Self {
        Self {
            anchors: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(next_id),
            dropped: AtomicU64::new(0),
            _kind: PhantomData,
        }
    }

    /// Anchor `handler` and enter the Pending state
    ///
    /// Pass [`PendingRegistration::refcon`] to the native registering call, then
    /// [`activate`](PendingRegistration::activate) once it succeeds. Dropping the
    /// pending registration instead releases the anchor.
    pub fn begin(&'static self, handler: Box<K::Handler>) -> PendingRegistration<K> {
        let anchor = Arc::new(Anchor {
            state: AtomicU8::new(CallbackState::Pending as u8),
            handler: Mutex::new(handler),
        });

        let mut anchors = self.lock();
        // The counter wraps at `usize::MAX`; zero is the null refcon and live ids stay taken.
        let id = loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u64;
            if id != 0 && !anchors.contains_key(&id) {
                break id;
            }
        };
        anchors.insert(id, anchor);
        drop(anchors);

        tracing::trace!(kind = K::NAME, id, "callback pending");
        PendingRegistration {
            registry: self,
            id: RegistrationId(id),
            armed: true,
        }
    }

    /// Release the anchor of an acknowledged unregistration
    ///
    /// Call after the native unregistering call has returned. Returns `false` if the
    /// id was not registered (already released, or released by `release_all`).
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let anchor = self.lock().remove(&id.0);
        match anchor {
            Some(anchor) => {
                anchor.set_state(CallbackState::Unregistered);
                tracing::trace!(kind = K::NAME, id = id.0, "callback unregistered");
                true
            }
            None => false,
        }
    }

    /// Release every anchor without native acknowledgment
    ///
    /// Only valid when native code is guaranteed not to call these trampolines
    /// again, i.e. during plugin unload.
    pub fn release_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        for anchor in drained.values() {
            anchor.set_state(CallbackState::Unregistered);
        }

        if !drained.is_empty() {
            tracing::debug!(kind = K::NAME, count = drained.len(), "released outstanding callbacks");
        }
        drained.len()
    }

    /// Number of anchors currently held, Pending and Active
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    /// Number of native invocations dropped since startup
    pub fn dropped_invocations(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn state(&self, id: RegistrationId) -> CallbackState {
        self.lock()
            .get(&id.0)
            .map_or(CallbackState::Unregistered, |anchor| anchor.state())
    }

    /// Fail with `InvalidCallbackState` unless `id` is Active
    pub fn ensure_active(&self, id: RegistrationId) -> BindingResult<()> {
        if self.state(id) == CallbackState::Active {
            Ok(())
        } else {
            Err(BindingError::InvalidCallbackState {
                kind: K::NAME,
                id: id.0,
            })
        }
    }

    /// Deliver a native invocation to the handler registered under `refcon`
    ///
    /// Called from trampolines. Returns `neutral` when the invocation is dropped or
    /// the handler panics; never unwinds.
    pub fn dispatch<R>(
        &self,
        refcon: *mut c_void,
        neutral: R,
        invoke: impl FnOnce(&mut K::Handler) -> R,
    ) -> R {
        let Some(id) = RegistrationId::from_refcon(refcon) else {
            self.drop_invocation(0, "null refcon");
            return neutral;
        };

        // The map lock is released before the handler runs so the handler may
        // register or unregister freely.
        let anchor = self.lock().get(&id.0).cloned();
        let Some(anchor) = anchor else {
            self.drop_invocation(id.0, "not registered");
            return neutral;
        };

        if anchor.state() != CallbackState::Active {
            self.drop_invocation(id.0, "not active");
            return neutral;
        }

        let mut handler = match anchor.handler.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.drop_invocation(id.0, "handler already running");
                return neutral;
            }
        };

        absorb_panic(K::NAME, neutral, || invoke(&mut **handler))
    }

    fn drop_invocation(&self, id: u64, reason: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        let error = BindingError::InvalidCallbackState { kind: K::NAME, id };
        tracing::debug!(%error, reason, "dropped native invocation");
    }

    fn activate(&self, id: RegistrationId) {
        if let Some(anchor) = self.lock().get(&id.0) {
            anchor.set_state(CallbackState::Active);
            tracing::trace!(kind = K::NAME, id = id.0, "callback active");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<Anchor<K>>>> {
        self.anchors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: CallbackKind> std::fmt::Debug for CallbackRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("kind", &K::NAME)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// A registration whose native registering call has not returned yet
#[must_use = "dropping a pending registration releases its handler"]
pub struct PendingRegistration<K: CallbackKind> {
    registry: &'static CallbackRegistry<K>,
    id: RegistrationId,
    armed: bool,
}

impl<K: CallbackKind> PendingRegistration<K> {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Context pointer for the native registering call
    pub fn refcon(&self) -> *mut c_void {
        self.id.refcon()
    }

    /// Native side accepted the registration
    pub fn activate(mut self) -> RegistrationId {
        self.armed = false;
        self.registry.activate(self.id);
        self.id
    }
}

impl<K: CallbackKind> Drop for PendingRegistration<K> {
    fn drop(&mut self) {
        if self.armed && self.registry.unregister(self.id) {
            tracing::debug!(kind = K::NAME, id = self.id.0, "pending callback rolled back");
        }
    }
}
