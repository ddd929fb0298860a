//! Platform registration backends
//!
//! A backend binds a key combination at the OS level and fires the
//! supplied callbacks on press and release. The hotkey lifecycle only
//! talks to backends through the [`Backend`] trait.
//!
//! On macOS registration needs a thread with a running CFRunLoop; the
//! event tap backend spawns one per registration. Other platforms fall
//! back to [`UnsupportedBackend`].

#[cfg(target_os = "macos")]
mod macos;
mod simulated;
mod unsupported;

#[cfg(target_os = "macos")]
pub use macos::{EventTapBackend, EventTapToken};
pub use simulated::{SimulatedBackend, SimulatedToken};
pub use unsupported::UnsupportedBackend;

use crate::channel::{ChannelClosed, EventTrigger};
use crate::events::Event;
use crate::hotkey::Combination;

/// Backend used by the daemon on this platform
#[cfg(target_os = "macos")]
pub type PlatformBackend = EventTapBackend;

/// Backend used by the daemon on this platform
#[cfg(not(target_os = "macos"))]
pub type PlatformBackend = UnsupportedBackend;

/// Errors reported by a registration backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("combination {0} is already bound")]
    AlreadyBound(String),

    #[error("invalid combination: {0}")]
    InvalidCombination(String),

    #[error("registration not permitted: {0}")]
    Restricted(String),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,

    #[error("platform error: {0}")]
    Platform(String),
}

/// Keydown and keyup callbacks handed to a backend at registration
#[derive(Debug, Clone)]
pub struct KeyCallbacks {
    keydown: EventTrigger<Event>,
    keyup: EventTrigger<Event>,
}

impl KeyCallbacks {
    pub fn new(keydown: EventTrigger<Event>, keyup: EventTrigger<Event>) -> Self {
        Self { keydown, keyup }
    }

    /// Signal that the combination was pressed. Never blocks.
    pub fn on_keydown(&self) -> Result<(), ChannelClosed> {
        self.keydown.fire(Event)
    }

    /// Signal that the combination was released. Never blocks.
    pub fn on_keyup(&self) -> Result<(), ChannelClosed> {
        self.keyup.fire(Event)
    }
}

/// Binds combinations at the platform level.
///
/// Callers are responsible for invoking `register`/`unregister` from
/// whatever execution context the platform requires.
pub trait Backend: Send + Sync {
    /// Opaque registration handle, required to release the binding
    type Token: Send;

    /// Bind `combination`, firing `callbacks` on press and release
    fn register(
        &self,
        combination: &Combination,
        callbacks: KeyCallbacks,
    ) -> Result<Self::Token, BackendError>;

    /// Release a binding. On error the token stays valid.
    fn unregister(&self, token: &Self::Token) -> Result<(), BackendError>;
}
