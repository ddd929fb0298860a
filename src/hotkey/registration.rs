//! Hotkey registration lifecycle
//!
//! A `Hotkey` owns a keydown and a keyup event channel plus, while
//! registered, the backend token for its binding. Registering again
//! rebinds the backend and keeps the channels; unregistering closes the
//! channels and replaces them with fresh ones.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::keys::{parse_combination, Combination, Key, Modifier, ParseError};
use super::state::State;
use crate::backend::{Backend, BackendError, KeyCallbacks};
use crate::channel::{channel_on, EventReceiver, EventSender};

/// Errors from hotkey registration and teardown
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("failed to register hotkey {hotkey}: {source}")]
    RegistrationFailed {
        hotkey: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to unregister hotkey {hotkey}: {source}")]
    UnregistrationFailed {
        hotkey: String,
        #[source]
        source: BackendError,
    },

    #[error("hotkey {hotkey} is not registered")]
    NotRegistered { hotkey: String },

    #[error("invalid hotkey combination: {0}")]
    InvalidCombination(#[from] ParseError),
}

/// Producer and consumer ends of both event channels
struct Channels {
    keydown_tx: EventSender,
    keydown_rx: EventReceiver,
    keyup_tx: EventSender,
    keyup_rx: EventReceiver,
}

impl Channels {
    fn new(runtime: &Handle) -> Self {
        let (keydown_tx, keydown_rx) = channel_on(runtime);
        let (keyup_tx, keyup_rx) = channel_on(runtime);
        Self {
            keydown_tx,
            keydown_rx,
            keyup_tx,
            keyup_rx,
        }
    }

    fn callbacks(&self) -> KeyCallbacks {
        KeyCallbacks::new(self.keydown_tx.trigger(), self.keyup_tx.trigger())
    }

    fn close(self) {
        self.keydown_tx.close();
        self.keyup_tx.close();
    }
}

/// A modifier set plus one key, bound process-wide through a backend.
///
/// Channels are allocated at construction, so consumers can start
/// listening before registration succeeds. Creating a hotkey spawns the
/// channel workers and therefore needs a Tokio runtime context; the
/// runtime is remembered, so `register`/`unregister` may later be called
/// from any thread, such as a platform main thread.
///
/// Prefer calling [`unregister`](Self::unregister) explicitly. Dropping a
/// registered hotkey releases its binding as a fallback, logging rather
/// than reporting any failure.
pub struct Hotkey<B: Backend> {
    modifiers: Vec<Modifier>,
    key: Key,
    backend: Arc<B>,
    token: Option<B::Token>,
    runtime: Handle,
    channels: Channels,
}

impl<B: Backend> Hotkey<B> {
    /// Create an unregistered hotkey.
    ///
    /// Modifiers keep the order given here for display. Repeats are
    /// collapsed to their first occurrence, unlike
    /// [`parse`](Self::parse), which rejects them as a likely typo.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime context.
    pub fn new(backend: Arc<B>, modifiers: impl IntoIterator<Item = Modifier>, key: Key) -> Self {
        let mut ordered = Vec::new();
        for modifier in modifiers {
            if !ordered.contains(&modifier) {
                ordered.push(modifier);
            }
        }

        let runtime = Handle::current();
        let channels = Channels::new(&runtime);

        Self {
            modifiers: ordered,
            key,
            backend,
            token: None,
            runtime,
            channels,
        }
    }

    /// Create an unregistered hotkey from a `ctrl+shift+KeyS` style string
    pub fn parse(backend: Arc<B>, combination: &str) -> Result<Self, HotkeyError> {
        let (modifiers, key) = parse_combination(combination)?;
        Ok(Self::new(backend, modifiers, key))
    }

    /// Bind the combination with the backend.
    ///
    /// When already registered, the old binding is released first and a
    /// fresh one obtained; the event channels are kept, so existing
    /// receivers and queued events stay valid. If releasing the old
    /// binding fails the hotkey remains registered on it. If the fresh
    /// registration fails the hotkey ends up unregistered.
    pub fn register(&mut self) -> Result<(), HotkeyError> {
        if let Some(token) = self.token.as_ref() {
            debug!(hotkey = %self, "releasing previous binding before rebinding");
            self.backend
                .unregister(token)
                .map_err(|source| HotkeyError::UnregistrationFailed {
                    hotkey: self.to_string(),
                    source,
                })?;
            self.token = None;
        }

        match self
            .backend
            .register(&self.combination(), self.channels.callbacks())
        {
            Ok(token) => {
                self.token = Some(token);
                info!(hotkey = %self, "hotkey registered");
                Ok(())
            }
            Err(source) => {
                warn!(hotkey = %self, error = %source, "hotkey registration refused");
                Err(HotkeyError::RegistrationFailed {
                    hotkey: self.to_string(),
                    source,
                })
            }
        }
    }

    /// Release the binding and reset the event channels.
    ///
    /// Receivers obtained before this call drain whatever was buffered and
    /// then report closure; fetch new ones with
    /// [`keydown_events`](Self::keydown_events) and
    /// [`keyup_events`](Self::keyup_events).
    pub fn unregister(&mut self) -> Result<(), HotkeyError> {
        let Some(token) = self.token.as_ref() else {
            return Err(HotkeyError::NotRegistered {
                hotkey: self.to_string(),
            });
        };

        self.backend
            .unregister(token)
            .map_err(|source| HotkeyError::UnregistrationFailed {
                hotkey: self.to_string(),
                source,
            })?;
        self.token = None;

        let previous = std::mem::replace(&mut self.channels, Channels::new(&self.runtime));
        previous.close();

        info!(hotkey = %self, "hotkey unregistered");
        Ok(())
    }

    /// Receiver for key-down events on the current channel
    pub fn keydown_events(&self) -> EventReceiver {
        self.channels.keydown_rx.clone()
    }

    /// Receiver for key-up events on the current channel
    pub fn keyup_events(&self) -> EventReceiver {
        self.channels.keyup_rx.clone()
    }

    /// Current registration state
    pub fn state(&self) -> State {
        if self.token.is_some() {
            State::Registered
        } else {
            State::Unregistered
        }
    }

    /// Whether the backend currently holds a binding for this hotkey
    pub fn is_registered(&self) -> bool {
        self.state() == State::Registered
    }

    /// Modifiers in construction order
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// The main key
    pub fn key(&self) -> Key {
        self.key
    }

    /// Order-insignificant identity used by backends for conflict checks
    pub fn combination(&self) -> Combination {
        Combination::new(self.modifiers.iter().copied(), self.key)
    }
}

impl<B: Backend> fmt::Display for Hotkey<B> {
    /// Key first, then modifiers in construction order: `S+Ctrl+Shift`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for modifier in &self.modifiers {
            write!(f, "+{}", modifier)?;
        }
        Ok(())
    }
}

impl<B: Backend> fmt::Debug for Hotkey<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hotkey")
            .field("modifiers", &self.modifiers)
            .field("key", &self.key)
            .field("state", &self.state())
            .field("keydown", &self.channels.keydown_rx)
            .field("keyup", &self.channels.keyup_rx)
            .finish()
    }
}

impl<B: Backend> Drop for Hotkey<B> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            match self.backend.unregister(&token) {
                Ok(()) => debug!(hotkey = %self, "released hotkey binding on drop"),
                Err(e) => warn!(hotkey = %self, error = %e, "failed to release hotkey binding on drop"),
            }
        }
        // Both senders close as `channels` drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::backend::SimulatedBackend;
    use crate::events::Event;

    const WAIT: Duration = Duration::from_secs(2);

    async fn next(rx: &EventReceiver) -> Option<Event> {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
    }

    fn ctrl_shift_s(backend: &Arc<SimulatedBackend>) -> Hotkey<SimulatedBackend> {
        Hotkey::new(Arc::clone(backend), [Modifier::Ctrl, Modifier::Shift], Key::S)
    }

    #[tokio::test]
    async fn test_new_hotkey_is_unregistered() {
        let backend = Arc::new(SimulatedBackend::new());
        let hk = ctrl_shift_s(&backend);

        assert_eq!(hk.state(), State::Unregistered);
        assert!(!hk.is_registered());
        assert_eq!(hk.key(), Key::S);
        assert_eq!(hk.modifiers(), &[Modifier::Ctrl, Modifier::Shift]);
        assert!(hk.keydown_events().same_channel(&hk.keydown_events()));
        assert!(!hk.keydown_events().same_channel(&hk.keyup_events()));
        assert_eq!(backend.register_calls(), 0);
    }

    #[tokio::test]
    async fn test_display_keeps_modifier_order() {
        let backend = Arc::new(SimulatedBackend::new());
        let a = ctrl_shift_s(&backend);
        let b = Hotkey::new(Arc::clone(&backend), [Modifier::Shift, Modifier::Ctrl], Key::S);

        assert_eq!(a.to_string(), "S+Ctrl+Shift");
        assert_eq!(b.to_string(), "S+Shift+Ctrl");
        assert_eq!(a.combination(), b.combination());
    }

    #[tokio::test]
    async fn test_duplicate_modifiers_collapse() {
        let backend = Arc::new(SimulatedBackend::new());
        let hk = Hotkey::new(backend, [Modifier::Alt, Modifier::Alt, Modifier::Cmd], Key::F1);
        assert_eq!(hk.to_string(), "F1+Alt+Cmd");
    }

    #[tokio::test]
    async fn test_press_release_cycle() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        assert_eq!(hk.state(), State::Registered);

        let keydown = hk.keydown_events();
        let keyup = hk.keyup_events();
        let combo = hk.combination();

        assert!(backend.press(&combo));
        assert_eq!(next(&keydown).await, Some(Event));

        assert!(backend.release(&combo));
        assert_eq!(next(&keyup).await, Some(Event));

        hk.unregister().unwrap();
        assert_eq!(backend.register_calls(), 1);
        assert_eq!(backend.unregister_calls(), 1);
        assert_eq!(backend.active_bindings(), 0);
    }

    #[tokio::test]
    async fn test_reregister_keeps_channels_and_events() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();

        let keydown = hk.keydown_events();
        let combo = hk.combination();
        backend.press(&combo);
        backend.press(&combo);

        hk.register().unwrap();
        assert!(hk.is_registered());
        assert_eq!(backend.register_calls(), 2);
        assert_eq!(backend.unregister_calls(), 1);
        assert_eq!(backend.active_bindings(), 1);
        assert!(keydown.same_channel(&hk.keydown_events()));

        // Fired through the new binding
        backend.press(&combo);

        for _ in 0..3 {
            assert_eq!(next(&keydown).await, Some(Event));
        }
        assert!(keydown.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_replaces_channels() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();

        let old_keydown = hk.keydown_events();
        let old_keyup = hk.keyup_events();
        backend.press(&hk.combination());

        hk.unregister().unwrap();
        assert_eq!(hk.state(), State::Unregistered);

        let new_keydown = hk.keydown_events();
        let new_keyup = hk.keyup_events();
        assert!(!new_keydown.same_channel(&old_keydown));
        assert!(!new_keyup.same_channel(&old_keyup));

        // Buffered event first, then closure
        assert_eq!(next(&old_keydown).await, Some(Event));
        assert_eq!(next(&old_keydown).await, None);
        assert_eq!(next(&old_keyup).await, None);

        // New channels stay open and work after registering again
        hk.register().unwrap();
        backend.release(&hk.combination());
        assert_eq!(next(&new_keyup).await, Some(Event));
    }

    #[tokio::test]
    async fn test_unregister_when_not_registered() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        let keydown = hk.keydown_events();

        let err = hk.unregister().unwrap_err();
        assert!(matches!(err, HotkeyError::NotRegistered { .. }));
        assert!(keydown.same_channel(&hk.keydown_events()));
        assert_eq!(backend.unregister_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unregister_from_plain_thread() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        let old_keydown = hk.keydown_events();
        backend.press(&hk.combination());

        // No Tokio context on this thread, like a platform main thread
        let hk = std::thread::spawn(move || {
            hk.unregister().unwrap();
            hk.register().unwrap();
            hk
        })
        .join()
        .unwrap();

        assert_eq!(next(&old_keydown).await, Some(Event));
        assert_eq!(next(&old_keydown).await, None);

        let new_keydown = hk.keydown_events();
        assert!(!new_keydown.same_channel(&old_keydown));
        backend.press(&hk.combination());
        assert_eq!(next(&new_keydown).await, Some(Event));

        // Dropping off-runtime releases the binding too
        std::thread::spawn(move || drop(hk)).join().unwrap();
        assert_eq!(backend.unregister_calls(), 2);
        assert_eq!(backend.active_bindings(), 0);
    }

    #[tokio::test]
    async fn test_second_hotkey_same_combination_fails() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut first = ctrl_shift_s(&backend);
        let mut second = Hotkey::new(Arc::clone(&backend), [Modifier::Shift, Modifier::Ctrl], Key::S);

        first.register().unwrap();
        let err = second.register().unwrap_err();

        assert!(matches!(
            err,
            HotkeyError::RegistrationFailed {
                source: BackendError::AlreadyBound(_),
                ..
            }
        ));
        assert_eq!(second.state(), State::Unregistered);
        assert!(first.is_registered());
    }

    #[tokio::test]
    async fn test_failed_unregister_keeps_registration() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        let keydown = hk.keydown_events();

        backend.fail_next_unregister();
        let err = hk.unregister().unwrap_err();
        assert!(matches!(err, HotkeyError::UnregistrationFailed { .. }));
        assert!(hk.is_registered());
        assert!(keydown.same_channel(&hk.keydown_events()));

        hk.unregister().unwrap();
        assert_eq!(backend.unregister_calls(), 2);
        assert_eq!(backend.active_bindings(), 0);
    }

    #[tokio::test]
    async fn test_reregister_with_failed_release() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();

        backend.fail_next_unregister();
        let err = hk.register().unwrap_err();
        assert!(matches!(err, HotkeyError::UnregistrationFailed { .. }));
        assert!(hk.is_registered());
        assert_eq!(backend.register_calls(), 1);
        assert_eq!(backend.active_bindings(), 1);
    }

    #[tokio::test]
    async fn test_reregister_refused_leaves_unregistered() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        let keydown = hk.keydown_events();

        backend.restrict(hk.combination());
        let err = hk.register().unwrap_err();
        assert!(matches!(
            err,
            HotkeyError::RegistrationFailed {
                source: BackendError::Restricted(_),
                ..
            }
        ));
        assert_eq!(hk.state(), State::Unregistered);
        assert_eq!(backend.active_bindings(), 0);
        assert!(keydown.same_channel(&hk.keydown_events()));
    }

    #[tokio::test]
    async fn test_drop_releases_binding_once() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();

        let keydown = hk.keydown_events();
        let keyup = hk.keyup_events();
        backend.press(&hk.combination());

        drop(hk);
        assert_eq!(backend.unregister_calls(), 1);
        assert_eq!(backend.active_bindings(), 0);

        assert_eq!(next(&keydown).await, Some(Event));
        assert_eq!(next(&keydown).await, None);
        assert_eq!(next(&keyup).await, None);
    }

    #[tokio::test]
    async fn test_drop_after_unregister_is_noop() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        hk.unregister().unwrap();

        let keydown = hk.keydown_events();
        drop(hk);

        assert_eq!(backend.unregister_calls(), 1);
        assert_eq!(next(&keydown).await, None);
    }

    #[tokio::test]
    async fn test_drop_swallows_backend_failure() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut hk = ctrl_shift_s(&backend);
        hk.register().unwrap();
        let keyup = hk.keyup_events();

        backend.fail_next_unregister();
        drop(hk);

        assert_eq!(backend.unregister_calls(), 1);
        assert_eq!(next(&keyup).await, None);
    }

    #[tokio::test]
    async fn test_parse() {
        let backend = Arc::new(SimulatedBackend::new());
        let hk = Hotkey::parse(Arc::clone(&backend), "cmd+alt+KeyF5").unwrap();
        assert_eq!(hk.to_string(), "F5+Cmd+Alt");

        let err = Hotkey::parse(Arc::clone(&backend), "cmd+alt").unwrap_err();
        assert!(matches!(err, HotkeyError::InvalidCombination(ParseError::MissingKey(_))));

        // Strings reject repeats; `new` collapses them
        let err = Hotkey::parse(Arc::clone(&backend), "alt+alt+F1").unwrap_err();
        assert!(matches!(
            err,
            HotkeyError::InvalidCombination(ParseError::DuplicateModifier(Modifier::Alt))
        ));
        let hk = Hotkey::new(backend, [Modifier::Alt, Modifier::Alt], Key::F1);
        assert_eq!(hk.modifiers(), &[Modifier::Alt]);
    }
}
