//! macOS backend using CGEventTap
//!
//! Each registration gets a dedicated thread with its own CFRunLoop and a
//! listen-only event tap that matches key-down/key-up of one virtual
//! keycode with an exact modifier set.

use std::cell::Cell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use super::{Backend, BackendError, KeyCallbacks};
use crate::hotkey::{Combination, Key, Modifier};

/// Modifier flags that take part in matching
const MODIFIER_MASK: u64 = CGEventFlags::CGEventFlagControl.bits()
    | CGEventFlags::CGEventFlagShift.bits()
    | CGEventFlags::CGEventFlagAlternate.bits()
    | CGEventFlags::CGEventFlagCommand.bits();

/// Registration handle for one event tap thread
pub struct EventTapToken {
    combination: Combination,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Backend that captures hotkeys with a CGEventTap per registration.
///
/// Requires the Accessibility permission; without it tap creation fails
/// and registration reports [`BackendError::Restricted`].
#[derive(Default)]
pub struct EventTapBackend {
    bound: Mutex<HashSet<Combination>>,
}

impl EventTapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn bound(&self) -> MutexGuard<'_, HashSet<Combination>> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Backend for EventTapBackend {
    type Token = EventTapToken;

    fn register(
        &self,
        combination: &Combination,
        callbacks: KeyCallbacks,
    ) -> Result<EventTapToken, BackendError> {
        if !self.bound().insert(combination.clone()) {
            return Err(BackendError::AlreadyBound(combination.to_string()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let keycode = virtual_keycode(combination.key());
        let flags = modifier_flags(combination);

        let spawned = thread::Builder::new()
            .name(format!("hotkey-tap-{}", combination))
            .spawn({
                let running = Arc::clone(&running);
                move || run_event_tap(keycode, flags, callbacks, running, ready_tx)
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.bound().remove(combination);
                return Err(BackendError::Platform(format!("failed to spawn tap thread: {}", e)));
            }
        };

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(BackendError::Platform("tap thread exited".to_string())));

        if let Err(e) = ready {
            self.bound().remove(combination);
            if handle.join().is_err() {
                warn!(%combination, "event tap thread panicked during setup");
            }
            return Err(e);
        }

        info!(%combination, keycode, "event tap registered");
        Ok(EventTapToken {
            combination: combination.clone(),
            running,
            thread: Mutex::new(Some(handle)),
        })
    }

    fn unregister(&self, token: &EventTapToken) -> Result<(), BackendError> {
        token.running.store(false, Ordering::SeqCst);

        let handle = token
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| BackendError::Platform("event tap thread panicked".to_string()))?;
        }

        self.bound().remove(&token.combination);
        info!(combination = %token.combination, "event tap unregistered");
        Ok(())
    }
}

/// Run the CFRunLoop with the event tap until `running` is cleared
fn run_event_tap(
    keycode: u16,
    flags: u64,
    callbacks: KeyCallbacks,
    running: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), BackendError>>,
) {
    // Set on a matching keydown so the keyup is reported even if the
    // modifiers were let go first
    let pressed = Cell::new(false);

    // Runs on the tap thread; must be fast and non-blocking
    let callback = |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
        let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
        if code != keycode {
            return None;
        }

        match event_type {
            CGEventType::KeyDown => {
                let repeat = event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0;
                let active = event.get_flags().bits() & MODIFIER_MASK;
                if !repeat && active == flags {
                    pressed.set(true);
                    if callbacks.on_keydown().is_err() {
                        debug!("keydown channel closed");
                    }
                }
            }
            CGEventType::KeyUp if pressed.get() => {
                pressed.set(false);
                if callbacks.on_keyup().is_err() {
                    debug!("keyup channel closed");
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled by the system");
            }
            _ => {}
        }
        None
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready.send(Err(BackendError::Restricted(
                "failed to create event tap, check Accessibility permissions".to_string(),
            )));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.send(Err(BackendError::Platform(
                "failed to create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    if ready.send(Ok(())).is_err() {
        return;
    }

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
        }
    }

    debug!(keycode, "event tap thread stopped");
}

fn modifier_flags(combination: &Combination) -> u64 {
    combination
        .modifiers()
        .iter()
        .map(|modifier| match modifier {
            Modifier::Ctrl => CGEventFlags::CGEventFlagControl,
            Modifier::Shift => CGEventFlags::CGEventFlagShift,
            Modifier::Alt => CGEventFlags::CGEventFlagAlternate,
            Modifier::Cmd => CGEventFlags::CGEventFlagCommand,
        })
        .fold(0, |acc, flag| acc | flag.bits())
}

/// macOS virtual keycode (kVK_*) for a key
fn virtual_keycode(key: Key) -> u16 {
    match key {
        Key::A => 0x00,
        Key::S => 0x01,
        Key::D => 0x02,
        Key::F => 0x03,
        Key::H => 0x04,
        Key::G => 0x05,
        Key::Z => 0x06,
        Key::X => 0x07,
        Key::C => 0x08,
        Key::V => 0x09,
        Key::B => 0x0B,
        Key::Q => 0x0C,
        Key::W => 0x0D,
        Key::E => 0x0E,
        Key::R => 0x0F,
        Key::Y => 0x10,
        Key::T => 0x11,
        Key::Num1 => 0x12,
        Key::Num2 => 0x13,
        Key::Num3 => 0x14,
        Key::Num4 => 0x15,
        Key::Num6 => 0x16,
        Key::Num5 => 0x17,
        Key::Num9 => 0x19,
        Key::Num7 => 0x1A,
        Key::Num8 => 0x1C,
        Key::Num0 => 0x1D,
        Key::O => 0x1F,
        Key::U => 0x20,
        Key::I => 0x22,
        Key::P => 0x23,
        Key::Return => 0x24,
        Key::L => 0x25,
        Key::J => 0x26,
        Key::K => 0x28,
        Key::N => 0x2D,
        Key::M => 0x2E,
        Key::Tab => 0x30,
        Key::Space => 0x31,
        Key::Delete => 0x33,
        Key::Escape => 0x35,
        Key::F17 => 0x40,
        Key::F18 => 0x4F,
        Key::F19 => 0x50,
        Key::F20 => 0x5A,
        Key::F5 => 0x60,
        Key::F6 => 0x61,
        Key::F7 => 0x62,
        Key::F3 => 0x63,
        Key::F8 => 0x64,
        Key::F9 => 0x65,
        Key::F11 => 0x67,
        Key::F13 => 0x69,
        Key::F16 => 0x6A,
        Key::F14 => 0x6B,
        Key::F10 => 0x6D,
        Key::F12 => 0x6F,
        Key::F15 => 0x71,
        Key::F4 => 0x76,
        Key::F2 => 0x78,
        Key::F1 => 0x7A,
        Key::Left => 0x7B,
        Key::Right => 0x7C,
        Key::Down => 0x7D,
        Key::Up => 0x7E,
    }
}
