//! hotkey-relay: process-wide hotkeys with non-blocking event delivery
//!
//! Register a set of modifiers plus one key as a global hotkey and get
//! notified on press and release without polling:
//! - Event channels that never block the platform callback producing
//!   into them, and never drop what was sent before closing
//! - A registration lifecycle that rebinds, resets and cleans up the
//!   platform binding without leaking or double-releasing it
//! - Pluggable platform backends (macOS event tap, in-process simulator)
//!
//! ```no_run
//! use std::sync::Arc;
//! use hotkey_relay::backend::PlatformBackend;
//! use hotkey_relay::hotkey::{Hotkey, Key, Modifier};
//!
//! # async fn run() -> Result<(), hotkey_relay::hotkey::HotkeyError> {
//! let backend = Arc::new(PlatformBackend::new());
//! let mut hk = Hotkey::new(backend, [Modifier::Ctrl, Modifier::Shift], Key::S);
//! hk.register()?;
//!
//! let keydown = hk.keydown_events();
//! let keyup = hk.keyup_events();
//! keydown.recv().await;
//! keyup.recv().await;
//!
//! hk.unregister()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod channel;
pub mod config;
pub mod events;
pub mod hotkey;
pub mod lifecycle;

pub use events::Event;
pub use hotkey::{Hotkey, HotkeyError, Key, Modifier};
