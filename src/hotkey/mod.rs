//! Hotkey module for process-wide key combinations
//!
//! A hotkey is a set of modifiers plus one key. Registration goes through
//! a platform backend; presses and releases arrive on event channels.

mod keys;
mod registration;
mod state;

pub use keys::{parse_combination, Combination, Key, Modifier, ParseError, KEY_MAP};
pub use registration::{Hotkey, HotkeyError};
pub use state::State;
