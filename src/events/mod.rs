//! Events module for hotkey notifications
//!
//! Provides the zero-size `Event` marker that travels through event
//! channels, and the structured `Notification` the daemon reports for
//! every delivered event.

use serde::{Deserialize, Serialize};

/// One occurrence of a hotkey press or release.
///
/// Carries no payload: only occurrence and ordering matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Event;

/// Notifications emitted by the daemon as events arrive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The hotkey was registered with the platform backend
    Registered {
        /// Display form of the hotkey, e.g. `S+Ctrl+Shift`
        hotkey: String,
    },

    /// The hotkey combination was pressed
    Keydown {
        hotkey: String,
        /// Number of keydown events seen since registration
        count: u64,
    },

    /// The hotkey combination was released
    Keyup {
        hotkey: String,
        /// Number of keyup events seen since registration
        count: u64,
    },

    /// The hotkey was released back to the platform
    Unregistered { hotkey: String },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::Registered { hotkey } => write!(f, "REGISTERED {}", hotkey),
            Notification::Keydown { hotkey, count } => {
                write!(f, "KEYDOWN {} (#{})", hotkey, count)
            }
            Notification::Keyup { hotkey, count } => write!(f, "KEYUP {} (#{})", hotkey, count),
            Notification::Unregistered { hotkey } => write!(f, "UNREGISTERED {}", hotkey),
        }
    }
}
