//! Registration state of a hotkey

/// The two states a hotkey moves between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Not bound at the platform level; channels exist but stay quiet
    #[default]
    Unregistered,
    /// Bound; the backend holds callbacks into the current channels
    Registered,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Unregistered => write!(f, "Unregistered"),
            State::Registered => write!(f, "Registered"),
        }
    }
}
