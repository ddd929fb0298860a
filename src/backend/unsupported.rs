//! Fallback backend for platforms without global hotkey support

use tracing::warn;

use super::{Backend, BackendError, KeyCallbacks};
use crate::hotkey::Combination;

/// Backend that refuses every registration
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for UnsupportedBackend {
    type Token = ();

    fn register(&self, combination: &Combination, _callbacks: KeyCallbacks) -> Result<(), BackendError> {
        warn!(%combination, "global hotkeys are not supported on this platform");
        Err(BackendError::Unsupported)
    }

    fn unregister(&self, _token: &()) -> Result<(), BackendError> {
        Err(BackendError::Unsupported)
    }
}
