//! In-process backend that records calls and fires callbacks on demand
//!
//! Useful for tests and for driving a hotkey without OS-level capture.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{Backend, BackendError, KeyCallbacks};
use crate::hotkey::Combination;

/// Registration handle issued by [`SimulatedBackend`]
#[derive(Debug, PartialEq, Eq)]
pub struct SimulatedToken {
    id: u64,
}

impl SimulatedToken {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct Binding {
    combination: Combination,
    callbacks: KeyCallbacks,
}

#[derive(Default)]
struct Inner {
    next_token: u64,
    bindings: HashMap<u64, Binding>,
    restricted: HashSet<Combination>,
    register_calls: usize,
    unregister_calls: usize,
    fail_next_unregister: bool,
}

/// Backend stub that keeps bindings in memory.
///
/// A combination can be bound only once at a time, matching how platform
/// hotkey APIs refuse a combination another owner already holds.
#[derive(Default)]
pub struct SimulatedBackend {
    inner: Mutex<Inner>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `register` calls, successful or not
    pub fn register_calls(&self) -> usize {
        self.lock().register_calls
    }

    /// Number of `unregister` calls, successful or not
    pub fn unregister_calls(&self) -> usize {
        self.lock().unregister_calls
    }

    /// Number of live bindings
    pub fn active_bindings(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_bound(&self, combination: &Combination) -> bool {
        self.lock()
            .bindings
            .values()
            .any(|b| &b.combination == combination)
    }

    /// Refuse future registrations of `combination`, as a platform does
    /// for reserved system shortcuts
    pub fn restrict(&self, combination: Combination) {
        self.lock().restricted.insert(combination);
    }

    /// Make the next `unregister` call fail
    pub fn fail_next_unregister(&self) {
        self.lock().fail_next_unregister = true;
    }

    /// Simulate the user pressing `combination`. Returns whether a
    /// binding received it.
    pub fn press(&self, combination: &Combination) -> bool {
        self.fire(combination, KeyCallbacks::on_keydown)
    }

    /// Simulate the user releasing `combination`. Returns whether a
    /// binding received it.
    pub fn release(&self, combination: &Combination) -> bool {
        self.fire(combination, KeyCallbacks::on_keyup)
    }

    fn fire<F>(&self, combination: &Combination, callback: F) -> bool
    where
        F: Fn(&KeyCallbacks) -> Result<(), crate::channel::ChannelClosed>,
    {
        let callbacks = self
            .lock()
            .bindings
            .values()
            .find(|b| &b.combination == combination)
            .map(|b| b.callbacks.clone());

        match callbacks {
            Some(callbacks) => {
                if let Err(e) = callback(&callbacks) {
                    debug!(%combination, ?e, "callback target closed");
                }
                true
            }
            None => false,
        }
    }
}

impl Backend for SimulatedBackend {
    type Token = SimulatedToken;

    fn register(
        &self,
        combination: &Combination,
        callbacks: KeyCallbacks,
    ) -> Result<SimulatedToken, BackendError> {
        let mut inner = self.lock();
        inner.register_calls += 1;

        if inner.restricted.contains(combination) {
            return Err(BackendError::Restricted(combination.to_string()));
        }
        if inner
            .bindings
            .values()
            .any(|b| &b.combination == combination)
        {
            return Err(BackendError::AlreadyBound(combination.to_string()));
        }

        inner.next_token += 1;
        let id = inner.next_token;
        inner.bindings.insert(
            id,
            Binding {
                combination: combination.clone(),
                callbacks,
            },
        );

        debug!(%combination, token = id, "simulated binding added");
        Ok(SimulatedToken { id })
    }

    fn unregister(&self, token: &SimulatedToken) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.unregister_calls += 1;

        if std::mem::take(&mut inner.fail_next_unregister) {
            return Err(BackendError::Platform("simulated unregister failure".to_string()));
        }

        match inner.bindings.remove(&token.id) {
            Some(binding) => {
                debug!(combination = %binding.combination, token = token.id, "simulated binding removed");
                Ok(())
            }
            None => Err(BackendError::Platform(format!("unknown token {}", token.id))),
        }
    }
}
