//! Per-resource "operation in progress" gate.
//!
//! A lock is taken when a save or action is dispatched and released when the
//! returned [`RequestGuard`] is dropped, which happens after the completion of
//! the request whatever its outcome.

use log::debug;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

/// Shared set of resources that have a request outstanding
#[derive(Clone, Debug, Default)]
pub struct RequestLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

/// Releases its resource lock when dropped
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RequestGuard {
    resource: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock of `resource`, or `None` if a request for it is outstanding
    pub fn try_acquire(&self, resource: &str) -> Option<RequestGuard> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        if !held.insert(resource.to_string()) {
            debug!("rejecting dispatch for {resource}: request outstanding");
            return None;
        }

        Some(RequestGuard {
            resource: resource.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_locked(&self, resource: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(resource)
    }
}

impl RequestGuard {
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.resource);
    }
}
