// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;
use std::sync::Mutex;

/// A submission whose completion became observable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionEvent {
    /// Submission id, as returned by `StatusReport::init`.
    pub submission: u32,
    /// Ring slot the submission occupied.
    pub index: u32,
}

/// Receives completion notifications from a `StatusReport`.
///
/// Called once per completed submission, in submission order, without the tracker lock held.
pub trait CompletionObserver: Send + Sync {
    fn on_complete(&self, event: &CompletionEvent);
}

/// Ordered set of observers keyed by identity.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Mutex<Vec<Arc<dyn CompletionObserver>>>,
}

impl ObserverSet {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn CompletionObserver>>> {
        match self.observers.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("observer list is poisoned"),
        }
    }

    /// Adds `observer` unless it is already registered. Returns whether it was added.
    pub fn register(&self, observer: Arc<dyn CompletionObserver>) -> bool {
        let mut observers = self.lock();
        if observers.iter().any(|o| same(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Removes `observer`. Returns whether it was registered.
    pub fn unregister(&self, observer: &Arc<dyn CompletionObserver>) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|o| !same(o, observer));
        observers.len() != before
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `events` to a snapshot of the current observers.
    pub fn notify(&self, events: &[CompletionEvent]) {
        if events.is_empty() {
            return;
        }
        let observers = self.lock().clone();
        for event in events {
            for observer in &observers {
                observer.on_complete(event);
            }
        }
    }
}

fn same(a: &Arc<dyn CompletionObserver>, b: &Arc<dyn CompletionObserver>) -> bool {
    // Vtable pointers are not unique per type, only the data pointer identifies the observer.
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}
