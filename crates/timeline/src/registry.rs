//! Registry of live performance observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::entry::PerformanceEntry;
use crate::observer::PerformanceObserver;

/// Process-wide set of observers interested in new entries.
///
/// The registry never owns an observer. It keeps weak references that are
/// pruned once the owning handle drops the observer.
#[derive(Debug, Default)]
pub struct PerformanceObserverRegistry {
    observers: Mutex<Vec<Weak<PerformanceObserver>>>,
}

impl PerformanceObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn observers(&self) -> MutexGuard<'_, Vec<Weak<PerformanceObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an observer. Registering the same observer twice is a no-op.
    pub fn register_observer(&self, observer: &Arc<PerformanceObserver>) {
        let mut observers = self.observers();
        let target = Arc::as_ptr(observer);
        if observers.iter().any(|w| std::ptr::eq(w.as_ptr(), target)) {
            return;
        }
        observers.retain(|w| w.strong_count() > 0);
        observers.push(Arc::downgrade(observer));
    }

    /// Remove an observer, along with any registrations whose observer is gone.
    pub fn unregister_observer(&self, observer: &PerformanceObserver) {
        let target: *const PerformanceObserver = observer;
        self.observers()
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), target));
    }

    /// Offer `entry` to every registered observer whose filter matches it.
    ///
    /// The registry lock is released before any observer is called, so an
    /// observer may register or unregister from inside its dispatch callback.
    pub fn for_each_observer(&self, entry: &PerformanceEntry) {
        let live: Vec<Arc<PerformanceObserver>> = {
            let mut observers = self.observers();
            observers.retain(|w| w.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in live {
            if observer.matches(entry) {
                observer.push(entry);
            }
        }
    }

    /// Number of registrations, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.observers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers().is_empty()
    }
}
