use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Single-slot mailbox: a publish replaces whatever is still unconsumed.
#[derive(Debug)]
pub struct UpdateSlot<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for UpdateSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for UpdateSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UpdateSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Store `value`, returning the older datum it displaced.
    pub fn publish(&self, value: T) -> Option<T> {
        self.lock().replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
