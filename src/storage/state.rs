//! Connection state shared by the adapters.
//!
//! Each adapter keeps its live backend handle in a [`ConnectionSlot`]:
//! empty before `connect`, filled until `disconnect`. Operations clone the
//! handle out of the slot so the lock is held only for the lookup.

use crate::{Error, Result};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Holder for an adapter's live connection handle.
pub(crate) struct ConnectionSlot<T> {
    backend: &'static str,
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> ConnectionSlot<T> {
    /// Creates an empty slot.
    pub(crate) const fn new(backend: &'static str) -> Self {
        Self {
            backend,
            inner: RwLock::new(None),
        }
    }

    /// Returns the live handle, or `NotConnected`.
    pub(crate) fn get(&self) -> Result<Arc<T>> {
        self.read().clone().ok_or(Error::NotConnected {
            backend: self.backend,
        })
    }

    /// Stores a handle, returning the one it replaced.
    pub(crate) fn install(&self, handle: T) -> Option<Arc<T>> {
        self.write().replace(Arc::new(handle))
    }

    /// Empties the slot, returning the handle that was live.
    pub(crate) fn take(&self) -> Option<Arc<T>> {
        self.write().take()
    }

    /// Returns true if a handle is installed.
    pub(crate) fn is_set(&self) -> bool {
        self.read().is_some()
    }

    /// Read lock with poison recovery.
    ///
    /// The slot only ever holds a fully built handle, so a panic elsewhere
    /// cannot leave it half-written.
    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<T>>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = self.backend, "connection slot lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<T>>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = self.backend, "connection slot lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_reports_not_connected() {
        let slot: ConnectionSlot<u32> = ConnectionSlot::new("test");
        assert!(!slot.is_set());
        assert!(matches!(
            slot.get(),
            Err(Error::NotConnected { backend: "test" })
        ));
    }

    #[test]
    fn test_install_get_take() {
        let slot = ConnectionSlot::new("test");
        assert!(slot.install(7).is_none());
        assert_eq!(*slot.get().unwrap(), 7);

        let previous = slot.install(8).unwrap();
        assert_eq!(*previous, 7);

        assert_eq!(*slot.take().unwrap(), 8);
        assert!(slot.get().is_err());
    }

    #[test]
    fn test_handle_outlives_take() {
        let slot = ConnectionSlot::new("test");
        slot.install(String::from("db"));
        let handle = slot.get().unwrap();
        slot.take();
        assert_eq!(handle.as_str(), "db");
    }
}
