//! Registry of foreign context pointers.
//!
//! # Why not keep the raw pointer? (for beginners)
//!
//! Every asynchronous boundary call carries a `void *ctx` that must be
//! handed back to the front-end when the call completes.  If the front-end
//! tears the object behind `ctx` down first, a completion that still holds
//! the raw pointer would call back into freed memory.
//!
//! Completions therefore hold a generational [`Key`] instead.  The pointer
//! itself lives here, and `snReleaseContext(ctx)` removes every entry for it.
//! A completion whose key no longer resolves is dropped.

use std::ffi::c_void;
use std::sync::{Mutex, MutexGuard, PoisonError};

use spacenet_core::{HandleTable, Key};
use tracing::debug;

/// Foreign context pointers stored by address so the table is `Send`.
pub struct ContextRegistry {
    table: Mutex<HandleTable<usize>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HandleTable::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleTable<usize>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, ctx: *mut c_void) -> Key {
        self.lock().insert(ctx as usize)
    }

    /// Looks the context up without consuming it (long-lived subscriptions).
    pub fn get(&self, key: Key) -> Option<*mut c_void> {
        self.lock().get(key).map(|&addr| addr as *mut c_void)
    }

    /// Consumes the entry (one-shot completions).
    pub fn take(&self, key: Key) -> Option<*mut c_void> {
        let ctx = self.lock().remove(key).map(|addr| addr as *mut c_void);
        if ctx.is_none() {
            debug!("context {key} was released; completion dropped");
        }
        ctx
    }

    /// Drops every entry registered for `ctx`.  Returns how many there were.
    pub fn release(&self, ctx: *mut c_void) -> usize {
        let addr = ctx as usize;
        let released = self.lock().retain(|_, &entry| entry != addr).len();
        debug!("released {released} registration(s) of context {addr:#x}");
        released
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(addr: usize) -> *mut c_void {
        addr as *mut c_void
    }

    #[test]
    fn test_take_resolves_once() {
        let registry = ContextRegistry::new();
        let key = registry.register(ptr(0x10));

        assert_eq!(registry.take(key), Some(ptr(0x10)));
        assert_eq!(registry.take(key), None);
    }

    #[test]
    fn test_get_does_not_consume() {
        let registry = ContextRegistry::new();
        let key = registry.register(ptr(0x20));

        assert_eq!(registry.get(key), Some(ptr(0x20)));
        assert_eq!(registry.get(key), Some(ptr(0x20)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_drops_every_registration_of_a_context() {
        // Arrange
        let registry = ContextRegistry::new();
        let a = registry.register(ptr(0x30));
        let b = registry.register(ptr(0x30));
        let other = registry.register(ptr(0x40));

        // Act
        let released = registry.release(ptr(0x30));

        // Assert
        assert_eq!(released, 2);
        assert_eq!(registry.take(a), None);
        assert_eq!(registry.take(b), None);
        assert_eq!(registry.take(other), Some(ptr(0x40)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reused_slot_does_not_resolve_old_key() {
        let registry = ContextRegistry::new();
        let old = registry.register(ptr(0x50));
        registry.release(ptr(0x50));
        let new = registry.register(ptr(0x60));

        assert_eq!(registry.get(old), None);
        assert_eq!(registry.get(new), Some(ptr(0x60)));
    }
}
