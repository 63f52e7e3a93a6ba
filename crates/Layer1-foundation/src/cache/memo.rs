//! Single-slot memoization cell
//!
//! The slot is an `Option<T>` behind one mutex: a value is present exactly
//! when the cell has been evaluated, and the whole check-compute-store
//! sequence runs while the lock is held.

use parking_lot::Mutex;
use std::fmt;

/// Compute-once cell that can be reset or have its result transplanted from
/// a sibling cell.
pub struct Memo<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Whether a value is currently stored
    pub fn is_evaluated(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Drop the stored value, if any
    pub fn reset(&self) {
        self.slot.lock().take();
    }
}

impl<T: Clone> Memo<T> {
    /// Return the stored value, computing it with `supplier` first if the
    /// cell is unevaluated.
    pub fn get_or_compute<F>(&self, supplier: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut slot = self.slot.lock();
        slot.get_or_insert_with(supplier).clone()
    }

    /// Fallible variant of [`Memo::get_or_compute`].
    ///
    /// On error nothing is stored, so the next call runs the supplier again.
    pub fn get_or_try_compute<F, E>(&self, supplier: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = supplier()?;
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Clone of the stored value without computing anything
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    /// Copy the value and evaluated state of `other` into this cell
    pub fn transplant_from(&self, other: &Memo<T>) {
        if std::ptr::eq(self, other) {
            return;
        }
        let value = other.slot.lock().clone();
        *self.slot.lock() = value;
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").field("slot", &*self.slot.lock()).finish()
    }
}
