//! Dispatch-slot redirection via pointer replacement
//!
//! Simple and efficient: the slot in the dispatch table is swapped between
//! the replacement and the original function pointer. Every object sharing
//! that table is affected.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

use d3d9hook_engine::DispatchEntry;

use super::redirect::{HookError, Redirection, RedirectionPrimitive};

/// Redirection primitive that rewrites dispatch-table slots
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotPrimitive;

/// Storage for a slot redirection
struct SlotRedirection {
    /// Debug name
    name: &'static str,

    /// Address of the dispatch-table slot
    slot: NonNull<*const ()>,

    /// Pointer the slot held when we installed
    original: *const (),

    /// Our replacement function
    replacement: *const (),

    /// Whether the slot currently holds `replacement`
    active: bool,
}

// SAFETY: the slot lives in the d3d9 module image and is only written with
// a single aligned atomic store
unsafe impl Send for SlotRedirection {}
unsafe impl Sync for SlotRedirection {}

/// Load the pointer currently in `slot`
unsafe fn read_slot(slot: NonNull<*const ()>) -> *const () {
    (*(slot.as_ptr() as *const AtomicPtr<()>)).load(Ordering::SeqCst)
}

/// Store `value` into `slot`, lifting page protection for the write
///
/// The previous protection is restored when the guard drops.
unsafe fn write_slot(slot: NonNull<*const ()>, value: *const ()) -> Result<(), HookError> {
    let _guard = region::protect_with_handle(
        slot.as_ptr() as *const u8,
        std::mem::size_of::<usize>(),
        region::Protection::READ_WRITE,
    )
    .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

    (*(slot.as_ptr() as *const AtomicPtr<()>)).store(value as *mut (), Ordering::SeqCst);
    Ok(())
}

impl RedirectionPrimitive for SlotPrimitive {
    unsafe fn install(
        &self,
        name: &'static str,
        entry: DispatchEntry,
        replacement: *const (),
    ) -> Result<Box<dyn Redirection>, HookError> {
        if replacement.is_null() {
            return Err(HookError::InvalidAddress(0));
        }

        let slot = entry.slot();
        let original = read_slot(slot);
        if original.is_null() {
            return Err(HookError::InvalidAddress(slot.as_ptr() as usize));
        }

        tracing::debug!(
            "Creating slot redirection '{}': slot[{}]={:x}, original={:x}, replacement={:x}",
            name,
            entry.ordinal(),
            slot.as_ptr() as usize,
            original as usize,
            replacement as usize
        );

        if original != entry.target() {
            // Someone redirected the slot after resolution; chain to them
            tracing::debug!(
                "Slot for '{}' changed since resolution ({:x} -> {:x})",
                name,
                entry.target() as usize,
                original as usize
            );
        }

        Ok(Box::new(SlotRedirection {
            name,
            slot,
            original,
            replacement,
            active: false,
        }))
    }
}

impl Redirection for SlotRedirection {
    fn name(&self) -> &str {
        self.name
    }

    fn activate(&mut self) -> Result<(), HookError> {
        if self.active {
            return Ok(());
        }

        let result = unsafe { write_slot(self.slot, self.replacement) };
        result.map_err(|e| HookError::ActivateFailed(format!("{}: {}", self.name, e)))?;

        self.active = true;
        tracing::debug!("Activated slot redirection '{}'", self.name);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), HookError> {
        if !self.active {
            return Ok(());
        }

        let result = unsafe { write_slot(self.slot, self.original) };
        result.map_err(|e| HookError::DeactivateFailed(format!("{}: {}", self.name, e)))?;

        self.active = false;
        tracing::debug!("Deactivated slot redirection '{}'", self.name);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn original(&self) -> *const () {
        self.original
    }

    fn dispose(mut self: Box<Self>) -> Result<(), HookError> {
        self.deactivate()?;
        tracing::debug!("Removed slot redirection '{}'", self.name);
        Ok(())
    }
}

impl Drop for SlotRedirection {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.deactivate() {
                tracing::error!("Failed to restore slot for '{}': {}", self.name, e);
            }
        }
    }
}
