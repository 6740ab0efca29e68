//! Ordinal-indexed dispatch-table addresses
//!
//! Downstream code only learns "the method at ordinal X lives here and is
//! callable with signature Y". Nothing else about the object layout leaks.

use std::ops::Range;
use std::ptr::NonNull;

use d3d9hook_sdk::{DeviceMethod, D3D9_DEVICE_METHOD_COUNT, D3D9_DEVICE_TOTAL_METHOD_COUNT};

use crate::error::ResolveError;

/// One resolved dispatch-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEntry {
    ordinal: usize,
    slot: NonNull<*const ()>,
    target: NonNull<()>,
}

// SAFETY: entries are addresses inside the d3d9 module image, which stays
// mapped for the life of the process
unsafe impl Send for DispatchEntry {}
unsafe impl Sync for DispatchEntry {}

impl DispatchEntry {
    /// Dispatch-table index this entry was read from
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Address of the method implementation
    pub fn target(&self) -> *const () {
        self.target.as_ptr()
    }

    /// Address of the dispatch-table slot holding `target`
    pub fn slot(&self) -> NonNull<*const ()> {
        self.slot
    }

    /// Start of the dispatch table this entry was read from
    pub fn table(&self) -> *const *const () {
        self.slot.as_ptr().wrapping_sub(self.ordinal)
    }
}

/// Dispatch-table addresses of IDirect3DDevice9 and, when available,
/// the IDirect3DDevice9Ex extension
///
/// An extended device may carry its own dispatch table. Its copies of the
/// base methods are kept as alternates so both tables can be redirected.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: Vec<Option<DispatchEntry>>,
    alternates: Vec<Option<DispatchEntry>>,
    extended: bool,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            entries: vec![None; D3D9_DEVICE_TOTAL_METHOD_COUNT],
            alternates: vec![None; D3D9_DEVICE_METHOD_COUNT],
            extended: false,
        }
    }

    /// Entry for a known device method
    pub fn get(&self, method: DeviceMethod) -> Option<DispatchEntry> {
        self.entry(method.ordinal())
    }

    /// Entry by raw ordinal
    pub fn entry(&self, ordinal: usize) -> Option<DispatchEntry> {
        self.entries.get(ordinal).copied().flatten()
    }

    /// Base-method entry in the extended device's table, when that table
    /// is separate from the base device's
    pub fn alternate(&self, method: DeviceMethod) -> Option<DispatchEntry> {
        self.alternates.get(method.ordinal()).copied().flatten()
    }

    /// True if the extended device could be constructed
    pub fn supports_extended(&self) -> bool {
        self.extended
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store entries read by [`read_entries`]
    pub(crate) fn commit(&mut self, entries: Vec<DispatchEntry>) {
        for entry in entries {
            self.entries[entry.ordinal] = Some(entry);
        }
    }

    /// Store base-method entries read from a separate extended table
    pub(crate) fn commit_alternates(&mut self, entries: Vec<DispatchEntry>) {
        for entry in entries {
            if let Some(slot) = self.alternates.get_mut(entry.ordinal) {
                *slot = Some(entry);
            }
        }
    }

    pub(crate) fn mark_extended(&mut self) {
        self.extended = true;
    }
}

/// Copy a range of dispatch-table entries
///
/// Either every entry in `range` is valid or nothing is returned.
///
/// # Safety
/// `vtable` must point to a dispatch table with at least `range.end` slots.
pub(crate) unsafe fn read_entries(
    vtable: NonNull<*const ()>,
    range: Range<usize>,
) -> Result<Vec<DispatchEntry>, ResolveError> {
    debug_assert!(range.end <= D3D9_DEVICE_TOTAL_METHOD_COUNT);

    let mut entries = Vec::with_capacity(range.len());
    for ordinal in range {
        let slot = vtable.as_ptr().add(ordinal);
        let target = NonNull::new(*slot as *mut ()).ok_or(ResolveError::NullEntry(ordinal))?;
        entries.push(DispatchEntry {
            ordinal,
            slot: NonNull::new_unchecked(slot),
            target,
        });
    }
    Ok(entries)
}
