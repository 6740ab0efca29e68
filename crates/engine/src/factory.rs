//! Scratch device creation
//!
//! A [`DeviceFactory`] builds a throwaway device whose only purpose is to
//! expose a live dispatch table. The device is wrapped in a [`ScratchDevice`]
//! which releases every COM reference it holds when dropped.

use std::ffi::c_void;
use std::ptr::NonNull;

use d3d9hook_sdk::{DeviceMethod, ReleaseFn, WindowHandle};

use crate::error::ResolveError;

/// Source of throwaway devices for dispatch-table resolution
pub trait DeviceFactory: Send + Sync {
    /// Create a minimal base device (IDirect3DDevice9)
    ///
    /// Failure here is fatal to resolution.
    fn create_device(&self, window: WindowHandle) -> Result<ScratchDevice, ResolveError>;

    /// Create a minimal extended device (IDirect3DDevice9Ex)
    ///
    /// Failure here only disables extended-interface hooking.
    fn create_device_ex(&self, window: WindowHandle) -> Result<ScratchDevice, ResolveError>;
}

/// Owned COM reference, released on drop
pub struct ComRef(NonNull<c_void>);

impl ComRef {
    /// Take ownership of one reference to a COM object
    ///
    /// # Safety
    /// `ptr` must point to a live COM object and the caller must own the
    /// reference being transferred.
    pub unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Self(ptr)
    }

    /// Raw object pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Dispatch-table pointer (first member of the object)
    pub fn vtable(&self) -> *mut *const () {
        // SAFETY: `from_raw` guarantees a live COM object, whose first field
        // is always the dispatch-table pointer
        unsafe { *(self.0.as_ptr() as *const *mut *const ()) }
    }

    /// Read a method pointer from the dispatch table
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the method at `ordinal`,
    /// and `ordinal` must be within the interface's dispatch table.
    pub unsafe fn method<F: Copy>(&self, ordinal: usize) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const ()>());
        let entry = *self.vtable().add(ordinal);
        std::mem::transmute_copy(&entry)
    }
}

impl Drop for ComRef {
    fn drop(&mut self) {
        unsafe {
            let release: ReleaseFn = self.method(DeviceMethod::Release.ordinal());
            release(self.as_ptr());
        }
    }
}

/// A throwaway device together with the factory object that created it
///
/// Fields drop in declaration order, so the device is released before the
/// factory that owns it.
pub struct ScratchDevice {
    device: ComRef,
    _owner: Option<ComRef>,
}

impl ScratchDevice {
    pub fn new(device: ComRef, owner: Option<ComRef>) -> Self {
        Self {
            device,
            _owner: owner,
        }
    }

    /// Raw device pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.device.as_ptr()
    }

    /// The device's dispatch table
    pub fn dispatch_table(&self) -> Result<NonNull<*const ()>, ResolveError> {
        NonNull::new(self.device.vtable()).ok_or(ResolveError::NullDispatchTable("IDirect3DDevice9"))
    }
}
