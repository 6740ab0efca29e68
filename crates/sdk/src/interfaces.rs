//! Direct3D 9 interface type definitions
//!
//! These are opaque types representing COM interfaces. We never look inside
//! them beyond the first pointer-sized field, which is the dispatch table.

use std::ffi::c_void;

use crate::types::{DisplayModeEx, PresentParameters, Rect, RgnData, HRESULT, HWND};

/// Opaque type for IDirect3D9
/// Factory used to create a base device
#[repr(C)]
pub struct IDirect3D9 {
    _opaque: [u8; 0],
}

/// Opaque type for IDirect3D9Ex
/// Factory used to create an extended device (Vista and later)
#[repr(C)]
pub struct IDirect3D9Ex {
    _opaque: [u8; 0],
}

/// Opaque type for IDirect3DDevice9
/// The rendering device whose calls are intercepted
#[repr(C)]
pub struct IDirect3DDevice9 {
    _opaque: [u8; 0],
}

/// Opaque type for IDirect3DDevice9Ex
/// Shares the base device layout and appends the extended methods
#[repr(C)]
pub struct IDirect3DDevice9Ex {
    _opaque: [u8; 0],
}

/// IUnknown::Release
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

/// IDirect3DDevice9::TestCooperativeLevel
pub type TestCooperativeLevelFn = unsafe extern "system" fn(this: *mut IDirect3DDevice9) -> HRESULT;

/// IDirect3DDevice9::BeginScene
pub type BeginSceneFn = unsafe extern "system" fn(this: *mut IDirect3DDevice9) -> HRESULT;

/// IDirect3DDevice9::EndScene
pub type EndSceneFn = unsafe extern "system" fn(this: *mut IDirect3DDevice9) -> HRESULT;

/// IDirect3DDevice9::Present
pub type PresentFn = unsafe extern "system" fn(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    dest_window_override: HWND,
    dirty_region: *const RgnData,
) -> HRESULT;

/// IDirect3DDevice9Ex::PresentEx
pub type PresentExFn = unsafe extern "system" fn(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    dest_window_override: HWND,
    dirty_region: *const RgnData,
    flags: u32,
) -> HRESULT;

/// IDirect3DDevice9::Reset
pub type ResetFn = unsafe extern "system" fn(
    this: *mut IDirect3DDevice9,
    presentation_parameters: *mut PresentParameters,
) -> HRESULT;

/// IDirect3D9::CreateDevice
pub type CreateDeviceFn = unsafe extern "system" fn(
    this: *mut IDirect3D9,
    adapter: u32,
    device_type: u32,
    focus_window: HWND,
    behavior_flags: u32,
    presentation_parameters: *mut PresentParameters,
    returned_device: *mut *mut IDirect3DDevice9,
) -> HRESULT;

/// IDirect3D9Ex::CreateDeviceEx
pub type CreateDeviceExFn = unsafe extern "system" fn(
    this: *mut IDirect3D9Ex,
    adapter: u32,
    device_type: u32,
    focus_window: HWND,
    behavior_flags: u32,
    presentation_parameters: *mut PresentParameters,
    fullscreen_display_mode: *mut DisplayModeEx,
    returned_device: *mut *mut IDirect3DDevice9Ex,
) -> HRESULT;
