//! Direct3D 9 value types and result codes
//!
//! Layouts mirror d3d9types.h / windef.h. Field names are snake_case but
//! order and widths are fixed by the C headers.

use std::ffi::c_void;

/// COM result code
#[allow(clippy::upper_case_acronyms)]
pub type HRESULT = i32;

/// Raw window handle as passed across the ABI
#[allow(clippy::upper_case_acronyms)]
pub type HWND = *mut c_void;

pub const D3D_OK: HRESULT = 0;
pub const D3DERR_DEVICELOST: HRESULT = 0x8876_0868_u32 as i32;
pub const D3DERR_DEVICENOTRESET: HRESULT = 0x8876_0869_u32 as i32;
pub const D3DERR_INVALIDCALL: HRESULT = 0x8876_086C_u32 as i32;
pub const D3DERR_DRIVERINTERNALERROR: HRESULT = 0x8876_0827_u32 as i32;
pub const D3DERR_NOTAVAILABLE: HRESULT = 0x8876_086A_u32 as i32;

/// True if the result code signals failure
#[inline]
pub const fn failed(hr: HRESULT) -> bool {
    hr < 0
}

/// RECT
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// RGNDATA
/// Only ever handled by address.
#[repr(C)]
pub struct RgnData {
    _opaque: [u8; 0],
}

/// D3DPRESENT_PARAMETERS
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentParameters {
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub back_buffer_format: u32,
    pub back_buffer_count: u32,
    pub multi_sample_type: u32,
    pub multi_sample_quality: u32,
    pub swap_effect: u32,
    pub device_window: HWND,
    pub windowed: i32,
    pub enable_auto_depth_stencil: i32,
    pub auto_depth_stencil_format: u32,
    pub flags: u32,
    pub fullscreen_refresh_rate_hz: u32,
    pub presentation_interval: u32,
}

// SAFETY: `device_window` is a window handle value, never dereferenced
unsafe impl Send for PresentParameters {}
unsafe impl Sync for PresentParameters {}

impl Default for PresentParameters {
    fn default() -> Self {
        Self {
            back_buffer_width: 0,
            back_buffer_height: 0,
            back_buffer_format: 0,
            back_buffer_count: 0,
            multi_sample_type: 0,
            multi_sample_quality: 0,
            swap_effect: 0,
            device_window: std::ptr::null_mut(),
            windowed: 0,
            enable_auto_depth_stencil: 0,
            auto_depth_stencil_format: 0,
            flags: 0,
            fullscreen_refresh_rate_hz: 0,
            presentation_interval: 0,
        }
    }
}

/// D3DDISPLAYMODEEX
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayModeEx {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub format: u32,
    pub scan_line_ordering: u32,
}

/// Window handle that can be stored and moved between threads
///
/// Handles are plain values on Windows; this wrapper never dereferences
/// the pointer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(HWND);

// SAFETY: a window handle is an opaque value owned by the OS
unsafe impl Send for WindowHandle {}
unsafe impl Sync for WindowHandle {}

impl WindowHandle {
    /// The null handle
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub const fn from_raw(hwnd: HWND) -> Self {
        Self(hwnd)
    }

    pub const fn as_raw(self) -> HWND {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for WindowHandle {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert!(failed(D3DERR_DEVICELOST));
        assert!(failed(D3DERR_INVALIDCALL));
        assert!(!failed(D3D_OK));
        assert_eq!(D3DERR_DEVICELOST as u32, 0x8876_0868);
    }

    #[test]
    fn test_present_parameters_layout() {
        let ptr = std::mem::size_of::<HWND>();
        // 7 DWORDs, padded HWND, 6 DWORDs
        let expected = if ptr == 8 { 7 * 4 + 4 + 8 + 6 * 4 } else { 7 * 4 + 4 + 6 * 4 };
        assert_eq!(std::mem::size_of::<PresentParameters>(), expected);
    }

    #[test]
    fn test_rect_dimensions() {
        let rect = Rect {
            left: 10,
            top: 20,
            right: 110,
            bottom: 70,
        };
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
    }

    #[test]
    fn test_window_handle_null() {
        assert!(WindowHandle::null().is_null());
        assert!(WindowHandle::default().is_null());
    }
}
