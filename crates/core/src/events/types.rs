//! Event argument and callback types
//!
//! Subscribers never see caller-owned memory: optional rectangles arrive
//! as value copies and the dirty region only as an opaque address.

use d3d9hook_sdk::versions::{
    D3DPRESENT_DONOTFLIP, D3DPRESENT_DONOTWAIT, D3DPRESENT_FLIPRESTART,
    D3DPRESENT_LINEAR_CONTENT, D3DPRESENT_VIDEO_RESTRICT_TO_MONITOR,
};
use d3d9hook_sdk::{PresentParameters, Rect, RgnData, WindowHandle, HWND};

use crate::device::Device;

bitflags::bitflags! {
    /// D3DPRESENT_* flags passed to PresentEx
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PresentFlags: u32 {
        const DONOTWAIT = D3DPRESENT_DONOTWAIT;
        const LINEAR_CONTENT = D3DPRESENT_LINEAR_CONTENT;
        const DONOTFLIP = D3DPRESENT_DONOTFLIP;
        const FLIPRESTART = D3DPRESENT_FLIPRESTART;
        const VIDEO_RESTRICT_TO_MONITOR = D3DPRESENT_VIDEO_RESTRICT_TO_MONITOR;
    }
}

/// Address of a caller-owned RGNDATA, valid only for the intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHandle(usize);

impl RegionHandle {
    fn from_ptr(ptr: *const RgnData) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr as usize))
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Arguments of an intercepted Present call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentArgs {
    pub source_rect: Option<Rect>,
    pub dest_rect: Option<Rect>,
    pub dest_window: WindowHandle,
    pub dirty_region: Option<RegionHandle>,
}

impl PresentArgs {
    /// Copy the caller's arguments
    ///
    /// # Safety
    /// Each rectangle pointer must be null or valid for reads.
    pub(crate) unsafe fn capture(
        source_rect: *const Rect,
        dest_rect: *const Rect,
        dest_window: HWND,
        dirty_region: *const RgnData,
    ) -> Self {
        Self {
            source_rect: source_rect.as_ref().copied(),
            dest_rect: dest_rect.as_ref().copied(),
            dest_window: WindowHandle::from_raw(dest_window),
            dirty_region: RegionHandle::from_ptr(dirty_region),
        }
    }
}

/// Arguments of an intercepted PresentEx call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentExArgs {
    pub present: PresentArgs,
    pub flags: PresentFlags,
}

impl PresentExArgs {
    /// # Safety
    /// See [`PresentArgs::capture`].
    pub(crate) unsafe fn capture(
        source_rect: *const Rect,
        dest_rect: *const Rect,
        dest_window: HWND,
        dirty_region: *const RgnData,
        flags: u32,
    ) -> Self {
        Self {
            present: PresentArgs::capture(source_rect, dest_rect, dest_window, dirty_region),
            flags: PresentFlags::from_bits_retain(flags),
        }
    }
}

/// BeginScene subscriber (channel reserved, never dispatched)
pub type BeginSceneCallback = dyn Fn(Device) + Send + Sync;

/// EndScene subscriber
pub type EndSceneCallback = dyn Fn(Device) + Send + Sync;

/// Present subscriber
pub type PresentCallback = dyn Fn(Device, &PresentArgs) + Send + Sync;

/// PresentEx subscriber
pub type PresentExCallback = dyn Fn(Device, &PresentExArgs) + Send + Sync;

/// Reset subscriber, called before the device resets
pub type ResetCallback = dyn Fn(Device, &PresentParameters) + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_capture_copies_rects() {
        let source = Rect {
            left: 0,
            top: 0,
            right: 640,
            bottom: 480,
        };

        let args = unsafe { PresentArgs::capture(&source, ptr::null(), ptr::null_mut(), ptr::null()) };

        assert_eq!(args.source_rect, Some(source));
        assert_eq!(args.dest_rect, None);
        assert!(args.dest_window.is_null());
        assert_eq!(args.dirty_region, None);
    }

    #[test]
    fn test_capture_ex_keeps_unknown_flag_bits() {
        let flags = D3DPRESENT_DONOTWAIT | 0x8000_0000;

        let args = unsafe {
            PresentExArgs::capture(ptr::null(), ptr::null(), ptr::null_mut(), ptr::null(), flags)
        };

        assert!(args.flags.contains(PresentFlags::DONOTWAIT));
        assert_eq!(args.flags.bits(), flags);
    }
}
