//! Call interception & dispatch engine
//!
//! Every interceptor follows the same sequence: copy the arguments,
//! dispatch to the subscriber snapshot, record the device, then call the
//! original with the caller's arguments verbatim and return its result.
//! The per-kind differences are documented on each method.

use std::sync::atomic::{AtomicU64, Ordering};

use d3d9hook_sdk::{
    BeginSceneFn, EndSceneFn, IDirect3DDevice9, PresentExFn, PresentFn, PresentParameters, Rect,
    ResetFn, RgnData, D3DERR_DEVICELOST, HRESULT, HWND,
};

use crate::device::{Device, DeviceTracker};
use crate::events::{EventHub, PresentArgs, PresentExArgs};
use crate::hooks::HookKind;

/// State shared by the interceptors of one manager
pub(crate) struct HookState {
    pub events: EventHub,
    pub tracker: DeviceTracker,
    calls: [AtomicU64; HookKind::COUNT],
}

impl HookState {
    pub fn new() -> Self {
        Self {
            events: EventHub::new(),
            tracker: DeviceTracker::new(),
            calls: Default::default(),
        }
    }

    /// Number of intercepted calls of one kind
    pub fn call_count(&self, kind: HookKind) -> u64 {
        self.calls[kind.index()].load(Ordering::Relaxed)
    }

    /// Number of intercepted Present and PresentEx calls
    pub fn frame_count(&self) -> u64 {
        self.call_count(HookKind::Present) + self.call_count(HookKind::PresentEx)
    }

    fn count(&self, kind: HookKind) {
        self.calls[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// BeginScene: pass-through only
    ///
    /// Nothing is dispatched and the device is not recorded.
    ///
    /// # Safety
    /// Arguments must be the ones the host passed to the redirected method.
    pub unsafe fn begin_scene(&self, this: *mut IDirect3DDevice9, original: BeginSceneFn) -> HRESULT {
        self.count(HookKind::BeginScene);
        original(this)
    }

    /// EndScene: dispatch, then call the original
    ///
    /// # Safety
    /// See [`begin_scene`](Self::begin_scene).
    pub unsafe fn end_scene(&self, this: *mut IDirect3DDevice9, original: EndSceneFn) -> HRESULT {
        self.count(HookKind::EndScene);

        if let Some(device) = Device::from_raw(this) {
            self.events.end_scene.dispatch(|f| f(device));
            self.tracker.observe(device);
        }

        original(this)
    }

    /// Present: dispatch, call the original, then report device loss
    ///
    /// # Safety
    /// See [`begin_scene`](Self::begin_scene).
    pub unsafe fn present(
        &self,
        this: *mut IDirect3DDevice9,
        source_rect: *const Rect,
        dest_rect: *const Rect,
        dest_window_override: HWND,
        dirty_region: *const RgnData,
        original: PresentFn,
    ) -> HRESULT {
        self.count(HookKind::Present);

        let device = Device::from_raw(this);
        if let Some(device) = device {
            let args = PresentArgs::capture(source_rect, dest_rect, dest_window_override, dirty_region);
            self.events.present.dispatch(|f| f(device, &args));
            self.tracker.observe(device);
        }

        let hr = original(this, source_rect, dest_rect, dest_window_override, dirty_region);
        if hr == D3DERR_DEVICELOST {
            report_device_lost(HookKind::Present, device);
        }
        hr
    }

    /// PresentEx: same sequence as Present, with presentation flags
    ///
    /// # Safety
    /// See [`begin_scene`](Self::begin_scene).
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn present_ex(
        &self,
        this: *mut IDirect3DDevice9,
        source_rect: *const Rect,
        dest_rect: *const Rect,
        dest_window_override: HWND,
        dirty_region: *const RgnData,
        flags: u32,
        original: PresentExFn,
    ) -> HRESULT {
        self.count(HookKind::PresentEx);

        let device = Device::from_raw(this);
        if let Some(device) = device {
            let args = PresentExArgs::capture(
                source_rect,
                dest_rect,
                dest_window_override,
                dirty_region,
                flags,
            );
            self.events.present_ex.dispatch(|f| f(device, &args));
            self.tracker.observe(device);
        }

        let hr = original(this, source_rect, dest_rect, dest_window_override, dirty_region, flags);
        if hr == D3DERR_DEVICELOST {
            report_device_lost(HookKind::PresentEx, device);
        }
        hr
    }

    /// Reset: dispatch before the original, flag the reset afterwards
    ///
    /// Subscribers are skipped when the host passes no parameters.
    ///
    /// # Safety
    /// See [`begin_scene`](Self::begin_scene).
    pub unsafe fn reset(
        &self,
        this: *mut IDirect3DDevice9,
        presentation_parameters: *mut PresentParameters,
        original: ResetFn,
    ) -> HRESULT {
        self.count(HookKind::Reset);

        let device = Device::from_raw(this);
        if let Some(device) = device {
            if let Some(params) = presentation_parameters.as_ref().copied() {
                self.events.reset.dispatch(|f| f(device, &params));
            }
            self.tracker.observe(device);
        }

        let hr = original(this, presentation_parameters);
        self.tracker.mark_reset();

        tracing::trace!("Reset returned {:#010x}", hr);
        if let Some(device) = device {
            let level = device.test_cooperative_level();
            tracing::trace!("Cooperative level after reset: {:#010x}", level);
        }

        hr
    }
}

/// Log a lost device and query the device the call came in on
fn report_device_lost(kind: HookKind, device: Option<Device>) {
    tracing::error!("{} reported D3DERR_DEVICELOST", kind);
    if let Some(device) = device {
        let level = device.test_cooperative_level();
        tracing::error!("Cooperative level: {:#010x}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use d3d9hook_engine::fake::FakeDevice;
    use d3d9hook_sdk::{DeviceMethod, D3DERR_DEVICENOTRESET, D3D_OK};
    use std::ptr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    unsafe fn original<F: Copy>(fake: &FakeDevice, method: DeviceMethod) -> F {
        std::mem::transmute_copy(&fake.original(method))
    }

    fn device_of(fake: &FakeDevice) -> Device {
        unsafe { Device::from_raw(fake.device_ptr()) }.unwrap()
    }

    #[test]
    fn test_begin_scene_passes_through() {
        let fake = FakeDevice::new();
        let state = HookState::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        state.events.on_begin_scene(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let hr = unsafe {
            state.begin_scene(fake.device_ptr(), original(&fake, DeviceMethod::BeginScene))
        };

        assert_eq!(hr, D3D_OK);
        assert_eq!(fake.begin_scenes(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(state.tracker.device(), None);
        assert_eq!(state.call_count(HookKind::BeginScene), 1);
    }

    #[test]
    fn test_end_scene_dispatches_before_original() {
        let fake = FakeDevice::new();
        let state = HookState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let probe = fake.clone();
        let log = Arc::clone(&seen);
        state.events.on_end_scene(move |device| {
            log.lock().unwrap().push((device, probe.end_scenes()));
        });

        unsafe { state.end_scene(fake.device_ptr(), original(&fake, DeviceMethod::EndScene)) };

        assert_eq!(*seen.lock().unwrap(), vec![(device_of(&fake), 0)]);
        assert_eq!(fake.end_scenes(), 1);
        assert_eq!(state.tracker.device(), Some(device_of(&fake)));
    }

    #[test]
    fn test_present_copies_rects_and_forwards_pointers() {
        let fake = FakeDevice::new();
        let state = HookState::new();
        let received = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&received);
        state.events.on_present(move |_, args| {
            *sink.lock().unwrap() = Some(*args);
        });

        let source = Rect {
            left: 1,
            top: 2,
            right: 3,
            bottom: 4,
        };
        let hr = unsafe {
            state.present(
                fake.device_ptr(),
                &source,
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                original(&fake, DeviceMethod::Present),
            )
        };

        assert_eq!(hr, D3D_OK);
        let args = received.lock().unwrap().unwrap();
        assert_eq!(args.source_rect, Some(source));
        assert_eq!(args.dest_rect, None);
        assert_eq!(fake.last_source_rect(), &source as *const Rect as usize);
        assert_eq!(fake.last_dest_rect(), 0);
        assert_eq!(state.frame_count(), 1);
    }

    #[test]
    fn test_present_device_lost_queries_cooperative_level() {
        let fake = FakeDevice::new();
        fake.set_present_result(D3DERR_DEVICELOST);
        fake.set_cooperative_level(D3DERR_DEVICENOTRESET);
        let state = HookState::new();

        let hr = unsafe {
            state.present(
                fake.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                original(&fake, DeviceMethod::Present),
            )
        };

        assert_eq!(hr, D3DERR_DEVICELOST);
        assert_eq!(fake.cooperative_level_queries(), 1);
    }

    #[test]
    fn test_present_ex_forwards_flags() {
        let fake = FakeDevice::new();
        let state = HookState::new();
        let flags = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&flags);
        state.events.on_present_ex(move |_, args| {
            *sink.lock().unwrap() = Some(args.flags);
        });

        unsafe {
            state.present_ex(
                fake.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                0x1,
                original(&fake, DeviceMethod::PresentEx),
            )
        };

        assert_eq!(fake.last_flags(), 0x1);
        assert_eq!(fake.present_exs(), 1);
        assert_eq!(*flags.lock().unwrap(), Some(crate::events::PresentFlags::DONOTWAIT));
        assert_eq!(state.frame_count(), 1);
    }

    #[test]
    fn test_reset_with_panicking_subscriber() {
        let fake = FakeDevice::new();
        fake.set_reset_result(D3DERR_DEVICENOTRESET);
        let state = HookState::new();
        state.events.on_reset(|_, _| panic!("release failed"));

        let mut params = PresentParameters {
            back_buffer_width: 1280,
            ..Default::default()
        };
        let hr = unsafe {
            state.reset(fake.device_ptr(), &mut params, original(&fake, DeviceMethod::Reset))
        };

        assert_eq!(hr, D3DERR_DEVICENOTRESET);
        assert_eq!(fake.resets(), 1);
        assert_eq!(fake.last_reset_width(), 1280);
        assert!(state.tracker.reset_observed());
        assert_eq!(fake.cooperative_level_queries(), 1);
    }

    #[test]
    fn test_reset_without_parameters_skips_dispatch() {
        let fake = FakeDevice::new();
        let state = HookState::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        state.events.on_reset(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        unsafe {
            state.reset(fake.device_ptr(), ptr::null_mut(), original(&fake, DeviceMethod::Reset))
        };

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(fake.resets(), 1);
        assert!(state.tracker.reset_observed());
    }

    #[test]
    fn test_device_is_consistent_across_kinds() {
        let first = FakeDevice::new();
        let second = FakeDevice::new();
        let state = HookState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        state.events.on_present(move |device, _| log.lock().unwrap().push(device));
        let log = Arc::clone(&seen);
        state.events.on_present_ex(move |device, _| log.lock().unwrap().push(device));

        unsafe {
            state.end_scene(first.device_ptr(), original(&first, DeviceMethod::EndScene));
            state.present(
                first.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                original(&first, DeviceMethod::Present),
            );
            state.present_ex(
                second.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                0,
                original(&second, DeviceMethod::PresentEx),
            );
            state.end_scene(second.device_ptr(), original(&second, DeviceMethod::EndScene));
            state.reset(second.device_ptr(), ptr::null_mut(), original(&second, DeviceMethod::Reset));
        }

        assert_eq!(state.tracker.device(), Some(device_of(&first)));
        assert_eq!(*seen.lock().unwrap(), vec![device_of(&first), device_of(&second)]);
        assert_eq!(second.end_scenes(), 1);
        assert_eq!(second.present_exs(), 1);
    }

    #[test]
    fn test_present_ex_device_lost_queries_cooperative_level() {
        let fake = FakeDevice::new();
        fake.set_present_result(D3DERR_DEVICELOST);
        let state = HookState::new();

        let hr = unsafe {
            state.present_ex(
                fake.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                0,
                original(&fake, DeviceMethod::PresentEx),
            )
        };

        assert_eq!(hr, D3DERR_DEVICELOST);
        assert_eq!(fake.present_exs(), 1);
        assert_eq!(fake.cooperative_level_queries(), 1);
    }

    #[test]
    fn test_device_lost_queries_calling_device() {
        let captured = FakeDevice::new();
        let calling = FakeDevice::new();
        calling.set_present_result(D3DERR_DEVICELOST);
        let state = HookState::new();

        unsafe {
            state.end_scene(captured.device_ptr(), original(&captured, DeviceMethod::EndScene));
            state.present(
                calling.device_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null(),
                original(&calling, DeviceMethod::Present),
            );
            state.reset(calling.device_ptr(), ptr::null_mut(), original(&calling, DeviceMethod::Reset));
        }

        assert_eq!(state.tracker.device(), Some(device_of(&captured)));
        assert_eq!(captured.cooperative_level_queries(), 0);
        assert_eq!(calling.cooperative_level_queries(), 2);
    }
}
