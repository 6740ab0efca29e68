//! In-memory fake Direct3D 9 device
//!
//! A heap-allocated object with a full IDirect3DDevice9Ex dispatch table of
//! `extern "system"` functions that count their calls. Lets the resolver,
//! the redirection primitive and the interceptors run end to end without a
//! GPU or Windows.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicI32, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use d3d9hook_sdk::{
    BeginSceneFn, DeviceMethod, EndSceneFn, IDirect3DDevice9, PresentExFn, PresentFn,
    PresentParameters, Rect, ResetFn, RgnData, WindowHandle, D3DERR_INVALIDCALL,
    D3DERR_NOTAVAILABLE, D3D9_DEVICE_TOTAL_METHOD_COUNT, D3D_OK, HRESULT, HWND,
};

use crate::error::ResolveError;
use crate::factory::{ComRef, DeviceFactory, ScratchDevice};

/// Per-object call counters and scripted results
#[derive(Default)]
struct FakeState {
    releases: AtomicU32,
    coop_queries: AtomicU32,
    begin_scenes: AtomicU32,
    end_scenes: AtomicU32,
    presents: AtomicU32,
    present_exs: AtomicU32,
    resets: AtomicU32,
    present_result: AtomicI32,
    coop_result: AtomicI32,
    reset_result: AtomicI32,
    last_source_rect: AtomicUsize,
    last_dest_rect: AtomicUsize,
    last_flags: AtomicU32,
    last_reset_width: AtomicU32,
}

/// COM-shaped object: dispatch-table pointer first
#[repr(C)]
struct FakeObject {
    vtable: *mut *const (),
    state: FakeState,
}

struct Inner {
    object: NonNull<FakeObject>,
    vtable: NonNull<*const ()>,
}

// SAFETY: all mutable state is atomic; slots are written through the
// redirection primitive, which is what the tests exercise
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Drop for Inner {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(self.object.as_ptr()));
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.vtable.as_ptr(),
                D3D9_DEVICE_TOTAL_METHOD_COUNT,
            )));
        }
    }
}

unsafe fn state<'a>(this: *mut c_void) -> &'a FakeState {
    &(*(this as *const FakeObject)).state
}

unsafe extern "system" fn fake_unused(_this: *mut c_void) -> HRESULT {
    D3DERR_INVALIDCALL
}

unsafe extern "system" fn fake_release(this: *mut c_void) -> u32 {
    state(this).releases.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "system" fn fake_test_cooperative_level(this: *mut IDirect3DDevice9) -> HRESULT {
    let state = state(this.cast());
    state.coop_queries.fetch_add(1, Ordering::SeqCst);
    state.coop_result.load(Ordering::SeqCst)
}

unsafe extern "system" fn fake_begin_scene(this: *mut IDirect3DDevice9) -> HRESULT {
    state(this.cast()).begin_scenes.fetch_add(1, Ordering::SeqCst);
    D3D_OK
}

unsafe extern "system" fn fake_end_scene(this: *mut IDirect3DDevice9) -> HRESULT {
    state(this.cast()).end_scenes.fetch_add(1, Ordering::SeqCst);
    D3D_OK
}

unsafe extern "system" fn fake_present(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    _dest_window_override: HWND,
    _dirty_region: *const RgnData,
) -> HRESULT {
    let state = state(this.cast());
    state.presents.fetch_add(1, Ordering::SeqCst);
    state.last_source_rect.store(source_rect as usize, Ordering::SeqCst);
    state.last_dest_rect.store(dest_rect as usize, Ordering::SeqCst);
    state.present_result.load(Ordering::SeqCst)
}

unsafe extern "system" fn fake_present_ex(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    _dest_window_override: HWND,
    _dirty_region: *const RgnData,
    flags: u32,
) -> HRESULT {
    let state = state(this.cast());
    state.present_exs.fetch_add(1, Ordering::SeqCst);
    state.last_source_rect.store(source_rect as usize, Ordering::SeqCst);
    state.last_dest_rect.store(dest_rect as usize, Ordering::SeqCst);
    state.last_flags.store(flags, Ordering::SeqCst);
    state.present_result.load(Ordering::SeqCst)
}

unsafe extern "system" fn fake_reset(
    this: *mut IDirect3DDevice9,
    presentation_parameters: *mut PresentParameters,
) -> HRESULT {
    let state = state(this.cast());
    state.resets.fetch_add(1, Ordering::SeqCst);
    if let Some(params) = presentation_parameters.as_ref() {
        state
            .last_reset_width
            .store(params.back_buffer_width, Ordering::SeqCst);
    }
    state.reset_result.load(Ordering::SeqCst)
}

fn opt_ptr(rect: Option<&Rect>) -> *const Rect {
    rect.map_or(ptr::null(), |r| r as *const Rect)
}

/// Fake device handle; clones share the same object
#[derive(Clone)]
pub struct FakeDevice(Arc<Inner>);

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevice {
    pub fn new() -> Self {
        let mut slots: Box<[*const ()]> =
            vec![fake_unused as *const (); D3D9_DEVICE_TOTAL_METHOD_COUNT].into_boxed_slice();
        for method in [
            DeviceMethod::Release,
            DeviceMethod::TestCooperativeLevel,
            DeviceMethod::BeginScene,
            DeviceMethod::EndScene,
            DeviceMethod::Present,
            DeviceMethod::PresentEx,
            DeviceMethod::Reset,
        ] {
            slots[method.ordinal()] = Self::implementation(method);
        }

        let vtable = Box::into_raw(slots) as *mut *const ();
        let object = Box::into_raw(Box::new(FakeObject {
            vtable,
            state: FakeState::default(),
        }));

        // SAFETY: both come from Box::into_raw
        unsafe {
            Self(Arc::new(Inner {
                object: NonNull::new_unchecked(object),
                vtable: NonNull::new_unchecked(vtable),
            }))
        }
    }

    fn implementation(method: DeviceMethod) -> *const () {
        match method {
            DeviceMethod::Release => fake_release as *const (),
            DeviceMethod::TestCooperativeLevel => fake_test_cooperative_level as *const (),
            DeviceMethod::BeginScene => fake_begin_scene as *const (),
            DeviceMethod::EndScene => fake_end_scene as *const (),
            DeviceMethod::Present => fake_present as *const (),
            DeviceMethod::PresentEx => fake_present_ex as *const (),
            DeviceMethod::Reset => fake_reset as *const (),
            _ => fake_unused as *const (),
        }
    }

    fn state(&self) -> &FakeState {
        unsafe { &self.0.object.as_ref().state }
    }

    fn slot(&self, method: DeviceMethod) -> *mut *const () {
        unsafe { self.0.vtable.as_ptr().add(method.ordinal()) }
    }

    /// Start of this object's dispatch table
    pub fn vtable_ptr(&self) -> *const *const () {
        self.0.vtable.as_ptr()
    }

    /// Device pointer as the host would pass it
    pub fn device_ptr(&self) -> *mut IDirect3DDevice9 {
        self.0.object.as_ptr().cast()
    }

    /// The function originally installed at `method`
    pub fn original(&self, method: DeviceMethod) -> *const () {
        Self::implementation(method)
    }

    /// The function currently installed at `method`
    pub fn current(&self, method: DeviceMethod) -> *const () {
        unsafe { (*(self.slot(method) as *const AtomicPtr<()>)).load(Ordering::SeqCst) }
    }

    /// Null out a slot to simulate a corrupt dispatch table
    pub fn clear_slot(&self, method: DeviceMethod) {
        unsafe { (*(self.slot(method) as *const AtomicPtr<()>)).store(ptr::null_mut(), Ordering::SeqCst) }
    }

    unsafe fn current_fn<F: Copy>(&self, method: DeviceMethod) -> F {
        let entry = self.current(method);
        std::mem::transmute_copy(&entry)
    }

    /// Call BeginScene through the dispatch table
    pub fn call_begin_scene(&self) -> HRESULT {
        unsafe {
            let f: BeginSceneFn = self.current_fn(DeviceMethod::BeginScene);
            f(self.device_ptr())
        }
    }

    /// Call EndScene through the dispatch table
    pub fn call_end_scene(&self) -> HRESULT {
        unsafe {
            let f: EndSceneFn = self.current_fn(DeviceMethod::EndScene);
            f(self.device_ptr())
        }
    }

    /// Call Present through the dispatch table
    pub fn call_present(&self, source: Option<&Rect>, dest: Option<&Rect>) -> HRESULT {
        unsafe {
            let f: PresentFn = self.current_fn(DeviceMethod::Present);
            f(
                self.device_ptr(),
                opt_ptr(source),
                opt_ptr(dest),
                ptr::null_mut(),
                ptr::null(),
            )
        }
    }

    /// Call PresentEx through the dispatch table
    pub fn call_present_ex(&self, source: Option<&Rect>, dest: Option<&Rect>, flags: u32) -> HRESULT {
        unsafe {
            let f: PresentExFn = self.current_fn(DeviceMethod::PresentEx);
            f(
                self.device_ptr(),
                opt_ptr(source),
                opt_ptr(dest),
                ptr::null_mut(),
                ptr::null(),
                flags,
            )
        }
    }

    /// Call Reset through the dispatch table
    pub fn call_reset(&self, params: &mut PresentParameters) -> HRESULT {
        unsafe {
            let f: ResetFn = self.current_fn(DeviceMethod::Reset);
            f(self.device_ptr(), params)
        }
    }

    pub fn set_present_result(&self, hr: HRESULT) {
        self.state().present_result.store(hr, Ordering::SeqCst);
    }

    pub fn set_cooperative_level(&self, hr: HRESULT) {
        self.state().coop_result.store(hr, Ordering::SeqCst);
    }

    pub fn set_reset_result(&self, hr: HRESULT) {
        self.state().reset_result.store(hr, Ordering::SeqCst);
    }

    pub fn releases(&self) -> u32 {
        self.state().releases.load(Ordering::SeqCst)
    }

    pub fn cooperative_level_queries(&self) -> u32 {
        self.state().coop_queries.load(Ordering::SeqCst)
    }

    pub fn begin_scenes(&self) -> u32 {
        self.state().begin_scenes.load(Ordering::SeqCst)
    }

    pub fn end_scenes(&self) -> u32 {
        self.state().end_scenes.load(Ordering::SeqCst)
    }

    pub fn presents(&self) -> u32 {
        self.state().presents.load(Ordering::SeqCst)
    }

    pub fn present_exs(&self) -> u32 {
        self.state().present_exs.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> u32 {
        self.state().resets.load(Ordering::SeqCst)
    }

    /// Source-rect pointer the last Present/PresentEx original received
    pub fn last_source_rect(&self) -> usize {
        self.state().last_source_rect.load(Ordering::SeqCst)
    }

    /// Dest-rect pointer the last Present/PresentEx original received
    pub fn last_dest_rect(&self) -> usize {
        self.state().last_dest_rect.load(Ordering::SeqCst)
    }

    pub fn last_flags(&self) -> u32 {
        self.state().last_flags.load(Ordering::SeqCst)
    }

    pub fn last_reset_width(&self) -> u32 {
        self.state().last_reset_width.load(Ordering::SeqCst)
    }
}

/// Factory handing out fake devices
///
/// Both interfaces share one object unless a separate extended device is
/// configured.
pub struct FakeFactory {
    device: FakeDevice,
    extended_device: Option<FakeDevice>,
    extended: bool,
    fail_base: bool,
    base_attempts: AtomicU32,
    extended_attempts: AtomicU32,
}

impl FakeFactory {
    pub fn new(device: FakeDevice) -> Self {
        Self {
            device,
            extended_device: None,
            extended: true,
            fail_base: false,
            base_attempts: AtomicU32::new(0),
            extended_attempts: AtomicU32::new(0),
        }
    }

    /// Reject extended device creation
    pub fn without_extended(mut self) -> Self {
        self.extended = false;
        self
    }

    /// Hand out `device`, with its own dispatch table, for the extended
    /// interface
    pub fn with_extended_device(mut self, device: FakeDevice) -> Self {
        self.extended_device = Some(device);
        self
    }

    /// Reject base device creation
    pub fn failing_base(mut self) -> Self {
        self.fail_base = true;
        self
    }

    pub fn base_attempts(&self) -> u32 {
        self.base_attempts.load(Ordering::SeqCst)
    }

    pub fn extended_attempts(&self) -> u32 {
        self.extended_attempts.load(Ordering::SeqCst)
    }

    fn scratch(device: &FakeDevice) -> ScratchDevice {
        // SAFETY: the fake object stays alive as long as the factory holds
        // it; its Release only counts
        let device = unsafe { ComRef::from_raw(NonNull::new_unchecked(device.device_ptr().cast())) };
        ScratchDevice::new(device, None)
    }
}

impl DeviceFactory for FakeFactory {
    fn create_device(&self, _window: WindowHandle) -> Result<ScratchDevice, ResolveError> {
        self.base_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_base {
            return Err(ResolveError::DeviceCreation {
                interface: "IDirect3DDevice9",
                hr: D3DERR_NOTAVAILABLE,
            });
        }
        Ok(Self::scratch(&self.device))
    }

    fn create_device_ex(&self, _window: WindowHandle) -> Result<ScratchDevice, ResolveError> {
        self.extended_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.extended {
            return Err(ResolveError::DeviceCreation {
                interface: "IDirect3DDevice9Ex",
                hr: D3DERR_NOTAVAILABLE,
            });
        }
        Ok(Self::scratch(self.extended_device.as_ref().unwrap_or(&self.device)))
    }
}
