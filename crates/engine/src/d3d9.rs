//! Scratch devices backed by the system d3d9.dll

use std::ptr::{self, NonNull};

use d3d9hook_sdk::ordinals::{DIRECT3D9EX_CREATE_DEVICE_EX, DIRECT3D9_CREATE_DEVICE};
use d3d9hook_sdk::versions::{
    D3DADAPTER_DEFAULT, D3DCREATE_HARDWARE_VERTEXPROCESSING, D3DDEVTYPE_NULLREF,
    D3DFMT_UNKNOWN, D3DSWAPEFFECT_DISCARD, D3D_SDK_VERSION,
};
use d3d9hook_sdk::{
    failed, CreateDeviceExFn, CreateDeviceFn, IDirect3D9, IDirect3D9Ex, IDirect3DDevice9,
    IDirect3DDevice9Ex, PresentParameters, WindowHandle, HRESULT,
};

use crate::error::ResolveError;
use crate::factory::{ComRef, DeviceFactory, ScratchDevice};

#[link(name = "d3d9")]
extern "system" {
    fn Direct3DCreate9(sdk_version: u32) -> *mut IDirect3D9;
    fn Direct3DCreate9Ex(sdk_version: u32, out: *mut *mut IDirect3D9Ex) -> HRESULT;
}

/// Creates 1x1 null-reference devices through d3d9.dll
#[derive(Debug, Default, Clone, Copy)]
pub struct Direct3D9Factory;

/// Smallest presentation parameters a null-reference device accepts
fn scratch_parameters(window: WindowHandle) -> PresentParameters {
    PresentParameters {
        back_buffer_width: 1,
        back_buffer_height: 1,
        back_buffer_format: D3DFMT_UNKNOWN,
        swap_effect: D3DSWAPEFFECT_DISCARD,
        device_window: window.as_raw(),
        windowed: 1,
        ..PresentParameters::default()
    }
}

impl DeviceFactory for Direct3D9Factory {
    fn create_device(&self, window: WindowHandle) -> Result<ScratchDevice, ResolveError> {
        let d3d = NonNull::new(unsafe { Direct3DCreate9(D3D_SDK_VERSION) })
            .ok_or(ResolveError::FactoryUnavailable("Direct3DCreate9"))?;
        // SAFETY: Direct3DCreate9 hands us one reference
        let d3d = unsafe { ComRef::from_raw(d3d.cast()) };

        let mut params = scratch_parameters(window);
        let mut device: *mut IDirect3DDevice9 = ptr::null_mut();

        let hr = unsafe {
            let create: CreateDeviceFn = d3d.method(DIRECT3D9_CREATE_DEVICE);
            create(
                d3d.as_ptr().cast(),
                D3DADAPTER_DEFAULT,
                D3DDEVTYPE_NULLREF,
                ptr::null_mut(),
                D3DCREATE_HARDWARE_VERTEXPROCESSING,
                &mut params,
                &mut device,
            )
        };

        match NonNull::new(device) {
            Some(device) if !failed(hr) => {
                // SAFETY: CreateDevice succeeded and transferred one reference
                let device = unsafe { ComRef::from_raw(device.cast()) };
                Ok(ScratchDevice::new(device, Some(d3d)))
            }
            _ => Err(ResolveError::DeviceCreation {
                interface: "IDirect3DDevice9",
                hr,
            }),
        }
    }

    fn create_device_ex(&self, window: WindowHandle) -> Result<ScratchDevice, ResolveError> {
        let mut d3d_ex: *mut IDirect3D9Ex = ptr::null_mut();
        let hr = unsafe { Direct3DCreate9Ex(D3D_SDK_VERSION, &mut d3d_ex) };
        let d3d_ex = match NonNull::new(d3d_ex) {
            // SAFETY: Direct3DCreate9Ex succeeded and transferred one reference
            Some(ptr) if !failed(hr) => unsafe { ComRef::from_raw(ptr.cast()) },
            _ => {
                return Err(ResolveError::DeviceCreation {
                    interface: "IDirect3D9Ex",
                    hr,
                })
            }
        };

        let mut params = scratch_parameters(window);
        let mut device: *mut IDirect3DDevice9Ex = ptr::null_mut();

        // Windowed devices must pass a null fullscreen display mode
        let hr = unsafe {
            let create: CreateDeviceExFn = d3d_ex.method(DIRECT3D9EX_CREATE_DEVICE_EX);
            create(
                d3d_ex.as_ptr().cast(),
                D3DADAPTER_DEFAULT,
                D3DDEVTYPE_NULLREF,
                ptr::null_mut(),
                D3DCREATE_HARDWARE_VERTEXPROCESSING,
                &mut params,
                ptr::null_mut(),
                &mut device,
            )
        };

        match NonNull::new(device) {
            Some(device) if !failed(hr) => {
                let device = unsafe { ComRef::from_raw(device.cast()) };
                Ok(ScratchDevice::new(device, Some(d3d_ex)))
            }
            _ => Err(ResolveError::DeviceCreation {
                interface: "IDirect3DDevice9Ex",
                hr,
            }),
        }
    }
}
