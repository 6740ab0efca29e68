//! C-compatible exports called by the injector

use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::instrument;

use d3d9hook_core::D3D9HookManager;

/// Timeout value meaning "wait forever"
pub const D3D9HOOK_WAIT_INFINITE: u32 = u32::MAX;

/// The process-wide manager, present between a successful load and unload
static MANAGER: RwLock<Option<Arc<D3D9HookManager>>> = RwLock::new(None);

fn current() -> Option<Arc<D3D9HookManager>> {
    MANAGER.read().clone()
}

/// Load `manager` and make it the process-wide one
#[cfg_attr(not(windows), allow(dead_code))]
fn install(manager: D3D9HookManager) -> Result<(), String> {
    let mut slot = MANAGER.write();
    if slot.as_ref().is_some_and(|m| m.loaded()) {
        return Err("d3d9hook is already loaded".to_string());
    }

    manager.load().map_err(|e| e.to_string())?;
    *slot = Some(Arc::new(manager));
    Ok(())
}

/// Run `f`, turning a panic into `fallback`
fn guarded<T>(what: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("Panic during {}", what);
            fallback
        }
    }
}

/// Load the hook manager and install its hooks
///
/// `window` may be null. Reads the config file and initializes logging on
/// first call.
///
/// # Safety
/// - `window` must be a valid window handle or null
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[cfg(windows)]
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn d3d9hook_load(window: *mut c_void, error: *mut c_char, maxlen: usize) -> bool {
    let (config, config_error) = crate::load_config();
    crate::init_tracing(&config);
    if let Some(e) = config_error {
        tracing::warn!("Using default config: {}", e);
    }

    tracing::info!("d3d9hook loading...");

    let window = d3d9hook_sdk::WindowHandle::from_raw(window);
    let result = guarded("load", Err("Panic during load".to_string()), || {
        install(D3D9HookManager::new(window).with_config(config))
    });

    match result {
        Ok(()) => {
            tracing::info!("d3d9hook loaded successfully!");
            true
        }
        Err(e) => {
            tracing::error!("Failed to load: {}", e);
            write_error(error, maxlen, &e);
            false
        }
    }
}

/// Remove every hook and drop the manager
///
/// Safe to call when not loaded.
#[no_mangle]
#[instrument(skip_all)]
pub extern "C" fn d3d9hook_unload() {
    tracing::info!("d3d9hook unloading...");

    let manager = MANAGER.write().take();
    if let Some(manager) = manager {
        guarded("unload", (), || manager.unload());
    }
}

/// Activate or deactivate every hook
///
/// Returns `false` if not loaded or if any hook failed to toggle.
#[no_mangle]
pub extern "C" fn d3d9hook_set_enabled(enabled: bool) -> bool {
    let Some(manager) = current() else {
        tracing::warn!("d3d9hook_set_enabled called before load");
        return false;
    };

    guarded("set_enabled", false, || match manager.set_enabled(enabled) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Failed to set enabled={}: {}", enabled, e);
            false
        }
    })
}

#[no_mangle]
pub extern "C" fn d3d9hook_is_loaded() -> bool {
    current().is_some_and(|m| m.loaded())
}

#[no_mangle]
pub extern "C" fn d3d9hook_is_enabled() -> bool {
    current().is_some_and(|m| m.enabled())
}

/// Wait for the first intercepted call and return the device pointer
///
/// Returns null on timeout or when not loaded. Pass
/// [`D3D9HOOK_WAIT_INFINITE`] to block until a device appears. Must not be
/// called from the render thread.
#[no_mangle]
pub extern "C" fn d3d9hook_wait_for_device(timeout_ms: u32) -> *mut c_void {
    let Some(manager) = current() else {
        return std::ptr::null_mut();
    };

    guarded("wait_for_device", std::ptr::null_mut(), || {
        let device = if timeout_ms == D3D9HOOK_WAIT_INFINITE {
            Some(manager.wait_for_device_presence())
        } else {
            manager.wait_for_device_presence_timeout(Duration::from_millis(u64::from(timeout_ms)))
        };
        device.map_or(std::ptr::null_mut(), |d| d.as_ptr().cast())
    })
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// - `error` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
#[cfg_attr(not(windows), allow(dead_code))]
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    if !error.is_null() && maxlen > 0 {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(maxlen - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), error as *mut u8, len);
        *error.add(len) = 0;
    }
}
