//! Device & lifecycle tracking
//!
//! The first device seen by an interceptor is captured once and never
//! replaced. Reset calls flip a sticky flag that callers can inspect.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use d3d9hook_sdk::{DeviceMethod, IDirect3DDevice9, TestCooperativeLevelFn, HRESULT};

/// Reference to the live rendering device
///
/// A plain pointer copy; holding one does not keep the device alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device(NonNull<IDirect3DDevice9>);

// SAFETY: a Device is only an address and can be copied between threads
// freely. This crate dereferences it solely inside an interceptor, on the
// thread the host issued that device call on; subscribers that call into the
// device must follow the host's threading rules themselves
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    /// Wrap a raw device pointer
    ///
    /// # Safety
    /// `ptr` must be null or point to a live object whose first field is an
    /// IDirect3DDevice9 dispatch table.
    pub unsafe fn from_raw(ptr: *mut IDirect3DDevice9) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut IDirect3DDevice9 {
        self.0.as_ptr()
    }

    /// Query the device's cooperative level (diagnostic only)
    ///
    /// Called from interceptors on the host's calling thread.
    pub(crate) fn test_cooperative_level(self) -> HRESULT {
        unsafe {
            let vtable = *(self.0.as_ptr() as *const *const *const ());
            let entry = *vtable.add(DeviceMethod::TestCooperativeLevel.ordinal());
            let f: TestCooperativeLevelFn = std::mem::transmute(entry);
            f(self.0.as_ptr())
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({:p})", self.0.as_ptr())
    }
}

/// Write-once device reference plus the sticky reset flag
#[derive(Debug, Default)]
pub struct DeviceTracker {
    device: OnceLock<Device>,
    reset_observed: AtomicBool,
    mismatch_reported: AtomicBool,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the device an interceptor was called with
    ///
    /// Only the first observation is stored; concurrent first calls settle on
    /// a single winner. Returns the captured device.
    pub fn observe(&self, device: Device) -> Device {
        let captured = *self.device.get_or_init(|| {
            tracing::info!("Captured rendering device {:?}", device);
            device
        });

        if captured != device && !self.mismatch_reported.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Intercepted call on {:?} but {:?} is already captured; keeping the first",
                device,
                captured
            );
        }

        captured
    }

    /// The captured device, if any call has been intercepted yet
    pub fn device(&self) -> Option<Device> {
        self.device.get().copied()
    }

    pub fn mark_reset(&self) {
        self.reset_observed.store(true, Ordering::Release);
    }

    /// True once any Reset has been intercepted
    pub fn reset_observed(&self) -> bool {
        self.reset_observed.load(Ordering::Acquire)
    }

    /// Block until a device has been captured, polling every `interval`
    pub fn wait_for_presence(&self, interval: Duration) -> Device {
        loop {
            if let Some(device) = self.device() {
                return device;
            }
            std::thread::sleep(interval);
        }
    }

    /// Like [`wait_for_presence`](Self::wait_for_presence) but gives up
    /// after `timeout`
    pub fn wait_for_presence_timeout(&self, interval: Duration, timeout: Duration) -> Option<Device> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(device) = self.device() {
                return Some(device);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(interval.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use d3d9hook_engine::fake::FakeDevice;
    use d3d9hook_sdk::D3DERR_DEVICENOTRESET;
    use std::sync::Arc;

    fn device_of(fake: &FakeDevice) -> Device {
        unsafe { Device::from_raw(fake.device_ptr()) }.unwrap()
    }

    #[test]
    fn test_null_device_rejected() {
        assert!(unsafe { Device::from_raw(std::ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_cooperative_level_calls_device() {
        let fake = FakeDevice::new();
        fake.set_cooperative_level(D3DERR_DEVICENOTRESET);

        assert_eq!(device_of(&fake).test_cooperative_level(), D3DERR_DEVICENOTRESET);
        assert_eq!(fake.cooperative_level_queries(), 1);
    }

    #[test]
    fn test_moving_device_across_threads_never_calls_it() {
        let fake = FakeDevice::new();
        let device = device_of(&fake);

        let moved = std::thread::spawn(move || device).join().unwrap();

        assert_eq!(moved, device);
        assert_eq!(fake.cooperative_level_queries(), 0);
    }

    #[test]
    fn test_first_device_wins() {
        let first = FakeDevice::new();
        let second = FakeDevice::new();
        let tracker = DeviceTracker::new();

        assert_eq!(tracker.device(), None);
        assert_eq!(tracker.observe(device_of(&first)), device_of(&first));
        assert_eq!(tracker.observe(device_of(&second)), device_of(&first));
        assert_eq!(tracker.device(), Some(device_of(&first)));
    }

    #[test]
    fn test_concurrent_first_observation_settles_once() {
        let fakes: Vec<FakeDevice> = (0..8).map(|_| FakeDevice::new()).collect();
        let devices: Vec<Device> = fakes.iter().map(device_of).collect();
        let tracker = Arc::new(DeviceTracker::new());

        let handles: Vec<_> = devices
            .iter()
            .map(|&device| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.observe(device))
            })
            .collect();

        let results: Vec<Device> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let captured = tracker.device().unwrap();

        assert!(devices.contains(&captured));
        assert!(results.iter().all(|&d| d == captured));
    }

    #[test]
    fn test_reset_flag_is_sticky() {
        let tracker = DeviceTracker::new();
        assert!(!tracker.reset_observed());

        tracker.mark_reset();
        tracker.mark_reset();

        assert!(tracker.reset_observed());
    }

    #[test]
    fn test_wait_returns_after_observation() {
        let fake = FakeDevice::new();
        let device = device_of(&fake);
        let tracker = Arc::new(DeviceTracker::new());

        let waiter = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || tracker.wait_for_presence(Duration::from_millis(5)))
        };

        std::thread::sleep(Duration::from_millis(20));
        tracker.observe(device);

        assert_eq!(waiter.join().unwrap(), device);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let tracker = DeviceTracker::new();
        let start = Instant::now();

        let result =
            tracker.wait_for_presence_timeout(Duration::from_millis(5), Duration::from_millis(30));

        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
