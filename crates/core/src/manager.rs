//! Lifecycle controller
//!
//! ```text
//! Unloaded → Loaded(Disabled) ⇄ Loaded(Enabled) → Unloaded
//! ```
//!
//! `load` resolves the dispatch table once and installs one redirection per
//! supported hook kind; `set_enabled` (de)activates the whole set; `unload`
//! disposes it. Subscriptions and the captured device belong to the manager
//! and survive unload/load cycles.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use d3d9hook_engine::{resolve, DeviceFactory, ResolveError};
use d3d9hook_sdk::WindowHandle;

use crate::config::HookConfig;
use crate::device::Device;
use crate::events::EventHub;
use crate::hooks::{thunks, HookError, HookKind, Redirection, RedirectionPrimitive};
use crate::intercept::HookState;

/// Error type for `load`
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Dispatch-table resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Failed to install {kind} hook: {source}")]
    Install {
        kind: HookKind,
        #[source]
        source: HookError,
    },

    #[error("No dispatch-table entry for {0}")]
    MissingEntry(HookKind),

    #[error("Failed to enable hooks after load: {0}")]
    Enable(#[source] HookError),

    #[error("Hooks are already loaded")]
    AlreadyLoaded,

    #[error("Another hook manager is already loaded in this process")]
    AnotherManagerActive,
}

/// Redirections for one hook kind
///
/// The first is in the base device's table; a second exists when the
/// extended device has a separate table.
struct InstalledHook {
    kind: HookKind,
    redirections: Vec<Box<dyn Redirection>>,
}

/// Mutable lifecycle state, guarded by one lock
#[derive(Default)]
struct Lifecycle {
    hooks: Vec<InstalledHook>,
    extended: bool,
    enabled: bool,
}

impl Lifecycle {
    /// Apply `enabled` to every hook
    ///
    /// Every hook is visited even if one fails; the first error is returned.
    fn apply(&mut self, enabled: bool) -> Result<(), HookError> {
        let mut first_error = None;

        for hook in &mut self.hooks {
            for redirection in &mut hook.redirections {
                let result = if enabled {
                    redirection.activate()
                } else {
                    redirection.deactivate()
                };

                if let Err(e) = result {
                    tracing::error!("Failed to toggle {} hook: {}", hook.kind, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.enabled = enabled;
        first_error.map_or(Ok(()), Err)
    }

    /// Dispose every hook and return to the unloaded state
    fn dispose_all(&mut self) {
        for hook in self.hooks.drain(..) {
            for redirection in hook.redirections {
                if let Err(e) = redirection.dispose() {
                    tracing::error!("Failed to remove {} hook: {}", hook.kind, e);
                }
            }
        }
        self.extended = false;
        self.enabled = false;
    }
}

/// Direct3D 9 device hook manager
///
/// # Example
///
/// ```ignore
/// let manager = D3D9HookManager::new(WindowHandle::null());
/// manager.load()?;
/// manager.events().on_end_scene(|device| draw_overlay(device));
/// manager.set_enabled(true)?;
/// let device = manager.wait_for_device_presence();
/// ```
pub struct D3D9HookManager {
    window: WindowHandle,
    factory: Box<dyn DeviceFactory>,
    primitive: Box<dyn RedirectionPrimitive>,
    config: HookConfig,
    state: Arc<HookState>,
    lifecycle: Mutex<Lifecycle>,
}

impl D3D9HookManager {
    /// Manager backed by the system d3d9.dll and dispatch-slot redirection
    #[cfg(windows)]
    pub fn new(window: WindowHandle) -> Self {
        Self::with_backend(
            window,
            d3d9hook_engine::Direct3D9Factory,
            crate::hooks::SlotPrimitive,
        )
    }

    /// Manager with a custom device factory and redirection primitive
    pub fn with_backend<F, P>(window: WindowHandle, factory: F, primitive: P) -> Self
    where
        F: DeviceFactory + 'static,
        P: RedirectionPrimitive + 'static,
    {
        Self {
            window,
            factory: Box::new(factory),
            primitive: Box::new(primitive),
            config: HookConfig::default(),
            state: Arc::new(HookState::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn with_config(mut self, config: HookConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Resolve the dispatch table and install every supported hook
    ///
    /// Hooks start disabled unless `enable_on_load` is set. On error nothing
    /// stays installed.
    #[tracing::instrument(skip_all)]
    pub fn load(&self) -> Result<(), LoadError> {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.hooks.is_empty() {
            return Err(LoadError::AlreadyLoaded);
        }

        if !thunks::claim(&self.state) {
            return Err(LoadError::AnotherManagerActive);
        }

        if let Err(e) = self.install_all(&mut lifecycle) {
            lifecycle.dispose_all();
            thunks::release(&self.state);
            tracing::error!("Load failed: {}", e);
            return Err(e);
        }

        tracing::info!(
            "Loaded {} hooks (extended interface {})",
            lifecycle.hooks.len(),
            if lifecycle.extended { "supported" } else { "unsupported" }
        );

        if self.config.enable_on_load {
            if let Err(e) = lifecycle.apply(true) {
                lifecycle.dispose_all();
                thunks::release(&self.state);
                return Err(LoadError::Enable(e));
            }
            tracing::info!("Hooks enabled");
        }

        Ok(())
    }

    fn install_all(&self, lifecycle: &mut Lifecycle) -> Result<(), LoadError> {
        let table = resolve(
            self.factory.as_ref(),
            self.window,
            self.config.probe_extended_interface,
        )?;

        lifecycle.extended = table.supports_extended();
        lifecycle.enabled = false;

        for kind in HookKind::ALL {
            if kind.requires_extended() && !lifecycle.extended {
                tracing::debug!("Skipping {} hook (extended interface unsupported)", kind);
                continue;
            }

            let entry = table
                .get(kind.method())
                .ok_or(LoadError::MissingEntry(kind))?;
            let entries = std::iter::once(entry).chain(table.alternate(kind.method()));

            let mut hook = InstalledHook {
                kind,
                redirections: Vec::with_capacity(thunks::ROUTES_PER_KIND),
            };
            for (route, entry) in entries.enumerate() {
                // SAFETY: the replacement is the interceptor for this exact method
                let installed = unsafe {
                    self.primitive
                        .install(kind.name(), entry, thunks::replacement_for(kind))
                };
                let redirection = match installed {
                    Ok(redirection) => redirection,
                    Err(source) => {
                        // Pushed so the load error path disposes it
                        lifecycle.hooks.push(hook);
                        return Err(LoadError::Install { kind, source });
                    }
                };

                thunks::publish_original(kind, route, entry.table(), redirection.original());
                hook.redirections.push(redirection);
            }

            if hook.redirections.len() > 1 {
                tracing::debug!("{} redirected in both dispatch tables", kind);
            }
            lifecycle.hooks.push(hook);
        }

        Ok(())
    }

    /// Dispose every hook
    ///
    /// A no-op when not loaded.
    #[tracing::instrument(skip_all)]
    pub fn unload(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.hooks.is_empty() {
            return;
        }

        let count = lifecycle.hooks.len();
        lifecycle.dispose_all();
        thunks::release(&self.state);
        tracing::info!("Unloaded {} hooks", count);
    }

    /// Activate or deactivate the full hook set
    pub fn set_enabled(&self, enabled: bool) -> Result<(), HookError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.hooks.is_empty() {
            return Err(HookError::NotLoaded);
        }

        lifecycle.apply(enabled)?;
        tracing::info!("Hooks {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.lifecycle.lock().enabled
    }

    /// True while the hook set is non-empty
    pub fn loaded(&self) -> bool {
        !self.lifecycle.lock().hooks.is_empty()
    }

    /// Hook kinds in the installed set, in installation order
    pub fn installed_hooks(&self) -> Vec<HookKind> {
        self.lifecycle.lock().hooks.iter().map(|h| h.kind).collect()
    }

    pub fn hook_count(&self) -> usize {
        self.lifecycle.lock().hooks.len()
    }

    /// Whether the last `load` could construct the extended device
    pub fn extended_interface_supported(&self) -> bool {
        self.lifecycle.lock().extended
    }

    /// Subscriber channels
    pub fn events(&self) -> &EventHub {
        &self.state.events
    }

    /// The captured device, if any call has been intercepted
    pub fn device(&self) -> Option<Device> {
        self.state.tracker.device()
    }

    pub fn reset_observed(&self) -> bool {
        self.state.tracker.reset_observed()
    }

    /// Number of intercepted calls of one kind
    pub fn call_count(&self, kind: HookKind) -> u64 {
        self.state.call_count(kind)
    }

    /// Number of intercepted Present and PresentEx calls
    pub fn frame_count(&self) -> u64 {
        self.state.frame_count()
    }

    /// Block until an interceptor has captured the device
    ///
    /// Must not be called from the render thread.
    pub fn wait_for_device_presence(&self) -> Device {
        self.state.tracker.wait_for_presence(self.config.poll_interval())
    }

    /// Like [`wait_for_device_presence`](Self::wait_for_device_presence)
    /// but gives up after `timeout`
    pub fn wait_for_device_presence_timeout(&self, timeout: Duration) -> Option<Device> {
        self.state
            .tracker
            .wait_for_presence_timeout(self.config.poll_interval(), timeout)
    }
}

impl Drop for D3D9HookManager {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::SlotPrimitive;
    use d3d9hook_engine::fake::{FakeDevice, FakeFactory};
    use d3d9hook_sdk::{DeviceMethod, PresentParameters, Rect, D3DERR_DEVICELOST, D3D_OK};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Interceptor routing is process-global
    static SERIAL: Mutex<()> = Mutex::new(());

    fn manager_for(factory: FakeFactory) -> D3D9HookManager {
        D3D9HookManager::with_backend(WindowHandle::null(), factory, SlotPrimitive)
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[test]
    fn test_load_without_extended_installs_four() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()).without_extended());

        manager.load().unwrap();

        assert!(manager.loaded());
        assert!(!manager.enabled());
        assert!(!manager.extended_interface_supported());
        assert_eq!(
            manager.installed_hooks(),
            vec![
                HookKind::BeginScene,
                HookKind::EndScene,
                HookKind::Present,
                HookKind::Reset
            ]
        );
        assert_eq!(fake.current(DeviceMethod::PresentEx), fake.original(DeviceMethod::PresentEx));
    }

    #[test]
    fn test_toggle_cycles_keep_hook_count() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));

        manager.load().unwrap();
        assert_eq!(manager.hook_count(), 5);
        assert!(manager.extended_interface_supported());

        for i in 0..6 {
            let enable = i % 2 == 0;
            manager.set_enabled(enable).unwrap();
            assert_eq!(manager.enabled(), enable);
            assert_eq!(manager.hook_count(), 5);
            let redirected = fake.current(DeviceMethod::Present) != fake.original(DeviceMethod::Present);
            assert_eq!(redirected, enable);
        }

        manager.unload();
        assert_eq!(manager.hook_count(), 0);
        assert!(!manager.loaded());
        assert!(!manager.extended_interface_supported());
    }

    #[test]
    fn test_present_reaches_every_subscriber_once() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        fake.set_present_result(D3DERR_DEVICELOST);
        let manager = manager_for(FakeFactory::new(fake.clone()));
        let (hits, observed) = counter();

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            manager.events().on_present(move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();
        let hr = fake.call_present(None, None);

        assert_eq!(observed.load(Ordering::SeqCst), 3);
        assert_eq!(fake.presents(), 1);
        assert_eq!(hr, D3DERR_DEVICELOST);
        assert_eq!(manager.frame_count(), 1);
        assert_eq!(manager.device().map(Device::as_ptr), Some(fake.device_ptr()));
    }

    #[test]
    fn test_present_ex_forwards_caller_pointers() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let sink = Arc::clone(&seen);
        manager.events().on_present_ex(move |_, args| {
            *sink.lock() = Some(*args);
        });

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();

        let dest = Rect {
            left: 0,
            top: 0,
            right: 800,
            bottom: 600,
        };
        let hr = fake.call_present_ex(None, Some(&dest), 0x2);

        assert_eq!(hr, D3D_OK);
        assert_eq!(fake.present_exs(), 1);
        assert_eq!(fake.last_dest_rect(), &dest as *const Rect as usize);
        assert_eq!(fake.last_flags(), 0x2);

        let args = seen.lock().unwrap();
        assert_eq!(args.present.dest_rect, Some(dest));
        assert_eq!(args.present.source_rect, None);
    }

    #[test]
    fn test_panicking_reset_subscriber_is_contained() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));
        manager.events().on_reset(|_, _| panic!("subscriber failure"));

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();

        let mut params = PresentParameters::default();
        for _ in 0..3 {
            assert_eq!(fake.call_reset(&mut params), D3D_OK);
        }

        assert_eq!(fake.resets(), 3);
        assert!(manager.reset_observed());
        manager.unload();
        assert!(!manager.loaded());
    }

    #[test]
    fn test_disabled_hooks_pass_straight_through() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));
        let (hits, observed) = counter();
        manager.events().on_end_scene(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        manager.load().unwrap();
        fake.call_end_scene();
        manager.set_enabled(true).unwrap();
        fake.call_end_scene();
        manager.set_enabled(false).unwrap();
        fake.call_end_scene();

        assert_eq!(fake.end_scenes(), 3);
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.call_count(HookKind::EndScene), 1);
    }

    #[test]
    fn test_begin_scene_never_captures_device() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();
        fake.call_begin_scene();

        assert_eq!(fake.begin_scenes(), 1);
        assert_eq!(manager.call_count(HookKind::BeginScene), 1);
        assert_eq!(manager.device(), None);
    }

    #[test]
    fn test_set_enabled_requires_load() {
        let _serial = SERIAL.lock();
        let manager = manager_for(FakeFactory::new(FakeDevice::new()));

        assert!(matches!(manager.set_enabled(true), Err(HookError::NotLoaded)));
        assert!(!manager.enabled());
    }

    #[test]
    fn test_unload_without_load_is_noop() {
        let _serial = SERIAL.lock();
        let manager = manager_for(FakeFactory::new(FakeDevice::new()));

        manager.unload();
        manager.unload();

        assert!(!manager.loaded());
    }

    #[test]
    fn test_double_load_is_rejected() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let first = manager_for(FakeFactory::new(fake.clone()));
        let second = manager_for(FakeFactory::new(fake.clone()));

        first.load().unwrap();

        assert!(matches!(first.load(), Err(LoadError::AlreadyLoaded)));
        assert!(matches!(second.load(), Err(LoadError::AnotherManagerActive)));

        first.unload();
        second.load().unwrap();
        assert!(second.loaded());
    }

    #[test]
    fn test_resolution_failure_leaves_nothing_installed() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let failing = manager_for(FakeFactory::new(fake.clone()).failing_base());

        assert!(matches!(failing.load(), Err(LoadError::Resolve(_))));
        assert!(!failing.loaded());

        let manager = manager_for(FakeFactory::new(fake.clone()));
        manager.load().unwrap();
        assert!(manager.loaded());
    }

    #[test]
    fn test_corrupt_table_fails_load() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));
        fake.clear_slot(DeviceMethod::Reset);

        let result = manager.load();

        assert!(matches!(result, Err(LoadError::Resolve(_))));
        assert_eq!(manager.hook_count(), 0);
    }

    #[test]
    fn test_enable_on_load() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let config = HookConfig {
            enable_on_load: true,
            ..Default::default()
        };
        let manager = manager_for(FakeFactory::new(fake.clone())).with_config(config);

        manager.load().unwrap();

        assert!(manager.enabled());
        assert_ne!(fake.current(DeviceMethod::EndScene), fake.original(DeviceMethod::EndScene));
    }

    #[test]
    fn test_unload_restores_every_slot() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();
        manager.unload();

        for kind in HookKind::ALL {
            let method = kind.method();
            assert_eq!(fake.current(method), fake.original(method), "{}", kind);
        }
        assert!(!manager.enabled());
    }

    #[test]
    fn test_subscriptions_survive_reload() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let manager = manager_for(FakeFactory::new(fake.clone()));
        let (hits, observed) = counter();
        manager.events().on_end_scene(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        manager.load().unwrap();
        manager.unload();
        manager.load().unwrap();
        manager.set_enabled(true).unwrap();
        fake.call_end_scene();

        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.events().subscriber_count(HookKind::EndScene), 1);
    }

    #[test]
    fn test_wait_for_device_after_first_frame() {
        let _serial = SERIAL.lock();
        let fake = FakeDevice::new();
        let config = HookConfig {
            poll_interval_ms: 5,
            ..Default::default()
        };
        let manager = manager_for(FakeFactory::new(fake.clone())).with_config(config);

        manager.load().unwrap();
        manager.set_enabled(true).unwrap();
        assert_eq!(manager.wait_for_device_presence_timeout(Duration::from_millis(20)), None);

        fake.call_present(None, None);

        let device = manager.wait_for_device_presence();
        assert_eq!(device.as_ptr(), fake.device_ptr());
    }

    #[test]
    fn test_separate_extended_table_is_redirected() {
        let _serial = SERIAL.lock();
        let base = FakeDevice::new();
        let extended = FakeDevice::new();
        let factory = FakeFactory::new(base.clone()).with_extended_device(extended.clone());
        let manager = manager_for(factory);
        let (hits, observed) = counter();
        manager.events().on_present(move |_, _| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        manager.load().unwrap();
        assert_eq!(manager.hook_count(), 5);
        manager.set_enabled(true).unwrap();

        for method in [
            DeviceMethod::BeginScene,
            DeviceMethod::EndScene,
            DeviceMethod::Present,
            DeviceMethod::Reset,
        ] {
            assert_ne!(extended.current(method), extended.original(method), "{:?}", method);
            assert_ne!(base.current(method), base.original(method), "{:?}", method);
        }

        extended.call_present(None, None);
        extended.call_end_scene();
        base.call_present(None, None);

        assert_eq!(observed.load(Ordering::SeqCst), 2);
        assert_eq!(extended.presents(), 1);
        assert_eq!(extended.end_scenes(), 1);
        assert_eq!(base.presents(), 1);
        assert_eq!(manager.call_count(HookKind::EndScene), 1);
        assert_eq!(manager.device().map(Device::as_ptr), Some(extended.device_ptr()));

        manager.set_enabled(false).unwrap();
        extended.call_present(None, None);
        assert_eq!(observed.load(Ordering::SeqCst), 2);

        manager.unload();
        for kind in HookKind::ALL {
            let method = kind.method();
            assert_eq!(extended.current(method), extended.original(method), "{}", kind);
            assert_eq!(base.current(method), base.original(method), "{}", kind);
        }
    }
}
