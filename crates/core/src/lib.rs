//! d3d9hook Core - Device Hook Lifecycle and Call Interception
//!
//! This crate contains the hook manager that redirects Direct3D 9 device
//! calls, republishes them as subscribable events and forwards them to the
//! original implementation.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Direct3D 9 types and ordinals
//! - [`engine`] - Dispatch-table resolution

pub use d3d9hook_engine as engine;
pub use d3d9hook_sdk as sdk;

pub mod config;
pub mod device;
pub mod events;
pub mod hooks;
mod intercept;
pub mod manager;

// Re-export commonly used items
pub use config::{ConfigError, ConfigResult, HookConfig};
pub use device::Device;
pub use events::{EventHub, PresentArgs, PresentExArgs, PresentFlags, RegionHandle, Subscription};
pub use hooks::{HookError, HookKind, Redirection, RedirectionPrimitive, SlotPrimitive};
pub use manager::{D3D9HookManager, LoadError};
