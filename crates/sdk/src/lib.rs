//! d3d9hook SDK - Direct3D 9 Type Definitions
//!
//! This crate contains the raw Direct3D 9 types needed to resolve and
//! intercept the device dispatch table. It has no dependencies so it can be
//! shared by the resolver, the hook core and the payload.
//!
//! # Modules
//!
//! - [`interfaces`] - Opaque COM interface types and method signatures
//! - [`ordinals`] - Fixed dispatch-table ordinals of the device interfaces
//! - [`types`] - `#[repr(C)]` value types and result codes
//! - [`versions`] - SDK version and device creation constants

pub mod interfaces;
pub mod ordinals;
pub mod types;
pub mod versions;

pub use interfaces::*;
pub use ordinals::{
    DeviceMethod, D3D9EX_DEVICE_METHOD_COUNT, D3D9_DEVICE_METHOD_COUNT,
    D3D9_DEVICE_TOTAL_METHOD_COUNT,
};
pub use types::*;
