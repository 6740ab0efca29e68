//! d3d9hook Engine - Dispatch-Table Resolution
//!
//! This crate handles:
//! - Creating throwaway Direct3D 9 devices via a [`DeviceFactory`]
//! - Copying their dispatch-table addresses into a [`DispatchTable`]
//! - Probing the optional extended interface (IDirect3DDevice9Ex)
//!
//! # Architecture
//!
//! Resolution runs once per load via [`resolve`]. The scratch devices are
//! released before it returns; only the addresses survive. On Windows the
//! [`Direct3D9Factory`] talks to the system d3d9.dll, elsewhere callers
//! supply their own factory.

pub mod error;
pub mod factory;
pub mod resolver;
pub mod table;

#[cfg(windows)]
pub mod d3d9;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::ResolveError;
pub use factory::{ComRef, DeviceFactory, ScratchDevice};
pub use resolver::resolve;
pub use table::{DispatchEntry, DispatchTable};

#[cfg(windows)]
pub use d3d9::Direct3D9Factory;
