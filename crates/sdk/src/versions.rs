//! SDK version and device creation constants
//!
//! Values from d3d9.h / d3d9caps.h.

/// D3D_SDK_VERSION passed to Direct3DCreate9 / Direct3DCreate9Ex
pub const D3D_SDK_VERSION: u32 = 32;

/// D3DADAPTER_DEFAULT
pub const D3DADAPTER_DEFAULT: u32 = 0;

/// D3DDEVTYPE_NULLREF
/// A device that renders nothing; enough to materialize a dispatch table.
pub const D3DDEVTYPE_NULLREF: u32 = 4;

/// D3DCREATE_HARDWARE_VERTEXPROCESSING
pub const D3DCREATE_HARDWARE_VERTEXPROCESSING: u32 = 0x40;

/// D3DSWAPEFFECT_DISCARD
pub const D3DSWAPEFFECT_DISCARD: u32 = 1;

/// D3DFMT_UNKNOWN
pub const D3DFMT_UNKNOWN: u32 = 0;

/// D3DPRESENT_DONOTWAIT
pub const D3DPRESENT_DONOTWAIT: u32 = 0x0000_0001;

/// D3DPRESENT_LINEAR_CONTENT
pub const D3DPRESENT_LINEAR_CONTENT: u32 = 0x0000_0002;

/// D3DPRESENT_DONOTFLIP
pub const D3DPRESENT_DONOTFLIP: u32 = 0x0000_0004;

/// D3DPRESENT_FLIPRESTART
pub const D3DPRESENT_FLIPRESTART: u32 = 0x0000_0008;

/// D3DPRESENT_VIDEO_RESTRICT_TO_MONITOR
pub const D3DPRESENT_VIDEO_RESTRICT_TO_MONITOR: u32 = 0x0000_0010;
