//! Dispatch-table ordinals
//!
//! These indices must match the binary layout of the interfaces exactly.
//! Derived from d3d9.h (IDirect3DDevice9 / IDirect3DDevice9Ex).

/// Number of methods on IDirect3DDevice9, IUnknown included
pub const D3D9_DEVICE_METHOD_COUNT: usize = 119;

/// Number of methods IDirect3DDevice9Ex appends to the base interface
pub const D3D9EX_DEVICE_METHOD_COUNT: usize = 15;

/// Full length of the IDirect3DDevice9Ex dispatch table
pub const D3D9_DEVICE_TOTAL_METHOD_COUNT: usize =
    D3D9_DEVICE_METHOD_COUNT + D3D9EX_DEVICE_METHOD_COUNT;

/// IDirect3D9::CreateDevice
pub const DIRECT3D9_CREATE_DEVICE: usize = 16;

/// IDirect3D9Ex::CreateDeviceEx
pub const DIRECT3D9EX_CREATE_DEVICE_EX: usize = 20;

/// Device methods this crate family knows the ordinal of
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMethod {
    QueryInterface = 0,
    AddRef = 1,
    Release = 2,
    TestCooperativeLevel = 3,
    Reset = 16,
    Present = 17,
    BeginScene = 41,
    EndScene = 42,
    PresentEx = 121,
}

impl DeviceMethod {
    /// Dispatch-table index of this method
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// True if the method only exists on IDirect3DDevice9Ex
    pub const fn is_extended(self) -> bool {
        self.ordinal() >= D3D9_DEVICE_METHOD_COUNT
    }

    /// Method name as it appears in d3d9.h
    pub const fn name(self) -> &'static str {
        match self {
            Self::QueryInterface => "QueryInterface",
            Self::AddRef => "AddRef",
            Self::Release => "Release",
            Self::TestCooperativeLevel => "TestCooperativeLevel",
            Self::Reset => "Reset",
            Self::Present => "Present",
            Self::BeginScene => "BeginScene",
            Self::EndScene => "EndScene",
            Self::PresentEx => "PresentEx",
        }
    }
}
