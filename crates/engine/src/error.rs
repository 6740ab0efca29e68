//! Error types for dispatch-table resolution

use d3d9hook_sdk::HRESULT;

/// Error type for resolution operations
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The factory entry point could not be obtained
    #[error("Factory unavailable: {0}")]
    FactoryUnavailable(&'static str),

    /// The factory refused to create a scratch device
    #[error("Failed to create {interface}: hr={hr:#010x}")]
    DeviceCreation {
        interface: &'static str,
        hr: HRESULT,
    },

    /// The created object had no dispatch table
    #[error("Null dispatch table on {0}")]
    NullDispatchTable(&'static str),

    /// A dispatch-table slot held a null pointer
    #[error("Null dispatch-table entry at ordinal {0}")]
    NullEntry(usize),
}
