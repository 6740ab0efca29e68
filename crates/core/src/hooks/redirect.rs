//! Redirection primitive boundary
//!
//! The machinery that actually diverts a dispatch-table entry lives behind
//! [`RedirectionPrimitive`]. The lifecycle controller only ever installs,
//! activates, deactivates and disposes, and asks for the original entry point.

use d3d9hook_engine::DispatchEntry;

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to activate redirection: {0}")]
    ActivateFailed(String),

    #[error("Failed to deactivate redirection: {0}")]
    DeactivateFailed(String),

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Hooks are not loaded")]
    NotLoaded,
}

/// Installs redirections on resolved dispatch-table entries
pub trait RedirectionPrimitive: Send + Sync {
    /// Bind `entry` to `replacement`
    ///
    /// The returned redirection starts inactive.
    ///
    /// # Safety
    /// `replacement` must be a function with the same signature and calling
    /// convention as the method at `entry`.
    unsafe fn install(
        &self,
        name: &'static str,
        entry: DispatchEntry,
        replacement: *const (),
    ) -> Result<Box<dyn Redirection>, HookError>;
}

/// One installed redirection
pub trait Redirection: Send + Sync {
    /// Debug name
    fn name(&self) -> &str;

    /// Route calls through the replacement
    fn activate(&mut self) -> Result<(), HookError>;

    /// Route calls straight to the original
    fn deactivate(&mut self) -> Result<(), HookError>;

    fn is_active(&self) -> bool;

    /// Entry point of the pre-redirection implementation
    fn original(&self) -> *const ();

    /// Remove the redirection and release its resources
    fn dispose(self: Box<Self>) -> Result<(), HookError>;
}
