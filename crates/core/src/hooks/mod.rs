//! Redirection installer
//!
//! - [`RedirectionPrimitive`] / [`Redirection`]: the boundary to whatever
//!   mechanism diverts a dispatch-table entry
//! - [`SlotPrimitive`]: built-in primitive that swaps the slot pointer
//! - interceptor routines the redirections point at

mod kind;
mod redirect;
pub(crate) mod thunks;
mod vtable;

pub use kind::HookKind;
pub use redirect::{HookError, Redirection, RedirectionPrimitive};
pub use vtable::SlotPrimitive;
