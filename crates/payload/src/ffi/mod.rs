//! C ABI over the process-wide hook manager

mod exports;

pub use exports::*;
