//! d3d9hook Payload - FFI Layer
//!
//! This crate provides the C ABI that an injector or bootstrap stub calls
//! after loading the payload into the host process. It owns one
//! process-wide [`D3D9HookManager`](d3d9hook_core::D3D9HookManager) and compiles to a cdylib (.dll).

pub mod ffi;

use d3d9hook_core::{ConfigError, HookConfig};
use tracing_subscriber::EnvFilter;

/// Load the config file, falling back to defaults
///
/// Logging is not up yet when this runs, so the error is handed back to be
/// reported after [`init_tracing`].
pub fn load_config() -> (HookConfig, Option<ConfigError>) {
    match HookConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (HookConfig::default(), Some(e)),
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the config's `debug` flag. Does nothing if a
/// subscriber is already installed.
pub fn init_tracing(config: &HookConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "info,d3d9hook=debug,d3d9hook_core=debug,d3d9hook_engine=debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for debug in [false, true] {
            let directives = default_directives(debug);
            assert!(EnvFilter::try_new(directives).is_ok(), "{}", directives);
        }
    }

    #[test]
    fn test_debug_enables_crate_logging() {
        assert!(default_directives(true).contains("d3d9hook_core=debug"));
        assert!(!default_directives(false).contains("debug"));
    }
}
