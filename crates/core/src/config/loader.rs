//! Config path resolution
//!
//! The config lives next to the host executable the payload was injected
//! into, unless `D3D9HOOK_CONFIG` points somewhere else.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "D3D9HOOK_CONFIG";

/// Directory holding d3d9hook files for the current host
///
/// Path: `<host exe dir>/d3d9hook/`
pub fn base_dir() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    base_dir_for(&exe)
}

fn base_dir_for(exe: &Path) -> ConfigResult<PathBuf> {
    exe.parent()
        .map(|dir| dir.join("d3d9hook"))
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the config file path.
///
/// Path: `$D3D9HOOK_CONFIG`, else `<host exe dir>/d3d9hook/d3d9hook.toml`
pub fn config_path() -> ConfigResult<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(base_dir()?.join("d3d9hook.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_is_next_to_executable() {
        let exe = PathBuf::from("/games/app/bin/app.exe");
        let base = base_dir_for(&exe).unwrap();

        assert_eq!(base, PathBuf::from("/games/app/bin/d3d9hook"));
    }

    #[test]
    fn test_base_dir_without_parent() {
        assert!(matches!(
            base_dir_for(Path::new("")),
            Err(ConfigError::NoConfigDirectory)
        ));
    }
}
