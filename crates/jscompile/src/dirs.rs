//! Locations of the user and system `jscompile.toml` files.

use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;

const CONFIG_DIR: &str = "jscompile";

/// File name used for system, user and project configuration
pub const CONFIG_FILE: &str = "jscompile.toml";

/// Per-user configuration directory for jscompile.
///
/// `%APPDATA%\jscompile` on Windows, `$XDG_CONFIG_HOME/jscompile` (or
/// `~/.config/jscompile`) elsewhere.
pub fn user_jscompile_config_dir() -> Option<PathBuf> {
    etcetera::choose_base_strategy()
        .ok()
        .map(|dirs| dirs.config_dir().join(CONFIG_DIR))
}

/// First `jscompile/jscompile.toml` found under a colon-separated list of
/// XDG config directories (`/etc/xdg` when the list is unset or empty).
#[cfg(not(windows))]
fn find_in_xdg_config_dirs(dirs: Option<&str>) -> Option<PathBuf> {
    dirs.filter(|value| !value.is_empty())
        .unwrap_or("/etc/xdg")
        .split(':')
        .take_while(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(CONFIG_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

#[cfg(windows)]
fn find_in_program_data(system_drive: &Path) -> Option<PathBuf> {
    let candidate = system_drive
        .join("ProgramData")
        .join(CONFIG_DIR)
        .join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

/// System-wide configuration file, if one exists.
///
/// Unix: `$XDG_CONFIG_DIRS`, then `/etc/jscompile/jscompile.toml`.
/// Windows: `%SYSTEMDRIVE%\ProgramData\jscompile\jscompile.toml`.
pub fn system_config_file() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var_os("SYSTEMDRIVE")
            .and_then(|drive| find_in_program_data(Path::new(&drive)))
    }

    #[cfg(not(windows))]
    {
        let xdg_config_dirs = std::env::var("XDG_CONFIG_DIRS").ok();
        if let Some(path) = find_in_xdg_config_dirs(xdg_config_dirs.as_deref()) {
            return Some(path);
        }

        let fallback = Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE);
        match fallback.try_exists() {
            Ok(true) => Some(fallback),
            Ok(false) => None,
            Err(err) => {
                log::warn!("Failed to query system configuration file: {err}");
                None
            }
        }
    }
}
