//! Host environment utility functions

use std::path::PathBuf;

/// Name of the environment variable which points at the root of the software
/// installation (the directory containing `params` and `sessions`).
pub const SW_ROOT_ENV_VAR: &str = "TANKBOT_SW_ROOT";

/// Get the root directory of the software installation.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
