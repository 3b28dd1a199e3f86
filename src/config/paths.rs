//! Platform directories for global configuration and runtime state.

use crate::error::OrchestratorError;
use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Result<ProjectDirs, OrchestratorError> {
    ProjectDirs::from("", "findoc", "findoc").ok_or_else(|| {
        OrchestratorError::ConfigError(
            "Could not determine platform directories (HOME not set)".to_string(),
        )
    })
}

/// Global configuration file: `<config_dir>/config.toml`.
pub fn global_config_path() -> Result<PathBuf, OrchestratorError> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// State directory used for the default log file.
///
/// Falls back to the data-local directory on platforms without a state dir.
pub fn state_dir() -> Result<PathBuf, OrchestratorError> {
    let dirs = project_dirs()?;
    Ok(dirs
        .state_dir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| dirs.data_local_dir().to_path_buf()))
}
