use crate::error::{ExtDataError, Result};
use crate::project_identity;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let user_dirs = UserDirs::new()
        .ok_or_else(|| ExtDataError::PathError("Could not determine user home directory".into()))?;

    let home = user_dirs.home_dir();

    if path_str == "~" {
        return Ok(home.to_path_buf());
    }

    let stripped = path_str
        .strip_prefix("~/")
        .ok_or_else(|| ExtDataError::PathError(format!("Invalid path format: {}", path_str)))?;

    Ok(home.join(stripped))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(
        "com",
        project_identity::STABLE_PROJECT_ID,
        project_identity::CONFIG_DIR_NAME,
    )
    .ok_or_else(|| ExtDataError::PathError("Could not determine project directories".into()))
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Source registry file: explicit path, then `EXTDATA_CONFIG`, then the
/// platform config dir.
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return expand_home(path);
    }
    if let Ok(path) = std::env::var(project_identity::env_key("CONFIG"))
        && !path.trim().is_empty()
    {
        return expand_home(Path::new(path.trim()));
    }
    Ok(config_dir()?.join(project_identity::CONFIG_FILE_BASENAME))
}

/// Cache directory, overridable with `EXTDATA_CACHE_DIR`.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(project_identity::env_key("CACHE_DIR"))
        && !path.trim().is_empty()
    {
        return expand_home(Path::new(path.trim()));
    }
    Ok(project_dirs()?.cache_dir().to_path_buf())
}

pub fn cache_db_file() -> Result<PathBuf> {
    Ok(cache_dir()?.join(project_identity::CACHE_DB_BASENAME))
}

/// State directory holding throttle reservations.
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(project_identity::env_key("STATE_DIR"))
        && !path.trim().is_empty()
    {
        return expand_home(Path::new(path.trim()));
    }
    let dirs = project_dirs()?;
    Ok(dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_local_dir())
        .to_path_buf())
}

pub fn throttle_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(project_identity::THROTTLE_FILE_BASENAME))
}

#[cfg(test)]
mod tests;
