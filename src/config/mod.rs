//! Site configuration: scoped source settings loaded from `sources.kdl`.

pub mod kdl;
pub mod legacy;
pub mod presets;
mod registry;
mod settings;

pub use registry::{Registry, RegistryBuilder, Supplemented, WILDCARD};
pub use settings::{Setting, SourceSettings};

use std::fs;
use std::path::Path;

use crate::error::{ExtDataError, Result};
use crate::ui;

/// Load the registry file. A missing file yields an empty registry.
pub fn load_registry(path: &Path) -> Result<Registry> {
    if !path.exists() {
        ui::verbose(&format!("No source registry at {}", path.display()));
        return Ok(Registry::empty());
    }

    let content = fs::read_to_string(path).map_err(|e| ExtDataError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let registry = kdl::parse_registry(&content, Some(&path.display().to_string()))?;
    ui::verbose(&format!(
        "Loaded {} source scope(s) from {}",
        registry.len(),
        path.display()
    ));
    Ok(registry)
}

#[cfg(test)]
mod tests;
