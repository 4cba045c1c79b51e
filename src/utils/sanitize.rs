//! Input sanitization utilities for security
//!
//! Values substituted into program arguments and file paths are checked
//! here before any process is spawned or file opened.

use crate::error::{ExtDataError, Result};
use crate::utils::regex_cache::compile_user_pattern;
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

/// Characters that could be dangerous in shell contexts
static SHELL_DANGEROUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;`|&<>\n\r]|\$\(").expect("Invalid regex pattern"));

static SAFE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w .,@:/+=-]*$").expect("Invalid regex pattern"));

/// Reject values that could chain or redirect commands.
///
/// # Security
/// Values like `x; rm -rf /` or `$(cat /etc/passwd)` are rejected before the
/// command is built, even though arguments are passed without a shell.
pub fn check_shell_safe(param: &str, value: &str) -> Result<()> {
    if value.len() > 4096 {
        return Err(ExtDataError::Validation {
            param: param.to_string(),
            reason: "value too long (max 4096 chars)".to_string(),
        });
    }
    if SHELL_DANGEROUS.is_match(value) {
        return Err(ExtDataError::Validation {
            param: param.to_string(),
            reason: format!("contains unsafe characters: {}", sanitize_for_display(value)),
        });
    }
    Ok(())
}

/// Check `value` against a configured filter: one of the named predicates
/// `numeric`, `alnum`, `safe`, or a regex (bare or `/.../flags`).
pub fn check_param_filter(param: &str, value: &str, filter: &str) -> Result<()> {
    let accepted = match filter.trim().to_lowercase().as_str() {
        "numeric" => !value.is_empty() && value.trim().parse::<f64>().is_ok(),
        "alnum" => !value.is_empty() && value.chars().all(char::is_alphanumeric),
        "safe" => SAFE_VALUE.is_match(value),
        _ => {
            let regex = compile_user_pattern(filter.trim()).map_err(|e| {
                ExtDataError::InvalidRegex(format!("filter for '{}': {}", param, e))
            })?;
            regex.is_match(value)
        }
    };

    if accepted {
        Ok(())
    } else {
        Err(ExtDataError::Validation {
            param: param.to_string(),
            reason: format!(
                "'{}' does not pass filter '{}'",
                sanitize_for_display(value),
                filter
            ),
        })
    }
}

/// A file name relative to a configured directory must stay inside it.
pub fn check_relative_path(name: &str) -> Result<()> {
    let path = Path::new(name);
    if name.is_empty() {
        return Err(ExtDataError::PathError("file name cannot be empty".to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(ExtDataError::PathError(format!(
                    "file name cannot leave its directory: {}",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Sanitize a value for display (log purposes only)
/// This does NOT make a value safe to use
pub fn sanitize_for_display(input: &str) -> String {
    if input.chars().count() > 200 {
        let cut: String = input.chars().take(200).collect();
        format!("{}...", cut)
    } else {
        input.to_string()
    }
}
