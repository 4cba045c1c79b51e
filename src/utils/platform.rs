use crate::error::{ExtDataError, Result};
use std::process::Command;

/// Build a direct program invocation in a platform-aware way.
///
/// Arguments are passed as argv; no shell is involved on any platform.
pub fn build_program_command(program: &str, args: &[String]) -> Result<Command> {
    let resolved = which::which(program).map_err(|e| ExtDataError::SystemCommandFailed {
        command: program.to_string(),
        reason: format!("program not found: {}", e),
    })?;

    let mut cmd = Command::new(resolved);
    cmd.args(args);
    Ok(cmd)
}

#[cfg(test)]
mod tests;
