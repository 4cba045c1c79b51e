//! Local program executor.
//!
//! The configured `command` is split into argv with shell quoting rules but
//! run without a shell. Only parameters declared in `params` are
//! substituted into it, and every substituted value must pass the shell
//! danger check and its `param filters` entry first.

use indexmap::IndexMap;
use std::fs;
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{DECODING_OPTIONS, Fetched, encoding, identity, require};
use crate::core::Payload;
use crate::error::{ExtDataError, Result};
use crate::fetch::{FetchPolicy, FetchState};
use crate::params::{RequestParams, substitute};
use crate::ui;
use crate::utils::platform::build_program_command;
use crate::utils::sanitize::{check_param_filter, check_shell_safe};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Template token replaced by a temporary output file path.
const TMP_TOKEN: &str = "tmp";

/// Captured result of one program run.
#[derive(Debug)]
pub struct ProgramOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Declared parameter values, each checked before use.
pub fn checked_values(params: &RequestParams) -> Result<IndexMap<String, String>> {
    let filters = params.table("param filters");
    let mut values = IndexMap::new();

    for name in params.list("params") {
        let value = params.text(&name).unwrap_or_default().to_string();
        check_shell_safe(&name, &value)?;
        let filter = filters.get(&name).or_else(|| {
            filters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                .map(|(_, v)| v)
        });
        if let Some(filter) = filter {
            check_param_filter(&name, &value, filter)?;
        }
        values.insert(name.to_lowercase(), value);
    }
    Ok(values)
}

/// Split `template` into argv and substitute declared values per token.
pub fn build_argv(template: &str, values: &IndexMap<String, String>, tmp: Option<&str>) -> Result<Vec<String>> {
    let tokens = shlex::split(template).ok_or_else(|| ExtDataError::Validation {
        param: "command".to_string(),
        reason: "unbalanced quotes".to_string(),
    })?;
    if tokens.is_empty() {
        return Err(ExtDataError::Validation {
            param: "command".to_string(),
            reason: "empty command".to_string(),
        });
    }

    Ok(tokens
        .iter()
        .map(|token| {
            substitute(token, |name| {
                let name = name.trim().to_lowercase();
                if name == TMP_TOKEN {
                    tmp.map(str::to_string)
                } else {
                    values.get(&name).cloned()
                }
            })
        })
        .collect())
}

/// Run with piped output, killing the child once `timeout` passes.
pub fn run_with_timeout(cmd: &mut Command, input: Option<Vec<u8>>, timeout: Duration) -> Result<ProgramOutput> {
    let cmd_debug = format!("{:?}", cmd);
    let failed = |reason: String| ExtDataError::SystemCommandFailed {
        command: cmd_debug.clone(),
        reason,
    };

    cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| failed(e.to_string()))?;

    let stdin_thread = match (input, child.stdin.take()) {
        (Some(bytes), Some(mut stdin)) => Some(thread::spawn(move || {
            let _ = stdin.write_all(&bytes);
        })),
        _ => None,
    };
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| failed("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| failed("Failed to capture stderr".to_string()))?;

    let stdout_thread = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::BufReader::new(stdout).read_to_end(&mut buf);
        buf
    });
    let stderr_thread = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::BufReader::new(stderr).read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_thread.join();
                    let _ = stderr_thread.join();
                    return Err(failed(format!(
                        "Command timed out after {} seconds",
                        timeout.as_secs()
                    )));
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(failed(e.to_string())),
        }
    };

    if let Some(handle) = stdin_thread {
        let _ = handle.join();
    }
    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(ProgramOutput {
        status,
        stdout,
        stderr,
    })
}

/// Run the configured program for `program=<id>` and return its output
/// as a document. The output may be cached under `cache seconds`.
pub fn fetch(params: &RequestParams, state: &FetchState<'_>) -> Result<Fetched> {
    let id = require(params, "program")?;
    let template = require(params, "command")?;
    let values = checked_values(params)?;

    let input = params
        .non_empty("input")
        .map(|name| params.text(name).unwrap_or_default().as_bytes().to_vec());
    let timeout = params
        .number("timeout")
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    let wants_tmp = template.contains(&format!("${}$", TMP_TOKEN));

    let mut key = identity("program", id, params, DECODING_OPTIONS);
    key["argv"] = serde_json::to_value(build_argv(template, &values, Some(""))?)?;
    if let Some(bytes) = &input {
        key["input"] = serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned());
    }
    let policy = FetchPolicy::from_params(params, None);

    let cached = state.run(&key, id, &policy, || {
        let tmp = if wants_tmp {
            Some(tempfile::Builder::new().prefix("extdata-").tempfile()?)
        } else {
            None
        };
        let tmp_path = tmp.as_ref().map(|file| file.path().display().to_string());
        let argv = build_argv(template, &values, tmp_path.as_deref())?;

        let mut cmd = build_program_command(&argv[0], &argv[1..])?;
        cmd.envs(params.table("env"));
        ui::verbose(&format!("Running program '{}': {}", id, argv.join(" ")));

        let output = run_with_timeout(&mut cmd, input.clone(), timeout)?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ExtDataError::SystemCommandFailed {
                command: id.to_string(),
                reason: match stderr.is_empty() {
                    true => format!("exited with {}", output.status),
                    false => format!("exited with {}: {}", output.status, stderr),
                },
            });
        }
        if !stderr.is_empty() {
            if !params.flag("ignore warnings") {
                return Err(ExtDataError::SystemCommandFailed {
                    command: id.to_string(),
                    reason: format!("wrote to stderr: {}", stderr),
                });
            }
            ui::verbose(&format!("Program '{}' warned: {}", id, stderr));
        }

        let bytes = match &tmp {
            Some(file) => fs::read(file.path()).map_err(|e| ExtDataError::IoError {
                path: file.path().to_path_buf(),
                source: e,
            })?,
            None => output.stdout,
        };
        Ok(Payload::Document(encoding::to_document(
            Some(id.to_string()),
            bytes,
            None,
            params,
        )))
    })?;
    Ok(Fetched::from_cached(cached, 1))
}
