//! KDL source registry format.
//!
//! ```kdl
//! preset "slow-api" {
//!     throttle-key "$host$"
//!     throttle-interval 10
//! }
//!
//! legacy {
//!     cache-expire-time 3600
//! }
//!
//! source "api.example.org" {
//!     preset "slow-api"
//!     timeout 20
//!     headers {
//!         Accept "application/json"
//!     }
//!     defaults {
//!         format "json"
//!     }
//!     required "q"
//!     validate {
//!         q "alnum"
//!     }
//! }
//! ```

use indexmap::IndexMap;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fmt::Write;

use super::legacy;
use super::registry::{Registry, RegistryBuilder};
use super::settings::{Setting, SourceSettings};
use crate::error::{ExtDataError, Result};
use crate::params::canonical_key;

/// Parse a registry file's content.
pub fn parse_registry(content: &str, file_path: Option<&str>) -> Result<Registry> {
    let doc: KdlDocument = content
        .parse()
        .map_err(|e: kdl::KdlError| ExtDataError::ConfigError(format_error_report(content, file_path, &e)))?;

    let mut builder = RegistryBuilder::new();
    for node in doc.nodes() {
        match node.name().value() {
            "source" | "site" => {
                let scope = first_string(node)
                    .ok_or_else(|| ExtDataError::ConfigError("source needs a scope, e.g. source \"*\"".into()))?;
                builder.source(&scope, parse_source(node)?);
            }
            "preset" => {
                let name = first_string(node)
                    .ok_or_else(|| ExtDataError::ConfigError("preset needs a name".into()))?;
                builder.preset(&name, parse_source(node)?);
            }
            "legacy" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        legacy::apply(&mut builder, child.name().value(), &arguments(child))?;
                    }
                }
            }
            "description" => {}
            other => {
                return Err(ExtDataError::ConfigError(format!(
                    "Unknown top-level node '{}' (expected source, preset or legacy)",
                    other
                )));
            }
        }
    }
    builder.build()
}

fn parse_source(node: &KdlNode) -> Result<SourceSettings> {
    let mut settings = SourceSettings::new();
    let Some(children) = node.children() else {
        return Ok(settings);
    };

    for child in children.nodes() {
        let name = child.name().value();
        match name {
            "preset" => settings.presets.extend(arguments(child)),
            "required" => settings.required.extend(arguments(child).iter().map(|p| canonical_key(p))),
            "defaults" => {
                for (key, value) in parse_source(child)?.settings {
                    settings.defaults.insert(key, value);
                }
            }
            "validate" => {
                for (param, rule) in table_of(child) {
                    settings.validators.insert(canonical_key(&param), rule);
                }
            }
            _ => settings.set(name, setting_of(child)),
        }
    }
    Ok(settings)
}

/// A child with its own children is a table; otherwise its arguments
/// decide between flag, text and list.
fn setting_of(node: &KdlNode) -> Setting {
    if node.children().is_some() {
        return Setting::Table(table_of(node));
    }
    let mut args = arguments(node);
    match args.len() {
        0 => Setting::Flag,
        1 => Setting::Text(args.remove(0)),
        _ => Setting::List(args),
    }
}

/// Child names keep their case: they are header names, env variables or
/// statement names.
fn table_of(node: &KdlNode) -> IndexMap<String, String> {
    let mut table = IndexMap::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let value = arguments(child).join(",");
            table.insert(child.name().value().to_string(), value);
        }
    }
    table
}

/// Positional arguments rendered as text; properties are ignored.
fn arguments(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .filter_map(|entry| value_text(entry.value()))
        .collect()
}

fn first_string(node: &KdlNode) -> Option<String> {
    arguments(node).into_iter().next()
}

fn value_text(value: &KdlValue) -> Option<String> {
    match value {
        KdlValue::String(s) => Some(s.clone()),
        KdlValue::Integer(i) => Some(i.to_string()),
        KdlValue::Float(f) => Some(f.to_string()),
        KdlValue::Bool(b) => Some(b.to_string()),
        KdlValue::Null => None,
    }
}

/// Render a parse failure with line, column and the offending line.
fn format_error_report(content: &str, file_path: Option<&str>, error: &kdl::KdlError) -> String {
    let mut report = String::from("KDL parsing error");
    if error.diagnostics.is_empty() {
        let _ = write!(&mut report, ": {}", error);
        return report;
    }

    for diag in &error.diagnostics {
        let (line, col) = offset_to_line_col(content, diag.span.offset());
        let message = diag.message.clone().unwrap_or_else(|| "parse error".to_string());
        let _ = write!(&mut report, "\n{}", message);
        match file_path {
            Some(path) => {
                let _ = write!(&mut report, "\n  --> {}:{}:{}", path, line, col);
            }
            None => {
                let _ = write!(&mut report, "\n  --> line {}, column {}", line, col);
            }
        }
        if let Some(source_line) = content.lines().nth(line.saturating_sub(1)) {
            let _ = write!(
                &mut report,
                "\n   | {}\n   | {}{}",
                source_line,
                " ".repeat(col.saturating_sub(1)),
                "^".repeat(diag.span.len().clamp(1, 20))
            );
        }
        if let Some(help) = &diag.help {
            let _ = write!(&mut report, "\n  = help: {}", help);
        } else if message.contains("unexpected end of file") {
            let _ = write!(&mut report, "\n  = hint: a closing brace '}}' may be missing");
        }
    }
    report
}

fn offset_to_line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0) + 1;
    (line, col)
}
