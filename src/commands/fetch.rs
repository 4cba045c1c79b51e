//! `extdata fetch`: run one request and print the mapped variables.

use colored::Colorize;
use std::path::PathBuf;

use crate::cli::args::OutputFormat;
use crate::config::load_registry;
use crate::connectors::EntryPoint;
use crate::connectors::clients::{CacheBackend, Services};
use crate::core::{ColumnValueSet, is_pseudo};
use crate::error::{ExtDataError, Result};
use crate::external_data::ExternalData;
use crate::params::RequestParams;
use crate::ui as output;
use crate::utils::paths;

pub struct FetchOptions {
    pub entry: EntryPoint,
    pub params: Vec<String>,
    pub output: OutputFormat,
    pub no_meta: bool,
    pub config: Option<PathBuf>,
    pub cache_store: CacheBackend,
}

pub fn run(options: FetchOptions) -> Result<()> {
    let registry = load_registry(&paths::config_file(options.config.as_deref())?)?;
    let services = Services::persistent(options.cache_store)?;
    let data = ExternalData::new(&registry, services);

    let request = RequestParams::from_pairs(&options.params);
    let outcome = data.run(options.entry, request);

    if let Some(errors) = outcome.render_errors() {
        for line in errors.lines() {
            output::warning(line);
        }
    }

    let values = if options.no_meta {
        without_meta(&outcome.values)
    } else {
        outcome.values.clone()
    };

    if !outcome.values.has_data() && outcome.had_errors() {
        return Err(ExtDataError::Other(format!(
            "{} returned no data",
            options.entry
        )));
    }

    match options.output {
        OutputFormat::Table => print!("{}", render_table(&values)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&values)?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&values)?),
    }
    Ok(())
}

pub fn without_meta(values: &ColumnValueSet) -> ColumnValueSet {
    values
        .iter()
        .filter(|(name, _)| !is_pseudo(name))
        .map(|(name, column)| (name.clone(), column.clone()))
        .collect()
}

/// Data columns as an aligned table; single-valued metadata columns
/// follow as `name: value` lines.
pub fn render_table(values: &ColumnValueSet) -> String {
    let data: Vec<(&String, &Vec<String>)> = values.iter().filter(|(name, _)| !is_pseudo(name)).collect();
    let meta: Vec<(&String, &Vec<String>)> = values.iter().filter(|(name, _)| is_pseudo(name)).collect();
    let mut out = String::new();

    if data.is_empty() {
        out.push_str(&format!("{}\n", "(no data)".dimmed()));
    } else {
        let rows = values.data_row_count();
        let widths: Vec<usize> = data
            .iter()
            .map(|(name, column)| {
                column
                    .iter()
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = data
            .iter()
            .zip(&widths)
            .map(|((name, _), width)| format!("{:<width$}", name, width = *width))
            .collect();
        out.push_str(&format!("{}\n", header.join("  ").trim_end().bold()));

        for row in 0..rows {
            let line: Vec<String> = data
                .iter()
                .zip(&widths)
                .map(|((_, column), width)| {
                    let cell = column.get(row).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", cell, width = *width)
                })
                .collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        }
    }

    for (name, column) in meta {
        out.push_str(&format!("{}: {}\n", name.bright_black(), column.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> ColumnValueSet {
        [
            ("name".to_string(), vec!["Apple".to_string(), "Fig".to_string()]),
            ("price".to_string(), vec!["1.20".to_string(), "10.00".to_string()]),
            ("__stale".to_string(), vec!["false".to_string()]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn table_aligns_columns_and_lists_meta() {
        colored::control::set_override(false);
        let table = render_table(&values());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "name   price");
        assert_eq!(lines[1], "Apple  1.20");
        assert_eq!(lines[2], "Fig    10.00");
        assert_eq!(lines[3], "__stale: false");
    }

    #[test]
    fn meta_columns_can_be_dropped() {
        let stripped = without_meta(&values());
        assert_eq!(stripped.len(), 2);
        assert!(!stripped.contains("__stale"));
    }

    #[test]
    fn empty_result_says_so() {
        colored::control::set_override(false);
        assert!(render_table(&ColumnValueSet::new()).contains("(no data)"));
    }
}
