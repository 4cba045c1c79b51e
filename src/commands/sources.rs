//! `extdata sources`: show what the registry configures per scope.

use colored::Colorize;
use std::path::Path;

use crate::config::{Registry, SourceSettings, load_registry};
use crate::error::{ExtDataError, Result};
use crate::ui as output;
use crate::utils::paths;

pub struct SourcesOptions<'a> {
    pub config: Option<&'a Path>,
    pub scope: Option<String>,
}

pub fn run(options: SourcesOptions<'_>) -> Result<()> {
    let path = paths::config_file(options.config)?;
    let registry = load_registry(&path)?;

    if registry.is_empty() {
        output::info(&format!("No sources configured in {}", path.display()));
        return Ok(());
    }

    match &options.scope {
        Some(scope) => {
            let settings = registry
                .get(scope)
                .ok_or_else(|| ExtDataError::UnknownSource(scope.clone()))?;
            print!("{}", describe(scope, settings));
        }
        None => print!("{}", describe_all(&registry)),
    }
    Ok(())
}

pub fn describe_all(registry: &Registry) -> String {
    registry
        .scopes()
        .map(|(scope, settings)| describe(scope, settings))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One scope as indented `key: value` lines. Secrets are masked.
pub fn describe(scope: &str, settings: &SourceSettings) -> String {
    let mut out = format!("{}\n", scope.bold());
    for (key, setting) in &settings.settings {
        out.push_str(&format!("  {}: {}\n", key, setting.display(key)));
    }
    if !settings.defaults.is_empty() {
        out.push_str(&format!("  {}\n", "defaults".italic()));
        for (key, setting) in &settings.defaults {
            out.push_str(&format!("    {}: {}\n", key, setting.display(key)));
        }
    }
    if !settings.required.is_empty() {
        out.push_str(&format!("  required: {}\n", settings.required.join(", ")));
    }
    for (param, rule) in &settings.validators {
        out.push_str(&format!("  validate {}: {}\n", param, rule));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::kdl::parse_registry;

    #[test]
    fn secrets_are_masked_in_listings() {
        colored::control::set_override(false);
        let registry = parse_registry(
            r#"
source "crm" {
    type "postgres"
    password "hunter2"
    required "from"
    defaults {
        limit 50
    }
}
"#,
            None,
        )
        .unwrap();

        let text = describe_all(&registry);
        assert!(text.starts_with("crm\n"));
        assert!(text.contains("  type: postgres\n"));
        assert!(text.contains("  password: ********\n"));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("    limit: 50\n"));
        assert!(text.contains("  required: from\n"));
    }
}
