//! Flat legacy globals re-keyed to modern scoped settings.
//!
//! ```kdl
//! legacy {
//!     cache-expire-time 3600
//!     db-server "shop" "db.example.org"
//!     exe-env "report" "LANG" "C"
//! }
//! ```

use indexmap::IndexMap;

use super::registry::{RegistryBuilder, WILDCARD};
use super::settings::Setting;
use crate::error::{ExtDataError, Result};

/// How a legacy global's arguments are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `name value` applies to every request.
    Global,
    /// `name key value` adds to a table applying to every request.
    GlobalTable,
    /// `name id value` applies to one target id.
    Scoped,
    /// `name id key value` adds to a table of one target id.
    ScopedTable,
}

const LEGACY_KEYS: &[(&str, &str, Shape)] = &[
    ("cache-expire-time", "cache seconds", Shape::Global),
    ("always-use-stale-cache", "use stale cache", Shape::Global),
    ("http-timeout", "timeout", Shape::Global),
    ("allow-ssl", "allow ssl", Shape::Global),
    ("string-replacements", "replacements", Shape::GlobalTable),
    ("db-server", "server", Shape::Scoped),
    ("db-server-type", "type", Shape::Scoped),
    ("db-name", "name", Shape::Scoped),
    ("db-user", "user", Shape::Scoped),
    ("db-password", "password", Shape::Scoped),
    ("db-directory", "directory", Shape::Scoped),
    ("db-flags", "flags", Shape::Scoped),
    ("exe-command", "command", Shape::Scoped),
    ("exe-env", "env", Shape::ScopedTable),
    ("directory-path", "path", Shape::Scoped),
    ("file-path", "path", Shape::Scoped),
    ("throttle-key", "throttle key", Shape::Scoped),
    ("throttle-interval", "throttle interval", Shape::Scoped),
];

/// Modern key for a legacy global name.
pub fn modern_key(legacy: &str) -> Option<&'static str> {
    lookup(legacy).map(|(key, _)| key)
}

fn lookup(legacy: &str) -> Option<(&'static str, Shape)> {
    LEGACY_KEYS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(legacy))
        .map(|(_, key, shape)| (*key, *shape))
}

/// Apply one legacy global given its name and positional arguments.
pub fn apply(builder: &mut RegistryBuilder, name: &str, args: &[String]) -> Result<()> {
    let (key, shape) = lookup(name)
        .ok_or_else(|| ExtDataError::ConfigError(format!("Unknown legacy setting '{}'", name)))?;

    let arity = match shape {
        Shape::Global => 1,
        Shape::GlobalTable | Shape::Scoped => 2,
        Shape::ScopedTable => 3,
    };
    if args.len() < arity {
        return Err(ExtDataError::ConfigError(format!(
            "Legacy setting '{}' expects {} argument(s), got {}",
            name,
            arity,
            args.len()
        )));
    }

    let table = |k: &str, v: &str| Setting::Table(IndexMap::from([(k.to_string(), v.to_string())]));
    match shape {
        Shape::Global => builder.legacy(WILDCARD, key, Setting::Text(args[0].clone())),
        Shape::GlobalTable => builder.legacy(WILDCARD, key, table(&args[0], &args[1])),
        Shape::Scoped => builder.legacy(&args[0], key, Setting::Text(args[1].clone())),
        Shape::ScopedTable => builder.legacy(&args[0], key, table(&args[1], &args[2])),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RequestParams;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn legacy_names_map_to_modern_keys() {
        assert_eq!(modern_key("cache-expire-time"), Some("cache seconds"));
        assert_eq!(modern_key("DB-SERVER"), Some("server"));
        assert_eq!(modern_key("nope"), None);
    }

    #[test]
    fn scoped_and_table_globals_land_in_their_scope() {
        let mut builder = RegistryBuilder::new();
        apply(&mut builder, "db-server", &strings(&["shop", "db.example.org"])).unwrap();
        apply(&mut builder, "exe-env", &strings(&["report", "LANG", "C"])).unwrap();
        apply(&mut builder, "exe-env", &strings(&["report", "TZ", "UTC"])).unwrap();
        apply(&mut builder, "cache-expire-time", &strings(&["60"])).unwrap();
        let registry = builder.build().unwrap();

        let shop = registry.supplement(&RequestParams::from_pairs(["db=shop"])).params;
        assert_eq!(shop.text("server"), Some("db.example.org"));
        assert_eq!(shop.text("cache seconds"), Some("60"));

        let report = registry.supplement(&RequestParams::from_pairs(["program=report"])).params;
        let env = report.table("env");
        assert_eq!(env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(env.get("TZ").map(String::as_str), Some("UTC"));
    }

    #[test]
    fn missing_arguments_are_config_errors() {
        let mut builder = RegistryBuilder::new();
        let err = apply(&mut builder, "db-server", &strings(&["only-id"])).unwrap_err();
        assert!(err.to_string().contains("expects 2"));
    }
}
