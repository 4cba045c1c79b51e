//! Layered site configuration.
//!
//! A request may match several configured scopes at once. Per key, the most
//! specific scope that sets it wins:
//! source id > url > host > second-level domain > db/program/directory/file
//! id > `*`.

use indexmap::IndexMap;

use super::presets;
use super::settings::{Setting, SourceSettings};
use crate::core::ErrorList;
use crate::error::ExtDataError;
use crate::params::{RequestParams, canonical_key};
use crate::utils::sanitize::check_param_filter;
use crate::utils::urls;

/// Scope matching every request.
pub const WILDCARD: &str = "*";

/// Keys naming a configured target id, least specific last.
const ID_KEYS: &[&str] = &["db", "server", "program", "directory", "file", "domain"];

/// Immutable set of configured scopes, built once by [`RegistryBuilder`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sources: IndexMap<String, SourceSettings>,
}

/// Result of supplementing a request with site configuration.
#[derive(Debug, Clone, Default)]
pub struct Supplemented {
    pub params: RequestParams,
    pub errors: ErrorList,
    /// Scopes that applied, most specific first.
    pub scopes: Vec<String>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &str) -> Option<&SourceSettings> {
        self.sources.get(&scope_key(scope))
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&String, &SourceSettings)> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Configured scopes this request falls under, most specific first.
    pub fn applicable_scopes(&self, request: &RequestParams) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(source) = request.non_empty("source") {
            candidates.push(source.to_string());
        }
        if let Some(url) = request.non_empty("url") {
            candidates.push(url.to_string());
            if let Some(host) = urls::host(url) {
                let domain = urls::second_level_domain(&host);
                candidates.push(host);
                candidates.push(domain);
            }
        }
        for key in ID_KEYS {
            if let Some(id) = request.non_empty(key) {
                candidates.push(id.to_string());
            }
        }
        candidates.push(WILDCARD.to_string());

        let mut scopes: Vec<String> = Vec::new();
        for candidate in candidates {
            let key = scope_key(&candidate);
            if self.sources.contains_key(&key) && !scopes.contains(&key) {
                scopes.push(key);
            }
        }
        scopes
    }

    /// Merge the applicable site settings into the caller's parameters.
    ///
    /// Effective precedence per key: defaults < caller < site settings.
    /// `$name$` in site values expands from the caller's own parameters.
    /// Missing required parameters and validator failures are reported in
    /// `errors`.
    pub fn supplement(&self, request: &RequestParams) -> Supplemented {
        let mut errors = ErrorList::new();
        if let Some(source) = request.non_empty("source")
            && self.get(source).is_none()
        {
            errors.push(ExtDataError::UnknownSource(source.to_string()).to_string());
        }

        let scopes = self.applicable_scopes(request);

        let mut merged = SourceSettings::new();
        for scope in &scopes {
            if let Some(settings) = self.sources.get(scope) {
                merged.fill_from(settings);
            }
        }

        // Program templates are substituted per argv token after validation.
        let expand = |key: &str, setting: &Setting| -> Setting {
            if key == "command" {
                setting.clone()
            } else {
                setting.substituted(request)
            }
        };
        let mut params = request.clone();
        for (key, setting) in &merged.settings {
            params.insert(key, expand(key, setting).into());
        }
        for (key, setting) in &merged.defaults {
            params.insert_if_absent(key, expand(key, setting).into());
        }

        for name in &merged.required {
            if !params.has(name) {
                errors.push(ExtDataError::MissingParameter(name.clone()).to_string());
            }
        }
        for (param, rule) in &merged.validators {
            if let Some(value) = params.text(param)
                && let Err(e) = check_param_filter(param, value, rule)
            {
                errors.push(e.to_string());
            }
        }

        Supplemented {
            params,
            errors,
            scopes,
        }
    }
}

/// Scope ids compare case-insensitively.
fn scope_key(scope: &str) -> String {
    scope.trim().to_lowercase()
}

/// Collects scopes from legacy globals, presets and declarative sources.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    presets: IndexMap<String, SourceSettings>,
    legacy: IndexMap<String, SourceSettings>,
    sources: IndexMap<String, SourceSettings>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            presets: presets::builtin(),
            ..Self::default()
        }
    }

    /// Declare or replace a named preset.
    pub fn preset(&mut self, name: &str, settings: SourceSettings) -> &mut Self {
        self.presets.insert(scope_key(name), settings);
        self
    }

    /// Declare a scope. Declaring the same scope twice merges, later
    /// declarations winning per key.
    pub fn source(&mut self, scope: &str, settings: SourceSettings) -> &mut Self {
        let entry = self.sources.entry(scope_key(scope)).or_default();
        let mut combined = settings;
        combined.fill_from(entry);
        *entry = combined;
        self
    }

    /// Record a setting from a legacy flat global, already re-keyed.
    pub fn legacy(&mut self, scope: &str, key: &str, setting: Setting) -> &mut Self {
        let key = canonical_key(key);
        let entry = self.legacy.entry(scope_key(scope)).or_default();
        if let (Some(Setting::Table(existing)), Setting::Table(more)) = (entry.settings.get_mut(&key), &setting) {
            existing.extend(more.clone());
            return self;
        }
        entry.settings.insert(key, setting);
        self
    }

    pub fn build(self) -> Result<Registry, ExtDataError> {
        let RegistryBuilder {
            presets,
            legacy,
            mut sources,
        } = self;

        for (scope, settings) in legacy {
            sources.entry(scope).or_default().fill_from(&settings);
        }

        for (scope, settings) in sources.iter_mut() {
            for name in settings.presets.clone() {
                let preset = presets.get(&scope_key(&name)).ok_or_else(|| {
                    ExtDataError::ConfigError(format!(
                        "source '{}' references unknown preset '{}'",
                        scope, name
                    ))
                })?;
                settings.fill_from(preset);
            }
        }

        Ok(Registry { sources })
    }
}
