//! Settings of one configured scope.

use indexmap::IndexMap;

use crate::params::{ParamValue, RequestParams, canonical_key, substitute};

/// A single configured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Flag,
    Text(String),
    List(Vec<String>),
    Table(IndexMap<String, String>),
}

impl Setting {
    /// Replace `$name$` tokens from the caller's own parameters.
    pub fn substituted(&self, user: &RequestParams) -> Setting {
        let expand = |value: &str| substitute(value, |name| user.text(name).map(str::to_string));
        match self {
            Setting::Flag => Setting::Flag,
            Setting::Text(value) => Setting::Text(expand(value)),
            Setting::List(items) => Setting::List(items.iter().map(|v| expand(v)).collect()),
            Setting::Table(table) => Setting::Table(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), expand(v)))
                    .collect(),
            ),
        }
    }

    /// Short human-readable rendering; secrets are masked.
    pub fn display(&self, key: &str) -> String {
        if is_secret(key) {
            return "********".to_string();
        }
        match self {
            Setting::Flag => "true".to_string(),
            Setting::Text(value) => value.clone(),
            Setting::List(items) => items.join(", "),
            Setting::Table(table) => table
                .iter()
                .map(|(k, v)| if is_secret(k) { format!("{}=********", k) } else { format!("{}={}", k, v) })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<Setting> for ParamValue {
    fn from(setting: Setting) -> Self {
        match setting {
            Setting::Flag => ParamValue::Flag,
            Setting::Text(value) => ParamValue::Text(value),
            Setting::List(items) => ParamValue::List(items),
            Setting::Table(table) => ParamValue::Table(table),
        }
    }
}

fn is_secret(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("password") || key.contains("secret") || key.contains("token")
}

/// Everything configured for one scope (source id, URL, host, domain or `*`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSettings {
    /// Values that override the caller's parameters.
    pub settings: IndexMap<String, Setting>,
    /// Values used only where the caller gave none.
    pub defaults: IndexMap<String, Setting>,
    /// Parameters that must be present after supplementing.
    pub required: Vec<String>,
    /// Parameter -> regex or named predicate.
    pub validators: IndexMap<String, String>,
    /// Preset bundles filling keys this scope does not set.
    pub presets: Vec<String>,
}

impl SourceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, setting: Setting) {
        self.settings.insert(canonical_key(key), setting);
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, Setting::Text(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.settings.get(&canonical_key(key))
    }

    /// Add every key of `other` this scope does not set yet.
    pub fn fill_from(&mut self, other: &SourceSettings) {
        for (key, setting) in &other.settings {
            self.settings
                .entry(key.clone())
                .or_insert_with(|| setting.clone());
        }
        for (key, setting) in &other.defaults {
            self.defaults
                .entry(key.clone())
                .or_insert_with(|| setting.clone());
        }
        for name in &other.required {
            if !self.required.contains(name) {
                self.required.push(name.clone());
            }
        }
        for (param, rule) in &other.validators {
            self.validators
                .entry(param.clone())
                .or_insert_with(|| rule.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
            && self.defaults.is_empty()
            && self.required.is_empty()
            && self.validators.is_empty()
    }
}
