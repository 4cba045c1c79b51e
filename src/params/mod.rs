//! Request parameter normalization.
//!
//! Callers hand over flat `key=value` parameters. Values such as `data` and
//! `filters` carry nested `k=v,k2=v2` lists which are split here, respecting
//! quotes and bracketed sub-expressions (XPath, JSONPath, SQL).

use indexmap::IndexMap;
use std::fmt;

/// Synthetic parameter naming the entry point the caller used.
pub const ENTRY_POINT_KEY: &str = "__pf";

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Bare token without `=`: the parameter is present but has no value.
    Flag,
    Text(String),
    List(Vec<String>),
    /// Key/value table from site configuration (headers, env, replacements).
    Table(IndexMap<String, String>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Flag => None,
            ParamValue::Text(s) => Some(s.as_str()),
            ParamValue::List(items) => items.first().map(String::as_str),
            ParamValue::Table(_) => None,
        }
    }

    pub fn to_list(&self) -> Vec<String> {
        match self {
            ParamValue::Flag => Vec::new(),
            ParamValue::Text(s) => vec![s.clone()],
            ParamValue::List(items) => items.clone(),
            ParamValue::Table(table) => table.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Flag => Ok(()),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::List(items) => f.write_str(&items.join(",")),
            ParamValue::Table(_) => f.write_str(&self.to_list().join(",")),
        }
    }
}

/// Which halves of a `key=value` pair get lower-cased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseFold {
    pub keys: bool,
    pub values: bool,
}

impl CaseFold {
    pub const NONE: CaseFold = CaseFold {
        keys: false,
        values: false,
    };
    pub const KEYS: CaseFold = CaseFold {
        keys: true,
        values: false,
    };
}

/// Ordered request parameters keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: IndexMap<String, ParamValue>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `key=value` tokens; bare tokens become flags and repeated
    /// keys accumulate into a list.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match split_first_unquoted(pair, '=') {
                Some((key, value)) => params.append(key, value.trim()),
                None => params.set_flag(pair),
            }
        }
        params
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(&canonical_key(key))
    }

    /// First textual value of the parameter, if any.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_text)
    }

    /// Non-empty trimmed text value.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.text(key).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(&canonical_key(key))
    }

    /// A flag is on when present, unless its value spells a negative.
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(ParamValue::Flag) => true,
            Some(value) => value.as_text().map(parse_bool).unwrap_or(true),
        }
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        self.non_empty(key).and_then(|s| s.parse::<i64>().ok())
    }

    pub fn insert(&mut self, key: &str, value: ParamValue) {
        self.values.insert(canonical_key(key), value);
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.insert(key, ParamValue::Text(value.into()));
    }

    pub fn set_flag(&mut self, key: &str) {
        self.insert(key, ParamValue::Flag);
    }

    /// Insert only when the key is not already present.
    pub fn insert_if_absent(&mut self, key: &str, value: ParamValue) {
        self.values.entry(canonical_key(key)).or_insert(value);
    }

    /// Add a value, turning an existing entry into a list.
    pub fn append(&mut self, key: &str, value: &str) {
        let key = canonical_key(key);
        match self.values.get_mut(&key) {
            None | Some(ParamValue::Flag) => {
                self.values.insert(key, ParamValue::Text(value.to_string()));
            }
            Some(ParamValue::Text(existing)) => {
                let first = std::mem::take(existing);
                self.values
                    .insert(key, ParamValue::List(vec![first, value.to_string()]));
            }
            Some(ParamValue::List(items)) => items.push(value.to_string()),
            Some(ParamValue::Table(table)) => {
                if let Some((k, v)) = split_first_unquoted(value, '=') {
                    table.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.shift_remove(&canonical_key(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a nested `k=v,k2=v2` parameter into ordered pairs.
    pub fn pairs(&self, key: &str, fold: CaseFold) -> IndexMap<String, Option<String>> {
        match self.get(key) {
            Some(ParamValue::Table(table)) => table
                .iter()
                .map(|(k, v)| {
                    let k = if fold.keys { k.to_lowercase() } else { k.clone() };
                    let v = if fold.values { v.to_lowercase() } else { v.clone() };
                    (k, Some(v))
                })
                .collect(),
            Some(ParamValue::List(items)) => {
                let mut merged = IndexMap::new();
                for item in items {
                    merged.extend(split_pairs(item, fold));
                }
                merged
            }
            Some(value) => value
                .as_text()
                .map(|s| split_pairs(s, fold))
                .unwrap_or_default(),
            None => IndexMap::new(),
        }
    }

    /// A key/value table: configured tables as-is, otherwise the nested
    /// `k=v` pairs of the parameter. Bare keys map to empty strings.
    pub fn table(&self, key: &str) -> IndexMap<String, String> {
        match self.get(key) {
            Some(ParamValue::Table(table)) => table.clone(),
            _ => self
                .pairs(key, CaseFold::NONE)
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect(),
        }
    }

    /// Values of a comma separated parameter.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(ParamValue::List(items)) => items
                .iter()
                .flat_map(|s| split_top_level(s, ','))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(value) => value
                .as_text()
                .map(|s| {
                    split_top_level(s, ',')
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Replace `$name$` tokens using these parameters.
    pub fn substitute(&self, template: &str) -> String {
        substitute(template, |name| self.text(name).map(str::to_string))
    }
}

impl<'a> IntoIterator for &'a RequestParams {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = indexmap::map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Canonical parameter name: trimmed, lower-cased, `-`/`_` read as spaces,
/// whitespace collapsed. Reserved `__` prefixes are kept verbatim.
pub fn canonical_key(key: &str) -> String {
    let key = key.trim();
    let rest = key.trim_start_matches('_');
    let prefix = &key[..key.len() - rest.len()];
    let body = rest
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("{}{}", prefix, body)
}

/// Split `k=v,k2=v2` into ordered pairs. Bare tokens map to `None`.
pub fn split_pairs(input: &str, fold: CaseFold) -> IndexMap<String, Option<String>> {
    let mut pairs = IndexMap::new();
    for segment in split_top_level(input, ',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match split_first_unquoted(segment, '=') {
            Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
            None => (segment.to_string(), None),
        };
        if key.is_empty() {
            continue;
        }
        let key = if fold.keys { key.to_lowercase() } else { key };
        let value = if fold.values {
            value.map(|v| v.to_lowercase())
        } else {
            value
        };
        pairs.insert(key, value);
    }
    pairs
}

/// Split on `sep` outside of quotes and bracket pairs.
///
/// Unbalanced input keeps the remainder as one segment.
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ if c == sep && depth == 0 => {
                    parts.push(&input[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Split on the first `sep` that sits outside quotes and brackets.
pub fn split_first_unquoted(input: &str, sep: char) -> Option<(&str, &str)> {
    let parts = split_top_level(input, sep);
    if parts.len() < 2 {
        return None;
    }
    let key = parts[0];
    Some((key, &input[key.len() + sep.len_utf8()..]))
}

/// Replace `$name$` tokens. Unknown names are left untouched.
pub fn substitute<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('$') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('$') {
            Some(close) => {
                let name = &after[..close];
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' ' | '.'));
                match (valid, valid.then(|| lookup(name)).flatten()) {
                    (true, Some(value)) => {
                        out.push_str(&value);
                        rest = &after[close + 1..];
                    }
                    _ => {
                        out.push('$');
                        rest = after;
                    }
                }
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "off" | "0" | "#false"
    )
}
