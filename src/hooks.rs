//! Named pre- and post-processing hooks.
//!
//! A source selects hooks by name with `preprocess` and `postprocess`.
//! Preprocess hooks rewrite the fetched document before parsing;
//! postprocess hooks rewrite the parsed columns before mapping. Hosts can
//! register their own next to the built-ins.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use crate::core::{Body, ColumnValueSet, Document, is_pseudo};
use crate::error::{ExtDataError, Result};
use crate::params::RequestParams;

pub type PreprocessHook = Box<dyn Fn(&mut Document, &RequestParams) -> Result<()> + Send + Sync>;
pub type PostprocessHook = Box<dyn Fn(&mut ColumnValueSet, &RequestParams) -> Result<()> + Send + Sync>;

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex pattern"));

pub struct Hooks {
    pre: IndexMap<String, PreprocessHook>,
    post: IndexMap<String, PostprocessHook>,
}

impl Hooks {
    /// No hooks at all.
    pub fn empty() -> Self {
        Self {
            pre: IndexMap::new(),
            post: IndexMap::new(),
        }
    }

    /// The built-in hooks:
    ///
    /// - `trim` (pre): strip surrounding whitespace from a text body
    /// - `strip-html-comments` (pre): drop `<!-- ... -->` blocks
    /// - `trim-values` (post): trim every cell
    /// - `drop-empty-rows` (post): remove rows with no non-empty data cell
    /// - `dedupe-rows` (post): keep the first of identical rows
    pub fn builtin() -> Self {
        let mut hooks = Self::empty();
        hooks.register_pre("trim", |doc, _| {
            map_text(doc, |text| text.trim().to_string());
            Ok(())
        });
        hooks.register_pre("strip-html-comments", |doc, _| {
            map_text(doc, |text| HTML_COMMENT.replace_all(text, "").into_owned());
            Ok(())
        });
        hooks.register_post("trim-values", |values, _| {
            for (name, column) in values.iter_mut() {
                if !is_pseudo(name) {
                    column.iter_mut().for_each(|cell| *cell = cell.trim().to_string());
                }
            }
            Ok(())
        });
        hooks.register_post("drop-empty-rows", |values, _| {
            retain_rows(values, |row| row.iter().any(|cell| !cell.trim().is_empty()));
            Ok(())
        });
        hooks.register_post("dedupe-rows", |values, _| {
            let mut seen = Vec::new();
            retain_rows(values, |row| {
                if seen.contains(&row) {
                    false
                } else {
                    seen.push(row);
                    true
                }
            });
            Ok(())
        });
        hooks
    }

    pub fn register_pre<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&mut Document, &RequestParams) -> Result<()> + Send + Sync + 'static,
    {
        self.pre.insert(name.to_lowercase(), Box::new(hook));
    }

    pub fn register_post<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&mut ColumnValueSet, &RequestParams) -> Result<()> + Send + Sync + 'static,
    {
        self.post.insert(name.to_lowercase(), Box::new(hook));
    }

    pub fn names(&self) -> (Vec<&str>, Vec<&str>) {
        (
            self.pre.keys().map(String::as_str).collect(),
            self.post.keys().map(String::as_str).collect(),
        )
    }

    pub fn preprocess(&self, name: &str, doc: &mut Document, params: &RequestParams) -> Result<()> {
        let hook = self
            .pre
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| ExtDataError::ConfigError(format!("Unknown preprocess hook '{}'", name)))?;
        hook(doc, params)
    }

    pub fn postprocess(&self, name: &str, values: &mut ColumnValueSet, params: &RequestParams) -> Result<()> {
        let hook = self
            .post
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| ExtDataError::ConfigError(format!("Unknown postprocess hook '{}'", name)))?;
        hook(values, params)
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::builtin()
    }
}

fn map_text(doc: &mut Document, f: impl Fn(&str) -> String) {
    if let Body::Text(text) = &mut doc.body {
        *text = f(text);
    }
}

/// Keep rows of the data columns for which `keep` holds.
fn retain_rows(values: &mut ColumnValueSet, mut keep: impl FnMut(Vec<String>) -> bool) {
    let data: Vec<String> = values.columns().filter(|c| !is_pseudo(c)).cloned().collect();
    let rows = values.data_row_count();

    let kept: Vec<bool> = (0..rows)
        .map(|row| {
            let cells = data
                .iter()
                .map(|column| {
                    values
                        .get(column)
                        .and_then(|values| values.get(row))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect();
            keep(cells)
        })
        .collect();

    for column in &data {
        if let Some(cells) = values.get(column).cloned() {
            let retained = cells
                .into_iter()
                .enumerate()
                .filter(|(row, _)| kept.get(*row).copied().unwrap_or(false))
                .map(|(_, cell)| cell)
                .collect();
            values.set(column, retained);
        }
    }
}
