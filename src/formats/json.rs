//! JSON and YAML documents, flattened raw or queried with JSONPath.

use serde_json::Value;

use super::{ParseContext, ParseError, QueryMode, strip_bom};
use crate::core::ColumnValueSet;
use crate::jsonpath::JsonPath;

const TOP_LEVEL_KEY: &str = "value";

pub fn parse_json(text: &str, ctx: &ParseContext<'_>, auto: bool) -> Result<ColumnValueSet, ParseError> {
    let tree: Value =
        serde_json::from_str(strip_bom(text).trim()).map_err(|e| ParseError::Json(e.to_string()))?;
    from_tree(&tree, ctx, auto)
}

pub fn parse_yaml(text: &str, ctx: &ParseContext<'_>, auto: bool) -> Result<ColumnValueSet, ParseError> {
    let tree: Value =
        serde_yml::from_str(strip_bom(text)).map_err(|e| ParseError::Yaml(e.to_string()))?;
    from_tree(&tree, ctx, auto)
}

fn from_tree(tree: &Value, ctx: &ParseContext<'_>, auto: bool) -> Result<ColumnValueSet, ParseError> {
    if auto && !matches!(tree, Value::Object(_) | Value::Array(_)) {
        return Err(ParseError::NoData("structured"));
    }

    if ctx.mode == QueryMode::JsonPath {
        let mut values = ColumnValueSet::new();
        for expression in &ctx.expressions {
            let path = JsonPath::parse(expression)?;
            let found = path.evaluate(tree).iter().map(value_to_string).collect();
            values.set(expression, found);
        }
        return Ok(values);
    }

    let mut values = ColumnValueSet::new();
    flatten(tree, None, &mut values);
    Ok(values)
}

/// Recursive raw flattening keyed by lower-cased leaf name. Scalar-only
/// lists collapse into one `, `-joined value.
fn flatten(value: &Value, key: Option<&str>, out: &mut ColumnValueSet) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten(child, Some(&name.to_lowercase()), out);
            }
        }
        Value::Array(items) => match key {
            Some(key) if items.iter().all(is_scalar) => {
                let joined: Vec<String> = items.iter().map(value_to_string).collect();
                out.push(key, joined.join(", "));
            }
            _ => {
                for item in items {
                    flatten(item, key, out);
                }
            }
        },
        scalar => out.push(key.unwrap_or(TOP_LEVEL_KEY), value_to_string(scalar)),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// String form of a JSON value: strings unquoted, null empty, containers as
/// compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
