//! JSONPath query engine over `serde_json::Value` trees.
//!
//! Evaluation runs segment by segment over a working selection that starts
//! as `[root]`. Selections hold shared references into the tree; results are
//! cloned out at the end, so the input is never mutated.

mod filter;
mod parser;

use serde_json::Value;
use thiserror::Error;

pub use filter::{CompareOp, FilterExpr, Operand};
pub use parser::Segment;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("Unbalanced brackets in JSONPath '{expression}' at position {position}")]
    Unbalanced { expression: String, position: usize },

    #[error("Unrecognized JSONPath segment '{segment}' in '{expression}'")]
    UnexpectedSegment { expression: String, segment: String },

    #[error("Invalid JSONPath filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// A parsed JSONPath expression.
#[derive(Debug, Clone)]
pub struct JsonPath {
    expression: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expression: &str) -> Result<Self, JsonPathError> {
        Ok(Self {
            expression: expression.trim().to_string(),
            segments: parser::parse_segments(expression)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// False when any segment can fan out to several nodes.
    pub fn is_definite(&self) -> bool {
        !self.segments.iter().any(Segment::diverges)
    }

    /// Nodes matched by the path, without a terminal `.length`.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let steps = match self.segments.last() {
            Some(Segment::Length) => &self.segments[..self.segments.len() - 1],
            _ => &self.segments[..],
        };

        let mut selection = vec![root];
        for segment in steps {
            selection = apply(segment, selection, root);
            if selection.is_empty() {
                break;
            }
        }
        selection
    }

    /// Matched values, cloned. A terminal `.length` yields one length per
    /// selected element.
    pub fn evaluate(&self, root: &Value) -> Vec<Value> {
        let selection = self.select(root);
        match self.segments.last() {
            Some(Segment::Length) => selection.into_iter().filter_map(length_of).collect(),
            _ => selection.into_iter().cloned().collect(),
        }
    }
}

/// Parse and evaluate in one step.
pub fn query(root: &Value, expression: &str) -> Result<Vec<Value>, JsonPathError> {
    Ok(JsonPath::parse(expression)?.evaluate(root))
}

fn length_of(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => Some(Value::from(items.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        Value::Object(map) => Some(
            map.get("length")
                .cloned()
                .unwrap_or_else(|| Value::from(map.len())),
        ),
        _ => None,
    }
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// The node followed by all its descendants, in document order.
fn descendants_or_self<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    for child in children(value) {
        descendants_or_self(child, out);
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len.saturating_add(index) } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

fn slice_indices(start: Option<i64>, end: Option<i64>, step: i64, len: usize) -> Vec<usize> {
    let len = len as i64;
    let clamp = |i: i64, low: i64, high: i64| i.max(low).min(high);
    let normalize = |i: i64| if i < 0 { len.saturating_add(i) } else { i };

    let mut indices = Vec::new();
    if step > 0 {
        let from = clamp(start.map(normalize).unwrap_or(0), 0, len);
        let to = clamp(end.map(normalize).unwrap_or(len), 0, len);
        let mut i = from;
        while i < to {
            indices.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let from = clamp(start.map(normalize).unwrap_or(len - 1), -1, len - 1);
        let to = clamp(end.map(normalize).unwrap_or(-1), -1, len - 1);
        let mut i = from;
        while i > to {
            indices.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
    indices
}

fn apply<'a>(segment: &Segment, selection: Vec<&'a Value>, root: &'a Value) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for node in selection {
        select_from(segment, node, root, &mut out);
    }
    out
}

fn select_from<'a>(segment: &Segment, node: &'a Value, root: &'a Value, out: &mut Vec<&'a Value>) {
    match segment {
        Segment::Child(name) => match node {
            Value::Object(map) => out.extend(map.get(name)),
            Value::Array(items) => {
                if let Ok(index) = name.parse::<i64>()
                    && let Some(i) = resolve_index(index, items.len())
                {
                    out.push(&items[i]);
                }
            }
            _ => {}
        },
        Segment::Length => {
            if let Value::Object(map) = node {
                out.extend(map.get("length"));
            }
        }
        Segment::Wildcard => out.extend(children(node)),
        Segment::Names(names) => {
            if let Value::Object(map) = node {
                out.extend(names.iter().filter_map(|n| map.get(n)));
            }
        }
        Segment::Indices(indices) => {
            if let Value::Array(items) = node {
                out.extend(
                    indices
                        .iter()
                        .filter_map(|&i| resolve_index(i, items.len()))
                        .map(|i| &items[i]),
                );
            }
        }
        Segment::Slice { start, end, step } => {
            if let Value::Array(items) = node {
                out.extend(
                    slice_indices(*start, *end, *step, items.len())
                        .into_iter()
                        .map(|i| &items[i]),
                );
            }
        }
        Segment::Filter(filter) => {
            out.extend(
                children(node)
                    .into_iter()
                    .filter(|child| filter.matches(child, root)),
            );
        }
        Segment::Recursive(inner) => {
            let mut all = Vec::new();
            descendants_or_self(node, &mut all);
            for candidate in all {
                select_from(inner, candidate, root, out);
            }
        }
    }
}

#[cfg(test)]
mod tests;
