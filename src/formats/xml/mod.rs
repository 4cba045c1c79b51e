//! XML and HTML parsing: raw flattening, XPath and CSS queries.

pub mod css;
pub mod dom;
pub mod xpath;

use super::{ParseContext, ParseError, QueryMode, strip_bom};
use crate::core::ColumnValueSet;
use dom::{Dom, NodeId};
use xpath::XPath;

pub fn parse(text: &str, html: bool, ctx: &ParseContext<'_>, auto: bool) -> Result<ColumnValueSet, ParseError> {
    let text = strip_bom(text);
    if auto && !looks_like_markup(text, html) {
        return Err(ParseError::Xml(format!(
            "input does not look like {}",
            if html { "HTML" } else { "XML" }
        )));
    }

    let dom = if html {
        Dom::parse_html(text)?
    } else {
        Dom::parse_xml(text)?
    };

    match ctx.mode {
        QueryMode::XPath => query(&dom, &ctx.expressions, |expr| XPath::compile(expr)),
        QueryMode::Css => query(&dom, &ctx.expressions, |expr| {
            XPath::compile(&css::css_to_xpath(expr)?)
        }),
        _ => Ok(flatten(&dom, Dom::ROOT)),
    }
}

fn query<F>(dom: &Dom, expressions: &[String], compile: F) -> Result<ColumnValueSet, ParseError>
where
    F: Fn(&str) -> Result<XPath, xpath::XPathError>,
{
    let mut values = ColumnValueSet::new();
    for expression in expressions {
        let compiled = compile(expression)?;
        values.set(expression, compiled.values(dom)?);
    }
    Ok(values)
}

/// Flatten the subtree under `id`: each leaf element contributes its text,
/// each attribute its value, keyed by lower-cased local name.
pub fn flatten(dom: &Dom, id: NodeId) -> ColumnValueSet {
    let mut values = ColumnValueSet::new();
    let mut nodes = vec![id];
    nodes.extend(dom.descendants(id));

    for node in nodes {
        let Some(name) = dom.element_name(node) else {
            continue;
        };
        for (key, value) in dom.attributes(node) {
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            values.push(&local_name(key).to_lowercase(), value.trim());
        }
        if dom.element_children(node).next().is_none() {
            values.push(&local_name(name).to_lowercase(), dom.text_content(node).trim());
        }
    }
    values
}

/// First element in document order whose local name matches, ignoring case.
pub fn find_element(dom: &Dom, local: &str) -> Option<NodeId> {
    dom.descendants(Dom::ROOT).into_iter().find(|&id| {
        dom.element_name(id)
            .is_some_and(|name| local_name(name).eq_ignore_ascii_case(local))
    })
}

pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn looks_like_markup(text: &str, html: bool) -> bool {
    let head = text.trim_start();
    if !head.starts_with('<') {
        return false;
    }
    if !html {
        return true;
    }
    let probe: String = head.chars().take(1024).collect::<String>().to_lowercase();
    ["<!doctype html", "<html", "<body", "<head", "<div", "<table", "<p>"]
        .iter()
        .any(|marker| probe.contains(marker))
}

#[cfg(test)]
mod tests;
