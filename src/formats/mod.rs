//! Format parser registry and auto-detector.
//!
//! A parser kind is selected from the request the same way connectors are:
//! an ordered constraint table over `format` and the mode flags. Without a
//! `format`, every concrete kind is tried by genericity rank and the first
//! one that parses and yields data wins.

pub mod archive;
pub mod csv;
pub mod ini;
pub mod json;
pub mod pattern;
pub mod text;
pub mod xml;

use thiserror::Error;

use crate::core::matcher::{Constraint, ConstraintTable};
use crate::core::{Body, ColumnValueSet, Document};
use crate::jsonpath::JsonPathError;
use crate::params::RequestParams;
use crate::ui;
use xml::xpath::XPathError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown format '{0}'")]
    UnknownFormat(String),

    #[error("No data found in {0} input")]
    NoData(&'static str),

    #[error("Invalid CSV: {0}")]
    Csv(String),

    #[error("Invalid XML: {0}")]
    Xml(String),

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid YAML: {0}")]
    Yaml(String),

    #[error("Invalid ini data: {0}")]
    Ini(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid regex: {0}")]
    Regex(String),

    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error(transparent)]
    JsonPath(#[from] JsonPathError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Auto,
    Csv,
    CsvWithHeader,
    Tsv,
    TsvWithHeader,
    Xml,
    Html,
    Json,
    Yaml,
    Ini,
    Regex,
    Text,
    Zip,
    Tar,
    TarGz,
    Gzip,
}

/// Auto-detection order, most specific first.
const AUTO_ORDER: &[FormatKind] = &[
    FormatKind::Zip,
    FormatKind::TarGz,
    FormatKind::Tar,
    FormatKind::Gzip,
    FormatKind::Json,
    FormatKind::Xml,
    FormatKind::Html,
    FormatKind::Ini,
    FormatKind::Yaml,
    FormatKind::Csv,
    FormatKind::Tsv,
    FormatKind::Text,
];

impl FormatKind {
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::Auto => "auto",
            FormatKind::Csv => "csv",
            FormatKind::CsvWithHeader => "csv with header",
            FormatKind::Tsv => "tsv",
            FormatKind::TsvWithHeader => "tsv with header",
            FormatKind::Xml => "xml",
            FormatKind::Html => "html",
            FormatKind::Json => "json",
            FormatKind::Yaml => "yaml",
            FormatKind::Ini => "ini",
            FormatKind::Regex => "regex",
            FormatKind::Text => "text",
            FormatKind::Zip => "zip",
            FormatKind::Tar => "tar",
            FormatKind::TarGz => "tar.gz",
            FormatKind::Gzip => "gzip",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FormatKind::Auto | FormatKind::Regex => &[],
            FormatKind::Csv | FormatKind::CsvWithHeader => &["csv"],
            FormatKind::Tsv | FormatKind::TsvWithHeader => &["tsv", "tab"],
            FormatKind::Xml => &["xml", "rss", "atom", "svg", "kml", "gpx"],
            FormatKind::Html => &["html", "htm", "xhtml"],
            FormatKind::Json => &["json", "geojson"],
            FormatKind::Yaml => &["yaml", "yml"],
            FormatKind::Ini => &["ini", "cfg", "conf", "properties"],
            FormatKind::Text => &["txt", "log"],
            FormatKind::Zip => &["zip"],
            FormatKind::Tar => &["tar"],
            FormatKind::TarGz => &["tar.gz", "tgz"],
            FormatKind::Gzip => &["gz"],
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(
            self,
            FormatKind::Zip | FormatKind::Tar | FormatKind::TarGz | FormatKind::Gzip
        )
    }
}

fn format_table(key: &'static str) -> ConstraintTable<FormatKind> {
    use Constraint::Is;
    let literal = |value: &'static str, kind: FormatKind| (vec![Is(key, value)], kind);

    [
        literal("csv with header", FormatKind::CsvWithHeader),
        literal("csv", FormatKind::Csv),
        literal("tsv with header", FormatKind::TsvWithHeader),
        literal("tsv", FormatKind::Tsv),
        literal("xml", FormatKind::Xml),
        literal("html", FormatKind::Html),
        literal("json", FormatKind::Json),
        literal("yaml", FormatKind::Yaml),
        literal("yml", FormatKind::Yaml),
        literal("ini", FormatKind::Ini),
        literal("regex", FormatKind::Regex),
        literal("text", FormatKind::Text),
        literal("plain text", FormatKind::Text),
        literal("zip", FormatKind::Zip),
        literal("tar", FormatKind::Tar),
        literal("tar.gz", FormatKind::TarGz),
        literal("tgz", FormatKind::TarGz),
        literal("gzip", FormatKind::Gzip),
        literal("gz", FormatKind::Gzip),
        literal("auto", FormatKind::Auto),
        (vec![Constraint::Present("regex")], FormatKind::Regex),
    ]
    .into_iter()
    .fold(ConstraintTable::new(), |table, (constraints, kind)| {
        table.with(constraints, kind)
    })
}

/// Parser kind for the request; `format_key` is `format` for documents and
/// `archive format` for archive members.
pub fn select_format(params: &RequestParams, format_key: &'static str) -> Result<FormatKind, ParseError> {
    if let Some(kind) = format_table(format_key).first_match(params) {
        return Ok(kind);
    }
    match params.non_empty(format_key) {
        Some(unknown) => Err(ParseError::UnknownFormat(unknown.to_string())),
        None => Ok(FormatKind::Auto),
    }
}

/// How XML/HTML and JSON/YAML documents are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Raw,
    XPath,
    Css,
    JsonPath,
}

/// Everything a parser needs besides the document itself.
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    pub params: &'a RequestParams,
    /// External names the mapping asks for; query expressions in
    /// XPath/CSS/JSONPath mode.
    pub expressions: Vec<String>,
    pub mode: QueryMode,
    depth: usize,
}

const MAX_ARCHIVE_DEPTH: usize = 4;

impl<'a> ParseContext<'a> {
    pub fn new(params: &'a RequestParams, expressions: Vec<String>) -> Self {
        let mode = if params.flag("use xpath") {
            QueryMode::XPath
        } else if params.flag("use css") {
            QueryMode::Css
        } else if params.flag("use jsonpath") {
            QueryMode::JsonPath
        } else {
            QueryMode::Raw
        };
        Self {
            params,
            expressions,
            mode,
            depth: 0,
        }
    }

    fn nested(&self) -> Result<Self, ParseError> {
        if self.depth >= MAX_ARCHIVE_DEPTH {
            return Err(ParseError::Archive("archives nested too deeply".to_string()));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }
}

/// Parse one document with the format the request selects.
pub fn parse_document(doc: &Document, ctx: &ParseContext<'_>) -> Result<ColumnValueSet, ParseError> {
    match select_format(ctx.params, "format")? {
        FormatKind::Auto => Ok(auto_detect(doc, ctx)),
        kind => parse_as(kind, doc, ctx, false),
    }
}

/// Parse an archive member: `archive format` if given, else auto-detection
/// guided by the member's own extension.
pub(crate) fn parse_member(doc: &Document, ctx: &ParseContext<'_>) -> Result<ColumnValueSet, ParseError> {
    let nested = ctx.nested()?;
    match select_format(ctx.params, "archive format")? {
        FormatKind::Auto => Ok(auto_detect(doc, &nested)),
        kind => parse_as(kind, doc, &nested, false),
    }
}

/// Try every concrete kind in rank order, extension matches first. Falls
/// back to the plain text result when nothing yields data.
pub fn auto_detect(doc: &Document, ctx: &ParseContext<'_>) -> ColumnValueSet {
    let extension = doc.extension();
    let (mut order, rest): (Vec<FormatKind>, Vec<FormatKind>) = AUTO_ORDER
        .iter()
        .copied()
        .partition(|kind| {
            extension
                .as_deref()
                .is_some_and(|ext| kind.extensions().contains(&ext))
        });
    order.extend(rest);

    for kind in order {
        if kind == FormatKind::Text {
            continue;
        }
        match parse_as(kind, doc, ctx, true) {
            Ok(values) if values.has_data() => {
                ui::verbose(&format!("Auto-detected format: {}", kind.name()));
                return values;
            }
            Ok(_) => ui::verbose(&format!("Format {} yielded no data", kind.name())),
            Err(e) => ui::verbose(&format!("Format {} rejected: {}", kind.name(), e)),
        }
    }

    ui::verbose("No structured format matched; using plain text");
    text::parse(&document_text(doc, ctx.params), ctx.params)
}

fn document_text(doc: &Document, params: &RequestParams) -> String {
    match &doc.body {
        Body::Text(text) => text.clone(),
        Body::Binary(bytes) => {
            crate::connectors::encoding::decode(bytes, params, doc.content_type.as_deref())
        }
    }
}

fn parse_as(
    kind: FormatKind,
    doc: &Document,
    ctx: &ParseContext<'_>,
    auto: bool,
) -> Result<ColumnValueSet, ParseError> {
    if kind.is_archive() {
        return archive::parse(kind, doc, ctx, auto);
    }

    let text = document_text(doc, ctx.params);
    Ok(match kind {
        FormatKind::Csv | FormatKind::CsvWithHeader | FormatKind::Tsv | FormatKind::TsvWithHeader => {
            csv::parse(&text, kind, ctx.params, auto)?
        }
        FormatKind::Xml => xml::parse(&text, false, ctx, auto)?,
        FormatKind::Html => xml::parse(&text, true, ctx, auto)?,
        FormatKind::Json => json::parse_json(&text, ctx, auto)?,
        FormatKind::Yaml => json::parse_yaml(&text, ctx, auto)?,
        FormatKind::Ini => ini::parse(&text, auto)?,
        FormatKind::Regex => pattern::parse(&text, ctx.params)?,
        FormatKind::Text => text::parse(&text, ctx.params),
        // Archive kinds return above.
        _ => auto_detect(doc, ctx),
    })
}

/// Strip byte order marks, including ones decoded with the wrong charset.
pub fn strip_bom(text: &str) -> &str {
    const MARKS: &[&str] = &["\u{feff}", "\u{fffe}", "ï»¿", "þÿ", "ÿþ"];
    MARKS
        .iter()
        .find_map(|mark| text.strip_prefix(mark))
        .unwrap_or(text)
}
