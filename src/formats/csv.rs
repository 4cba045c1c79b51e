use ::csv::{ReaderBuilder, Trim};

use super::{FormatKind, ParseError, strip_bom};
use crate::core::ColumnValueSet;
use crate::params::RequestParams;

/// Parse delimited text into columns keyed by header name, or by 1-based
/// position when there is no header.
pub fn parse(
    text: &str,
    kind: FormatKind,
    params: &RequestParams,
    auto: bool,
) -> Result<ColumnValueSet, ParseError> {
    let text = strip_bom(text);
    let delimiter = delimiter(text, kind, params, auto)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Csv(e.to_string()))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(ParseError::NoData("CSV"));
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if auto && (width < 2 || rows.iter().any(|row| row.len() != width)) {
        return Err(ParseError::Csv(
            "rows do not share a consistent column count".to_string(),
        ));
    }

    let header = matches!(kind, FormatKind::CsvWithHeader | FormatKind::TsvWithHeader)
        || params.flag("header")
        || (auto && looks_like_header(&rows));

    let names: Vec<String> = if header {
        let first = rows.remove(0);
        (0..width)
            .map(|i| match first.get(i) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => (i + 1).to_string(),
            })
            .collect()
    } else {
        (1..=width).map(|i| i.to_string()).collect()
    };

    let mut values = ColumnValueSet::new();
    for name in &names {
        values.set(name, Vec::with_capacity(rows.len()));
    }
    for row in rows {
        for (i, name) in names.iter().enumerate() {
            values.push(name, row.get(i).cloned().unwrap_or_default());
        }
    }
    Ok(values)
}

fn delimiter(text: &str, kind: FormatKind, params: &RequestParams, auto: bool) -> Result<u8, ParseError> {
    if let Some(custom) = params.text("delimiter").filter(|d| !d.is_empty()) {
        let custom = match custom {
            "\\t" | "tab" => "\t",
            other => other,
        };
        return match custom.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ParseError::Csv(format!(
                "delimiter must be a single byte, got '{}'",
                custom
            ))),
        };
    }

    if matches!(kind, FormatKind::Tsv | FormatKind::TsvWithHeader) {
        return Ok(b'\t');
    }
    if !auto {
        return Ok(b',');
    }

    // Sniff the first line for the most frequent candidate.
    let first_line = text.lines().next().unwrap_or("");
    let best = [b',', b'\t', b';', b'|']
        .into_iter()
        .map(|d| (d, first_line.bytes().filter(|b| *b == d).count()))
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(d, _)| d);
    Ok(best.unwrap_or(b','))
}

/// A first row of distinct, non-numeric labels over at least one data row.
fn looks_like_header(rows: &[Vec<String>]) -> bool {
    let Some(first) = rows.first() else {
        return false;
    };
    if rows.len() < 2 {
        return false;
    }
    let labels_ok = first
        .iter()
        .all(|cell| !cell.is_empty() && cell.parse::<f64>().is_err());
    let mut seen = std::collections::HashSet::new();
    let distinct = first.iter().all(|cell| seen.insert(cell.to_lowercase()));
    labels_ok && distinct
}
