//! Character set resolution and transcoding to UTF-8.
//!
//! Precedence: explicit `encoding` > byte order mark > `<?xml encoding>` or
//! `<meta charset>` > `Content-Type` charset > the first error-free decode
//! among the `encodings` candidates (default UTF-8, then windows-1252).
//! The `replacements` table is applied to the decoded text.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::Regex;
use std::sync::LazyLock;

use crate::core::Document;
use crate::formats::archive::is_archive_bytes;
use crate::params::RequestParams;
use crate::ui;

/// How far into the body in-document charset hints are looked for.
const HINT_WINDOW: usize = 2048;

static XML_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<\?xml[^>]*\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("Invalid regex pattern")
});

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9._:-]+)"#).expect("Invalid regex pattern")
});

static CONTENT_TYPE_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"#).expect("Invalid regex pattern")
});

/// Decode fetched bytes to UTF-8 text and apply configured replacements.
pub fn decode(bytes: &[u8], params: &RequestParams, content_type: Option<&str>) -> String {
    let text = transcode(bytes, params, content_type);
    apply_replacements(text, params)
}

/// Turn fetched bytes into a document: archives stay binary for the
/// archive parser, everything else is decoded now so the cache holds UTF-8.
pub fn to_document(
    name: Option<String>,
    bytes: Vec<u8>,
    content_type: Option<String>,
    params: &RequestParams,
) -> Document {
    let mut doc = if is_archive_bytes(&bytes) {
        Document::binary(name, bytes)
    } else {
        let text = decode(&bytes, params, content_type.as_deref());
        Document::text(name, text)
    };
    doc.content_type = content_type;
    doc
}

fn transcode(bytes: &[u8], params: &RequestParams, content_type: Option<&str>) -> String {
    if let Some(label) = params.non_empty("encoding") {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => return encoding.decode_with_bom_removal(bytes).0.into_owned(),
            None => ui::verbose(&format!("Unknown encoding '{}', detecting instead", label)),
        }
    }

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding
            .decode_without_bom_handling(&bytes[bom_len..])
            .0
            .into_owned();
    }

    if let Some(encoding) = document_hint(bytes).or_else(|| content_type.and_then(header_charset)) {
        return encoding.decode_without_bom_handling(bytes).0.into_owned();
    }

    detect(bytes, &candidates(params))
}

fn document_hint(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HINT_WINDOW)]);
    XML_DECLARATION
        .captures(&head)
        .or_else(|| META_CHARSET.captures(&head))
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()))
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    CONTENT_TYPE_CHARSET
        .captures(content_type)
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()))
}

fn candidates(params: &RequestParams) -> Vec<&'static Encoding> {
    let configured: Vec<&'static Encoding> = params
        .list("encodings")
        .iter()
        .filter_map(|label| Encoding::for_label(label.as_bytes()))
        .collect();
    if configured.is_empty() {
        vec![UTF_8, WINDOWS_1252]
    } else {
        configured
    }
}

/// First candidate that decodes without errors; otherwise the one with the
/// fewest replacement characters.
fn detect(bytes: &[u8], candidates: &[&'static Encoding]) -> String {
    for encoding in candidates {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return text.into_owned();
        }
    }

    candidates
        .iter()
        .map(|encoding| encoding.decode_without_bom_handling(bytes).0.into_owned())
        .min_by_key(|text| text.matches('\u{fffd}').count())
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

fn apply_replacements(text: String, params: &RequestParams) -> String {
    let table = params.table("replacements");
    if table.is_empty() {
        return text;
    }
    table
        .iter()
        .filter(|(from, _)| !from.is_empty())
        .fold(text, |text, (from, to)| text.replace(from.as_str(), to))
}
