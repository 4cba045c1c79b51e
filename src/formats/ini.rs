use regex::Regex;
use std::sync::LazyLock;

use super::{ParseError, strip_bom};
use crate::core::{ColumnValueSet, pseudo};

/// Section header, comment, or `key = value` (`\=` escapes an equals sign
/// inside the key).
static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:\[(?P<section>[^\]]*)\]|[#;](?P<comment>.*)|(?P<key>(?:\\.|[^=\\\[#;])(?:\\.|[^=\\])*?)\s*=\s*(?P<value>.*?))\s*$",
    )
    .expect("Invalid regex pattern")
});

pub fn parse(text: &str, auto: bool) -> Result<ColumnValueSet, ParseError> {
    let mut values = ColumnValueSet::new();
    let mut section = String::new();
    let mut keys = 0usize;

    for (number, line) in strip_bom(text).lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = LINE.captures(line) else {
            if auto {
                return Err(ParseError::Ini(format!("line {} is not a key/value pair", number + 1)));
            }
            continue;
        };

        if let Some(name) = caps.name("section") {
            section = name.as_str().trim().to_string();
        } else if let Some(comment) = caps.name("comment") {
            values.push(pseudo::COMMENTS, comment.as_str().trim());
        } else if let (Some(key), Some(value)) = (caps.name("key"), caps.name("value")) {
            let key = key.as_str().trim().replace("\\=", "=");
            let name = if section.is_empty() {
                key
            } else {
                format!("{}.{}", section, key)
            };
            values.push(&name, unquote(value.as_str()));
            keys += 1;
        }
    }

    if keys == 0 {
        return Err(ParseError::NoData("ini"));
    }
    Ok(values)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
