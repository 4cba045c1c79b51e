use super::JsonPathError;
use super::filter::{FilterExpr, parse_filter};

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name` or `['name']`
    Child(String),
    /// `.*` or `[*]`
    Wildcard,
    /// `['a','b']`
    Names(Vec<String>),
    /// `[0]`, `[0,-1]`
    Indices(Vec<i64>),
    /// `[start:end:step]`
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
    /// `[?( expr )]`
    Filter(Box<FilterExpr>),
    /// `..` followed by any other selector
    Recursive(Box<Segment>),
    /// `.length`
    Length,
}

impl Segment {
    /// Whether the segment can yield several nodes from one input node.
    pub fn diverges(&self) -> bool {
        match self {
            Segment::Child(_) | Segment::Length => false,
            Segment::Names(names) => names.len() > 1,
            Segment::Indices(indices) => indices.len() > 1,
            Segment::Wildcard
            | Segment::Slice { .. }
            | Segment::Filter(_)
            | Segment::Recursive(_) => true,
        }
    }
}

/// Split a path expression into segments. The expression may start with
/// `$` (document root) or `@` (current node); a bare `a.b` is read as `$.a.b`.
pub fn parse_segments(expression: &str) -> Result<Vec<Segment>, JsonPathError> {
    let source = expression.trim();
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut segments = Vec::new();

    if matches!(chars.first(), Some('$') | Some('@')) {
        pos = 1;
    } else if !chars.is_empty() && chars[0] != '.' && chars[0] != '[' {
        // Relative shorthand: read the first name as a child segment.
        let (name, next) = read_name(&chars, 0);
        segments.push(Segment::Child(name));
        pos = next;
    }

    while pos < chars.len() {
        match chars[pos] {
            '.' if chars.get(pos + 1) == Some(&'.') => {
                pos += 2;
                let (inner, next) = match chars.get(pos) {
                    Some('[') => {
                        let (content, next) = bracket_content(source, &chars, pos)?;
                        (parse_bracket(source, &content)?, next)
                    }
                    Some('*') => (Segment::Wildcard, pos + 1),
                    Some(_) => {
                        let (name, next) = read_name(&chars, pos);
                        if name.is_empty() {
                            return Err(unexpected(source, &chars[pos..]));
                        }
                        (Segment::Child(name), next)
                    }
                    None => return Err(unexpected(source, &['.', '.'])),
                };
                segments.push(Segment::Recursive(Box::new(inner)));
                pos = next;
            }
            '.' => {
                pos += 1;
                if chars.get(pos) == Some(&'*') {
                    segments.push(Segment::Wildcard);
                    pos += 1;
                    continue;
                }
                let (name, next) = read_name(&chars, pos);
                if name.is_empty() {
                    return Err(unexpected(source, &chars[pos - 1..]));
                }
                pos = next;
                if name == "length" && pos >= chars.len() {
                    segments.push(Segment::Length);
                } else {
                    segments.push(Segment::Child(name));
                }
            }
            '[' => {
                let (content, next) = bracket_content(source, &chars, pos)?;
                segments.push(parse_bracket(source, &content)?);
                pos = next;
            }
            ']' | ')' => {
                return Err(JsonPathError::Unbalanced {
                    expression: source.to_string(),
                    position: pos,
                });
            }
            _ => return Err(unexpected(source, &chars[pos..])),
        }
    }

    Ok(segments)
}

fn unexpected(expression: &str, rest: &[char]) -> JsonPathError {
    JsonPathError::UnexpectedSegment {
        expression: expression.to_string(),
        segment: rest.iter().collect(),
    }
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], '.' | '[' | ']' | '(' | ')') {
        end += 1;
    }
    (chars[start..end].iter().collect::<String>().trim().to_string(), end)
}

/// Content between `[` at `open` and its matching `]`, and the index after it.
fn bracket_content(
    expression: &str,
    chars: &[char],
    open: usize,
) -> Result<(String, usize), JsonPathError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = open;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if c != ']' {
                            break;
                        }
                        return Ok((chars[open + 1..i].iter().collect(), i + 1));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    Err(JsonPathError::Unbalanced {
        expression: expression.to_string(),
        position: open,
    })
}

fn parse_bracket(expression: &str, content: &str) -> Result<Segment, JsonPathError> {
    let content = content.trim();

    if content == "*" {
        return Ok(Segment::Wildcard);
    }

    if let Some(filter) = content.strip_prefix('?') {
        let filter = filter.trim();
        let inner = filter
            .strip_prefix('(')
            .and_then(|f| f.strip_suffix(')'))
            .ok_or_else(|| JsonPathError::InvalidFilter {
                filter: filter.to_string(),
                reason: "filter must be wrapped in parentheses".to_string(),
            })?;
        return Ok(Segment::Filter(Box::new(parse_filter(inner)?)));
    }

    // `(@.length-1)` script index
    if let Some(script) = content.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
        let compact: String = script.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(offset) = compact.strip_prefix("@.length-")
            && let Some(index) = offset.parse::<i64>().ok().and_then(i64::checked_neg)
        {
            return Ok(Segment::Indices(vec![index]));
        }
        return Err(unexpected(expression, &content.chars().collect::<Vec<_>>()));
    }

    let parts = crate::params::split_top_level(content, ',');

    if parts.iter().all(|p| is_quoted(p.trim())) {
        let names = parts.iter().map(|p| unquote(p.trim())).collect::<Vec<_>>();
        return Ok(match names.len() {
            1 => Segment::Child(names.into_iter().next().unwrap_or_default()),
            _ => Segment::Names(names),
        });
    }

    if parts.len() == 1 && content.contains(':') {
        return parse_slice(expression, content);
    }

    let indices: Option<Vec<i64>> = parts.iter().map(|p| p.trim().parse::<i64>().ok()).collect();
    if let Some(indices) = indices {
        return Ok(Segment::Indices(indices));
    }

    if parts.len() == 1 && !content.is_empty() {
        return Ok(Segment::Child(content.to_string()));
    }

    Err(unexpected(expression, &content.chars().collect::<Vec<_>>()))
}

fn parse_slice(expression: &str, content: &str) -> Result<Segment, JsonPathError> {
    let fields: Vec<&str> = content.split(':').map(str::trim).collect();
    if fields.len() > 3 {
        return Err(unexpected(expression, &content.chars().collect::<Vec<_>>()));
    }
    let number = |s: &str| -> Result<Option<i64>, JsonPathError> {
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<i64>()
            .map(Some)
            .map_err(|_| unexpected(expression, &content.chars().collect::<Vec<_>>()))
    };
    let start = number(fields[0])?;
    let end = number(fields.get(1).copied().unwrap_or(""))?;
    let step = number(fields.get(2).copied().unwrap_or(""))?.unwrap_or(1);
    Ok(Segment::Slice {
        start,
        end,
        step: if step == 0 { 1 } else { step },
    })
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
}

pub(super) fn unquote(s: &str) -> String {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
