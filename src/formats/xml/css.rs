//! CSS selector to XPath translation.
//!
//! Handles type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`), descendant and `>`
//! combinators, `:first-child`/`:last-child`, selector groups, and a
//! trailing `.attr(name)` that selects an attribute of the matched elements.

use super::xpath::XPathError;

pub fn css_to_xpath(selector: &str) -> Result<String, XPathError> {
    let (selector, attribute) = split_attr_suffix(selector.trim());

    let mut groups = Vec::new();
    for group in crate::params::split_top_level(selector, ',') {
        let group = group.trim();
        if group.is_empty() {
            return Err(invalid(selector, "empty selector group"));
        }
        let mut xpath = translate_group(group)?;
        if let Some(attribute) = &attribute {
            xpath.push_str("/@");
            xpath.push_str(attribute);
        }
        groups.push(xpath);
    }

    if groups.is_empty() {
        return Err(invalid(selector, "empty selector"));
    }
    Ok(groups.join(" | "))
}

fn invalid(selector: &str, reason: &str) -> XPathError {
    XPathError::Syntax {
        expression: selector.to_string(),
        reason: reason.to_string(),
    }
}

/// `a.link.attr(href)` -> (`a.link`, Some(`href`))
fn split_attr_suffix(selector: &str) -> (&str, Option<String>) {
    if let Some(body) = selector.strip_suffix(')')
        && let Some(index) = body.rfind(".attr(")
    {
        let name = body[index + ".attr(".len()..]
            .trim()
            .trim_matches(|c| c == '\'' || c == '"');
        if !name.is_empty() {
            return (&selector[..index], Some(name.to_string()));
        }
    }
    (selector, None)
}

fn translate_group(group: &str) -> Result<String, XPathError> {
    let chars: Vec<char> = group.chars().collect();
    let mut out = String::from("//");
    let mut i = 0;
    let mut expect_compound = true;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '>' {
            // Combinator: whitespace alone is descendant, `>` is child.
            let mut child = false;
            while i < chars.len() && (chars[i].is_whitespace() || chars[i] == '>') {
                child |= chars[i] == '>';
                i += 1;
            }
            if i >= chars.len() {
                break;
            }
            out.push_str(if child { "/" } else { "//" });
            expect_compound = true;
            continue;
        }

        if !expect_compound {
            return Err(invalid(group, "unexpected character"));
        }

        let (compound, next) = translate_compound(group, &chars, i)?;
        out.push_str(&compound);
        i = next;
        expect_compound = false;
    }

    Ok(out)
}

fn translate_compound(group: &str, chars: &[char], start: usize) -> Result<(String, usize), XPathError> {
    let mut i = start;
    let mut element = String::new();
    let mut predicates = Vec::new();

    if chars[i] == '*' {
        element.push('*');
        i += 1;
    } else {
        while i < chars.len() && is_ident(chars[i]) {
            element.push(chars[i]);
            i += 1;
        }
    }
    if element.is_empty() {
        element.push('*');
    }

    while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
        match chars[i] {
            '#' => {
                let (name, next) = read_ident(chars, i + 1);
                if name.is_empty() {
                    return Err(invalid(group, "empty id selector"));
                }
                predicates.push(format!("@id={}", quote(&name)));
                i = next;
            }
            '.' => {
                let (name, next) = read_ident(chars, i + 1);
                if name.is_empty() {
                    return Err(invalid(group, "empty class selector"));
                }
                predicates.push(contains_word("@class", &name));
                i = next;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| invalid(group, "unclosed attribute selector"))?;
                let inner: String = chars[i + 1..end].iter().collect();
                predicates.push(attribute_predicate(group, &inner)?);
                i = end + 1;
            }
            ':' => {
                let (name, next) = read_ident(chars, i + 1);
                predicates.push(match name.as_str() {
                    "first-child" => "not(preceding-sibling::*)".to_string(),
                    "last-child" => "not(following-sibling::*)".to_string(),
                    _ => return Err(invalid(group, &format!("unsupported pseudo-class ':{}'", name))),
                });
                i = next;
            }
            _ => return Err(invalid(group, "unexpected character")),
        }
    }

    let mut xpath = element;
    for predicate in predicates {
        xpath.push('[');
        xpath.push_str(&predicate);
        xpath.push(']');
    }
    Ok((xpath, i))
}

fn attribute_predicate(group: &str, inner: &str) -> Result<String, XPathError> {
    let operators = ["~=", "^=", "$=", "*=", "|=", "="];
    for op in operators {
        if let Some((name, value)) = inner.split_once(op) {
            let attr = format!("@{}", name.trim());
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            return Ok(match op {
                "=" => format!("{}={}", attr, quote(value)),
                "~=" => contains_word(&attr, value),
                "^=" => format!("starts-with({}, {})", attr, quote(value)),
                "*=" => format!("contains({}, {})", attr, quote(value)),
                "$=" => format!("ends-with({}, {})", attr, quote(value)),
                _ => format!(
                    "{}={} or starts-with({}, {})",
                    attr,
                    quote(value),
                    attr,
                    quote(&format!("{}-", value))
                ),
            });
        }
    }
    let name = inner.trim();
    if name.is_empty() {
        return Err(invalid(group, "empty attribute selector"));
    }
    Ok(format!("@{}", name))
}

fn contains_word(attr: &str, word: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space({}), ' '), {})",
        attr,
        quote(&format!(" {} ", word))
    )
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && is_ident(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}
