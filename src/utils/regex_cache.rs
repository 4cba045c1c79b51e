//! Regex compilation cache for performance optimization
//!
//! Parsers, validators and JSONPath filters compile user-supplied patterns on
//! every request; this cache avoids recompiling the same pattern repeatedly.

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Global cache for compiled regex patterns
static REGEX_CACHE: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Get or compile a regex pattern from the cache
///
/// # Examples
/// ```
/// use extdata::utils::regex_cache::get_cached_regex;
///
/// let regex = get_cached_regex(r"\d+").unwrap();
/// assert!(regex.is_match("123"));
/// ```
pub fn get_cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    if let Ok(cache) = REGEX_CACHE.lock()
        && let Some(regex) = cache.get(pattern)
    {
        return Ok(regex.clone());
    }

    let regex = Regex::new(pattern)?;

    if let Ok(mut cache) = REGEX_CACHE.lock() {
        cache.insert(pattern.to_string(), regex.clone());
    }

    Ok(regex)
}

/// Compile a pattern written either bare (`\d+`) or delimited with flags
/// (`/\d+/i`, `#a.b#s`). Supported flags: `i`, `m`, `s`, `x`, `u`.
pub fn compile_user_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let Some((body, flags)) = split_delimited(pattern) else {
        return get_cached_regex(pattern);
    };

    let cache_key = format!("\u{0}{}\u{0}{}", flags, body);
    if let Ok(cache) = REGEX_CACHE.lock()
        && let Some(regex) = cache.get(&cache_key)
    {
        return Ok(regex.clone());
    }

    let regex = RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()?;

    if let Ok(mut cache) = REGEX_CACHE.lock() {
        cache.insert(cache_key, regex.clone());
    }
    Ok(regex)
}

/// `/body/flags` -> (body, flags) when the pattern is delimited.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next()?;
    if !matches!(delimiter, '/' | '#' | '~' | '@' | '%') {
        return None;
    }
    let end = pattern.rfind(delimiter)?;
    if end == 0 {
        return None;
    }
    let flags = &pattern[end + 1..];
    if !flags.chars().all(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'u')) {
        return None;
    }
    Some((&pattern[1..end], flags))
}

/// Check if a pattern is already cached
pub fn is_cached(pattern: &str) -> bool {
    REGEX_CACHE
        .lock()
        .map(|cache| cache.contains_key(pattern))
        .unwrap_or(false)
}
