//! Shell-style wildcard matching for directory walks and archive members.

/// Whether `pattern` uses `*` or `?`.
pub fn is_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Match `name` against `pattern` where `*` spans any run of characters
/// and `?` one character. Matching is case-sensitive.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match a member path: patterns containing `/` match the whole path,
/// others match the final component only.
pub fn path_match(pattern: &str, path: &str) -> bool {
    let path = path.trim_start_matches("./");
    if pattern.contains('/') {
        wildcard_match(pattern.trim_start_matches("./"), path)
    } else {
        let file = path.rsplit('/').next().unwrap_or(path);
        wildcard_match(pattern, file)
    }
}

#[cfg(test)]
mod tests;
