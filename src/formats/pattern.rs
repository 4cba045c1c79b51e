use super::ParseError;
use crate::core::ColumnValueSet;
use crate::params::RequestParams;
use crate::utils::regex_cache::compile_user_pattern;

/// Every match of the `regex` parameter is a row. Named groups become
/// columns by name, unnamed groups by index; a pattern without groups
/// yields column `0` holding the whole match.
pub fn parse(text: &str, params: &RequestParams) -> Result<ColumnValueSet, ParseError> {
    let pattern = params
        .non_empty("regex")
        .ok_or(ParseError::Regex("no 'regex' pattern given".to_string()))?;
    let regex = compile_user_pattern(pattern).map_err(|e| ParseError::Regex(e.to_string()))?;

    let names: Vec<String> = if regex.captures_len() == 1 {
        vec!["0".to_string()]
    } else {
        regex
            .capture_names()
            .enumerate()
            .skip(1)
            .map(|(i, name)| name.map(str::to_string).unwrap_or_else(|| i.to_string()))
            .collect()
    };
    let first_group = if regex.captures_len() == 1 { 0 } else { 1 };

    let mut values = ColumnValueSet::new();
    for name in &names {
        values.set(name, Vec::new());
    }
    for caps in regex.captures_iter(text) {
        for (offset, name) in names.iter().enumerate() {
            let value = caps
                .get(first_group + offset)
                .map(|m| m.as_str())
                .unwrap_or("");
            values.push(name, value);
        }
    }
    Ok(values)
}
