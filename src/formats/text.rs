use crate::core::{ColumnValueSet, pseudo};
use crate::params::RequestParams;

/// The body as one `__text` value, cut to the requested line window.
///
/// `start line`/`end line` are 1-based and inclusive; `header lines` and
/// `footer lines` drop lines from either end first. The resulting window is
/// recorded in `__start`/`__end`.
pub fn parse(text: &str, params: &RequestParams) -> ColumnValueSet {
    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();

    let header = count(params, "header lines");
    let footer = count(params, "footer lines");
    let mut first = header + 1;
    let mut last = total.saturating_sub(footer);

    if let Some(start) = params.number("start line").filter(|n| *n > 0) {
        first = first.max(start as usize);
    }
    if let Some(end) = params.number("end line").filter(|n| *n > 0) {
        last = last.min(end as usize);
    }

    let body = if first <= last && first <= total {
        lines[first - 1..last].join("\n")
    } else {
        String::new()
    };

    let mut values = ColumnValueSet::new();
    values.set_meta(pseudo::TEXT, body);
    values.set_meta(pseudo::START, first.to_string());
    values.set_meta(pseudo::END, last.to_string());
    values
}

fn count(params: &RequestParams, key: &str) -> usize {
    params
        .number(key)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "title\nline 2\nline 3\nline 4\nfooter";

    fn window(pairs: &[&str]) -> (String, String, String) {
        let values = parse(BODY, &RequestParams::from_pairs(pairs.iter().copied()));
        let get = |k: &str| values.get(k).unwrap()[0].clone();
        (get(pseudo::TEXT), get(pseudo::START), get(pseudo::END))
    }

    #[test]
    fn whole_body_by_default() {
        assert_eq!(window(&[]), (BODY.to_string(), "1".into(), "5".into()));
    }

    #[test]
    fn header_and_footer_lines_are_dropped() {
        let (text, start, end) = window(&["header lines=1", "footer lines=1"]);
        assert_eq!(text, "line 2\nline 3\nline 4");
        assert_eq!((start.as_str(), end.as_str()), ("2", "4"));
    }

    #[test]
    fn explicit_window() {
        let (text, _, _) = window(&["start line=3", "end line=3"]);
        assert_eq!(text, "line 3");
    }

    #[test]
    fn empty_window_past_the_end() {
        let (text, _, _) = window(&["start line=9"]);
        assert_eq!(text, "");
        let values = parse(BODY, &RequestParams::from_pairs(["start line=9"]));
        assert!(!values.has_data());
    }
}
