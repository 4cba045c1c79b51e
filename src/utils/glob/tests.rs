use super::*;

#[test]
fn star_and_question_mark() {
    assert!(wildcard_match("*.csv", "data.csv"));
    assert!(wildcard_match("data?.csv", "data1.csv"));
    assert!(wildcard_match("*", ""));
    assert!(wildcard_match("a*b*c", "axxbyyc"));
    assert!(!wildcard_match("*.csv", "data.tsv"));
    assert!(!wildcard_match("data?.csv", "data.csv"));
}

#[test]
fn path_patterns() {
    assert!(path_match("*.csv", "nested/dir/data.csv"));
    assert!(path_match("nested/*.csv", "nested/data.csv"));
    assert!(!path_match("other/*.csv", "nested/data.csv"));
    assert!(path_match("data.csv", "./data.csv"));
}

#[test]
fn detects_patterns() {
    assert!(is_pattern("*.log"));
    assert!(is_pattern("a?c"));
    assert!(!is_pattern("plain.txt"));
}
