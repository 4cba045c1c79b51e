use super::*;
use serde_json::json;

fn store() -> Value {
    json!({
        "store": {
            "book": [
                {"category": "reference", "author": "Nigel Rees", "title": "Sayings", "price": 8.95},
                {"category": "fiction", "author": "Evelyn Waugh", "title": "Sword", "price": 12.99},
                {"category": "fiction", "author": "Herman Melville", "title": "Moby Dick", "isbn": "0-553-21311-3", "price": 8.99},
                {"category": "fiction", "author": "J. R. R. Tolkien", "title": "The Lord", "isbn": "0-395-19395-8", "price": 22.99}
            ],
            "bicycle": {"color": "red", "price": 19.95}
        }
    })
}

fn run(doc: &Value, expr: &str) -> Vec<Value> {
    query(doc, expr).unwrap()
}

#[test]
fn wildcard_index_and_filter() {
    let doc = json!({"store": {"book": [{"price": 10}, {"price": 20}]}});
    assert_eq!(run(&doc, "$.store.book[*].price"), vec![json!(10), json!(20)]);
    assert_eq!(run(&doc, "$.store.book[0].price"), vec![json!(10)]);
    assert_eq!(run(&doc, "$.store.book[?(@.price > 15)].price"), vec![json!(20)]);
}

#[test]
fn recursive_descent() {
    let doc = store();
    assert_eq!(run(&doc, "$..author").len(), 4);
    let prices = run(&doc, "$.store..price");
    assert_eq!(prices.len(), 5);
    assert_eq!(run(&doc, "$..book[2].title"), vec![json!("Moby Dick")]);
}

#[test]
fn negative_indices_and_lists() {
    let doc = store();
    assert_eq!(run(&doc, "$..book[-1].title"), vec![json!("The Lord")]);
    assert_eq!(
        run(&doc, "$.store.book[0,-1].title"),
        vec![json!("Sayings"), json!("The Lord")]
    );
    assert_eq!(run(&doc, "$.store.book[(@.length-1)].title"), vec![json!("The Lord")]);
    assert!(run(&doc, "$.store.book[10].title").is_empty());
}

#[test]
fn slices() {
    let doc = json!({"a": [0, 1, 2, 3, 4, 5]});
    assert_eq!(run(&doc, "$.a[1:3]"), vec![json!(1), json!(2)]);
    assert_eq!(run(&doc, "$.a[:2]"), vec![json!(0), json!(1)]);
    assert_eq!(run(&doc, "$.a[-2:]"), vec![json!(4), json!(5)]);
    assert_eq!(run(&doc, "$.a[::2]"), vec![json!(0), json!(2), json!(4)]);
    assert_eq!(run(&doc, "$.a[::-2]"), vec![json!(5), json!(3), json!(1)]);
}

#[test]
fn extreme_slice_bounds_stay_in_range() {
    let doc = json!({"a": [1, 2, 3]});
    assert_eq!(run(&doc, "$.a[1:3:9223372036854775807]"), vec![json!(2)]);
    assert_eq!(run(&doc, "$.a[1::-9223372036854775808]"), vec![json!(2)]);
    assert_eq!(run(&doc, "$.a[-9223372036854775808:2]"), vec![json!(1), json!(2)]);
    assert!(run(&doc, "$.a[-9223372036854775808]").is_empty());
    assert!(query(&doc, "$.a[(@.length--9223372036854775808)]").is_err());
}

#[test]
fn quoted_names() {
    let doc = json!({"a b": {"c": 1, "d": 2}});
    assert_eq!(run(&doc, "$['a b']['c','d']"), vec![json!(1), json!(2)]);
    assert_eq!(run(&doc, "$[\"a b\"].c"), vec![json!(1)]);
}

#[test]
fn filter_operators() {
    let doc = store();
    assert_eq!(run(&doc, "$..book[?(@.isbn)].title").len(), 2);
    assert_eq!(
        run(&doc, "$..book[?(@.category == 'reference')].author"),
        vec![json!("Nigel Rees")]
    );
    assert_eq!(run(&doc, "$..book[?(@.category != 'fiction')]").len(), 1);
    assert_eq!(run(&doc, "$..book[?(@.price <= 8.99)]").len(), 2);
    assert_eq!(
        run(&doc, "$..book[?(@.author =~ /melville/i)].title"),
        vec![json!("Moby Dick")]
    );
}

#[test]
fn filter_boolean_logic() {
    let doc = store();
    assert_eq!(
        run(&doc, "$..book[?(@.category == 'fiction' and @.price < 10)].title"),
        vec![json!("Moby Dick")]
    );
    assert_eq!(
        run(&doc, "$..book[?(@.price < 9 && not @.isbn)].title"),
        vec![json!("Sayings")]
    );
    assert_eq!(run(&doc, "$..book[?(@.price > 20 || @.price < 9)]").len(), 3);
}

#[test]
fn filter_with_root_reference() {
    let doc = json!({"limit": 15, "items": [{"v": 10}, {"v": 20}]});
    assert_eq!(run(&doc, "$.items[?(@.v > $.limit)].v"), vec![json!(20)]);
}

#[test]
fn terminal_length_is_per_element() {
    let doc = json!({"groups": [{"m": [1, 2]}, {"m": [1, 2, 3]}]});
    assert_eq!(run(&doc, "$.groups.length"), vec![json!(2)]);
    assert_eq!(run(&doc, "$.groups[*].m.length"), vec![json!(2), json!(3)]);
    assert_eq!(
        run(&doc, "$.groups[?(@.m.length > 2)].m[0]"),
        vec![json!(1)]
    );
}

#[test]
fn empty_selection_halts() {
    let doc = store();
    assert!(run(&doc, "$.missing.book[*].price").is_empty());
    assert!(run(&doc, "$.missing.length").is_empty());
}

#[test]
fn divergence_flag() {
    assert!(JsonPath::parse("$.a.b[0]").unwrap().is_definite());
    assert!(!JsonPath::parse("$.a[*]").unwrap().is_definite());
    assert!(!JsonPath::parse("$..a").unwrap().is_definite());
    assert!(!JsonPath::parse("$.a[0,1]").unwrap().is_definite());
    assert!(!JsonPath::parse("$.a[?(@.x)]").unwrap().is_definite());
}

#[test]
fn input_is_not_modified() {
    let doc = store();
    let before = doc.clone();
    let _ = run(&doc, "$..book[?(@.price > 1)]");
    assert_eq!(doc, before);
}

#[test]
fn malformed_expressions_error() {
    assert!(matches!(
        JsonPath::parse("$.a[0"),
        Err(JsonPathError::Unbalanced { .. })
    ));
    assert!(matches!(
        JsonPath::parse("$.a]"),
        Err(JsonPathError::Unbalanced { .. })
    ));
    assert!(matches!(
        JsonPath::parse("$.a[?(@.x > )]"),
        Err(JsonPathError::InvalidFilter { .. })
    ));
    assert!(matches!(
        JsonPath::parse("$.a[1:2:3:4]"),
        Err(JsonPathError::UnexpectedSegment { .. })
    ));
}
