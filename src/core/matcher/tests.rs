use super::*;

fn table() -> ConstraintTable<&'static str> {
    ConstraintTable::new()
        .with(vec![Constraint::Is("kind", "special"), Constraint::Present("id")], "special")
        .with(vec![Constraint::Present("id")], "by-id")
        .with(vec![], "fallback")
}

#[test]
fn first_match_respects_order() {
    let params = RequestParams::from_pairs(["kind=SPECIAL", "id=1"]);
    assert_eq!(table().first_match(&params), Some("special"));

    let params = RequestParams::from_pairs(["kind=other", "id=1"]);
    assert_eq!(table().first_match(&params), Some("by-id"));

    let params = RequestParams::from_pairs(["kind=special"]);
    assert_eq!(table().first_match(&params), Some("fallback"));
}

#[test]
fn present_accepts_bare_flags() {
    let params = RequestParams::from_pairs(["id"]);
    assert!(Constraint::Present("id").holds(&params));
    assert!(!Constraint::Is("id", "").holds(&params));
}

#[test]
fn no_entry_no_match() {
    let table: ConstraintTable<u8> = ConstraintTable::new().with(vec![Constraint::Present("x")], 1);
    assert_eq!(table.first_match(&RequestParams::new()), None);
}

#[test]
fn wildcard_needs_a_pattern_value() {
    let walk = Constraint::Wildcard("file name");
    assert!(walk.holds(&RequestParams::from_pairs(["file name=*.csv"])));
    assert!(walk.holds(&RequestParams::from_pairs(["file name=report-?.txt"])));
    assert!(!walk.holds(&RequestParams::from_pairs(["file name=report.txt"])));
    assert!(!walk.holds(&RequestParams::from_pairs(["file name"])));
}
