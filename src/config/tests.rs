use super::*;
use crate::params::{ParamValue, RequestParams};
use std::io::Write as _;

const SAMPLE: &str = r#"
description "Test registry"

preset "slow" {
    throttle-key "$host$"
    throttle-interval 10
}

legacy {
    cache-expire-time 600
    db-server "shop" "legacy.example.org"
    db-server-type "shop" "mysql"
}

source "*" {
    timeout 30
    cache-seconds 60
}

source "example.org" {
    timeout 20
    user-agent "domain"
}

source "api.example.org" {
    preset "slow"
    timeout 10
    headers {
        Accept "application/json"
        X-Key "$key$"
    }
    defaults {
        format "json"
    }
    required "q"
    validate {
        q "alnum"
    }
}

source "shop" {
    server "db.example.org"
    prepared {
        by-sku "SELECT * FROM items WHERE sku = ?"
    }
}
"#;

fn registry() -> Registry {
    kdl::parse_registry(SAMPLE, None).unwrap()
}

fn request(pairs: &[&str]) -> RequestParams {
    RequestParams::from_pairs(pairs.iter().copied())
}

#[test]
fn most_specific_scope_wins_per_key() {
    let out = registry().supplement(&request(&["url=https://api.example.org/v1", "q=abc"]));
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    assert_eq!(out.params.text("timeout"), Some("10"));
    assert_eq!(out.params.text("user agent"), Some("domain"));
    assert_eq!(out.params.text("cache seconds"), Some("60"));
    assert_eq!(out.scopes, vec!["api.example.org", "example.org", "*"]);
}

#[test]
fn site_values_override_caller_and_defaults_only_fill() {
    let out = registry().supplement(&request(&[
        "url=https://api.example.org/v1",
        "q=abc",
        "timeout=99",
        "format=csv",
    ]));
    assert_eq!(out.params.text("timeout"), Some("10"));
    assert_eq!(out.params.text("format"), Some("csv"));

    let out = registry().supplement(&request(&["url=https://api.example.org/v1", "q=abc"]));
    assert_eq!(out.params.text("format"), Some("json"));
}

#[test]
fn site_values_expand_caller_parameters() {
    let out = registry().supplement(&request(&["url=https://api.example.org/", "q=x", "key=s3cret"]));
    let headers = out.params.table("headers");
    assert_eq!(headers.get("X-Key").map(String::as_str), Some("s3cret"));
    assert_eq!(headers.get("Accept").map(String::as_str), Some("application/json"));
}

#[test]
fn program_templates_are_not_expanded_early() {
    let registry = kdl::parse_registry("source \"report\" {\n    command \"report --user $user$\"\n}\n", None).unwrap();
    let out = registry.supplement(&request(&["program=report", "user=alice; id"]));
    assert_eq!(out.params.text("command"), Some("report --user $user$"));
}

#[test]
fn presets_fill_missing_keys() {
    let out = registry().supplement(&request(&["url=https://api.example.org/", "q=x"]));
    assert_eq!(out.params.text("throttle key"), Some("$host$"));
    assert_eq!(out.params.text("throttle interval"), Some("10"));
}

#[test]
fn required_and_validators_report_errors() {
    let out = registry().supplement(&request(&["url=https://api.example.org/"]));
    assert!(out.errors.contains("Missing required parameter: q"));

    let out = registry().supplement(&request(&["url=https://api.example.org/", "q=a b"]));
    assert!(out.errors.contains("Invalid value for 'q'"));
}

#[test]
fn declarative_settings_beat_legacy_ones() {
    let out = registry().supplement(&request(&["db=shop"]));
    assert_eq!(out.params.text("server"), Some("db.example.org"));
    assert_eq!(out.params.text("type"), Some("mysql"));
    assert_eq!(
        out.params.table("prepared").get("by-sku").map(String::as_str),
        Some("SELECT * FROM items WHERE sku = ?")
    );
    // The declared `*` scope wins over the legacy global.
    assert_eq!(out.params.text("cache seconds"), Some("60"));
}

#[test]
fn unknown_source_is_reported() {
    let out = registry().supplement(&request(&["source=ghost"]));
    assert!(out.errors.contains("Unknown source 'ghost'"));
}

#[test]
fn flags_lists_and_tables() {
    let registry = kdl::parse_registry(
        r#"source "x" {
            use-stale-cache
            encodings "utf-8" "iso-8859-1"
            env {
                LANG "C"
            }
        }"#,
        None,
    )
    .unwrap();
    let settings = registry.get("X").unwrap();
    assert_eq!(settings.get("use stale cache"), Some(&Setting::Flag));
    assert_eq!(
        settings.get("encodings"),
        Some(&Setting::List(vec!["utf-8".into(), "iso-8859-1".into()]))
    );
    let params = registry.supplement(&request(&["file=x"])).params;
    assert!(matches!(params.get("env"), Some(ParamValue::Table(_))));
}

#[test]
fn unknown_preset_fails_the_build() {
    let err = kdl::parse_registry(r#"source "x" { preset "nope" }"#, None).unwrap_err();
    assert!(err.to_string().contains("unknown preset 'nope'"));
}

#[test]
fn syntax_errors_point_at_the_line() {
    let err = kdl::parse_registry("source \"x\" {\n  timeout 10\n", Some("sources.kdl")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("KDL parsing error"));
}

#[test]
fn missing_file_yields_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = load_registry(&dir.path().join("absent.kdl")).unwrap();
    assert!(registry.is_empty());

    let path = dir.path().join("sources.kdl");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    assert!(load_registry(&path).unwrap().len() >= 4);
}
