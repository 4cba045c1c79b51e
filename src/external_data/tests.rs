use super::*;
use crate::config::kdl::parse_registry;
use crate::connectors::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::fetch::clock::ManualClock;
use crate::fetch::jobs::MemoryJobQueue;
use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct CannedTransport {
    bodies: Mutex<VecDeque<String>>,
    calls: Mutex<usize>,
}

impl CannedTransport {
    fn new(bodies: &[&str]) -> Self {
        Self {
            bodies: Mutex::new(bodies.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl HttpTransport for CannedTransport {
    fn send(&self, _request: &HttpRequest) -> Result<HttpResponse> {
        *self.calls.lock().unwrap() += 1;
        match self.bodies.lock().unwrap().pop_front() {
            Some(body) => Ok(HttpResponse {
                status: 200,
                content_type: Some("text/csv".into()),
                body: body.into_bytes(),
            }),
            None => Ok(HttpResponse {
                status: 500,
                content_type: None,
                body: b"down".to_vec(),
            }),
        }
    }
}

fn request(pairs: &[&str]) -> RequestParams {
    RequestParams::from_pairs(pairs.iter().copied())
}

fn cells(outcome: &FetchOutcome, column: &str) -> Vec<String> {
    outcome.column(column).cloned().unwrap_or_default()
}

const PRICES: &str = "text=title,price\nApple,1.20\nBread,2.50\nCheese,7.00";

#[test]
fn inline_text_is_parsed_filtered_and_mapped() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(
        EntryPoint::Inline,
        request(&[PRICES, "format=csv with header", "data=name=title,cost=price", "filters=title=Bread"]),
    );

    assert!(!outcome.had_errors(), "{:?}", outcome.errors);
    assert_eq!(outcome.kind, Some(ConnectorKind::Inline));
    assert_eq!(cells(&outcome, "name"), vec!["Bread"]);
    assert_eq!(cells(&outcome, "cost"), vec!["2.50"]);
    assert!(!outcome.values.contains("title"));
    assert_eq!(cells(&outcome, pseudo::STALE), vec!["false"]);
    assert_eq!(cells(&outcome, pseudo::TRIES), vec!["1"]);
}

#[test]
fn unresolved_request_fetches_nothing() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::Web, request(&["text=hello"]));

    assert_eq!(outcome.kind, Some(ConnectorKind::Unresolved));
    assert!(outcome.values.is_empty());
    assert!(outcome.render_errors().unwrap().contains("No suitable connector"));
}

#[test]
fn suppressed_errors_are_still_reported() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::Web, request(&["suppress error"]));

    assert!(outcome.suppressed);
    assert!(outcome.had_errors());
    assert_eq!(outcome.render_errors(), None);
}

#[test]
fn unknown_source_is_reported() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::External, request(&["source=nowhere", "text=x"]));
    assert!(outcome.errors.contains("Unknown source 'nowhere'"));
}

#[test]
fn directory_walk_tags_rows_with_their_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("jan.csv"), "month,total\njan,10\n").unwrap();
    fs::write(dir.path().join("feb.csv"), "month,total\nfeb,12\nfeb,3\n").unwrap();
    let config = format!(
        "source \"reports\" {{\n    path \"{}\"\n}}\n",
        dir.path().display().to_string().replace('\\', "\\\\")
    );
    let registry = parse_registry(&config, None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());

    let outcome = data.run(EntryPoint::File, request(&["directory=reports", "file name=*.csv"]));

    assert!(!outcome.had_errors(), "{:?}", outcome.errors);
    assert_eq!(cells(&outcome, "total"), vec!["12", "3", "10"]);
    assert_eq!(cells(&outcome, pseudo::FILE), vec!["feb.csv", "feb.csv", "jan.csv"]);
}

#[test]
fn sqlite_source_from_site_config() {
    let dir = TempDir::new().unwrap();
    let conn = rusqlite::Connection::open(dir.path().join("stock.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE items (sku TEXT, qty INTEGER);
         INSERT INTO items VALUES ('A1', 4), ('B2', 0);",
    )
    .unwrap();
    drop(conn);

    let config = format!(
        "source \"stock\" {{\n    type \"sqlite\"\n    directory \"{}\"\n}}\n",
        dir.path().display().to_string().replace('\\', "\\\\")
    );
    let registry = parse_registry(&config, None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(
        EntryPoint::Db,
        request(&["db=stock", "from=items", "where=qty > 0", "data=code=sku"]),
    );

    assert!(!outcome.had_errors(), "{:?}", outcome.errors);
    assert_eq!(cells(&outcome, "code"), vec!["A1"]);
}

#[test]
fn missing_database_client_is_an_error() {
    let config = "source \"crm\" {\n    type \"postgres\"\n}\n";
    let registry = parse_registry(config, None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::Db, request(&["db=crm", "from=people"]));
    assert!(outcome.errors.contains("No client registered for postgres databases"));
}

#[test]
fn cached_web_fetch_reports_zero_tries() {
    let registry = Registry::empty();
    let transport = Arc::new(CannedTransport::new(&["a,b\n1,2\n"]));
    let clock = Arc::new(ManualClock::new(100));
    let services = Services::in_memory()
        .with_http(transport.clone())
        .with_clock(clock.clone());
    let data = ExternalData::new(&registry, services);
    let ask = || request(&["url=https://example.org/x.csv", "cache seconds=60"]);

    let first = data.run(EntryPoint::Web, ask());
    clock.advance(10);
    let second = data.run(EntryPoint::Web, ask());

    assert_eq!(transport.calls(), 1);
    assert_eq!(cells(&first, pseudo::TRIES), vec!["1"]);
    assert_eq!(cells(&second, pseudo::TRIES), vec!["0"]);
    assert_eq!(cells(&second, pseudo::TIME), vec!["100"]);
    assert_eq!(cells(&second, "a"), vec!["1"]);
}

#[test]
fn throttled_request_serves_stale_value_with_a_soft_error() {
    let registry = Registry::empty();
    let transport = Arc::new(CannedTransport::new(&["a,b\n1,2\n", "a,b\n3,4\n"]));
    let clock = Arc::new(ManualClock::new(1_000));
    let jobs = Arc::new(MemoryJobQueue::new());
    let services = Services::in_memory()
        .with_http(transport.clone())
        .with_clock(clock.clone())
        .with_jobs(jobs.clone());
    let data = ExternalData::new(&registry, services);
    let ask = || {
        request(&[
            "url=https://example.org/x.csv",
            "cache seconds=10",
            "throttle key=$host$",
            "throttle interval=300",
        ])
    };

    data.run(EntryPoint::Web, ask());
    clock.advance(60);
    let outcome = data.run(EntryPoint::Web, ask());

    assert_eq!(transport.calls(), 1);
    assert_eq!(cells(&outcome, "a"), vec!["1"]);
    assert_eq!(cells(&outcome, pseudo::STALE), vec!["true"]);
    assert!(outcome.errors.contains("stale value served"));
    assert_eq!(jobs.jobs().len(), 1);
    assert_eq!(jobs.jobs()[0].not_before, 1_300);
}

#[test]
fn site_hooks_run_around_parsing() {
    let config = "source \"*\" {\n    preprocess \"trim\"\n    postprocess \"dedupe-rows\"\n}\n";
    let registry = parse_registry(config, None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(
        EntryPoint::Inline,
        request(&["text=\n\nk,v\nx,1\nx,1\ny,2\n\n", "format=csv with header"]),
    );

    assert!(!outcome.had_errors(), "{:?}", outcome.errors);
    assert_eq!(cells(&outcome, "k"), vec!["x", "y"]);
}

#[test]
fn unknown_hook_is_recorded() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::Inline, request(&["text=a,b\n1,2", "postprocess=shout"]));
    assert!(outcome.errors.contains("Unknown postprocess hook 'shout'"));
    assert!(!outcome.values.is_empty());
}

#[test]
fn mapping_of_pairs_and_bare_names() {
    let params = request(&["data=name=title,price"]);
    let mapping = mapping_of(&params);
    assert_eq!(mapping.get("name").map(String::as_str), Some("title"));
    assert_eq!(mapping.get("price").map(String::as_str), Some("price"));
}

#[test]
fn caller_cannot_name_an_unconfigured_program() {
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(
        EntryPoint::Program,
        request(&["program=anything", "command=echo from_caller", "format=text"]),
    );

    assert!(outcome.errors.contains("Unknown source 'anything'"));
    assert!(outcome.values.is_empty());
}

#[cfg(unix)]
#[test]
fn caller_command_and_env_do_not_replace_site_settings() {
    let config = "source \"clock\" {\n    command \"printf 'site'\"\n}\n";
    let registry = parse_registry(config, None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(
        EntryPoint::Program,
        request(&["program=clock", "command=printf 'caller'", "env=PATH=/tmp", "format=text"]),
    );

    assert!(!outcome.had_errors(), "{:?}", outcome.errors);
    assert_eq!(cells(&outcome, pseudo::TEXT), vec!["site"]);
}

#[test]
fn caller_path_is_ignored_for_files() {
    let dir = TempDir::new().unwrap();
    let secret = dir.path().join("secret.txt");
    fs::write(&secret, "top secret").unwrap();
    let path = format!("path={}", secret.display());

    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::File, request(&["file=whatever", path.as_str(), "format=text"]));
    assert!(outcome.errors.contains("Unknown source 'whatever'"));
    assert!(outcome.values.is_empty());

    // A configured id without a path still refuses the caller's one.
    let registry = parse_registry("source \"notes\" {\n    format \"text\"\n}\n", None).unwrap();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::File, request(&["file=notes", path.as_str()]));
    assert!(outcome.errors.contains("Missing required parameter: path"));
    assert!(outcome.values.is_empty());
}

#[test]
fn caller_cannot_point_a_walk_at_another_directory() {
    let dir = TempDir::new().unwrap();
    let root = format!("path={}", dir.path().display());
    let registry = Registry::empty();
    let data = ExternalData::new(&registry, Services::in_memory());
    let outcome = data.run(EntryPoint::File, request(&["directory=anywhere", root.as_str(), "file name=*"]));

    assert!(outcome.errors.contains("Unknown source 'anywhere'"));
    assert!(outcome.values.is_empty());
}
