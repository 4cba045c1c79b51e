use super::*;
use crate::fetch::cache::MemoryCacheStore;
use crate::fetch::clock::ManualClock;
use crate::fetch::jobs::NullJobQueue;
use crate::fetch::throttle::MemoryThrottleStore;
use crate::params::ParamValue;
use indexmap::IndexMap;
use tempfile::TempDir;

fn params(pairs: &[&str]) -> RequestParams {
    RequestParams::from_pairs(pairs.iter().copied())
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn table(pairs: &[(&str, &str)]) -> ParamValue {
    ParamValue::Table(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
    )
}

fn inventory() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open(dir.path().join("inventory.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE items (sku TEXT, name TEXT, qty INTEGER, price REAL);
         INSERT INTO items VALUES ('A1', 'bolt', 100, 0.25);
         INSERT INTO items VALUES ('B2', 'nut', 250, 0.1);
         INSERT INTO items VALUES ('C3', 'washer', NULL, 0.05);",
    )
    .unwrap();
    dir
}

#[test]
fn composed_select_with_all_clauses() {
    let request = params(&[
        "from=items=i,stock",
        "join=prices=prices.sku = i.sku",
        "where=i.qty > 0",
        "group by=i.sku",
        "having=count(*) > 1",
        "order by=i.sku DESC",
        "limit=5",
    ]);
    let sql = compose_select(DbEngine::Postgres, &request, &fields(&["i.sku", "name"])).unwrap();
    assert_eq!(
        sql,
        "SELECT i.sku, name FROM items AS i, stock JOIN prices ON prices.sku = i.sku \
         WHERE i.qty > 0 GROUP BY i.sku HAVING count(*) > 1 ORDER BY i.sku DESC LIMIT 5"
    );
}

#[test]
fn mssql_uses_top_and_star_without_fields() {
    let sql = compose_select(DbEngine::Mssql, &params(&["from=items", "limit=3"]), &[]).unwrap();
    assert_eq!(sql, "SELECT TOP 3 * FROM items");
}

#[test]
fn composed_select_needs_a_table() {
    let err = compose_select(DbEngine::Mysql, &params(&["where=x"]), &[]).unwrap_err();
    assert!(matches!(err, ExtDataError::MissingParameter(ref p) if p == "from"));
}

#[test]
fn mongo_find_passes_filter_through() {
    let statement = compose_find(
        &params(&["from=orders", "where={\"status\": \"open\"}", "limit=10"]),
        &fields(&["total"]),
    )
    .unwrap();
    assert_eq!(
        statement,
        DbStatement::MongoFind {
            collection: "orders".into(),
            filter: Some("{\"status\": \"open\"}".into()),
            sort: None,
            limit: Some(10),
            projection: fields(&["total"]),
        }
    );

    let err = compose_find(&params(&["from=orders", "where=status=open"]), &[]).unwrap_err();
    assert!(matches!(err, ExtDataError::Validation { ref param, .. } if param == "where"));
}

#[test]
fn placeholders_inside_literals_do_not_count() {
    assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?"), 2);
    assert_eq!(count_placeholders("SELECT 1"), 0);
}

#[test]
fn prepared_statement_binds_typed_parameters() {
    let mut request = params(&["query=by_qty", "parameters=bolt,10,0.5"]);
    request.insert(
        "prepared",
        table(&[("by_qty", "SELECT * FROM items WHERE name = ? AND qty > ? AND price > ?")]),
    );
    request.insert("types", table(&[("by_qty", "sid")]));

    let DbStatement::Sql { params, .. } = prepared_statement(&request).unwrap() else {
        panic!("expected SQL");
    };
    assert_eq!(
        params,
        vec![
            SqlValue::Text("bolt".into()),
            SqlValue::Integer(10),
            SqlValue::Double(0.5)
        ]
    );
}

#[test]
fn prepared_statement_mismatches_are_validation_errors() {
    let mut request = params(&["query=by_sku", "parameters=A1,B2"]);
    request.insert("prepared", table(&[("by_sku", "SELECT * FROM items WHERE sku = ?")]));
    let err = prepared_statement(&request).unwrap_err();
    assert!(err.to_string().contains("expects 1 parameter(s), got 2"));

    let mut request = params(&["query=by_qty", "parameters=many"]);
    request.insert("prepared", table(&[("by_qty", "SELECT * FROM items WHERE qty > ?")]));
    request.insert("types", table(&[("by_qty", "i")]));
    let err = prepared_statement(&request).unwrap_err();
    assert!(err.to_string().contains("'many' is not an integer"));

    let err = prepared_statement(&params(&["query=missing"])).unwrap_err();
    assert!(err.to_string().contains("no prepared statement named 'missing'"));
}

#[test]
fn sqlite_path_appends_extension() {
    let connection = DbConnection {
        engine: DbEngine::Sqlite,
        id: "inv".into(),
        server: None,
        name: Some("inventory".into()),
        user: None,
        password: None,
        directory: Some("/srv/data".into()),
        flags: None,
    };
    assert_eq!(
        SqliteClient::database_path(&connection),
        PathBuf::from("/srv/data/inventory.sqlite")
    );
}

#[test]
fn sqlite_fetch_returns_columns() {
    let dir = inventory();
    let cache = MemoryCacheStore::new();
    let throttle = MemoryThrottleStore::new();
    let clock = ManualClock::new(100);
    let state = FetchState {
        cache: &cache,
        throttle: &throttle,
        jobs: &NullJobQueue,
        clock: &clock,
    };

    let mut request = params(&["db=inv", "name=inventory", "from=items", "order by=sku"]);
    request.set("directory", dir.path().display().to_string());
    let fetched = fetch(
        DbEngine::Sqlite,
        DbQuery::Composed,
        &request,
        &fields(&["sku", "qty"]),
        &SqliteClient,
        &state,
    )
    .unwrap();

    let Payload::Records { values } = fetched.payload else {
        panic!("expected records");
    };
    assert_eq!(values.get("sku").unwrap(), &vec!["A1", "B2", "C3"]);
    assert_eq!(values.get("qty").unwrap(), &vec!["100", "250", ""]);
}

#[test]
fn sqlite_prepared_query_and_empty_result_keeps_columns() {
    let dir = inventory();
    let connection = DbConnection {
        engine: DbEngine::Sqlite,
        id: "inv".into(),
        server: None,
        name: Some("inventory.sqlite".into()),
        user: None,
        password: None,
        directory: Some(dir.path().display().to_string()),
        flags: None,
    };
    let statement = DbStatement::Sql {
        sql: "SELECT name FROM items WHERE sku = ?".into(),
        params: vec![SqlValue::Text("ZZ".into())],
    };
    let values = SqliteClient.query(&connection, &statement).unwrap();
    assert!(values.contains("name"));
    assert!(!values.has_data());
}

#[test]
fn missing_sqlite_file_is_a_connection_error() {
    let connection = DbConnection {
        engine: DbEngine::Sqlite,
        id: "ghost".into(),
        server: None,
        name: None,
        user: None,
        password: None,
        directory: Some("/nonexistent/dir".into()),
        flags: None,
    };
    let statement = DbStatement::Sql {
        sql: "SELECT 1".into(),
        params: vec![],
    };
    let err = SqliteClient.query(&connection, &statement).unwrap_err();
    assert!(matches!(err, ExtDataError::Connection { .. }));
}
