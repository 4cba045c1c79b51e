//! Database executor.
//!
//! A composed request becomes a single SELECT (or a Mongo find request);
//! clauses pass through as written. A prepared request names a statement
//! registered in the site configuration and binds `parameters` to its `?`
//! placeholders according to the statement's type tags.

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql, params_from_iter};
use serde::Serialize;
use std::path::PathBuf;

use super::{DbEngine, DbQuery, Fetched, identity, require};
use crate::core::{ColumnValueSet, Payload};
use crate::error::{ExtDataError, Result};
use crate::fetch::{FetchPolicy, FetchState};
use crate::params::{CaseFold, RequestParams};
use crate::ui;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Blob(Vec<u8>),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(text) => ToSqlOutput::from(text.as_str()),
            SqlValue::Integer(i) => ToSqlOutput::from(*i),
            SqlValue::Double(d) => ToSqlOutput::from(*d),
            SqlValue::Blob(bytes) => ToSqlOutput::from(bytes.as_slice()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DbStatement {
    Sql {
        sql: String,
        params: Vec<SqlValue>,
    },
    MongoFind {
        collection: String,
        /// JSON filter document, passed through.
        filter: Option<String>,
        sort: Option<String>,
        limit: Option<i64>,
        projection: Vec<String>,
    },
}

/// Connection settings of one configured database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConnection {
    pub engine: DbEngine,
    /// The `db` id the caller used.
    pub id: String,
    pub server: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub directory: Option<String>,
    pub flags: Option<String>,
}

impl DbConnection {
    pub fn from_params(engine: DbEngine, params: &RequestParams) -> Result<Self> {
        let text = |key: &str| params.non_empty(key).map(str::to_string);
        Ok(Self {
            engine,
            id: require(params, "db")?.to_string(),
            server: text("server"),
            name: text("name"),
            user: text("user"),
            password: text("password"),
            directory: text("directory"),
            flags: text("flags"),
        })
    }
}

/// Runs statements against one engine.
pub trait DatabaseClient: Send + Sync {
    fn query(&self, connection: &DbConnection, statement: &DbStatement) -> Result<ColumnValueSet>;
}

/// SQLite files opened read-only.
#[derive(Debug, Default)]
pub struct SqliteClient;

impl SqliteClient {
    /// `directory`/`name`, with `.sqlite` appended when the name has no
    /// extension. `server` or the id stand in for a missing name.
    pub fn database_path(connection: &DbConnection) -> PathBuf {
        let name = connection
            .name
            .as_deref()
            .or(connection.server.as_deref())
            .unwrap_or(&connection.id);
        let mut path = match &connection.directory {
            Some(dir) => PathBuf::from(dir).join(name),
            None => PathBuf::from(name),
        };
        if path.extension().is_none() {
            path.set_extension("sqlite");
        }
        path
    }
}

impl DatabaseClient for SqliteClient {
    fn query(&self, connection: &DbConnection, statement: &DbStatement) -> Result<ColumnValueSet> {
        let DbStatement::Sql { sql, params } = statement else {
            return Err(ExtDataError::Validation {
                param: "type".to_string(),
                reason: "SQLite databases take SQL statements".to_string(),
            });
        };

        let path = Self::database_path(connection);
        if !path.exists() {
            return Err(ExtDataError::Connection {
                target: connection.id.clone(),
                reason: format!("database file not found: {}", path.display()),
            });
        }
        ui::verbose(&format!("Querying {}: {}", path.display(), sql));

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let mut values = ColumnValueSet::new();
        for name in &names {
            values.set(name, Vec::new());
        }

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            for (i, name) in names.iter().enumerate() {
                values.push(name, value_text(row.get_ref(i)?));
            }
        }
        Ok(values)
    }
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// `from` entries are `table` or `table=alias`; `join` entries are
/// `table=condition`.
pub fn compose_select(engine: DbEngine, params: &RequestParams, fields: &[String]) -> Result<String> {
    let from = params.pairs("from", CaseFold::NONE);
    if from.is_empty() {
        return Err(ExtDataError::MissingParameter("from".to_string()));
    }

    let columns = if fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(", ")
    };
    let limit = params.number("limit").filter(|n| *n > 0);

    let mut sql = String::from("SELECT ");
    if let Some(n) = limit
        && engine.uses_top()
    {
        sql.push_str(&format!("TOP {} ", n));
    }
    sql.push_str(&columns);

    let tables: Vec<String> = from
        .iter()
        .map(|(table, alias)| match alias {
            Some(alias) if !alias.is_empty() => format!("{} AS {}", table, alias),
            _ => table.clone(),
        })
        .collect();
    sql.push_str(" FROM ");
    sql.push_str(&tables.join(", "));

    for (table, condition) in params.pairs("join", CaseFold::NONE) {
        match condition {
            Some(condition) if !condition.is_empty() => {
                sql.push_str(&format!(" JOIN {} ON {}", table, condition));
            }
            _ => {
                return Err(ExtDataError::Validation {
                    param: "join".to_string(),
                    reason: format!("join with '{}' needs a condition", table),
                });
            }
        }
    }

    for (key, keyword) in [
        ("where", "WHERE"),
        ("group by", "GROUP BY"),
        ("having", "HAVING"),
        ("order by", "ORDER BY"),
    ] {
        if let Some(clause) = params.non_empty(key) {
            sql.push_str(&format!(" {} {}", keyword, clause));
        }
    }

    if let Some(n) = limit
        && !engine.uses_top()
    {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    Ok(sql)
}

/// Mongo find request: `from` names the collection, `where` is a JSON
/// filter, `order by` a JSON sort document.
pub fn compose_find(params: &RequestParams, fields: &[String]) -> Result<DbStatement> {
    let collection = require(params, "from")?.to_string();
    let json_param = |key: &str| -> Result<Option<String>> {
        match params.non_empty(key) {
            None => Ok(None),
            Some(text) => serde_json::from_str::<serde_json::Value>(text)
                .map(|_| Some(text.to_string()))
                .map_err(|e| ExtDataError::Validation {
                    param: key.to_string(),
                    reason: format!("not a JSON document: {}", e),
                }),
        }
    };

    Ok(DbStatement::MongoFind {
        collection,
        filter: json_param("where")?,
        sort: json_param("order by")?,
        limit: params.number("limit").filter(|n| *n > 0),
        projection: fields.to_vec(),
    })
}

/// Count `?` placeholders outside quoted literals.
pub fn count_placeholders(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

/// Look up the statement named by `query` and bind `parameters`.
pub fn prepared_statement(params: &RequestParams) -> Result<DbStatement> {
    let name = require(params, "query")?;
    let prepared = params.table("prepared");
    let sql = prepared
        .get(name)
        .or_else(|| {
            prepared
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .ok_or_else(|| ExtDataError::Validation {
            param: "query".to_string(),
            reason: format!("no prepared statement named '{}'", name),
        })?
        .clone();

    let expected = count_placeholders(&sql);
    let values = params.list("parameters");
    if values.len() != expected {
        return Err(ExtDataError::Validation {
            param: "parameters".to_string(),
            reason: format!(
                "statement '{}' expects {} parameter(s), got {}",
                name,
                expected,
                values.len()
            ),
        });
    }

    let types = params.table("types");
    let tags: Vec<char> = match types.get(name) {
        Some(tags) => tags.trim().chars().collect(),
        None => vec!['s'; expected],
    };
    if tags.len() != expected {
        return Err(ExtDataError::Validation {
            param: "types".to_string(),
            reason: format!(
                "statement '{}' has {} placeholder(s) but {} type tag(s)",
                name,
                expected,
                tags.len()
            ),
        });
    }

    let bound = values
        .into_iter()
        .zip(tags)
        .map(|(value, tag)| bind(&value, tag))
        .collect::<Result<Vec<_>>>()?;
    Ok(DbStatement::Sql { sql, params: bound })
}

fn bind(value: &str, tag: char) -> Result<SqlValue> {
    let mismatch = |kind: &str| ExtDataError::Validation {
        param: "parameters".to_string(),
        reason: format!("'{}' is not {}", value, kind),
    };
    match tag.to_ascii_lowercase() {
        's' => Ok(SqlValue::Text(value.to_string())),
        'i' => value
            .trim()
            .parse()
            .map(SqlValue::Integer)
            .map_err(|_| mismatch("an integer")),
        'd' => value
            .trim()
            .parse()
            .map(SqlValue::Double)
            .map_err(|_| mismatch("a number")),
        'b' => Ok(SqlValue::Blob(value.as_bytes().to_vec())),
        other => Err(ExtDataError::Validation {
            param: "types".to_string(),
            reason: format!("unknown type tag '{}' (expected s, i, d or b)", other),
        }),
    }
}

/// Run the request against `client`, through the cache and throttle gate.
/// `fields` are the external names the mapping asks for.
pub fn fetch(
    engine: DbEngine,
    query: DbQuery,
    params: &RequestParams,
    fields: &[String],
    client: &dyn DatabaseClient,
    state: &FetchState<'_>,
) -> Result<Fetched> {
    let connection = DbConnection::from_params(engine, params)?;
    let statement = match (query, engine) {
        (DbQuery::Prepared, _) => prepared_statement(params)?,
        (DbQuery::Composed, DbEngine::Mongo) => compose_find(params, fields)?,
        (DbQuery::Composed, _) => DbStatement::Sql {
            sql: compose_select(engine, params, fields)?,
            params: Vec::new(),
        },
    };

    let mut key = identity(engine.name(), &connection.id, params, &["server", "name", "directory"]);
    key["statement"] = serde_json::to_value(&statement)?;
    let policy = FetchPolicy::from_params(params, None);

    let cached = state.run(&key, &connection.id, &policy, || {
        client
            .query(&connection, &statement)
            .map(|values| Payload::Records { values })
    })?;
    Ok(Fetched::from_cached(cached, 1))
}

#[cfg(test)]
mod tests;
