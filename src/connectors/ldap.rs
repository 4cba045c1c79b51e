//! LDAP executor. The directory protocol lives in a host-supplied
//! [`LdapClient`]; this module turns request parameters into a search and
//! the returned entries into rows.

use indexmap::IndexMap;
use serde::Serialize;

use super::{Fetched, identity, require};
use crate::core::{ColumnValueSet, Payload};
use crate::error::Result;
use crate::fetch::{FetchPolicy, FetchState};
use crate::params::RequestParams;

pub const DEFAULT_FILTER: &str = "(objectClass=*)";

/// Attribute name to values, as returned by a search.
pub type LdapEntry = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LdapQuery {
    pub domain: String,
    pub server: Option<String>,
    pub base: Option<String>,
    pub filter: String,
    /// Empty asks for every attribute.
    pub attributes: Vec<String>,
    #[serde(skip)]
    pub user: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

impl LdapQuery {
    pub fn from_params(params: &RequestParams, fields: &[String]) -> Result<Self> {
        let text = |key: &str| params.non_empty(key).map(str::to_string);
        let mut attributes = params.list("attributes");
        if attributes.is_empty() {
            attributes = fields.to_vec();
        }
        Ok(Self {
            domain: require(params, "domain")?.to_string(),
            server: text("server"),
            base: text("base"),
            filter: text("filter").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            attributes,
            user: text("user"),
            password: text("password"),
        })
    }
}

/// Binds and searches one directory.
pub trait LdapClient: Send + Sync {
    fn search(&self, query: &LdapQuery) -> Result<Vec<LdapEntry>>;
}

/// One row per entry. Multi-valued attributes keep their first value
/// unless `all` joins every value with `,`.
pub fn entries_to_rows(entries: &[LdapEntry], join_all: bool) -> ColumnValueSet {
    let mut values = ColumnValueSet::new();
    for entry in entries {
        for name in entry.keys() {
            if !values.contains(name) {
                values.set(name, Vec::new());
            }
        }
    }

    let columns: Vec<String> = values.columns().cloned().collect();
    for entry in entries {
        for column in &columns {
            let cell = match entry.get(column) {
                Some(items) if join_all => items.join(","),
                Some(items) => items.first().cloned().unwrap_or_default(),
                None => String::new(),
            };
            values.push(column, cell);
        }
    }
    values
}

pub fn fetch(
    params: &RequestParams,
    fields: &[String],
    client: &dyn LdapClient,
    state: &FetchState<'_>,
) -> Result<Fetched> {
    let query = LdapQuery::from_params(params, fields)?;
    let mut key = identity("ldap", &query.domain, params, &["all"]);
    key["query"] = serde_json::to_value(&query)?;
    let policy = FetchPolicy::from_params(params, None);

    let cached = state.run(&key, &query.domain, &policy, || {
        let entries = client.search(&query)?;
        Ok(Payload::Records {
            values: entries_to_rows(&entries, params.flag("all")),
        })
    })?;
    Ok(Fetched::from_cached(cached, 1))
}
