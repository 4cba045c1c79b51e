//! Connector resolution.
//!
//! The entry point is injected as `__pf` and the site configuration merged
//! in; the first table entry whose constraints all hold picks the kind.
//! Entries are grouped per backend and repeated under `get_external_data`
//! in identifying-key order (`url`, `db`, `program`, `directory`/`file`,
//! `domain`, `text`).

use std::sync::LazyLock;

use super::{Connector, ConnectorKind, DbEngine, DbQuery, EntryPoint, FileSource, HttpMethod};
use crate::config::{Registry, Supplemented, WILDCARD};
use crate::core::matcher::{Constraint, ConstraintTable};
use crate::error::ExtDataError;
use crate::params::{ENTRY_POINT_KEY, RequestParams};
use crate::ui;

type Rows = Vec<(Vec<Constraint>, ConnectorKind)>;

fn web_rows() -> Rows {
    use Constraint::Present;
    vec![
        (vec![Present("url"), Present("post data")], ConnectorKind::Http(HttpMethod::Post)),
        (vec![Present("url")], ConnectorKind::Http(HttpMethod::Get)),
    ]
}

fn soap_rows() -> Rows {
    vec![(
        vec![Constraint::Present("url"), Constraint::Present("request")],
        ConnectorKind::Http(HttpMethod::Soap),
    )]
}

/// Prepared statements come first: `query` names one.
fn db_rows() -> Rows {
    use Constraint::{Is, Present};
    let mut rows = Rows::new();
    for engine in DbEngine::ALL {
        for type_name in engine.type_names() {
            rows.push((
                vec![Present("db"), Is("type", *type_name), Present("query")],
                ConnectorKind::Database(engine, DbQuery::Prepared),
            ));
            rows.push((
                vec![Present("db"), Is("type", *type_name)],
                ConnectorKind::Database(engine, DbQuery::Composed),
            ));
        }
    }
    rows
}

fn program_rows() -> Rows {
    vec![(vec![Constraint::Present("program")], ConnectorKind::Program)]
}

fn file_rows() -> Rows {
    use Constraint::{Present, Wildcard};
    vec![
        (vec![Present("file")], ConnectorKind::Directory(FileSource::NamedFile)),
        (
            vec![Present("directory"), Wildcard("file name")],
            ConnectorKind::Directory(FileSource::DirectoryWalk),
        ),
        (
            vec![Present("directory"), Present("file name")],
            ConnectorKind::Directory(FileSource::DirectoryFile),
        ),
    ]
}

fn ldap_rows() -> Rows {
    vec![(vec![Constraint::Present("domain")], ConnectorKind::Ldap)]
}

fn inline_rows() -> Rows {
    vec![(vec![Constraint::Present("text")], ConnectorKind::Inline)]
}

fn build_table() -> ConstraintTable<ConnectorKind> {
    let per_entry: [(EntryPoint, Rows); 7] = [
        (EntryPoint::Web, web_rows()),
        (EntryPoint::Soap, soap_rows()),
        (EntryPoint::Db, db_rows()),
        (EntryPoint::File, file_rows()),
        (EntryPoint::Program, program_rows()),
        (EntryPoint::Ldap, ldap_rows()),
        (EntryPoint::Inline, inline_rows()),
    ];
    let generic = [web_rows(), db_rows(), program_rows(), file_rows(), ldap_rows(), inline_rows()];

    let scoped = per_entry
        .into_iter()
        .flat_map(|(entry, rows)| rows.into_iter().map(move |row| (entry, row)));
    let external = generic
        .into_iter()
        .flatten()
        .map(|row| (EntryPoint::External, row));

    scoped
        .chain(external)
        .fold(ConstraintTable::new(), |table, (entry, (constraints, kind))| {
            let mut all = vec![Constraint::Is(ENTRY_POINT_KEY, entry.name())];
            all.extend(constraints);
            table.with(all, kind)
        })
}

static CONNECTORS: LazyLock<ConstraintTable<ConnectorKind>> = LazyLock::new(build_table);

/// Resolve a request to a connector. Site settings for the target are
/// merged in first, so a configured `type` or `path` takes part in the
/// choice.
pub fn resolve(entry: EntryPoint, request: &RequestParams, registry: &Registry) -> Connector {
    let (mut kind, mut supplemented) = supplement_and_match(entry, request, registry);

    let overridden: Vec<&str> = kind
        .site_only_keys()
        .iter()
        .copied()
        .filter(|key| request.has(key))
        .collect();
    if !overridden.is_empty() {
        ui::verbose(&format!("Ignoring caller values for site-only keys: {}", overridden.join(", ")));
        let mut cleaned = request.clone();
        for key in &overridden {
            cleaned.remove(key);
        }
        (kind, supplemented) = supplement_and_match(entry, &cleaned, registry);
    }

    if !supplemented.scopes.is_empty() {
        ui::verbose(&format!("Applied source scopes: {}", supplemented.scopes.join(", ")));
    }

    let mut connector = Connector {
        entry,
        kind,
        params: supplemented.params,
        errors: supplemented.errors,
    };

    if let Some(key) = kind.configured_id_key()
        && let Some(id) = connector.params.non_empty(key).map(str::to_string)
        && !is_configured(registry, &id, request)
    {
        connector.push_error(&ExtDataError::UnknownSource(id));
    }

    if kind == ConnectorKind::Unresolved {
        connector.push_error(&ExtDataError::NoConnector);
        if entry == EntryPoint::Db && connector.params.has("db") && !connector.params.has("type") {
            connector.push_error(&ExtDataError::MissingParameter("type".to_string()));
        }
    } else {
        ui::verbose(&format!("{} resolved to {} connector", entry, kind));
    }
    connector
}

fn supplement_and_match(
    entry: EntryPoint,
    request: &RequestParams,
    registry: &Registry,
) -> (ConnectorKind, Supplemented) {
    let mut supplemented = registry.supplement(request);
    supplemented.params.set(ENTRY_POINT_KEY, entry.name());
    let kind = CONNECTORS
        .first_match(&supplemented.params)
        .unwrap_or(ConnectorKind::Unresolved);
    (kind, supplemented)
}

/// Programs, files, directories and databases run only under a scope
/// named by their id or by an explicit `source`.
fn is_configured(registry: &Registry, id: &str, request: &RequestParams) -> bool {
    let named = |scope: &str| scope.trim() != WILDCARD && registry.get(scope).is_some();
    named(id) || request.non_empty("source").is_some_and(named)
}
