//! The `ExternalData` facade: resolve, fetch, parse, filter and map one
//! request, collecting every error along the way instead of failing.

use crate::config::Registry;
use crate::connectors::clients::Services;
use crate::connectors::registry::resolve;
use crate::connectors::{
    Connector, ConnectorKind, EntryPoint, Fetched, HttpMethod, database, directory, http, inline, ldap,
    program,
};
use crate::core::{ColumnValueSet, ErrorList, Payload, pseudo};
use crate::error::{ExtDataError, Result};
use crate::formats::{ParseContext, parse_document};
use crate::hooks::Hooks;
use crate::mapping::{self, Filters, Mapping};
use crate::params::{CaseFold, RequestParams};
use crate::ui;

/// Result of one request. Values are present even when errors were
/// recorded, e.g. a stale payload served after a failed refresh.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub kind: Option<ConnectorKind>,
    pub values: ColumnValueSet,
    pub errors: ErrorList,
    /// `suppress error` was set: errors are kept but not rendered.
    pub suppressed: bool,
}

impl FetchOutcome {
    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Error text for display, one message per line. `None` when there is
    /// nothing to show.
    pub fn render_errors(&self) -> Option<String> {
        if self.suppressed || self.errors.is_empty() {
            return None;
        }
        Some(self.errors.iter().cloned().collect::<Vec<_>>().join("\n"))
    }

    /// Values of one output column.
    pub fn column(&self, name: &str) -> Option<&Vec<String>> {
        self.values.get(name)
    }
}

/// `data` pairs, local name to external field; a bare name maps to itself.
pub fn mapping_of(params: &RequestParams) -> Mapping {
    params
        .pairs("data", CaseFold::NONE)
        .into_iter()
        .map(|(local, external)| {
            let external = external.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| local.clone());
            (local, external)
        })
        .collect()
}

pub fn filters_of(params: &RequestParams) -> Filters {
    params.table("filters")
}

pub struct ExternalData<'a> {
    registry: &'a Registry,
    services: Services,
    hooks: Hooks,
}

impl<'a> ExternalData<'a> {
    pub fn new(registry: &'a Registry, services: Services) -> Self {
        Self {
            registry,
            services,
            hooks: Hooks::builtin(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run one request through the whole pipeline.
    pub fn run(&self, entry: EntryPoint, request: RequestParams) -> FetchOutcome {
        let connector = resolve(entry, &request, self.registry);
        let mut outcome = FetchOutcome {
            kind: Some(connector.kind),
            suppressed: connector.params.flag("suppress error"),
            errors: connector.errors.clone(),
            values: ColumnValueSet::new(),
        };
        if !connector.is_runnable() {
            return outcome;
        }

        let mapping = mapping_of(&connector.params);
        let filters = filters_of(&connector.params);
        let fields: Vec<String> = mapping.values().cloned().collect();

        let fetched = match self.execute(&connector, &fields) {
            Ok(fetched) => fetched,
            Err(e) => {
                ui::verbose(&format!("Fetch failed: {}", e));
                outcome.errors.push(e.to_string());
                return outcome;
            }
        };
        if let Some(notice) = &fetched.notice {
            outcome.errors.push(notice.to_string());
        }

        let (timestamp, stale, tries) = (fetched.timestamp, fetched.stale, fetched.tries);
        let parsed = self.parse_payload(fetched.payload, &connector.params, fields, &mut outcome.errors);
        let mut values = mapping::filter_and_map(parsed, &filters, &mapping);
        values.pad_rows();
        values.set_meta(pseudo::TIME, timestamp.to_string());
        values.set_meta(pseudo::STALE, stale.to_string());
        values.set_meta(pseudo::TRIES, tries.to_string());

        outcome.values = values;
        outcome
    }

    fn execute(&self, connector: &Connector, fields: &[String]) -> Result<Fetched> {
        let params = &connector.params;
        let state = self.services.fetch_state();
        let transport = self.services.http.as_ref();

        match connector.kind {
            ConnectorKind::Http(HttpMethod::Get) => http::get(params, transport, &state),
            ConnectorKind::Http(HttpMethod::Post) => http::post(params, transport, &state),
            ConnectorKind::Http(HttpMethod::Soap) => http::soap(params, transport, &state),
            ConnectorKind::Database(engine, query) => database::fetch(
                engine,
                query,
                params,
                fields,
                self.services.database(engine)?,
                &state,
            ),
            ConnectorKind::Directory(source) => directory::fetch(source, params, &state),
            ConnectorKind::Program => program::fetch(params, &state),
            ConnectorKind::Ldap => ldap::fetch(params, fields, self.services.ldap()?, &state),
            ConnectorKind::Inline => inline::fetch(params, &state),
            ConnectorKind::Unresolved => Err(ExtDataError::NoConnector),
        }
    }

    /// Hooks and parsing. Per-document failures are recorded and the
    /// remaining documents still parsed.
    fn parse_payload(
        &self,
        payload: Payload,
        params: &RequestParams,
        expressions: Vec<String>,
        errors: &mut ErrorList,
    ) -> ColumnValueSet {
        let ctx = ParseContext::new(params, expressions);
        let preprocess = params.non_empty("preprocess");

        let parse_one = |mut doc: crate::core::Document| -> Result<ColumnValueSet> {
            if let Some(hook) = preprocess {
                self.hooks.preprocess(hook, &mut doc, params)?;
            }
            Ok(parse_document(&doc, &ctx)?)
        };

        let mut values = match payload {
            Payload::Document(doc) => parse_one(doc).unwrap_or_else(|e| {
                errors.push(e.to_string());
                ColumnValueSet::new()
            }),
            Payload::Files { documents } => {
                let mut all = ColumnValueSet::new();
                for doc in documents {
                    let name = doc.name.clone().unwrap_or_default();
                    match parse_one(doc) {
                        Ok(parsed) => all.append_rows(parsed, pseudo::FILE, &name),
                        Err(e) => errors.push(format!("{}: {}", name, e)),
                    }
                }
                all
            }
            Payload::Records { values } => values,
        };

        if let Some(hook) = params.non_empty("postprocess")
            && let Err(e) = self.hooks.postprocess(hook, &mut values, params)
        {
            errors.push(e.to_string());
        }
        values
    }
}

#[cfg(test)]
mod tests;
