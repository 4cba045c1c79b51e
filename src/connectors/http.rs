//! Web and SOAP executors.
//!
//! GET requests are cached and throttled and retried a bounded number of
//! times (`tries`, no backoff) on transport errors, non-2xx statuses and
//! empty bodies. POST requests are throttled but never cached.

use indexmap::IndexMap;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::cell::Cell;
use std::time::Duration;

use super::{DECODING_OPTIONS, Fetched, encoding, identity, require};
use crate::core::{Document, Payload};
use crate::error::{ExtDataError, Result};
use crate::fetch::{FetchPolicy, FetchState};
use crate::formats::ParseError;
use crate::formats::xml::{self, dom::Dom};
use crate::params::{CaseFold, RequestParams};
use crate::project_identity;
use crate::ui;

pub const DEFAULT_TRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    /// Accept invalid TLS certificates (`allow ssl`).
    pub allow_insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking `reqwest` transport.
#[derive(Debug, Default)]
pub struct ReqwestTransport;

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let connection_error = |reason: String| ExtDataError::Connection {
            target: request.url.clone(),
            reason,
        };

        let client = Client::builder()
            .timeout(request.timeout)
            .user_agent(project_identity::user_agent())
            .danger_accept_invalid_certs(request.allow_insecure)
            .build()
            .map_err(|e| connection_error(format!("Failed to create HTTP client: {}", e)))?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| connection_error(format!("Network error: {}", e)))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .map_err(|e| connection_error(format!("Failed to read response body: {}", e)))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Build a request from `headers`, `timeout` and `allow ssl`.
pub fn build_request(params: &RequestParams, method: Method, url: &str, body: Option<String>) -> HttpRequest {
    let headers = params.table("headers").into_iter().collect();
    let timeout = params
        .number("timeout")
        .filter(|secs| *secs > 0)
        .map(|secs| secs as u64)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    HttpRequest {
        method,
        url: url.to_string(),
        headers,
        body,
        timeout: Duration::from_secs(timeout),
        allow_insecure: params.flag("allow ssl"),
    }
}

fn tries(params: &RequestParams) -> u32 {
    params
        .number("tries")
        .filter(|n| *n > 0)
        .map(|n| n as u32)
        .unwrap_or(DEFAULT_TRIES)
}

/// Send until a usable response arrives or `tries` attempts are spent.
pub fn send_with_retries(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    tries: u32,
    attempts: &Cell<u32>,
) -> Result<HttpResponse> {
    let mut last_error = None;
    for attempt in 1..=tries.max(1) {
        attempts.set(attempt);
        let error = match transport.send(request) {
            Ok(response) if !response.is_success() => ExtDataError::Connection {
                target: request.url.clone(),
                reason: format!("HTTP status {}", response.status),
            },
            Ok(response) if response.body.iter().all(u8::is_ascii_whitespace) => ExtDataError::Connection {
                target: request.url.clone(),
                reason: "empty response body".to_string(),
            },
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        ui::verbose(&format!("Attempt {}/{} failed: {}", attempt, tries, error));
        last_error = Some(error);
    }
    Err(last_error.unwrap_or_else(|| ExtDataError::Connection {
        target: request.url.clone(),
        reason: "no attempt made".to_string(),
    }))
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// GET `url` through the cache and throttle gate.
pub fn get(params: &RequestParams, transport: &dyn HttpTransport, state: &FetchState<'_>) -> Result<Fetched> {
    let url = require(params, "url")?;
    let request = build_request(params, Method::Get, url, None);
    let policy = FetchPolicy::from_params(params, Some(url));

    let mut options = vec!["headers"];
    options.extend_from_slice(DECODING_OPTIONS);
    let key = identity("http-get", url, params, &options);

    let attempts = Cell::new(0);
    let cached = state.run(&key, url, &policy, || {
        let response = send_with_retries(transport, &request, tries(params), &attempts)?;
        Ok(Payload::Document(encoding::to_document(
            Some(url.to_string()),
            response.body,
            response.content_type,
            params,
        )))
    })?;
    Ok(Fetched::from_cached(cached, attempts.get()))
}

/// POST `post data` to `url`: throttled, never cached.
pub fn post(params: &RequestParams, transport: &dyn HttpTransport, state: &FetchState<'_>) -> Result<Fetched> {
    let url = require(params, "url")?;
    let body = params.text("post data").unwrap_or_default().to_string();
    let mut request = build_request(params, Method::Post, url, Some(body));
    if !has_header(&request.headers, "Content-Type") {
        request
            .headers
            .push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
    }
    let policy = FetchPolicy::from_params(params, Some(url));

    let attempts = Cell::new(0);
    let payload = state.run_uncached(url, &policy, || {
        let response = send_with_retries(transport, &request, tries(params), &attempts)?;
        Ok(Payload::Document(encoding::to_document(
            Some(url.to_string()),
            response.body,
            response.content_type,
            params,
        )))
    })?;
    Ok(Fetched::new(payload, state.clock.now(), attempts.get()))
}

/// SOAP 1.1 envelope calling `request` with the given parameters.
pub fn soap_envelope(request: &str, namespace: Option<&str>, data: &IndexMap<String, String>) -> String {
    let escape = |text: &str| quick_xml::escape::escape(text).into_owned();
    let mut body = String::new();
    for (name, value) in data {
        body.push_str(&format!("      <{0}>{1}</{0}>\n", name, escape(value)));
    }
    let xmlns = namespace
        .map(|ns| format!(" xmlns=\"{}\"", escape(ns)))
        .unwrap_or_default();

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<soap:Envelope xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ",
            "xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" ",
            "xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\n",
            "  <soap:Body>\n",
            "    <{request}{xmlns}>\n",
            "{body}",
            "    </{request}>\n",
            "  </soap:Body>\n",
            "</soap:Envelope>\n"
        ),
        request = request,
        xmlns = xmlns,
        body = body
    )
}

/// Call a SOAP operation and flatten its response element into records.
/// Responses are cached like GET requests, keyed by the envelope.
pub fn soap(params: &RequestParams, transport: &dyn HttpTransport, state: &FetchState<'_>) -> Result<Fetched> {
    let url = require(params, "url")?;
    let operation = require(params, "request")?;
    let namespace = params.non_empty("namespace");

    let data_key = if params.has("request data") { "request data" } else { "requestdata" };
    let data: IndexMap<String, String> = params
        .pairs(data_key, CaseFold::NONE)
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect();
    let envelope = soap_envelope(operation, namespace, &data);

    let action = params.non_empty("soap action").map(str::to_string).unwrap_or_else(|| {
        match namespace {
            Some(ns) => format!("{}/{}", ns.trim_end_matches('/'), operation),
            None => operation.to_string(),
        }
    });
    let mut request = build_request(params, Method::Post, url, Some(envelope.clone()));
    request
        .headers
        .push(("Content-Type".to_string(), SOAP_CONTENT_TYPE.to_string()));
    request
        .headers
        .push(("SOAPAction".to_string(), format!("\"{}\"", action)));

    let policy = FetchPolicy::from_params(params, Some(url));
    let mut key = identity("soap", url, params, DECODING_OPTIONS);
    key["envelope"] = serde_json::Value::String(envelope);

    let attempts = Cell::new(0);
    let cached = state.run(&key, url, &policy, || {
        let response = send_with_retries(transport, &request, tries(params), &attempts)?;
        let text = encoding::decode(&response.body, params, response.content_type.as_deref());
        let mut doc = Document::text(Some(url.to_string()), text);
        doc.content_type = response.content_type;
        Ok(Payload::Document(doc))
    })?;

    let response_element = params
        .non_empty("response")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}Response", operation));

    let mut fetched = Fetched::from_cached(cached, attempts.get());
    if let Payload::Document(doc) = &fetched.payload {
        let text = doc.body.as_text().unwrap_or_default();
        let dom = Dom::parse_xml(text)?;
        let element = xml::find_element(&dom, &response_element).ok_or_else(|| {
            ParseError::Xml(format!("response element <{}> not found", response_element))
        })?;
        fetched.payload = Payload::Records {
            values: xml::flatten(&dom, element),
        };
    }
    Ok(fetched)
}
