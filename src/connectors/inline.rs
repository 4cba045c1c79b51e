//! Inline executor: the `text` parameter is the document.

use super::{Fetched, require};
use crate::core::{Document, Payload};
use crate::error::Result;
use crate::fetch::FetchState;
use crate::params::RequestParams;

pub fn fetch(params: &RequestParams, state: &FetchState<'_>) -> Result<Fetched> {
    let text = require(params, "text")?;
    let name = params.non_empty("file name").map(str::to_string);
    Ok(Fetched::new(
        Payload::Document(Document::text(name, text)),
        state.clock.now(),
        1,
    ))
}
