mod sink;

use crate::dom::DOM;
use anyhow::Error;
use html5ever::tendril::TendrilSink as _;
use html5ever::{ParseOpts, parse_document};
use log::debug;

use sink::ArenaSink;

/// Parse a complete HTML document into a fresh [`DOM`].
///
/// The tree is built by the full html5ever tree builder, so implied
/// `html`/`head`/`body` elements are present in the result.
///
/// # Errors
/// Returns the first structural error the sink hit while building the arena.
pub fn parse_html(source: &str) -> Result<DOM, Error> {
    let dom = parse_document(ArenaSink::default(), ParseOpts::default()).one(source)?;
    debug!(target: "html", "parsed {} bytes of HTML", source.len());
    Ok(dom)
}
