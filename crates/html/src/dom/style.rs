//! Inline `style` attribute declarations.

use core::ops::Range;
use cssparser::{Parser, ParserInput, Token};

/// Byte ranges of the top-level declarations in a `style` attribute,
/// without their terminating semicolons.
///
/// Semicolons inside strings, `url()` and blocks do not split.
fn declaration_spans(source: &str) -> Vec<Range<usize>> {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let is_semicolon = match parser.next_including_whitespace_and_comments() {
            Ok(token) => matches!(token, Token::Semicolon),
            Err(_) => break,
        };
        if is_semicolon {
            let after = parser.position().byte_index();
            spans.push(start..after.saturating_sub(1));
            start = after;
        }
    }
    spans.push(start..source.len());
    spans
}

/// Lowercased name and the byte range of the trimmed value.
fn split_declaration(source: &str, span: Range<usize>) -> Option<(String, Range<usize>)> {
    let start = span.start;
    let text = source.get(span)?;
    let colon = text.find(':')?;
    let name = text.get(..colon)?.trim().to_ascii_lowercase();
    let raw_value = text.get(colon + 1..)?;
    let value = raw_value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    let value_start = start + colon + 1 + (raw_value.len() - raw_value.trim_start().len());
    Some((name, value_start..value_start + value.len()))
}

/// Split a `style` attribute into `(property, value)` pairs.
///
/// Property names are lowercased; empty or malformed declarations are skipped.
pub fn parse_declarations(source: &str) -> Vec<(String, String)> {
    declaration_spans(source)
        .into_iter()
        .filter_map(|span| split_declaration(source, span))
        .filter_map(|(name, value)| Some((name, source.get(value)?.to_owned())))
        .collect()
}

/// Set `property` to `value` in the text of a `style` attribute.
///
/// Existing declarations of `property` get their value replaced in place,
/// otherwise a declaration is appended. Everything else is kept as written.
pub fn set_declaration(source: &str, property: &str, value: &str) -> String {
    let targets: Vec<Range<usize>> = declaration_spans(source)
        .into_iter()
        .filter_map(|span| split_declaration(source, span))
        .filter(|(name, _)| name == property)
        .map(|(_, range)| range)
        .collect();
    if targets.is_empty() {
        let kept = source.trim_end();
        let separator = if kept.is_empty() {
            ""
        } else if kept.ends_with(';') {
            " "
        } else {
            "; "
        };
        return format!("{kept}{separator}{property}: {value};");
    }

    let mut out = String::with_capacity(source.len() + value.len());
    let mut cursor = 0;
    for range in targets {
        out.push_str(source.get(cursor..range.start).unwrap_or_default());
        out.push_str(value);
        cursor = range.end;
    }
    out.push_str(source.get(cursor..).unwrap_or_default());
    out
}
