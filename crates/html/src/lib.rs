#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

//! Page DOM for the reveal coordinator.
//!
//! The DOM lives in an `indextree` arena. Elements carry their attributes
//! inline; inline `style` declarations are read and written through the
//! attribute so there is a single source of truth. `parser` builds the arena
//! from HTML source with html5ever.

pub mod dom;
pub mod parser;

pub use dom::{DOM, DOMNode, NodeKey, NodeKind};
pub use parser::parse_html;
