//! A streaming, non-validating, well-formedness-checking XML 1.0 parser with a push
//! (callback) event API.
//!
//! A [`Parser`] is fed text through repeated calls to [`Parser::write`], followed by
//! exactly one [`Parser::end`]. It never buffers the whole document: each call advances
//! an internal state machine as far as the currently available text allows, holding any
//! incomplete construct over to the next call. Structural events (the XML declaration,
//! doctype, processing instructions, comments, tags, text, entity references) are
//! reported synchronously to a user-supplied [`Reader`] sink as soon as each one
//! completes.
//!
//! Byte-oriented input (as opposed to text already known to be valid UTF-8) should be
//! routed through [`Decoder`] first, which sniffs UTF-8 / UTF-16LE / UTF-16BE from a
//! byte-order mark or the declaration's `encoding` pseudo-attribute and decodes strictly
//! (malformed byte sequences are a fatal error, never lossily replaced).

mod chars;
mod decoder;
mod error;
mod parser;
mod reader;

pub use decoder::Decoder;
pub use error::{Error, ErrorKind, Result};
pub use parser::Parser;
pub use reader::{Attributes, Doctype, Reader, XmlDecl};

/// Knobs controlling [`Parser`] behavior. `Copy` and cheap to construct; the common case
/// is `ParserOptions::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    incomplete_text_nodes: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions { incomplete_text_nodes: false }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, a single logical text node may be reported through more than one
    /// [`Reader::text`] call if it happens to straddle a `write` chunk boundary. The
    /// concatenation of those calls always equals what a single call would have reported.
    /// Off by default: callers that want one `text` call per logical node at the cost of
    /// extra buffering should leave this alone.
    pub fn incomplete_text_nodes(mut self, enabled: bool) -> Self {
        self.incomplete_text_nodes = enabled;
        self
    }

    pub(crate) fn wants_incomplete_text_nodes(&self) -> bool {
        self.incomplete_text_nodes
    }
}
