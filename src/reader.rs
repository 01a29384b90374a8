//! The sink contract the parser drives: [`Reader`], plus the small value types its
//! methods receive.

use std::fmt;

/// An insertion-ordered, duplicate-free collection of attribute name/value pairs.
///
/// Iteration order is the order attributes appeared in the source. The parser clears
/// and reuses one instance across tags rather than allocating a fresh map per start tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: Vec<(String, String)>,
}

impl Attributes {
    pub(crate) fn new() -> Self {
        Attributes { pairs: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.pairs.clear();
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn insert(&mut self, name: String, value: String) {
        debug_assert!(!self.contains(&name), "caller must reject duplicates before inserting");
        self.pairs.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// The parsed `<?xml ... ?>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDecl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// The name captured from a `<!DOCTYPE ...>` declaration. Internal subset contents and
/// external identifiers are skimmed for well-formedness only and are not exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctype {
    pub name: String,
}

/// The sink the parser drives. `start`, `empty`, `end`, and `text` have no default body
/// and must be implemented; every other method is optional and defaults to a no-op, mirroring
/// a SAX content handler where most callbacks go unused by any given consumer.
///
/// Each method returns `Result<(), Self::Error>`; an `Err` aborts the in-progress `write`
/// or `end` call and leaves the parser terminal.
pub trait Reader {
    type Error: std::error::Error + Send + Sync + 'static;

    fn start(&mut self, name: &str, attributes: &Attributes) -> Result<(), Self::Error>;

    fn empty(&mut self, name: &str, attributes: &Attributes) -> Result<(), Self::Error>;

    fn end(&mut self, name: &str) -> Result<(), Self::Error>;

    fn text(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Called once, after `?>`, if the document carries an XML declaration.
    fn xml(&mut self, _decl: &XmlDecl) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once, after the closing `>` of a `<!DOCTYPE ...>`.
    fn doctype(&mut self, _doctype: &Doctype) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called after `?>` of a processing instruction. `content` is empty (not absent)
    /// when the PI had no content, and is only ever populated when [`Reader::wants_pi`]
    /// returns `true`.
    fn pi(&mut self, _target: &str, _content: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called after `-->`. Only ever populated when [`Reader::wants_comments`] returns `true`.
    fn comment(&mut self, _text: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a non-predefined `&name;` encountered in text content, after the
    /// preceding text has already been flushed via [`Reader::text`].
    fn entity_ref(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a non-predefined `&name;` encountered inside an attribute value.
    /// The returned string, if any, is spliced into the attribute value verbatim
    /// (it is not re-parsed for further references). Returning `None` is an
    /// `UnresolvedEntity` error.
    fn replace_entity_ref(&mut self, _name: &str) -> Option<String> {
        None
    }

    /// Whether [`Reader::comment`] should receive buffered content. When `false`, comment
    /// bodies are still scanned for well-formedness but not materialized into a `String`.
    fn wants_comments(&self) -> bool {
        true
    }

    /// Whether [`Reader::pi`] should receive buffered content.
    fn wants_pi(&self) -> bool {
        true
    }

    /// Whether [`Reader::doctype`] (and the internal-subset skim) should bother reporting.
    /// The internal subset is always skimmed for well-formedness regardless of this flag.
    fn wants_doctype(&self) -> bool {
        true
    }

    /// Whether [`Reader::entity_ref`] should be invoked for a non-predefined `&name;`
    /// found in text content. When `false` (the default), such a reference is a fatal
    /// `UnresolvedEntity` error instead of being silently dropped — a `Reader` that never
    /// overrides `entity_ref` has no way to observe the reference at all, so reporting
    /// success would misrepresent the document.
    fn wants_entity_ref(&self) -> bool {
        false
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}=\"{}\"", name, value)?;
        }
        Ok(())
    }
}
