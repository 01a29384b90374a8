//! Numeric character references and predefined entities, shared between text content
//! and attribute values (the only two contexts a `&...;` reference can appear in).

use super::Parser;
use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::Reader;

/// `amp`/`lt`/`gt`/`apos`/`quot` are the five entities every XML processor resolves
/// without consulting the DTD.
pub(super) fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Parses the body of a `&#...;` or `&#x...;` reference (without the `&#`/`&#x` prefix
/// or trailing `;`) into the character it denotes.
pub(super) fn parse_char_ref(rest: &str) -> Option<char> {
    let value = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        chars::parse_hex(hex)
    } else {
        chars::parse_decimal(rest)
    }?;
    if !chars::is_valid_char_ref(value) {
        return None;
    }
    char::from_u32(value)
}

impl<R: Reader> Parser<R> {
    /// Resolves a reference encountered in attribute-value normalization; the result is
    /// appended directly to `self.content`. Unlike text content, this never flushes or
    /// calls `entity_ref`, since the entire attribute value is already materialized.
    pub(super) fn resolve_attr_reference(&mut self, inner: &str) -> Result<()> {
        if let Some(rest) = inner.strip_prefix('#') {
            let c = parse_char_ref(rest)
                .ok_or_else(|| Error::new(ErrorKind::InvalidCharRef).at(self.index))?;
            self.content.push(c);
            return Ok(());
        }
        if !super::is_valid_name(inner) {
            return Err(Error::new(ErrorKind::InvalidEntityRef).at(self.index));
        }
        if let Some(c) = predefined_entity(inner) {
            self.content.push(c);
            return Ok(());
        }
        match self.reader.replace_entity_ref(inner) {
            Some(s) => self.content.push_str(&s),
            None => return Err(Error::new(ErrorKind::UnresolvedEntity).at(self.index)),
        }
        Ok(())
    }
}
