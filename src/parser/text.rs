//! Character data: the one construct with no fixed terminator, scanned incrementally a
//! span at a time between the next `<` or `&`. `pending_cr` carries a lone trailing `\r`
//! across a chunk boundary (so a split `\r\n` still normalizes to one `\n`); `bracket_run`
//! counts consecutive literal `]` so a literal `]]>` can be rejected the moment the `>`
//! arrives, even when the run was buffered one call at a time.

use super::reference::{parse_char_ref, predefined_entity};
use super::{Parser, State};
use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::Reader;

impl<R: Reader> Parser<R> {
    pub(super) fn step_text(&mut self) -> Result<()> {
        let hay = self.chunk.as_bytes();
        match memchr::memchr2(b'<', b'&', &hay[self.index..]) {
            None => {
                let span = self.chunk[self.index..].to_string();
                self.index = self.chunk.len();
                self.process_text_span(&span, true)?;
                if self.options.wants_incomplete_text_nodes() {
                    self.flush_text()?;
                }
                Ok(())
            }
            Some(rel) => {
                let pos = self.index + rel;
                if pos > self.index {
                    let span = self.chunk[self.index..pos].to_string();
                    self.process_text_span(&span, false)?;
                }
                let c = hay[pos];
                if c == b'&' {
                    self.index = pos + 1;
                    self.scan_from = self.index;
                    self.state = State::Reference;
                } else {
                    self.index = pos + 1;
                    self.state = State::OpenAngle;
                }
                Ok(())
            }
        }
    }

    /// `at_true_boundary` is true only when `span` is the entire remaining chunk (no `<`
    /// or `&` found): a trailing `\r` there is genuinely ambiguous (a `\n` might be the
    /// very next byte written) and must wait. When `span` was cut short by a known `<`/`&`,
    /// a trailing `\r` can be resolved immediately since neither of those is `\n`.
    fn process_text_span(&mut self, span: &str, at_true_boundary: bool) -> Result<()> {
        let mut chars_iter = span.chars().peekable();
        if self.pending_cr {
            if chars_iter.peek() == Some(&'\n') {
                chars_iter.next();
            }
            self.push_text_char('\n')?;
            self.pending_cr = false;
        }
        while let Some(c) = chars_iter.next() {
            if !chars::is_xml_char(c) {
                return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
            }
            if c == '\r' {
                if chars_iter.peek() == Some(&'\n') {
                    chars_iter.next();
                    self.push_text_char('\n')?;
                } else if chars_iter.peek().is_none() && at_true_boundary {
                    self.pending_cr = true;
                } else {
                    self.push_text_char('\n')?;
                }
            } else {
                self.push_text_char(c)?;
            }
        }
        Ok(())
    }

    fn push_text_char(&mut self, c: char) -> Result<()> {
        if c == ']' {
            self.bracket_run += 1;
        } else if c == '>' && self.bracket_run >= 2 {
            return Err(Error::new(ErrorKind::InvalidCdEnd).at(self.index));
        } else {
            self.bracket_run = 0;
        }
        self.content.push(c);
        Ok(())
    }

    pub(super) fn step_reference(&mut self) -> Result<()> {
        let hay = self.chunk.as_bytes();
        let search_start = self.scan_from.max(self.index).min(hay.len());
        match memchr::memchr(b';', &hay[search_start..]) {
            None => {
                self.scan_from = hay.len();
                Ok(())
            }
            Some(rel) => {
                let pos = search_start + rel;
                let inner = self.chunk[self.index..pos].to_string();
                self.index = pos + 1;
                self.scan_from = self.index;
                self.resolve_text_reference(&inner)?;
                self.state = State::Text;
                Ok(())
            }
        }
    }

    fn emit_reference_char(&mut self, c: char) {
        self.bracket_run = 0;
        self.content.push(c);
    }

    fn resolve_text_reference(&mut self, inner: &str) -> Result<()> {
        if let Some(rest) = inner.strip_prefix('#') {
            let c = parse_char_ref(rest)
                .ok_or_else(|| Error::new(ErrorKind::InvalidCharRef).at(self.index))?;
            self.emit_reference_char(c);
            return Ok(());
        }
        if !super::is_valid_name(inner) {
            return Err(Error::new(ErrorKind::InvalidEntityRef).at(self.index));
        }
        if let Some(c) = predefined_entity(inner) {
            self.emit_reference_char(c);
            return Ok(());
        }
        if !self.reader.wants_entity_ref() {
            return Err(Error::new(ErrorKind::UnresolvedEntity).at(self.index));
        }
        self.flush_text()?;
        self.reader.entity_ref(inner).map_err(Error::from_reader)?;
        Ok(())
    }

    pub(super) fn step_cdata(&mut self) -> Result<()> {
        let hay = self.chunk.as_bytes();
        let search_start = self.scan_from.max(self.index).min(hay.len());
        match memchr::memmem::find(&hay[search_start..], b"]]>") {
            None => {
                self.scan_from = hay.len().saturating_sub(2).max(self.index);
                Ok(())
            }
            Some(rel) => {
                let pos = search_start + rel;
                let body = self.chunk[self.index..pos].to_string();
                self.index = pos + 3;
                self.scan_from = self.index;
                self.process_cdata_body(&body)?;
                self.bracket_run = 0;
                self.state = State::Text;
                Ok(())
            }
        }
    }

    fn process_cdata_body(&mut self, body: &str) -> Result<()> {
        let mut chars_iter = body.chars().peekable();
        if self.pending_cr {
            if chars_iter.peek() == Some(&'\n') {
                chars_iter.next();
            }
            self.content.push('\n');
            self.pending_cr = false;
        }
        while let Some(c) = chars_iter.next() {
            if !chars::is_xml_char(c) {
                return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
            }
            if c == '\r' {
                if chars_iter.peek() == Some(&'\n') {
                    chars_iter.next();
                }
                self.content.push('\n');
            } else {
                self.content.push(c);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::error::ErrorKind;
    use crate::reader::{Attributes, Reader};
    use std::convert::Infallible;

    #[derive(Default)]
    struct Sink {
        text: Vec<String>,
    }

    impl Reader for Sink {
        type Error = Infallible;
        fn start(&mut self, _name: &str, _attrs: &Attributes) -> Result<(), Infallible> {
            Ok(())
        }
        fn empty(&mut self, _name: &str, _attrs: &Attributes) -> Result<(), Infallible> {
            Ok(())
        }
        fn end(&mut self, _name: &str) -> Result<(), Infallible> {
            Ok(())
        }
        fn text(&mut self, text: &str) -> Result<(), Infallible> {
            self.text.push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn cdata_content_is_transparent_to_surrounding_text() {
        let mut p = Parser::new(Sink::default());
        p.write("<a>pre<![CDATA[<&]]>post</a>").unwrap();
        p.end().unwrap();
        assert_eq!(p.into_inner().text, vec!["pre<&post".to_string()]);
    }

    #[test]
    fn crlf_in_text_normalizes_to_lf() {
        let mut p = Parser::new(Sink::default());
        p.write("<a>a\r\nb</a>").unwrap();
        p.end().unwrap();
        assert_eq!(p.into_inner().text, vec!["a\nb".to_string()]);
    }

    #[test]
    fn bare_cdata_end_marker_in_text_is_an_error() {
        let mut p = Parser::new(Sink::default());
        let err = p.write("<a>]]></a>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCdEnd);
    }

    #[test]
    fn predefined_entity_reference_decodes_in_place() {
        let mut p = Parser::new(Sink::default());
        p.write("<a>&amp;&lt;&gt;</a>").unwrap();
        p.end().unwrap();
        assert_eq!(p.into_inner().text, vec!["&<>".to_string()]);
    }

    #[test]
    fn numeric_char_ref_decodes_the_code_point() {
        let mut p = Parser::new(Sink::default());
        p.write("<a>&#65;&#x42;</a>").unwrap();
        p.end().unwrap();
        assert_eq!(p.into_inner().text, vec!["AB".to_string()]);
    }

    #[test]
    fn out_of_range_numeric_char_ref_is_an_error() {
        let mut p = Parser::new(Sink::default());
        let err = p.write("<a>&#xD800;</a>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCharRef);
    }
}
