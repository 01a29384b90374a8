//! Start tags, end tags, and attribute values.

use super::{scan_name_run, scan_ws_run, AttrEqPhase, Parser, State};
use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::Reader;

impl<R: Reader> Parser<R> {
    pub(super) fn step_start_tag_name(&mut self) -> Result<()> {
        if self.element.is_empty() {
            match self.chunk[self.index..].chars().next() {
                None => return Ok(()),
                Some(c) => {
                    if !chars::is_name_start(c) {
                        return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
                    }
                }
            }
        }
        let rest = &self.chunk[self.index..];
        let (len, terminated) = scan_name_run(rest);
        if len > 0 {
            self.element.push_str(&rest[..len]);
            self.index += len;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk[self.index..].chars().next().unwrap();
        match c {
            c if chars::is_whitespace(c) => {
                self.index += c.len_utf8();
                self.state = State::StartTagWs;
                Ok(())
            }
            '>' => {
                self.index += 1;
                self.finish_start_tag()
            }
            '/' => {
                self.index += 1;
                self.state = State::EmptyTagEnd;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::InvalidStartTag).at(self.index)),
        }
    }

    pub(super) fn step_start_tag_ws(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws, terminated) = scan_ws_run(rest);
        if ws > 0 {
            self.index += ws;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk[self.index..].chars().next().unwrap();
        match c {
            '>' => {
                self.index += 1;
                self.finish_start_tag()
            }
            '/' => {
                self.index += 1;
                self.state = State::EmptyTagEnd;
                Ok(())
            }
            c if chars::is_name_start(c) => {
                self.attr_name.clear();
                self.state = State::AttrName;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::InvalidStartTag).at(self.index)),
        }
    }

    pub(super) fn step_empty_tag_end(&mut self) -> Result<()> {
        let c = match self.chunk.as_bytes().get(self.index) {
            Some(&b) => b,
            None => return Ok(()),
        };
        if c != b'>' {
            return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
        }
        self.index += 1;
        self.finish_empty_tag()
    }

    pub(super) fn step_attr_name(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (len, terminated) = scan_name_run(rest);
        if len > 0 {
            self.attr_name.push_str(&rest[..len]);
            self.index += len;
        }
        if !terminated {
            return Ok(());
        }
        self.attr_eq_phase = AttrEqPhase::BeforeEq;
        self.state = State::AttrEq;
        Ok(())
    }

    pub(super) fn step_attr_eq(&mut self) -> Result<()> {
        match self.attr_eq_phase {
            AttrEqPhase::BeforeEq => {
                let rest = &self.chunk[self.index..];
                let (ws, terminated) = scan_ws_run(rest);
                if ws > 0 {
                    self.index += ws;
                }
                if !terminated {
                    return Ok(());
                }
                let c = self.chunk[self.index..].chars().next().unwrap();
                if c != '=' {
                    return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
                }
                self.index += 1;
                self.attr_eq_phase = AttrEqPhase::AfterEq;
                Ok(())
            }
            AttrEqPhase::AfterEq => {
                let rest = &self.chunk[self.index..];
                let (ws, terminated) = scan_ws_run(rest);
                if ws > 0 {
                    self.index += ws;
                }
                if !terminated {
                    return Ok(());
                }
                let c = self.chunk.as_bytes()[self.index];
                if c != b'\'' && c != b'"' {
                    return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
                }
                self.quote = c;
                self.index += 1;
                self.content.clear();
                self.state = State::AttrValue;
                Ok(())
            }
        }
    }

    pub(super) fn step_attr_value(&mut self) -> Result<()> {
        let hay = self.chunk.as_bytes();
        match memchr::memchr2(self.quote, b'<', &hay[self.index..]) {
            None => Ok(()),
            Some(rel) => {
                let pos = self.index + rel;
                if hay[pos] == b'<' {
                    return Err(Error::new(ErrorKind::InvalidAttributeValue).at(pos));
                }
                let span = self.chunk[self.index..pos].to_string();
                self.index = pos + 1;
                self.process_attr_value_span(&span)?;
                let name = std::mem::take(&mut self.attr_name);
                if self.attrs.contains(&name) {
                    return Err(Error::new(ErrorKind::DuplicateAttr).at(pos));
                }
                let value = std::mem::take(&mut self.content);
                self.attrs.insert(name, value);
                self.state = State::StartTagWs;
                Ok(())
            }
        }
    }

    fn process_attr_value_span(&mut self, span: &str) -> Result<()> {
        let mut chars_iter = span.chars().peekable();
        while let Some(c) = chars_iter.next() {
            match c {
                '\r' => {
                    if chars_iter.peek() == Some(&'\n') {
                        chars_iter.next();
                    }
                    self.content.push(' ');
                }
                '\t' | '\n' | ' ' => self.content.push(' '),
                '&' => {
                    let mut name = String::new();
                    let mut terminated = false;
                    for nc in chars_iter.by_ref() {
                        if nc == ';' {
                            terminated = true;
                            break;
                        }
                        name.push(nc);
                    }
                    if !terminated {
                        return Err(Error::new(ErrorKind::InvalidEntityRef).at(self.index));
                    }
                    self.resolve_attr_reference(&name)?;
                }
                _ => {
                    if !chars::is_xml_char(c) {
                        return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
                    }
                    self.content.push(c);
                }
            }
        }
        Ok(())
    }

    fn finish_start_tag(&mut self) -> Result<()> {
        if self.stack.is_empty() && self.seen_root {
            return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
        }
        self.reader.start(&self.element, &self.attrs).map_err(Error::from_reader)?;
        self.stack.push(self.element.clone());
        self.seen_root = true;
        self.element.clear();
        self.attrs.clear();
        self.bracket_run = 0;
        self.pending_cr = false;
        self.state = State::Text;
        Ok(())
    }

    fn finish_empty_tag(&mut self) -> Result<()> {
        if self.stack.is_empty() && self.seen_root {
            return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index));
        }
        self.reader.empty(&self.element, &self.attrs).map_err(Error::from_reader)?;
        self.seen_root = true;
        self.element.clear();
        self.attrs.clear();
        self.state = if self.stack.is_empty() {
            State::Misc
        } else {
            self.bracket_run = 0;
            self.pending_cr = false;
            State::Text
        };
        Ok(())
    }

    pub(super) fn step_end_tag_name(&mut self) -> Result<()> {
        if self.element.is_empty() {
            match self.chunk[self.index..].chars().next() {
                None => return Ok(()),
                Some(c) => {
                    if !chars::is_name_start(c) {
                        return Err(Error::new(ErrorKind::InvalidEndTag).at(self.index));
                    }
                }
            }
        }
        let rest = &self.chunk[self.index..];
        let (len, terminated) = scan_name_run(rest);
        if len > 0 {
            self.element.push_str(&rest[..len]);
            self.index += len;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk[self.index..].chars().next().unwrap();
        match c {
            '>' => {
                self.index += 1;
                self.finish_end_tag()
            }
            c if chars::is_whitespace(c) => {
                self.index += c.len_utf8();
                self.state = State::EndTagWs;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::InvalidEndTag).at(self.index)),
        }
    }

    pub(super) fn step_end_tag_ws(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws, terminated) = scan_ws_run(rest);
        if ws > 0 {
            self.index += ws;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk.as_bytes()[self.index];
        if c != b'>' {
            return Err(Error::new(ErrorKind::InvalidEndTag).at(self.index));
        }
        self.index += 1;
        self.finish_end_tag()
    }

    fn finish_end_tag(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(open) if open == self.element => {}
            _ => return Err(Error::new(ErrorKind::InvalidEndTag).at(self.index)),
        }
        self.reader.end(&self.element).map_err(Error::from_reader)?;
        self.element.clear();
        self.state = if self.stack.is_empty() {
            State::Misc
        } else {
            self.bracket_run = 0;
            self.pending_cr = false;
            State::Text
        };
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
        starts: Vec<(String, Vec<(String, String)>)>,
        empties: Vec<String>,
        ends: Vec<String>,
    }

    impl Reader for Sink {
        type Error = Infallible;

        fn start(&mut self, name: &str, attrs: &Attributes) -> Result<(), Infallible> {
            self.starts.push((name.to_string(), attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()));
            Ok(())
        }
        fn empty(&mut self, name: &str, _attrs: &Attributes) -> Result<(), Infallible> {
            self.empties.push(name.to_string());
            Ok(())
        }
        fn end(&mut self, name: &str) -> Result<(), Infallible> {
            self.ends.push(name.to_string());
            Ok(())
        }
        fn text(&mut self, _text: &str) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn start_tag_collects_attributes_in_source_order() {
        let mut p = Parser::new(Sink::default());
        p.write(r#"<r a="1" b="2"></r>"#).unwrap();
        p.end().unwrap();
        let sink = p.into_inner();
        assert_eq!(sink.starts, vec![("r".to_string(), vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())])]);
        assert_eq!(sink.ends, vec!["r".to_string()]);
    }

    #[test]
    fn empty_tag_reports_empty_not_start_and_end() {
        let mut p = Parser::new(Sink::default());
        p.write("<r/>").unwrap();
        p.end().unwrap();
        let sink = p.into_inner();
        assert_eq!(sink.empties, vec!["r".to_string()]);
        assert!(sink.starts.is_empty());
        assert!(sink.ends.is_empty());
    }

    #[test]
    fn mismatched_end_tag_is_an_error() {
        let mut p = Parser::new(Sink::default());
        let err = p.write("<a></b>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEndTag);
    }

    #[test]
    fn duplicate_attribute_is_an_error() {
        let mut p = Parser::new(Sink::default());
        let err = p.write(r#"<r a="1" a="2"/>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateAttr);
    }

    #[test]
    fn literal_less_than_in_attribute_value_is_an_error() {
        let mut p = Parser::new(Sink::default());
        let err = p.write(r#"<r a="<"/>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAttributeValue);
    }

    #[test]
    fn attribute_whitespace_is_normalized_to_single_spaces() {
        let mut p = Parser::new(Sink::default());
        p.write("<r a=\"1\t2\n3\"></r>").unwrap();
        p.end().unwrap();
        let sink = p.into_inner();
        assert_eq!(sink.starts, vec![("r".to_string(), vec![("a".to_string(), "1 2 3".to_string())])]);
    }
}
