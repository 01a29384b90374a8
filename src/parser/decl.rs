//! The `<?xml version="1.0" encoding="..." standalone="..."?>` declaration. `version` is
//! mandatory and must come first; `encoding` and `standalone` are optional and, if both
//! present, must appear in that order. `decl_pos` tracks how far through that fixed
//! sequence the declaration has gotten.

use super::{scan_ws_run, Parser, State};
use crate::error::{Error, ErrorKind, Result};
use crate::reader::{Reader, XmlDecl};

impl<R: Reader> Parser<R> {
    pub(super) fn step_decl_attr_name(&mut self) -> Result<()> {
        if self.element.is_empty() {
            match self.chunk[self.index..].chars().next() {
                None => return Ok(()),
                Some(c) => {
                    if !crate::chars::is_name_start(c) {
                        return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
                    }
                }
            }
        }
        let rest = &self.chunk[self.index..];
        let (len, terminated) = super::scan_name_run(rest);
        if len > 0 {
            self.element.push_str(&rest[..len]);
            self.index += len;
        }
        if !terminated {
            return Ok(());
        }
        let expected: &[&str] = match self.decl_pos {
            0 => &["version"],
            1 => &["encoding", "standalone"],
            2 => &["standalone"],
            _ => &[],
        };
        if !expected.contains(&self.element.as_str()) {
            return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
        }
        self.state = State::DeclEq;
        Ok(())
    }

    pub(super) fn step_decl_eq(&mut self) -> Result<()> {
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
            return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
        }
        self.index += 1;
        self.state = State::DeclBeforeQuote;
        Ok(())
    }

    pub(super) fn step_decl_before_quote(&mut self) -> Result<()> {
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
            return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
        }
        self.quote = c;
        self.index += 1;
        self.content.clear();
        self.state = State::DeclValue;
        Ok(())
    }

    pub(super) fn step_decl_value(&mut self) -> Result<()> {
        match memchr::memchr(self.quote, &self.chunk.as_bytes()[self.index..]) {
            None => Ok(()),
            Some(rel) => {
                let value = self.chunk[self.index..self.index + rel].to_string();
                self.index += rel + 1;
                self.apply_decl_value(value)?;
                self.state = State::DeclAfterValue;
                Ok(())
            }
        }
    }

    fn apply_decl_value(&mut self, value: String) -> Result<()> {
        match self.element.as_str() {
            "version" => {
                if !is_valid_version(&value) {
                    return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
                }
                self.decl_version = Some(value);
                self.decl_pos = 1;
            }
            "encoding" => {
                if !is_valid_encoding_name(&value) {
                    return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
                }
                self.decl_encoding = Some(value.to_ascii_lowercase());
                self.decl_pos = 2;
            }
            "standalone" => {
                let b = match value.as_str() {
                    "yes" => true,
                    "no" => false,
                    _ => return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index)),
                };
                self.decl_standalone = Some(b);
                self.decl_pos = 3;
            }
            _ => return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index)),
        }
        self.element.clear();
        Ok(())
    }

    pub(super) fn step_decl_after_value(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws, terminated) = scan_ws_run(rest);
        if ws > 0 {
            self.index += ws;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk[self.index..].chars().next().unwrap();
        if c == '?' {
            match self.chunk.as_bytes().get(self.index + 1) {
                None => Ok(()),
                Some(b'>') => {
                    if self.decl_version.is_none() {
                        return Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index));
                    }
                    self.index += 2;
                    self.finish_xml_decl()
                }
                Some(_) => Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index)),
            }
        } else if crate::chars::is_name_start(c) && self.decl_pos < 3 {
            self.element.clear();
            self.state = State::DeclAttrName;
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidXmlDecl).at(self.index))
        }
    }

    fn finish_xml_decl(&mut self) -> Result<()> {
        let decl = XmlDecl {
            version: self.decl_version.take().unwrap_or_default(),
            encoding: self.decl_encoding.take(),
            standalone: self.decl_standalone.take(),
        };
        self.decl_pos = 0;
        self.reader.xml(&decl).map_err(Error::from_reader)?;
        self.state = State::Misc;
        Ok(())
    }
}

fn is_valid_version(s: &str) -> bool {
    match s.strip_prefix("1.") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn is_valid_encoding_name(s: &str) -> bool {
    let mut chars_iter = s.chars();
    match chars_iter.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars_iter.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}
