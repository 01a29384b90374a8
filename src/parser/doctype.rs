//! `<!DOCTYPE name [SYSTEM|PUBLIC ...] ['[' internal-subset ']'] '>'`.
//!
//! Only `name` is surfaced to the `Reader`; external identifiers and the internal
//! subset are skimmed for well-formedness and discarded. The internal subset has no
//! fixed terminator (the closing `]` depends on matching the opening `[`, skipping over
//! quoted literals that may themselves contain brackets) so it is the one other
//! construct, besides text, scanned a character at a time with persisted state.

use super::{scan_ws_run, DoctypeExternalKind, Parser, State};
use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::{Doctype, Reader};

impl<R: Reader> Parser<R> {
    pub(super) fn step_doctype_ws(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws, terminated) = scan_ws_run(rest);
        if ws == 0 && terminated {
            return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
        }
        if ws > 0 {
            self.index += ws;
        }
        if !terminated {
            return Ok(());
        }
        self.element.clear();
        self.state = State::DoctypeName;
        Ok(())
    }

    pub(super) fn step_doctype_name(&mut self) -> Result<()> {
        if self.element.is_empty() {
            match self.chunk[self.index..].chars().next() {
                None => return Ok(()),
                Some(c) => {
                    if !chars::is_name_start(c) {
                        return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
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
        self.state = State::DoctypeAfterName;
        Ok(())
    }

    pub(super) fn step_doctype_after_name(&mut self) -> Result<()> {
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
                self.finish_doctype()
            }
            '[' => {
                self.index += 1;
                self.doctype_bracket_depth = 1;
                self.doctype_quote = 0;
                self.state = State::DoctypeSubset;
                Ok(())
            }
            'S' => {
                self.literal_progress = 0;
                self.state = State::DoctypeSystemKw;
                Ok(())
            }
            'P' => {
                self.literal_progress = 0;
                self.state = State::DoctypePublicKw;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index)),
        }
    }

    pub(super) fn step_doctype_system_kw(&mut self) -> Result<()> {
        match self.match_literal(b"SYSTEM") {
            Err(()) => Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index)),
            Ok(false) => Ok(()),
            Ok(true) => {
                self.doctype_external = DoctypeExternalKind::System;
                self.doctype_lit_stage = 1;
                self.state = State::DoctypeWsBeforeLit;
                Ok(())
            }
        }
    }

    pub(super) fn step_doctype_public_kw(&mut self) -> Result<()> {
        match self.match_literal(b"PUBLIC") {
            Err(()) => Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index)),
            Ok(false) => Ok(()),
            Ok(true) => {
                self.doctype_external = DoctypeExternalKind::Public;
                self.doctype_lit_stage = 0;
                self.state = State::DoctypeWsBeforeLit;
                Ok(())
            }
        }
    }

    pub(super) fn step_doctype_ws_before_lit(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws, terminated) = scan_ws_run(rest);
        if ws == 0 && terminated {
            return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
        }
        if ws > 0 {
            self.index += ws;
        }
        if !terminated {
            return Ok(());
        }
        self.state = State::DoctypeQuoteOpen;
        Ok(())
    }

    pub(super) fn step_doctype_quote_open(&mut self) -> Result<()> {
        let c = match self.chunk.as_bytes().get(self.index) {
            Some(&b) => b,
            None => return Ok(()),
        };
        if c != b'\'' && c != b'"' {
            return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
        }
        self.quote = c;
        self.index += 1;
        self.content.clear();
        self.state = State::DoctypeLitValue;
        Ok(())
    }

    pub(super) fn step_doctype_lit_value(&mut self) -> Result<()> {
        match memchr::memchr(self.quote, &self.chunk.as_bytes()[self.index..]) {
            None => Ok(()),
            Some(rel) => {
                let value = self.chunk[self.index..self.index + rel].to_string();
                self.index += rel + 1;
                for c in value.chars() {
                    if !chars::is_xml_char(c) {
                        return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
                    }
                }
                match self.doctype_lit_stage {
                    0 => {
                        self.doctype_public_id = Some(value);
                        self.doctype_lit_stage = 1;
                        self.state = State::DoctypeWsBeforeLit;
                    }
                    _ => {
                        self.doctype_system_id = Some(value);
                        self.state = State::DoctypeAfterExternalId;
                    }
                }
                Ok(())
            }
        }
    }

    pub(super) fn step_doctype_after_external_id(&mut self) -> Result<()> {
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
                self.finish_doctype()
            }
            '[' => {
                self.index += 1;
                self.doctype_bracket_depth = 1;
                self.doctype_quote = 0;
                self.state = State::DoctypeSubset;
                Ok(())
            }
            _ => Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index)),
        }
    }

    pub(super) fn step_doctype_subset(&mut self) -> Result<()> {
        let mut idx = self.index;
        let mut quote = self.doctype_quote;
        let mut depth = self.doctype_bracket_depth;
        let bytes_len = self.chunk.len();
        while idx < bytes_len {
            let c = self.chunk[idx..].chars().next().unwrap();
            if !chars::is_xml_char(c) {
                self.index = idx;
                return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(idx));
            }
            let len = c.len_utf8();
            if quote != 0 {
                if c == quote as char {
                    quote = 0;
                }
                idx += len;
            } else {
                match c {
                    '\'' | '"' => {
                        quote = c as u8;
                        idx += len;
                    }
                    '[' => {
                        depth += 1;
                        idx += len;
                    }
                    ']' => {
                        depth -= 1;
                        idx += len;
                        if depth == 0 {
                            self.index = idx;
                            self.doctype_quote = quote;
                            self.doctype_bracket_depth = depth;
                            self.state = State::DoctypeAfterSubset;
                            return Ok(());
                        }
                    }
                    _ => idx += len,
                }
            }
        }
        self.index = idx;
        self.doctype_quote = quote;
        self.doctype_bracket_depth = depth;
        Ok(())
    }

    pub(super) fn step_doctype_after_subset(&mut self) -> Result<()> {
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
            return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
        }
        self.index += 1;
        self.finish_doctype()
    }

    fn finish_doctype(&mut self) -> Result<()> {
        let doctype = Doctype { name: std::mem::take(&mut self.element) };
        if self.reader.wants_doctype() {
            self.reader.doctype(&doctype).map_err(Error::from_reader)?;
        }
        self.doctype_external = DoctypeExternalKind::None;
        self.doctype_public_id = None;
        self.doctype_system_id = None;
        self.state = State::Misc;
        Ok(())
    }
}
