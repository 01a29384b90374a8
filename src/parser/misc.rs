//! Comments and processing instructions: both are buffered raw until their terminator
//! is found, then validated and normalized in a single pass.

use super::{Parser, State};
use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::Reader;

impl<R: Reader> Parser<R> {
    /// A comment ends at the first `-->`; a bare `--` not immediately followed by `>` is
    /// illegal anywhere in the body, so the search target is `--` itself, with the
    /// trailing byte deciding which case applies.
    pub(super) fn step_comment(&mut self) -> Result<()> {
        loop {
            let hay = self.chunk.as_bytes();
            let search_start = self.scan_from.max(self.index).min(hay.len());
            match memchr::memmem::find(&hay[search_start..], b"--") {
                None => {
                    self.scan_from = hay.len().saturating_sub(1).max(self.index);
                    return Ok(());
                }
                Some(rel) => {
                    let pos = search_start + rel;
                    match hay.get(pos + 2) {
                        None => {
                            self.scan_from = pos;
                            return Ok(());
                        }
                        Some(b'>') => {
                            let body = self.chunk[self.index..pos].to_string();
                            self.index = pos + 3;
                            self.scan_from = self.index;
                            return self.finish_comment(&body);
                        }
                        Some(_) => {
                            return Err(Error::new(ErrorKind::InvalidComment).at(pos));
                        }
                    }
                }
            }
        }
    }

    fn finish_comment(&mut self, raw: &str) -> Result<()> {
        let capture = self.reader.wants_comments();
        let mut content = String::new();
        let mut chars_iter = raw.chars().peekable();
        while let Some(c) = chars_iter.next() {
            if !chars::is_xml_char(c) {
                return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
            }
            if c == '\r' {
                if chars_iter.peek() == Some(&'\n') {
                    chars_iter.next();
                }
                if capture {
                    content.push('\n');
                }
            } else if capture {
                content.push(c);
            }
        }
        self.reader.comment(&content).map_err(Error::from_reader)?;
        self.bracket_run = 0;
        self.state = if self.stack.is_empty() { State::Misc } else { State::Text };
        Ok(())
    }

    pub(super) fn step_pi_target(&mut self) -> Result<()> {
        if self.element.is_empty() {
            match self.chunk[self.index..].chars().next() {
                None => return Ok(()),
                Some(c) => {
                    if !chars::is_name_start(c) {
                        return Err(Error::new(ErrorKind::InvalidPi).at(self.index));
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
        if self.element.eq_ignore_ascii_case("xml") {
            return Err(Error::new(ErrorKind::ReservedPi).at(self.index));
        }
        self.state = State::PiAfterTarget;
        Ok(())
    }

    pub(super) fn step_pi_after_target(&mut self) -> Result<()> {
        let c = match self.chunk[self.index..].chars().next() {
            Some(c) => c,
            None => return Ok(()),
        };
        if c == '?' {
            match self.chunk.as_bytes().get(self.index + 1) {
                None => Ok(()),
                Some(b'>') => {
                    self.index += 2;
                    self.finish_pi(String::new())
                }
                Some(_) => Err(Error::new(ErrorKind::InvalidPi).at(self.index)),
            }
        } else if chars::is_whitespace(c) {
            self.index += c.len_utf8();
            self.scan_from = self.index;
            self.state = State::PiContent;
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidPi).at(self.index))
        }
    }

    pub(super) fn step_pi_content(&mut self) -> Result<()> {
        let hay = self.chunk.as_bytes();
        let search_start = self.scan_from.max(self.index).min(hay.len());
        match memchr::memmem::find(&hay[search_start..], b"?>") {
            None => {
                self.scan_from = hay.len().saturating_sub(1).max(self.index);
                Ok(())
            }
            Some(rel) => {
                let pos = search_start + rel;
                let body = self.chunk[self.index..pos].to_string();
                self.index = pos + 2;
                self.finish_pi(body)
            }
        }
    }

    fn finish_pi(&mut self, raw: String) -> Result<()> {
        let capture = self.reader.wants_pi();
        let mut content = String::new();
        let mut chars_iter = raw.chars().peekable();
        while let Some(c) = chars_iter.next() {
            if !chars::is_xml_char(c) {
                return Err(Error::new(ErrorKind::InvalidChar).at(self.index));
            }
            if c == '\r' {
                if chars_iter.peek() == Some(&'\n') {
                    chars_iter.next();
                }
                if capture {
                    content.push('\n');
                }
            } else if capture {
                content.push(c);
            }
        }
        let target = std::mem::take(&mut self.element);
        self.reader.pi(&target, &content).map_err(Error::from_reader)?;
        self.bracket_run = 0;
        self.state = if self.stack.is_empty() { State::Misc } else { State::Text };
        Ok(())
    }
}
