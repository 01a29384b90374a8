//! The core state machine: turns a sequence of `write(text)` calls into synchronous
//! calls on a [`crate::Reader`].
//!
//! Every bounded construct with a fixed closing token (comments, PIs, CDATA, quoted
//! literals, entity references) is handled the same way: wait until the terminator is
//! found in the buffered suffix, then validate and transform the whole span in one pass.
//! Only two constructs have no such fixed terminator and are scanned one character at a
//! time with a little persisted state: text content (`text.rs`) and the DOCTYPE internal
//! subset (`doctype.rs`). This keeps the amount of genuinely resumable state small.

mod decl;
mod doctype;
mod misc;
mod reference;
mod tag;
mod text;

use crate::chars;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::{Attributes, Doctype, Reader, XmlDecl};
use crate::ParserOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeDecl,
    Misc,
    OpenAngle,
    BangStart,
    Comment,
    PiTarget,
    PiAfterTarget,
    PiContent,
    DeclAttrName,
    DeclEq,
    DeclBeforeQuote,
    DeclValue,
    DeclAfterValue,
    DoctypeWs,
    DoctypeName,
    DoctypeAfterName,
    DoctypeSystemKw,
    DoctypePublicKw,
    DoctypeWsBeforeLit,
    DoctypeQuoteOpen,
    DoctypeLitValue,
    DoctypeAfterExternalId,
    DoctypeSubset,
    DoctypeAfterSubset,
    StartTagName,
    StartTagWs,
    AttrName,
    AttrEq,
    AttrValue,
    EmptyTagEnd,
    EndTagName,
    EndTagWs,
    Text,
    Cdata,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BangCandidate {
    Comment,
    Cdata,
    Doctype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DoctypeExternalKind {
    None,
    System,
    Public,
}

/// Drives a [`Reader`] from pushed text. See the module-level docs for the design.
pub struct Parser<R: Reader> {
    reader: R,
    options: ParserOptions,

    chunk: String,
    index: usize,
    state: State,
    ended: bool,
    errored: bool,

    seen_doctype: bool,
    seen_root: bool,

    element: String,
    attr_name: String,
    content: String,
    attrs: Attributes,
    stack: Vec<String>,
    quote: u8,

    bang_candidate: Option<BangCandidate>,
    literal_progress: usize,
    scan_from: usize,

    decl_pos: u8,
    decl_version: Option<String>,
    decl_encoding: Option<String>,
    decl_standalone: Option<bool>,

    doctype_external: DoctypeExternalKind,
    doctype_lit_stage: u8,
    doctype_public_id: Option<String>,
    doctype_system_id: Option<String>,
    doctype_bracket_depth: u32,
    doctype_quote: u8,

    attr_eq_phase: AttrEqPhase,

    pending_cr: bool,
    bracket_run: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrEqPhase {
    BeforeEq,
    AfterEq,
}

impl<R: Reader> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, ParserOptions::default())
    }

    pub fn with_options(reader: R, options: ParserOptions) -> Self {
        Parser {
            reader,
            options,
            chunk: String::new(),
            index: 0,
            state: State::BeforeDecl,
            ended: false,
            errored: false,
            seen_doctype: false,
            seen_root: false,
            element: String::new(),
            attr_name: String::new(),
            content: String::new(),
            attrs: Attributes::new(),
            stack: Vec::new(),
            quote: 0,
            bang_candidate: None,
            literal_progress: 0,
            scan_from: 0,
            decl_pos: 0,
            decl_version: None,
            decl_encoding: None,
            decl_standalone: None,
            doctype_external: DoctypeExternalKind::None,
            doctype_lit_stage: 0,
            doctype_public_id: None,
            doctype_system_id: None,
            doctype_bracket_depth: 0,
            doctype_quote: 0,
            attr_eq_phase: AttrEqPhase::BeforeEq,
            pending_cr: false,
            bracket_run: 0,
        }
    }

    /// Gives the sink back, consuming the parser.
    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Feeds more document text. Drives the state machine as far as `text` allows,
    /// calling back into the `Reader` synchronously for each completed construct.
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.ensure_not_terminal()?;
        self.chunk.push_str(text);
        match self.run() {
            Ok(()) => {
                if self.index > 0 {
                    self.chunk.drain(..self.index);
                    self.scan_from = self.scan_from.saturating_sub(self.index);
                    self.index = 0;
                }
                Ok(())
            }
            Err(err) => {
                self.errored = true;
                Err(err)
            }
        }
    }

    /// Signals end of input. Fails if the document is incomplete: an open element, a
    /// root element that never appeared, or an in-progress construct.
    pub fn end(&mut self) -> Result<()> {
        self.ensure_not_terminal()?;
        if !self.stack.is_empty() || !self.seen_root || self.state != State::Misc {
            self.errored = true;
            return Err(Error::new(ErrorKind::UnexpectedEof));
        }
        self.ended = true;
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<()> {
        if self.ended || self.errored {
            return Err(Error::with_detail(
                ErrorKind::UnexpectedEof,
                "write/end called on a terminated parser",
            ));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        while self.index < self.chunk.len() {
            let before_index = self.index;
            let before_state = self.state;
            self.step()?;
            if self.index == before_index && self.state == before_state {
                break;
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        match self.state {
            State::BeforeDecl => self.step_before_decl(),
            State::Misc => self.step_misc(),
            State::OpenAngle => self.step_open_angle(),
            State::BangStart => self.step_bang_start(),
            State::Comment => self.step_comment(),
            State::PiTarget => self.step_pi_target(),
            State::PiAfterTarget => self.step_pi_after_target(),
            State::PiContent => self.step_pi_content(),
            State::DeclAttrName => self.step_decl_attr_name(),
            State::DeclEq => self.step_decl_eq(),
            State::DeclBeforeQuote => self.step_decl_before_quote(),
            State::DeclValue => self.step_decl_value(),
            State::DeclAfterValue => self.step_decl_after_value(),
            State::DoctypeWs => self.step_doctype_ws(),
            State::DoctypeName => self.step_doctype_name(),
            State::DoctypeAfterName => self.step_doctype_after_name(),
            State::DoctypeSystemKw => self.step_doctype_system_kw(),
            State::DoctypePublicKw => self.step_doctype_public_kw(),
            State::DoctypeWsBeforeLit => self.step_doctype_ws_before_lit(),
            State::DoctypeQuoteOpen => self.step_doctype_quote_open(),
            State::DoctypeLitValue => self.step_doctype_lit_value(),
            State::DoctypeAfterExternalId => self.step_doctype_after_external_id(),
            State::DoctypeSubset => self.step_doctype_subset(),
            State::DoctypeAfterSubset => self.step_doctype_after_subset(),
            State::StartTagName => self.step_start_tag_name(),
            State::StartTagWs => self.step_start_tag_ws(),
            State::AttrName => self.step_attr_name(),
            State::AttrEq => self.step_attr_eq(),
            State::AttrValue => self.step_attr_value(),
            State::EmptyTagEnd => self.step_empty_tag_end(),
            State::EndTagName => self.step_end_tag_name(),
            State::EndTagWs => self.step_end_tag_ws(),
            State::Text => self.step_text(),
            State::Cdata => self.step_cdata(),
            State::Reference => self.step_reference(),
        }
    }

    fn step_before_decl(&mut self) -> Result<()> {
        const PREFIX: &[u8] = b"<?xml";
        let rest = self.chunk[self.index..].as_bytes();
        let avail = rest.len().min(PREFIX.len());
        if rest[..avail] != PREFIX[..avail] {
            self.state = State::Misc;
            return Ok(());
        }
        if avail < PREFIX.len() {
            return Ok(());
        }
        match rest.get(PREFIX.len()) {
            None => Ok(()),
            Some(&b) => {
                if chars::is_whitespace(b as char) {
                    self.index += PREFIX.len() + 1;
                    self.decl_pos = 0;
                    self.element.clear();
                    self.state = State::DeclAttrName;
                } else {
                    self.state = State::Misc;
                }
                Ok(())
            }
        }
    }

    fn step_misc(&mut self) -> Result<()> {
        let rest = &self.chunk[self.index..];
        let (ws_len, terminated) = scan_ws_run(rest);
        if ws_len > 0 {
            self.index += ws_len;
        }
        if !terminated {
            return Ok(());
        }
        let c = self.chunk[self.index..].chars().next().unwrap();
        if c == '<' {
            self.index += 1;
            self.state = State::OpenAngle;
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidChar).at(self.index))
        }
    }

    fn step_open_angle(&mut self) -> Result<()> {
        let c = match self.chunk[self.index..].chars().next() {
            Some(c) => c,
            None => return Ok(()),
        };
        match c {
            '!' => {
                self.index += 1;
                self.bang_candidate = None;
                self.literal_progress = 0;
                self.state = State::BangStart;
            }
            '?' => {
                self.flush_text()?;
                self.index += 1;
                self.element.clear();
                self.state = State::PiTarget;
            }
            '/' => {
                self.flush_text()?;
                self.index += 1;
                self.element.clear();
                self.state = State::EndTagName;
            }
            c if chars::is_name_start(c) => {
                self.flush_text()?;
                self.element.clear();
                self.attrs.clear();
                self.state = State::StartTagName;
            }
            _ => return Err(Error::new(ErrorKind::InvalidStartTag).at(self.index)),
        }
        Ok(())
    }

    fn step_bang_start(&mut self) -> Result<()> {
        if self.bang_candidate.is_none() {
            let c = match self.chunk[self.index..].chars().next() {
                Some(c) => c,
                None => return Ok(()),
            };
            self.bang_candidate = Some(match c {
                '-' => BangCandidate::Comment,
                '[' => BangCandidate::Cdata,
                _ => BangCandidate::Doctype,
            });
            self.literal_progress = 0;
        }
        let candidate = self.bang_candidate.unwrap();
        let lit: &[u8] = match candidate {
            BangCandidate::Comment => b"--",
            BangCandidate::Cdata => b"[CDATA[",
            BangCandidate::Doctype => b"DOCTYPE",
        };
        match self.match_literal(lit) {
            Err(()) => {
                let kind = match candidate {
                    BangCandidate::Comment => ErrorKind::InvalidComment,
                    BangCandidate::Cdata => ErrorKind::InvalidCdata,
                    BangCandidate::Doctype => ErrorKind::InvalidDoctypeDecl,
                };
                Err(Error::new(kind).at(self.index))
            }
            Ok(false) => Ok(()),
            Ok(true) => {
                self.bang_candidate = None;
                match candidate {
                    BangCandidate::Comment => {
                        self.flush_text()?;
                        self.scan_from = self.index;
                        self.state = State::Comment;
                        Ok(())
                    }
                    BangCandidate::Cdata => {
                        if self.stack.is_empty() {
                            return Err(Error::new(ErrorKind::InvalidCdata).at(self.index));
                        }
                        self.bracket_run = 0;
                        self.scan_from = self.index;
                        self.state = State::Cdata;
                        Ok(())
                    }
                    BangCandidate::Doctype => {
                        if self.seen_doctype || self.seen_root {
                            return Err(Error::new(ErrorKind::InvalidDoctypeDecl).at(self.index));
                        }
                        self.flush_text()?;
                        self.seen_doctype = true;
                        self.state = State::DoctypeWs;
                        Ok(())
                    }
                }
            }
        }
    }

    /// Tries to match `literal` against the chunk starting at `self.index`, tracking
    /// partial progress across calls in `self.literal_progress`. `Ok(true)` means fully
    /// matched (and consumed); `Ok(false)` means wait for more input; `Err(())` is a
    /// mismatch.
    fn match_literal(&mut self, literal: &[u8]) -> std::result::Result<bool, ()> {
        let rest = self.chunk[self.index..].as_bytes();
        let remaining_lit = &literal[self.literal_progress..];
        let avail = rest.len().min(remaining_lit.len());
        if rest[..avail] != remaining_lit[..avail] {
            return Err(());
        }
        self.literal_progress += avail;
        self.index += avail;
        if self.literal_progress == literal.len() {
            self.literal_progress = 0;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn flush_text(&mut self) -> Result<()> {
        if !self.content.is_empty() {
            let text = std::mem::take(&mut self.content);
            self.reader.text(&text).map_err(Error::from_reader)?;
        }
        Ok(())
    }

}

/// Scans the leading run of `NameChar`s in `s`. Returns `(byte_len, true)` if a
/// non-name character was found within `s` (the name is complete), or `(s.len(), false)`
/// if `s` ran out mid-name (more input is needed).
fn scan_name_run(s: &str) -> (usize, bool) {
    let mut len = 0;
    for c in s.chars() {
        if chars::is_name_char(c) {
            len += c.len_utf8();
        } else {
            return (len, true);
        }
    }
    (len, false)
}

/// Same shape as [`scan_name_run`] but for whitespace runs.
fn scan_ws_run(s: &str) -> (usize, bool) {
    let mut len = 0;
    for c in s.chars() {
        if chars::is_whitespace(c) {
            len += c.len_utf8();
        } else {
            return (len, true);
        }
    }
    (len, false)
}

fn is_valid_name(s: &str) -> bool {
    let mut chars_iter = s.chars();
    match chars_iter.next() {
        Some(c) if chars::is_name_start(c) => {}
        _ => return false,
    }
    chars_iter.all(chars::is_name_char)
}
