//! Error taxonomy for the parser and the byte→text decoder front end.

use std::fmt;

/// Stable discriminant for every way a document can fail to be well-formed, plus the
/// encoding-layer failures the decoder front end can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidXmlDecl,
    InvalidDoctypeDecl,
    InvalidComment,
    ReservedPi,
    InvalidPi,
    InvalidEntityRef,
    UnresolvedEntity,
    InvalidCharRef,
    InvalidStartTag,
    InvalidAttributeValue,
    DuplicateAttr,
    InvalidEndTag,
    InvalidChar,
    InvalidCdEnd,
    InvalidCdata,
    UnexpectedEof,
    EncodingNotSupported,
    EncodingInvalidData,
    /// A handler registered on the `Reader` returned an error; it is wrapped here so a
    /// single `Error` type flows out of `write`/`end` regardless of origin.
    Reader,
}

impl ErrorKind {
    fn message(self) -> &'static str {
        match self {
            ErrorKind::InvalidXmlDecl => "invalid XML declaration",
            ErrorKind::InvalidDoctypeDecl => "invalid DOCTYPE declaration",
            ErrorKind::InvalidComment => "invalid comment",
            ErrorKind::ReservedPi => "processing instruction target is reserved",
            ErrorKind::InvalidPi => "invalid processing instruction",
            ErrorKind::InvalidEntityRef => "invalid entity reference",
            ErrorKind::UnresolvedEntity => "unresolved entity reference",
            ErrorKind::InvalidCharRef => "invalid character reference",
            ErrorKind::InvalidStartTag => "invalid start tag",
            ErrorKind::InvalidAttributeValue => "invalid attribute value",
            ErrorKind::DuplicateAttr => "duplicate attribute",
            ErrorKind::InvalidEndTag => "invalid end tag",
            ErrorKind::InvalidChar => "invalid character",
            ErrorKind::InvalidCdEnd => "']]>' is not allowed in character content",
            ErrorKind::InvalidCdata => "invalid CDATA section",
            ErrorKind::UnexpectedEof => "unexpected end of input",
            ErrorKind::EncodingNotSupported => "unsupported encoding",
            ErrorKind::EncodingInvalidData => "invalid byte sequence for the detected encoding",
            ErrorKind::Reader => "reader callback failed",
        }
    }
}

/// A well-formedness violation, encoding failure, or wrapped reader error.
///
/// Carries an optional human-readable detail and the byte offset (within the current
/// `write` chunk) at which the failure was noticed, when available.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<String>,
    position: Option<usize>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind, detail: None, position: None, source: None }
    }

    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Error { kind, detail: Some(detail.into()), position: None, source: None }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Wraps an error raised by a `Reader` handler so it can propagate through `write`/`end`.
    pub fn from_reader(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error {
            kind: ErrorKind::Reader,
            detail: Some(source.to_string()),
            position: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// True for any well-formedness or encoding failure; false only for a wrapped reader error.
    pub fn is_parser_error(&self) -> bool {
        !matches!(self.kind, ErrorKind::Reader)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.message())?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        if let Some(position) = self.position {
            write!(f, " (at offset {})", position)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|b| b.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
