//! Byte→text front end: BOM sniffing, declared-encoding sniffing, and strict
//! (non-lossy) decoding via `encoding_rs`.
//!
//! This sits in front of [`crate::Parser`], which only ever sees `&str`. It is an
//! external collaborator to the core grammar, not part of it, but still a real module
//! in this crate rather than an assumed-external dependency.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{Error, ErrorKind, Result};

const PROLOG_SCAN_CAP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Resolved {
    fn to_encoding_rs(self) -> &'static Encoding {
        match self {
            Resolved::Utf8 => UTF_8,
            Resolved::Utf16Le => UTF_16LE,
            Resolved::Utf16Be => UTF_16BE,
        }
    }
}

enum Pending {
    /// Still buffering bytes to sniff the BOM and/or declared encoding.
    Sniffing(Vec<u8>),
    Resolved(encoding_rs::Decoder),
}

/// Incrementally decodes a byte stream into text, detecting UTF-8 / UTF-16LE / UTF-16BE
/// from a byte-order mark or the XML declaration's `encoding` pseudo-attribute.
pub struct Decoder {
    state: Pending,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder { state: Pending::Sniffing(Vec::new()) }
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `bytes` as can be resolved right now, appending to `out`.
    /// Any input that cannot yet be decoded (because the encoding is still being
    /// sniffed, or because it ends mid code unit) is retained internally.
    pub fn feed(&mut self, bytes: &[u8], out: &mut String) -> Result<()> {
        loop {
            match &mut self.state {
                Pending::Resolved(decoder) => {
                    return decode_strict(decoder, bytes, out, false);
                }
                Pending::Sniffing(buf) => {
                    buf.extend_from_slice(bytes);
                    match try_resolve(buf, false)? {
                        None => return Ok(()),
                        Some((resolved, bom_len)) => {
                            let mut sniffed = std::mem::take(buf);
                            sniffed.drain(..bom_len);
                            let mut decoder = resolved.to_encoding_rs().new_decoder_without_bom_handling();
                            decode_strict(&mut decoder, &sniffed, out, false)?;
                            self.state = Pending::Resolved(decoder);
                            // loop again with an empty `bytes` slice; the sniffed
                            // buffer already contained everything fed so far
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Signals end of input; flushes any trailing decoder state and fails if bytes
    /// remain stuck mid code-unit or the encoding was never resolved.
    pub fn end(&mut self, out: &mut String) -> Result<()> {
        match &mut self.state {
            Pending::Resolved(decoder) => decode_strict(decoder, &[], out, true),
            Pending::Sniffing(buf) => {
                if buf.is_empty() {
                    return Ok(());
                }
                match try_resolve(buf, true)? {
                    Some((resolved, bom_len)) => {
                        let mut sniffed = std::mem::take(buf);
                        sniffed.drain(..bom_len);
                        let mut decoder = resolved.to_encoding_rs().new_decoder_without_bom_handling();
                        decode_strict(&mut decoder, &sniffed, out, true)?;
                        self.state = Pending::Resolved(decoder);
                        Ok(())
                    }
                    None => {
                        // A short document with no BOM and no (or truncated) XML
                        // declaration: fall back to UTF-8, the implicit default.
                        let mut decoder = UTF_8.new_decoder_without_bom_handling();
                        let bytes = std::mem::take(buf);
                        decode_strict(&mut decoder, &bytes, out, true)
                    }
                }
            }
        }
    }
}

fn decode_strict(
    decoder: &mut encoding_rs::Decoder,
    bytes: &[u8],
    out: &mut String,
    last: bool,
) -> Result<()> {
    let mut input = bytes;
    loop {
        let capacity_needed = decoder
            .max_utf8_buffer_length_without_replacement(input.len())
            .unwrap_or(input.len() + 16);
        out.reserve(capacity_needed);
        let (result, read) = decoder.decode_to_string_without_replacement(input, out, last);
        match result {
            encoding_rs::DecoderResult::InputEmpty => return Ok(()),
            encoding_rs::DecoderResult::OutputFull => {
                input = &input[read..];
                continue;
            }
            encoding_rs::DecoderResult::Malformed(_, _) => {
                return Err(Error::new(ErrorKind::EncodingInvalidData));
            }
        }
    }
}

/// Looks for a byte-order mark, then (failing that) an XML declaration's `encoding`
/// pseudo-attribute, within `buf`. Returns `Ok(None)` when more bytes are needed before
/// a decision can be made. `at_eof` is true only when no further bytes will ever arrive
/// (the `Decoder::end` path), at which point a declaration that is still incomplete is
/// treated as absent rather than awaited forever.
///
/// A BOM does not short-circuit the declared encoding: if a declaration is present after
/// the BOM and names a different encoding, that is a fatal mismatch, not a silent
/// BOM-wins resolution.
fn try_resolve(buf: &[u8], at_eof: bool) -> Result<Option<(Resolved, usize)>> {
    match sniff_bom(buf) {
        None => Ok(None),
        Some(None) => match scan_declared_encoding(buf) {
            ScanResult::NeedMore => Ok(None),
            ScanResult::None => Ok(Some((Resolved::Utf8, 0))),
            ScanResult::Found(label) => Ok(Some((resolve_label(&label)?, 0))),
        },
        Some(Some((bom_resolved, bom_len))) => match scan_declared_encoding(&buf[bom_len..]) {
            ScanResult::NeedMore => {
                if at_eof {
                    Ok(Some((bom_resolved, bom_len)))
                } else {
                    Ok(None)
                }
            }
            ScanResult::None => Ok(Some((bom_resolved, bom_len))),
            ScanResult::Found(label) => {
                let declared = resolve_label(&label)?;
                if declared != bom_resolved {
                    return Err(Error::with_detail(
                        ErrorKind::EncodingInvalidData,
                        format!("declared encoding \"{label}\" conflicts with the document's byte-order mark"),
                    ));
                }
                Ok(Some((bom_resolved, bom_len)))
            }
        },
    }
}

/// Resolves an `encoding="..."` label to one of the three supported encodings.
/// `utf-16` with no BOM is ambiguous (no endianness to pick) and so, like any other
/// unrecognized label, is `EncodingNotSupported`.
fn resolve_label(label: &str) -> Result<Resolved> {
    match label.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(Resolved::Utf8),
        "utf-16le" => Ok(Resolved::Utf16Le),
        "utf-16be" => Ok(Resolved::Utf16Be),
        _ => Err(Error::with_detail(ErrorKind::EncodingNotSupported, label.to_string())),
    }
}

/// `None` = not enough bytes yet to rule a BOM in or out.
/// `Some(None)` = definitely no BOM.
/// `Some(Some((enc, len)))` = BOM recognized, `len` bytes should be stripped.
fn sniff_bom(buf: &[u8]) -> Option<Option<(Resolved, usize)>> {
    if buf.is_empty() {
        return None;
    }
    match buf[0] {
        0xEF => {
            if buf.len() < 3 {
                None
            } else if buf[1] == 0xBB && buf[2] == 0xBF {
                Some(Some((Resolved::Utf8, 3)))
            } else {
                Some(None)
            }
        }
        0xFF => {
            if buf.len() < 2 {
                None
            } else if buf[1] == 0xFE {
                Some(Some((Resolved::Utf16Le, 2)))
            } else {
                Some(None)
            }
        }
        0xFE => {
            if buf.len() < 2 {
                None
            } else if buf[1] == 0xFF {
                Some(Some((Resolved::Utf16Be, 2)))
            } else {
                Some(None)
            }
        }
        _ => Some(None),
    }
}

enum ScanResult {
    NeedMore,
    None,
    Found(String),
}

/// Scans a bounded ASCII prefix for `<?xml ... encoding="LABEL" ...?>`. The XML
/// declaration is mandated to be pure ASCII up to and including its closing `?>`, so
/// this can run directly over raw bytes before any real decoding happens.
fn scan_declared_encoding(buf: &[u8]) -> ScanResult {
    const PREFIX: &[u8] = b"<?xml";
    if buf.len() < PREFIX.len() {
        if PREFIX.starts_with(buf) {
            return ScanResult::NeedMore;
        }
        return ScanResult::None;
    }
    if &buf[..PREFIX.len()] != PREFIX {
        return ScanResult::None;
    }
    let end = match memchr::memmem::find(buf, b"?>") {
        Some(pos) => pos,
        None => {
            if buf.len() >= PROLOG_SCAN_CAP {
                return ScanResult::None;
            }
            return ScanResult::NeedMore;
        }
    };
    let decl = &buf[..end];
    let needle = b"encoding";
    let mut search_from = 0;
    while let Some(rel) = memchr::memmem::find(&decl[search_from..], needle) {
        let pos = search_from + rel;
        let mut i = pos + needle.len();
        while i < decl.len() && decl[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= decl.len() || decl[i] != b'=' {
            search_from = pos + needle.len();
            continue;
        }
        i += 1;
        while i < decl.len() && decl[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = match decl.get(i) {
            Some(b'\'') | Some(b'"') => decl[i],
            _ => {
                search_from = pos + needle.len();
                continue;
            }
        };
        i += 1;
        let value_start = i;
        let value_end = match decl[value_start..].iter().position(|&b| b == quote) {
            Some(p) => value_start + p,
            None => return ScanResult::None,
        };
        let value = &decl[value_start..value_end];
        return match std::str::from_utf8(value) {
            Ok(s) => ScanResult::Found(s.to_string()),
            Err(_) => ScanResult::None,
        };
    }
    ScanResult::None
}
