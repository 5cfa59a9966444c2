//! Canonical text codec.
//!
//! Writing quotes a field only when it contains the separator, the quote
//! character or a line break, doubling embedded quotes. Reading is the
//! quote-aware inverse and keeps the exact source text of every record so
//! rows can be carried around byte-for-byte.

use crate::schema::{QUOTE, SEPARATOR};
use std::borrow::Cow;

/// Escape a single field value for the canonical text form.
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([SEPARATOR, QUOTE, '\n', '\r']) {
        let doubled = value.replace(QUOTE, "\"\"");
        Cow::Owned(format!("{QUOTE}{doubled}{QUOTE}"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Encode a full record (without line terminator).
pub fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out
}

/// One record read from canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// Exact source text, without the line terminator.
    pub raw: &'a str,
    /// Unescaped field values.
    pub fields: Vec<String>,
}

impl Record<'_> {
    /// A record with no visible content.
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Split text into records. A quoted field may span several lines.
///
/// Quoting only opens at the start of a field; a stray quote in the middle
/// of an unquoted value is kept literally, which is how generation output
/// usually misuses it.
pub fn split_records(text: &str) -> Vec<Record<'_>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut state = State::FieldStart;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if state == State::Quoted {
            if ch == QUOTE {
                state = State::QuoteInQuoted;
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push(Record {
                    raw: trim_cr(&text[start..idx]),
                    fields: std::mem::take(&mut fields),
                });
                start = idx + 1;
                state = State::FieldStart;
            }
            '\r' if matches!(chars.peek(), Some((_, '\n'))) => {}
            SEPARATOR => {
                fields.push(std::mem::take(&mut field));
                state = State::FieldStart;
            }
            QUOTE if state == State::FieldStart => state = State::Quoted,
            QUOTE if state == State::QuoteInQuoted => {
                field.push(QUOTE);
                state = State::Quoted;
            }
            other => {
                field.push(other);
                state = State::Unquoted;
            }
        }
    }

    if start < text.len() {
        fields.push(field);
        records.push(Record {
            raw: trim_cr(&text[start..]),
            fields,
        });
    }

    records
}

/// Tokenize a single record into unescaped field values.
pub fn tokenize_record(record: &str) -> Vec<String> {
    let mut records = split_records(record);
    match records.len() {
        0 => vec![String::new()],
        1 => records.remove(0).fields,
        // A stray terminator outside quotes: keep everything as one record
        // so the caller's field-count check reports it.
        _ => records.into_iter().flat_map(|r| r.fields).collect(),
    }
}

fn trim_cr(raw: &str) -> &str {
    raw.strip_suffix('\r').unwrap_or(raw)
}
