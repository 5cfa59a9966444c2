//! Pure extraction functions.
//!
//! Each function looks for one kind of candidate in the raw response and
//! knows nothing about precedence or sanity checks.

use flowsmith_types::codec::split_records;
use flowsmith_types::{header_line, Node, NodeId, FIELD_COUNT};
use serde_json::Value;

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Info string after the opening fence, lowercased (`json`, `csv`, ...).
    pub lang: String,
    pub body: &'a str,
}

/// All fenced blocks in order of appearance. An unterminated block runs
/// to the end of the text.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(open) = rest.find("```") {
        let after_fence = offset + open + 3;
        let line_end = text[after_fence..]
            .find('\n')
            .map(|i| after_fence + i)
            .unwrap_or(text.len());
        let lang = text[after_fence..line_end].trim().to_ascii_lowercase();
        let body_start = (line_end + 1).min(text.len());

        let (body_end, next) = match find_closing_fence(&text[body_start..]) {
            Some((start, end)) => (body_start + start, body_start + end),
            None => (text.len(), text.len()),
        };

        blocks.push(FencedBlock {
            lang,
            body: &text[body_start..body_end],
        });

        offset = next;
        rest = &text[next..];
    }

    blocks
}

/// Closing fence must start a line. Returns (fence start, position after
/// the fence line).
fn find_closing_fence(body: &str) -> Option<(usize, usize)> {
    let mut position = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            return Some((position, position + line.len()));
        }
        position += line.len();
    }
    None
}

/// Outermost balanced span starting at the first `open` character.
/// Brackets inside JSON string literals are ignored.
pub fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + idx + close.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Balanced candidates in order of where they start: whichever of `{`
/// and `[` comes first is tried first.
pub fn balanced_candidates(text: &str) -> Vec<&str> {
    let mut found: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let span = balanced_span(text, open, close)?;
            let start = text.find(open)?;
            Some((start, span))
        })
        .collect();
    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, span)| span).collect()
}

/// What a structured value turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    Nodes(Vec<Node>),
    Table(String),
}

const NODE_LIST_KEYS: [&str; 3] = ["nodes", "rows", "flow"];
const TABLE_KEYS: [&str; 2] = ["csv", "document"];

/// Parse JSON text into a node list or embedded table text. A second
/// attempt normalizes single quotes, the most common non-JSON quoting.
pub fn parse_structured(candidate: &str) -> Result<Structured, String> {
    let value: Value = match serde_json::from_str(candidate.trim()) {
        Ok(value) => value,
        Err(first) => serde_json::from_str(&candidate.trim().replace('\'', "\""))
            .map_err(|_| format!("not valid JSON: {}", first))?,
    };
    interpret(&value)
}

fn interpret(value: &Value) -> Result<Structured, String> {
    match value {
        Value::Array(items) if items.iter().all(Value::is_string) && !items.is_empty() => {
            let lines: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            Ok(Structured::Table(lines.join("\n")))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value::<Node>(item.clone())
                    .map_err(|e| format!("node {} is invalid: {}", i + 1, e))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Structured::Nodes),
        Value::Object(map) => {
            if let Some(inner) = NODE_LIST_KEYS.iter().find_map(|key| map.get(*key)) {
                return match inner {
                    Value::String(table) => Ok(Structured::Table(table.clone())),
                    other => interpret(other),
                };
            }
            if let Some(table) = TABLE_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
            {
                return Ok(Structured::Table(table.to_string()));
            }
            serde_json::from_value::<Node>(value.clone())
                .map(|node| Structured::Nodes(vec![node]))
                .map_err(|_| "object holds neither a node list nor table text".to_string())
        }
        _ => Err("expected an array or object".to_string()),
    }
}

/// Table text starting at the canonical header, through the last
/// contiguous record that tokenizes to the schema's field count.
pub fn scan_from_header(text: &str) -> Option<String> {
    let header = header_line();
    let start = text
        .match_indices(header.as_str())
        .map(|(i, _)| i)
        .find(|i| *i == 0 || text[..*i].ends_with('\n'))?;

    let mut lines = vec![header.as_str()];
    let records = split_records(&text[start..]);
    let mut records = records.iter();
    records.next();
    lines.extend(
        records
            .take_while(|record| looks_like_row(record.raw, record.fields.len()))
            .map(|record| record.raw),
    );
    Some(lines.join("\n"))
}

/// Every row-shaped record anywhere in the text, for patches that arrive
/// without a header and interleaved with prose.
pub fn scan_rows(text: &str) -> Option<String> {
    let rows: Vec<&str> = split_records(text)
        .into_iter()
        .filter(|record| looks_like_row(record.raw, record.fields.len()))
        .filter(|record| {
            record
                .fields
                .first()
                .is_some_and(|id| id.parse::<NodeId>().is_ok())
        })
        .map(|record| record.raw)
        .collect();
    (!rows.is_empty()).then(|| rows.join("\n"))
}

fn looks_like_row(raw: &str, field_count: usize) -> bool {
    let trimmed = raw.trim_start();
    !trimmed.is_empty()
        && !trimmed.starts_with("```")
        && !trimmed.starts_with('#')
        && field_count == FIELD_COUNT
}
