//! Structural sanity checks applied to every candidate.

use crate::strategy::Scope;
use flowsmith_types::codec::split_records;
use flowsmith_types::{
    header_line, serialize, FlowDocument, FlowGraph, ModelError, Node, Row, FIELD_COUNT,
};

/// Thresholds a candidate must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub scope: Scope,
    /// A whole document must carry strictly more rows than this.
    pub min_rows: usize,
}

impl Limits {
    fn enough(&self, count: usize) -> bool {
        match self.scope {
            Scope::Document => count > self.min_rows,
            Scope::Rows => count >= 1,
        }
    }

    fn shortfall(&self, count: usize) -> String {
        match self.scope {
            Scope::Document => format!("only {} row(s), need more than {}", count, self.min_rows),
            Scope::Rows => "no rows".to_string(),
        }
    }
}

/// Check canonical table text and turn it into a document.
///
/// In document scope the first record must be the canonical header; in
/// row scope a header is skipped when present. Every data record must
/// tokenize to the schema's field count and start with a node number.
pub fn check_table(text: &str, limits: Limits) -> Result<FlowDocument, String> {
    let header = header_line();
    let mut records = split_records(text.trim_start_matches('\u{feff}'))
        .into_iter()
        .filter(|record| !record.is_blank())
        .peekable();

    let has_header = records
        .peek()
        .is_some_and(|first| first.raw.trim_start().starts_with(&header));
    match (limits.scope, has_header) {
        (_, true) => {
            records.next();
        }
        (Scope::Document, false) => return Err("first line is not the canonical header".to_string()),
        (Scope::Rows, false) => {}
    }

    let mut rows = Vec::new();
    for (position, record) in records.enumerate() {
        if record.fields.len() != FIELD_COUNT {
            return Err(format!(
                "row {} has {} fields, expected {}",
                position + 1,
                record.fields.len(),
                FIELD_COUNT
            ));
        }
        let row = Row::parse(record.raw);
        if row.node_id().is_none() {
            return Err(format!("row {} has no numeric node number", position + 1));
        }
        rows.push(row);
    }

    if !limits.enough(rows.len()) {
        return Err(limits.shortfall(rows.len()));
    }
    Ok(FlowDocument::from_rows(rows))
}

/// Check a structured node list and serialize it.
///
/// Whole documents may not repeat an identifier. Patches may; the splice
/// decides which occurrence wins. No route value or option label may hold a
/// list or route separator, since the encoded row would not read back.
pub fn check_nodes(nodes: &[Node], limits: Limits) -> Result<FlowDocument, String> {
    if !limits.enough(nodes.len()) {
        return Err(limits.shortfall(nodes.len()));
    }
    if let Some((node, text)) = nodes
        .iter()
        .find_map(|node| node.reserved_text().map(|text| (node.id, text)))
    {
        return Err(ModelError::ReservedSeparator {
            node,
            text: text.to_string(),
        }
        .to_string());
    }
    if limits.scope == Scope::Document {
        FlowGraph::from_nodes(nodes.to_vec()).map_err(|e| e.to_string())?;
    }
    Ok(serialize(nodes))
}
