//! The flow document: a header plus an ordered list of rows.
//!
//! Every row keeps the exact text it was read from. Splicing a repaired row
//! into a document therefore never touches the bytes of any other row.

use crate::codec::{encode_record, split_records, tokenize_record};
use crate::error::SchemaError;
use crate::node::{is_option_widget, parse_routes, Node, NodeId};
use crate::schema::{header_line, Column, FIELD_COUNT, LIST_SEPARATOR, ROUTE_VALUE_SEPARATOR};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// One data row of a flow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    raw: String,
    fields: Vec<String>,
}

impl Row {
    /// Tokenize a single record. The raw text is kept as given.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let fields = tokenize_record(&raw);
        Self { raw, fields }
    }

    /// Build a row from already-unescaped field values.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        Self {
            raw: encode_record(fields),
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
        }
    }

    pub fn from_node(node: &Node) -> Self {
        Self::from_fields(&node.to_fields())
    }

    /// Exact record text, without line terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field value of `column`, or `None` when the row is short.
    pub fn field(&self, column: Column) -> Option<&str> {
        self.fields.get(column.index()).map(String::as_str)
    }

    /// Identifier from the `Node Number` column.
    pub fn node_id(&self) -> Option<NodeId> {
        self.field(Column::NodeNumber)?.parse().ok()
    }

    /// Whether the row carries exactly the schema's field count.
    pub fn is_well_formed(&self) -> bool {
        self.fields.len() == FIELD_COUNT
    }

    /// Node identifiers this row routes to, from `Next Nodes` and from
    /// option widgets in `Rich Asset Content`.
    pub fn referenced_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .field(Column::NextNodes)
            .map(parse_routes)
            .unwrap_or_default()
            .into_iter()
            .map(|route| route.target)
            .collect();

        if self.field(Column::RichAssetType).is_some_and(is_option_widget) {
            let content = self.field(Column::RichAssetContent).unwrap_or_default();
            ids.extend(
                content
                    .split(LIST_SEPARATOR)
                    .filter_map(|option| option.rsplit_once(ROUTE_VALUE_SEPARATOR))
                    .filter_map(|(_, target)| target.trim().parse::<NodeId>().ok()),
            );
        }

        let mut seen = BTreeSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A complete flow document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDocument {
    rows: Vec<Row>,
}

impl FlowDocument {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Strict reader for canonical text.
    ///
    /// The first record must be the canonical header (trailing extra
    /// columns are tolerated) and every non-blank record after it must
    /// tokenize to exactly [`FIELD_COUNT`] fields.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let mut records = split_records(text)
            .into_iter()
            .skip_while(|record| record.is_blank());

        let header = records.next().ok_or(SchemaError::Empty)?;
        if !header.raw.trim_start_matches('\u{feff}').starts_with(&header_line()) {
            return Err(SchemaError::MissingHeader {
                found: header.raw.chars().take(80).collect(),
            });
        }

        let mut rows = Vec::new();
        for (position, record) in records.filter(|record| !record.is_blank()).enumerate() {
            if record.fields.len() != FIELD_COUNT {
                return Err(SchemaError::FieldCount {
                    record: position + 1,
                    expected: FIELD_COUNT,
                    found: record.fields.len(),
                });
            }
            rows.push(Row {
                raw: record.raw.to_string(),
                fields: record.fields,
            });
        }

        Ok(Self { rows })
    }

    /// Canonical text: header, one line per row, trailing newline.
    pub fn to_text(&self) -> String {
        let mut out = header_line();
        out.push('\n');
        for row in &self.rows {
            out.push_str(row.raw());
            out.push('\n');
        }
        out
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    /// Identifier to row position. When an identifier repeats, the first
    /// occurrence is indexed.
    pub fn row_index(&self) -> HashMap<NodeId, usize> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for (position, row) in self.rows.iter().enumerate() {
            if let Some(id) = row.node_id() {
                index.entry(id).or_insert(position);
            }
        }
        index
    }

    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.rows.iter().position(|row| row.node_id() == Some(id))
    }

    /// Identifiers in row order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.rows.iter().filter_map(Row::node_id).collect()
    }

    /// Identifiers that appear on more than one row.
    pub fn duplicate_ids(&self) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for id in self.node_ids() {
            if !seen.insert(id) {
                duplicates.insert(id);
            }
        }
        duplicates.into_iter().collect()
    }

    /// `(source, target)` pairs whose target names no row in this document.
    pub fn dangling_references(&self) -> Vec<(NodeId, NodeId)> {
        let known: BTreeSet<NodeId> = self.node_ids().into_iter().collect();
        self.rows
            .iter()
            .filter_map(|row| row.node_id().map(|id| (id, row)))
            .flat_map(|(id, row)| {
                row.referenced_ids()
                    .into_iter()
                    .filter(|target| !known.contains(target))
                    .map(move |target| (id, target))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Replace the row at `position`, returning the previous row.
    pub fn replace(&mut self, position: usize, row: Row) -> Option<Row> {
        self.rows
            .get_mut(position)
            .map(|slot| std::mem::replace(slot, row))
    }
}

impl fmt::Display for FlowDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for FlowDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for FlowDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        FlowDocument::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Write nodes in canonical form. Pure and infallible.
pub fn serialize(nodes: &[Node]) -> FlowDocument {
    FlowDocument::from_rows(nodes.iter().map(Row::from_node).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChoiceOption, RichContent, Route};

    fn sample_nodes() -> Vec<Node> {
        vec![
            Node::decision(1, "Welcome")
                .with_message("Hi, how can I help?")
                .with_next([2]),
            Node::action(2, "Lookup", "LookupOrder")
                .with_route(Route::on("true", 3))
                .with_route(Route::on("false", 4)),
            Node::decision(3, "Found").with_message("Found it, \"great\"."),
            Node::decision(4, "Missing").with_message("Sorry,\nnothing there."),
        ]
    }

    #[test]
    fn test_serialize_writes_single_header() {
        let text = serialize(&sample_nodes()).to_text();
        assert_eq!(text.matches(&header_line()).count(), 1);
        assert!(text.starts_with(&header_line()));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_serialize_then_parse_keeps_rows() {
        let document = serialize(&sample_nodes());
        let reparsed = FlowDocument::parse(&document.to_text()).unwrap();
        assert_eq!(reparsed, document);
        assert_eq!(
            reparsed.rows()[3].field(Column::Message),
            Some("Sorry,\nnothing there.")
        );
    }

    #[test]
    fn test_parse_rejects_missing_header() {
        let err = FlowDocument::parse("1,D,Welcome\n").unwrap_err();
        assert!(matches!(err, SchemaError::MissingHeader { .. }));
        assert!(matches!(FlowDocument::parse("  \n"), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_parse_rejects_short_row() {
        let text = format!("{}\n1,D,Welcome\n", header_line());
        let err = FlowDocument::parse(&text).unwrap_err();
        assert_eq!(
            err,
            SchemaError::FieldCount { record: 1, expected: FIELD_COUNT, found: 3 }
        );
    }

    #[test]
    fn test_row_index_and_positions() {
        let document = serialize(&sample_nodes());
        let index = document.row_index();
        assert_eq!(index.get(&NodeId::new(3)), Some(&2));
        assert_eq!(document.position_of(NodeId::new(4)), Some(3));
        assert_eq!(document.position_of(NodeId::new(99)), None);
    }

    #[test]
    fn test_dangling_and_duplicate_detection() {
        let mut nodes = sample_nodes();
        nodes.push(Node::decision(5, "Menu").with_rich_content(RichContent::Button {
            options: vec![ChoiceOption { label: "Back".into(), target: Some(NodeId::new(42)) }],
        }));
        nodes.push(Node::decision(1, "Again").with_next([77]));
        let document = serialize(&nodes);

        assert_eq!(document.duplicate_ids(), vec![NodeId::new(1)]);
        assert_eq!(
            document.dangling_references(),
            vec![(NodeId::new(5), NodeId::new(42)), (NodeId::new(1), NodeId::new(77))]
        );
    }

    #[test]
    fn test_replace_keeps_other_rows() {
        let mut document = serialize(&sample_nodes());
        let before = document.clone();
        let replacement = Row::from_node(&Node::decision(3, "Found").with_message("Fixed"));
        let previous = document.replace(2, replacement.clone());

        assert_eq!(previous.as_ref(), before.get(2));
        assert_eq!(document.get(2), Some(&replacement));
        for position in [0, 1, 3] {
            assert_eq!(document.get(position).unwrap().raw(), before.get(position).unwrap().raw());
        }
        assert!(document.replace(10, Row::from_fields(&["x"])).is_none());
    }
}
