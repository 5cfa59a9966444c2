//! Splicing patch rows back into a document.

use flowsmith_types::{Column, FlowDocument, NodeId, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One replaced row and the columns whose value changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRecord {
    pub node_identifier: NodeId,
    pub columns: Vec<String>,
}

/// Result of a splice.
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceOutcome {
    pub document: FlowDocument,
    /// Rows whose content changed, in document order.
    pub fixes: Vec<FixRecord>,
    /// Patch identifiers that were not allowed or matched no row.
    pub ignored: BTreeSet<NodeId>,
}

/// Replace rows of a copy of `original` with the patch rows sharing their
/// identifier. All other rows are carried over unchanged, and the row
/// count never changes.
///
/// When the patch repeats an identifier, its last occurrence wins. With
/// `allowed` set, only rows with those identifiers may be replaced.
pub fn splice(original: &FlowDocument, patch: &FlowDocument, allowed: Option<&BTreeSet<NodeId>>) -> SpliceOutcome {
    let mut replacements: BTreeMap<NodeId, &Row> = BTreeMap::new();
    let mut ignored = BTreeSet::new();
    for row in patch.rows() {
        let Some(id) = row.node_id() else { continue };
        if allowed.is_some_and(|allowed| !allowed.contains(&id)) {
            ignored.insert(id);
            continue;
        }
        replacements.insert(id, row);
    }

    let mut document = original.clone();
    let mut fixes = Vec::new();
    let index = original.row_index();
    for (id, replacement) in &replacements {
        let Some(&position) = index.get(id) else {
            ignored.insert(*id);
            continue;
        };
        let Some(current) = original.get(position) else { continue };
        let columns = changed_columns(current, replacement);
        if columns.is_empty() {
            continue;
        }
        document.replace(position, (*replacement).clone());
        fixes.push((position, FixRecord { node_identifier: *id, columns }));
    }
    fixes.sort_by_key(|(position, _)| *position);

    SpliceOutcome {
        document,
        fixes: fixes.into_iter().map(|(_, fix)| fix).collect(),
        ignored,
    }
}

fn changed_columns(before: &Row, after: &Row) -> Vec<String> {
    Column::ALL
        .iter()
        .filter(|column| before.field(**column) != after.field(**column))
        .map(|column| column.header().to_string())
        .collect()
}
