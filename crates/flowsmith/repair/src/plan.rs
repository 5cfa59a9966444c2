//! Deciding what to send for repair.

use flowsmith_types::{referenced_ids, FlowDocument, NodeId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Broken share of the document up to which only broken rows are sent.
pub const DEFAULT_ROW_LEVEL_THRESHOLD: f64 = 0.5;

/// How much of the document the collaborator gets to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// Broken rows only, with neighbouring rows as read-only context.
    RowLevel,
    /// The whole document.
    FullDocument,
}

/// Pick the strategy for `broken` of `total` rows.
///
/// An error that addresses no row cannot be localized, so it forces the
/// full document, as does an empty document.
pub fn choose_strategy(broken: usize, total: usize, unaddressed: usize, threshold: f64) -> RepairStrategy {
    if unaddressed > 0 || total == 0 {
        return RepairStrategy::FullDocument;
    }
    if (broken as f64) / (total as f64) <= threshold {
        RepairStrategy::RowLevel
    } else {
        RepairStrategy::FullDocument
    }
}

/// Row positions involved in one repair round.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairPlan {
    pub strategy: RepairStrategy,
    /// Positions of rows addressed by an error, in document order.
    pub broken: Vec<usize>,
    /// Positions of the immediate neighbours of broken rows that are not
    /// broken themselves, in document order.
    pub context: Vec<usize>,
    /// Addressed identifiers that name no row of the document.
    pub unknown: BTreeSet<NodeId>,
    /// Number of errors that address no row.
    pub unaddressed: usize,
}

impl RepairPlan {
    pub fn build(document: &FlowDocument, errors: &[ValidationError], threshold: f64) -> Self {
        let index = document.row_index();
        let addressed = referenced_ids(errors);

        let mut broken: Vec<usize> = Vec::new();
        let mut unknown = BTreeSet::new();
        for id in &addressed {
            match index.get(id) {
                Some(position) => broken.push(*position),
                None => {
                    unknown.insert(*id);
                }
            }
        }
        broken.sort_unstable();

        let broken_set: BTreeSet<usize> = broken.iter().copied().collect();
        let context: Vec<usize> = broken
            .iter()
            .flat_map(|position| [position.checked_sub(1), Some(position + 1)])
            .flatten()
            .filter(|position| *position < document.len() && !broken_set.contains(position))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let unaddressed = errors.iter().filter(|e| !e.is_row_addressed()).count();
        let strategy = choose_strategy(broken.len(), document.len(), unaddressed, threshold);

        Self {
            strategy,
            broken,
            context,
            unknown,
            unaddressed,
        }
    }

    /// Identifiers of the broken rows.
    pub fn broken_ids(&self, document: &FlowDocument) -> BTreeSet<NodeId> {
        ids_at(document, &self.broken)
    }

    /// Identifiers of the context rows.
    pub fn context_ids(&self, document: &FlowDocument) -> BTreeSet<NodeId> {
        ids_at(document, &self.context)
    }

    /// Nothing the collaborator could fix.
    pub fn is_empty(&self) -> bool {
        self.broken.is_empty() && self.unaddressed == 0
    }
}

fn ids_at(document: &FlowDocument, positions: &[usize]) -> BTreeSet<NodeId> {
    positions
        .iter()
        .filter_map(|position| document.get(*position))
        .filter_map(|row| row.node_id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::{serialize, Node};

    fn document(ids: &[u32]) -> FlowDocument {
        let nodes: Vec<Node> = ids.iter().map(|id| Node::decision(*id, "n")).collect();
        serialize(&nodes)
    }

    fn errors_for(ids: &[u32]) -> Vec<ValidationError> {
        ids.iter()
            .map(|id| ValidationError::for_node(*id, "format", "Message", "bad"))
            .collect()
    }

    #[test]
    fn test_threshold_boundaries() {
        let doc = document(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let four = RepairPlan::build(&doc, &errors_for(&[1, 3, 5, 7]), DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(four.strategy, RepairStrategy::RowLevel);

        let five = RepairPlan::build(&doc, &errors_for(&[1, 3, 5, 7, 9]), DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(five.strategy, RepairStrategy::RowLevel);

        let six = RepairPlan::build(&doc, &errors_for(&[1, 2, 3, 4, 5, 6]), DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(six.strategy, RepairStrategy::FullDocument);
    }

    #[test]
    fn test_context_excludes_broken_neighbours() {
        let doc = document(&[1, 2, 3, 4, 5, 6]);
        let plan = RepairPlan::build(&doc, &errors_for(&[1, 2, 5]), DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(plan.broken, vec![0, 1, 4]);
        assert_eq!(plan.context, vec![2, 3, 5]);
    }

    #[test]
    fn test_unknown_ids_and_unaddressed_errors() {
        let doc = document(&[1, 2, 3, 4]);
        let mut errors = errors_for(&[2, 99]);
        let plan = RepairPlan::build(&doc, &errors, DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(plan.unknown, BTreeSet::from([NodeId::new(99)]));
        assert_eq!(plan.strategy, RepairStrategy::RowLevel);

        errors.push(ValidationError::general("flow", "start node missing"));
        let plan = RepairPlan::build(&doc, &errors, DEFAULT_ROW_LEVEL_THRESHOLD);
        assert_eq!(plan.strategy, RepairStrategy::FullDocument);
    }
}
