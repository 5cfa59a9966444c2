//! What the repair collaborator receives.

use crate::plan::{RepairPlan, RepairStrategy};
use flowsmith_types::{format_error_list, header_line, FlowDocument, NodeId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A previously proven correction the caller wants reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownFix {
    pub error: String,
    #[serde(alias = "fix")]
    pub correction: String,
}

/// One repair round, ready for the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRequest {
    pub strategy: RepairStrategy,
    /// Rows the collaborator may rewrite, as canonical text with header.
    pub payload: String,
    /// Neighbouring rows for reference only, as canonical text with
    /// header. Empty for full-document repair.
    pub context: String,
    /// Numbered error list.
    pub errors: String,
    pub iteration: u32,
    pub known_fixes: Vec<KnownFix>,
    /// Identifiers the collaborator is expected to return.
    pub broken_ids: BTreeSet<NodeId>,
    /// Identifiers of the context rows.
    pub context_ids: BTreeSet<NodeId>,
}

impl RepairRequest {
    pub fn build(
        document: &FlowDocument,
        plan: &RepairPlan,
        errors: &[ValidationError],
        iteration: u32,
        known_fixes: &[KnownFix],
    ) -> Self {
        let (payload, context, context_ids) = match plan.strategy {
            RepairStrategy::RowLevel => (
                table(document, &plan.broken),
                if plan.context.is_empty() {
                    String::new()
                } else {
                    table(document, &plan.context)
                },
                plan.context_ids(document),
            ),
            RepairStrategy::FullDocument => (document.to_text(), String::new(), BTreeSet::new()),
        };

        Self {
            strategy: plan.strategy,
            payload,
            context,
            errors: format_error_list(errors),
            iteration,
            known_fixes: known_fixes.to_vec(),
            broken_ids: plan.broken_ids(document),
            context_ids,
        }
    }

    /// Every identifier shown to the collaborator.
    pub fn payload_ids(&self) -> BTreeSet<NodeId> {
        self.broken_ids.union(&self.context_ids).copied().collect()
    }

    /// Plain-text rendering for text-only collaborators.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.strategy {
            RepairStrategy::RowLevel => {
                out.push_str("ROWS TO FIX (return only these rows, same columns, same node numbers):\n");
                out.push_str(&self.payload);
                if !self.context.is_empty() {
                    out.push_str("\nCONTEXT ROWS (read-only, do not return):\n");
                    out.push_str(&self.context);
                }
            }
            RepairStrategy::FullDocument => {
                out.push_str("DOCUMENT TO FIX (return the full document with header):\n");
                out.push_str(&self.payload);
            }
        }
        out.push_str("\nVALIDATION ERRORS:\n");
        out.push_str(&self.errors);
        out.push('\n');
        if !self.known_fixes.is_empty() {
            out.push_str("\nKNOWN FIXES:\n");
            for fix in &self.known_fixes {
                out.push_str(&format!("- {} => {}\n", fix.error, fix.correction));
            }
        }
        out.push_str(&format!("\nITERATION: {}\n", self.iteration));
        out
    }
}

fn table(document: &FlowDocument, positions: &[usize]) -> String {
    let mut out = header_line();
    out.push('\n');
    for row in positions.iter().filter_map(|position| document.get(*position)) {
        out.push_str(row.raw());
        out.push('\n');
    }
    out
}
