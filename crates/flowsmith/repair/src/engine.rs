//! The repair round: plan, ask, parse, splice.

use crate::collaborator::RepairCollaborator;
use crate::plan::{RepairPlan, RepairStrategy, DEFAULT_ROW_LEVEL_THRESHOLD};
use crate::request::{KnownFix, RepairRequest};
use crate::splice::{splice, FixRecord};
use flowsmith_parser::ResponseParser;
use flowsmith_types::{FlowDocument, FlowsmithResult, NodeId, ValidationError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one repair round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineOutcome {
    pub document: FlowDocument,
    pub fixes_made: Vec<FixRecord>,
    /// Addressed identifiers that are not fixed after this round.
    pub still_broken: Vec<NodeId>,
    /// `None` when there was nothing to repair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RepairStrategy>,
}

impl RefineOutcome {
    fn unchanged(document: &FlowDocument, still_broken: BTreeSet<NodeId>) -> Self {
        Self {
            document: document.clone(),
            fixes_made: Vec::new(),
            still_broken: still_broken.into_iter().collect(),
            strategy: None,
        }
    }
}

/// Stateless repair engine. The caller passes the document, the errors
/// and the iteration count every round.
#[derive(Clone)]
pub struct RepairEngine {
    collaborator: Arc<dyn RepairCollaborator>,
    threshold: f64,
}

impl RepairEngine {
    pub fn new(collaborator: Arc<dyn RepairCollaborator>) -> Self {
        Self {
            collaborator,
            threshold: DEFAULT_ROW_LEVEL_THRESHOLD,
        }
    }

    /// Broken share up to which row-level repair is used.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run one repair round.
    ///
    /// With no errors the input comes back unchanged. An unparseable
    /// collaborator response leaves every addressed row as submitted and
    /// reports it still broken. Collaborator failures (rate limiting,
    /// authentication, transport) are returned as errors.
    pub async fn refine(
        &self,
        document: &FlowDocument,
        errors: &[ValidationError],
        iteration: u32,
        known_fixes: &[KnownFix],
    ) -> FlowsmithResult<RefineOutcome> {
        if errors.is_empty() {
            debug!("No validation errors, nothing to refine");
            return Ok(RefineOutcome::unchanged(document, BTreeSet::new()));
        }

        let plan = RepairPlan::build(document, errors, self.threshold);
        let broken_ids = plan.broken_ids(document);
        let mut still_broken: BTreeSet<NodeId> = plan.unknown.clone();

        if !plan.unknown.is_empty() {
            warn!(unknown = ?plan.unknown, "Errors address rows missing from the document");
        }
        if plan.is_empty() {
            return Ok(RefineOutcome::unchanged(document, still_broken));
        }

        info!(
            strategy = ?plan.strategy,
            broken = plan.broken.len(),
            context = plan.context.len(),
            total = document.len(),
            iteration,
            "Refining flow document"
        );

        let request = RepairRequest::build(document, &plan, errors, iteration, known_fixes);
        let response = self.collaborator.repair(&request).await?;

        let patch = match ResponseParser::rows().parse(&response) {
            Ok(parsed) => parsed.document,
            Err(failure) => {
                warn!(
                    attempted = failure.attempted.len(),
                    "Repair response could not be parsed, keeping rows as submitted"
                );
                still_broken.extend(broken_ids);
                return Ok(RefineOutcome {
                    strategy: Some(plan.strategy),
                    ..RefineOutcome::unchanged(document, still_broken)
                });
            }
        };

        let allowed = match plan.strategy {
            RepairStrategy::RowLevel => Some(&broken_ids),
            RepairStrategy::FullDocument => None,
        };
        let outcome = splice(document, &patch, allowed);
        if !outcome.ignored.is_empty() {
            warn!(ignored = ?outcome.ignored, "Ignored patch rows outside the repair set");
        }

        let fixed: BTreeSet<NodeId> = outcome.fixes.iter().map(|fix| fix.node_identifier).collect();
        still_broken.extend(broken_ids.difference(&fixed).copied());

        info!(
            fixed = fixed.len(),
            still_broken = still_broken.len(),
            "Repair round complete"
        );

        Ok(RefineOutcome {
            document: outcome.document,
            fixes_made: outcome.fixes,
            still_broken: still_broken.into_iter().collect(),
            strategy: Some(plan.strategy),
        })
    }
}
