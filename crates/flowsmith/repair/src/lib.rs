//! Flowsmith Repair - row-level repair driven by validator feedback
//!
//! Given a document and the validator's errors, the engine decides whether
//! to send only the broken rows (with their neighbours as read-only
//! context) or the whole document, asks a [`RepairCollaborator`] for
//! corrected rows, and splices them back into an otherwise untouched copy.
//! Untouched rows keep their exact bytes and the row count never changes.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod collaborator;
pub mod engine;
pub mod plan;
pub mod request;
pub mod splice;

pub use collaborator::RepairCollaborator;
pub use engine::{RefineOutcome, RepairEngine};
pub use plan::{choose_strategy, RepairPlan, RepairStrategy, DEFAULT_ROW_LEVEL_THRESHOLD};
pub use request::{KnownFix, RepairRequest};
pub use splice::{splice, FixRecord, SpliceOutcome};
