//! The repair collaborator seam.

use crate::request::RepairRequest;
use async_trait::async_trait;
use flowsmith_types::FlowsmithResult;

/// Something that rewrites broken rows, typically a language model.
///
/// Implementations return the raw response text; the engine extracts rows
/// from it with the response parser. Rate limiting and authentication
/// failures must be reported as their own error variants.
#[async_trait]
pub trait RepairCollaborator: Send + Sync {
    async fn repair(&self, request: &RepairRequest) -> FlowsmithResult<String>;
}
