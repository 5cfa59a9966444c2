//! The generation collaborator seam.

use crate::context::ContextSnippet;
use crate::request::{GenerationOutput, GenerationRequest};
use async_trait::async_trait;
use flowsmith_types::FlowsmithResult;

/// Produces a flow from a request and gathered context.
///
/// Implementations surface rate limiting as `RateLimited` and rejected
/// credentials as `Auth` without retrying either.
#[async_trait]
pub trait FlowGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        context: &[ContextSnippet],
    ) -> FlowsmithResult<GenerationOutput>;
}
