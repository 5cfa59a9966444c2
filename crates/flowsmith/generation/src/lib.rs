//! Flowsmith Generation - producing flow documents from a description
//!
//! - **request**: what the generator is told, and what it returns
//! - **generator**: the `FlowGenerator` collaborator seam
//! - **llm**: model backend adapter, usable as generator and as repair
//!   collaborator
//! - **context**: concurrent read-only context lookups, memoized per topic
//!   or correlated over a channel
//! - **service**: one generation round with parsing and structural warnings

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod context;
pub mod generator;
pub mod llm;
pub mod request;
pub mod service;

pub use context::{
    CachedSource, ChannelContextSource, ContextGatherer, ContextSnippet, ContextSource,
    LookupInbox, LookupRequest,
};
pub use generator::FlowGenerator;
pub use llm::{BackendKind, LlmClient, ModelConfig};
pub use request::{generation_instructions, GenerationOutput, GenerationRequest, PriorAnswer};
pub use service::{structural_warnings, GeneratedFlow, GenerationService};
