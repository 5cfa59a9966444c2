//! Flowsmith Validator - remote compiler/validator and version lifecycle
//!
//! - **outcome**: classify a submission response as accepted, content
//!   errors or a version lock
//! - **store**: the `ArtifactStore` seam, with HTTP and in-memory backends
//! - **manager**: artifact creation and writable-version probing
//! - **client**: validate and publish

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod error;
pub mod http;
pub mod manager;
pub mod memory;
pub mod outcome;
pub mod store;

pub use client::{PublishReceipt, ValidationReport, ValidatorClient};
pub use error::{StoreError, StoreResult};
pub use http::HttpArtifactStore;
pub use manager::{Submission, VersionManager};
pub use memory::{check_structure, DocumentChecker, InMemoryArtifactStore};
pub use outcome::{classify_submission, is_lock_message, SubmissionOutcome};
pub use store::ArtifactStore;
