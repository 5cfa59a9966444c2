#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
//! Flowsmith daemon library
//!
//! HTTP front for the flow pipeline:
//! - `POST /api/v1/generate` builds a document from a flow configuration
//! - `POST /api/v1/refine` runs one repair round over validator errors
//! - `POST /api/v1/validate` and `/publish` talk to the validator backend
//! - `POST /api/v1/converge` loops validate and refine until acceptance

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod service;

pub use api::create_router;
pub use api::rest::state::AppState;
pub use config::DaemonConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
pub use service::{ConvergeReport, FlowService};
