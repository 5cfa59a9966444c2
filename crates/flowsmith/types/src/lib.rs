//! Flowsmith Types - flow document model and canonical codec
//!
//! A flow document is a header plus an ordered list of typed nodes with a
//! fixed column schema. This crate owns everything the other Flowsmith
//! crates agree on:
//!
//! - **schema**: the fixed column order and header
//! - **codec**: quote-aware escaping and record splitting
//! - **node**: typed nodes, routes and rich content
//! - **document**: rows with their exact source text, and `serialize`
//! - **graph**: arena lookup over a node list
//! - **validation**: validator errors and shape normalization
//! - **version**: artifact versions and tag arithmetic
//! - **error**: the shared error taxonomy

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod codec;
pub mod document;
pub mod error;
pub mod graph;
pub mod node;
pub mod schema;
pub mod validation;
pub mod version;

pub use document::{serialize, FlowDocument, Row};
pub use error::{
    ErrorKind, FlowsmithError, FlowsmithResult, ModelError, SchemaError, ValidationShapeError,
};
pub use graph::FlowGraph;
pub use node::{
    encode_routes, parse_routes, CarouselCard, ChoiceOption, Node, NodeId, NodeKind, NodeTags,
    RichContent, Route,
};
pub use schema::{header_line, Column, FIELD_COUNT};
pub use validation::{format_error_list, normalize_errors, referenced_ids, ValidationError};
pub use version::{highest_version, next_version, sort_descending, ArtifactVersion, INITIAL_VERSION};
