//! Flowsmith Parser - flow documents from unreliable generation output
//!
//! Generation output may hold a structured node list in a fenced block, a
//! loose JSON object inside prose, a bare JSON value, a fenced table or a
//! table pasted into prose. [`ResponseParser`] tries each in the fixed
//! order of [`Strategy::ORDER`] and returns the first candidate that
//! passes a structural sanity check, or a [`ParseFailure`] listing every
//! attempt. It never returns a plausible but structurally wrong document.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod extract;
pub mod parser;
pub mod sanity;
pub mod strategy;

pub use error::{Attempt, ParseFailure, ParseResult};
pub use parser::{ParsedResponse, ResponseParser, DEFAULT_MIN_ROWS};
pub use strategy::{Scope, Strategy};
