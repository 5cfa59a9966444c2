//! API request handlers

mod flows;
mod health;

pub use flows::*;
pub use health::*;
