//! Extraction strategies and their precedence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of locating a flow document inside a generation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A fenced code block holding a structured node list
    FencedBlock,
    /// The outermost balanced `{...}` or `[...]` span of the response
    BalancedBraces,
    /// The entire response parsed as one structured value
    WholeResponse,
    /// A fenced code block holding canonical table text
    FencedTable,
    /// The canonical header found in raw text, followed by row-shaped lines
    HeaderScan,
}

impl Strategy {
    /// Precedence contract: strategies run in this order and the first one
    /// that passes the sanity check wins. Structured output is preferred
    /// over table text because it carries typed fields.
    pub const ORDER: [Strategy; 5] = [
        Strategy::FencedBlock,
        Strategy::BalancedBraces,
        Strategy::WholeResponse,
        Strategy::FencedTable,
        Strategy::HeaderScan,
    ];

    /// Whether this strategy reads structured (JSON) output.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            Strategy::FencedBlock | Strategy::BalancedBraces | Strategy::WholeResponse
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::FencedBlock => "FencedBlock",
            Strategy::BalancedBraces => "BalancedBraces",
            Strategy::WholeResponse => "WholeResponse",
            Strategy::FencedTable => "FencedTable",
            Strategy::HeaderScan => "HeaderScan",
        };
        f.write_str(name)
    }
}

/// What the response is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// A whole document: header required, more than the minimum row count.
    #[default]
    Document,
    /// A patch of rows: header optional, at least one row.
    Rows,
}
