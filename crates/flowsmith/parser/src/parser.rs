//! The ordered strategy chain.

use crate::error::{Attempt, ParseFailure, ParseResult};
use crate::extract::{
    balanced_candidates, fenced_blocks, parse_structured, scan_from_header, scan_rows, Structured,
};
use crate::sanity::{check_nodes, check_table, Limits};
use crate::strategy::{Scope, Strategy};
use flowsmith_types::{FlowDocument, Node};
use tracing::{debug, warn};

/// Default minimum row count: a whole document must have more rows than
/// this.
pub const DEFAULT_MIN_ROWS: usize = 3;

/// A successfully extracted document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub document: FlowDocument,
    /// The strategy that produced it.
    pub strategy: Strategy,
    /// Typed nodes, when the winning strategy read structured output.
    pub nodes: Option<Vec<Node>>,
}

impl ParsedResponse {
    /// Whether the generator needed anything but the preferred strategy.
    pub fn used_fallback(&self) -> bool {
        self.strategy != Strategy::ORDER[0]
    }
}

/// Turns unreliable generation output into a flow document or an
/// explicit failure.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    limits: Limits,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Scope::Document)
    }
}

impl ResponseParser {
    pub fn new(scope: Scope) -> Self {
        Self {
            limits: Limits {
                scope,
                min_rows: DEFAULT_MIN_ROWS,
            },
        }
    }

    /// Parser for whole documents.
    pub fn document() -> Self {
        Self::new(Scope::Document)
    }

    /// Parser for repair patches.
    pub fn rows() -> Self {
        Self::new(Scope::Rows)
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.limits.min_rows = min_rows;
        self
    }

    pub fn scope(&self) -> Scope {
        self.limits.scope
    }

    /// Hold a structured node list to the same limits as extracted output.
    pub fn check_nodes(&self, nodes: &[Node]) -> Result<FlowDocument, String> {
        check_nodes(nodes, self.limits)
    }

    /// Run every strategy in [`Strategy::ORDER`] and return the first
    /// candidate that passes the sanity check.
    pub fn parse(&self, response: &str) -> ParseResult<ParsedResponse> {
        let mut attempted = Vec::with_capacity(Strategy::ORDER.len());

        for strategy in Strategy::ORDER {
            match self.run(strategy, response) {
                Ok(parsed) => {
                    debug!(
                        strategy = %strategy,
                        rows = parsed.document.len(),
                        scope = ?self.limits.scope,
                        "Extracted flow document"
                    );
                    return Ok(parsed);
                }
                Err(reason) => {
                    debug!(strategy = %strategy, reason = %reason, "Extraction strategy failed");
                    attempted.push(Attempt { strategy, reason });
                }
            }
        }

        warn!(
            scope = ?self.limits.scope,
            response_len = response.len(),
            "No extraction strategy produced a valid flow document"
        );
        Err(ParseFailure { attempted })
    }

    /// Run a single strategy.
    pub fn run(&self, strategy: Strategy, response: &str) -> Result<ParsedResponse, String> {
        match strategy {
            Strategy::FencedBlock => {
                let blocks = fenced_blocks(response);
                if blocks.is_empty() {
                    return Err("no fenced block".to_string());
                }
                first_success(
                    blocks.iter().map(|block| block.body),
                    |body| self.structured(strategy, body),
                    "no fenced block holds a node list",
                )
            }
            Strategy::BalancedBraces => {
                let candidates = balanced_candidates(response);
                if candidates.is_empty() {
                    return Err("no balanced bracketed span".to_string());
                }
                first_success(
                    candidates.into_iter(),
                    |span| self.structured(strategy, span),
                    "no balanced span holds a node list",
                )
            }
            Strategy::WholeResponse => self.structured(strategy, response),
            Strategy::FencedTable => {
                let blocks = fenced_blocks(response);
                if blocks.is_empty() {
                    return Err("no fenced block".to_string());
                }
                first_success(
                    blocks.iter().map(|block| block.body),
                    |body| self.table(strategy, body),
                    "no fenced block holds table text",
                )
            }
            Strategy::HeaderScan => {
                let table = match self.limits.scope {
                    Scope::Document => scan_from_header(response),
                    Scope::Rows => scan_from_header(response).or_else(|| scan_rows(response)),
                };
                match table {
                    Some(table) => self.table(strategy, &table),
                    None if self.limits.scope == Scope::Rows => {
                        Err("no row-shaped lines".to_string())
                    }
                    None => Err("canonical header not found".to_string()),
                }
            }
        }
    }

    fn structured(&self, strategy: Strategy, candidate: &str) -> Result<ParsedResponse, String> {
        match parse_structured(candidate)? {
            Structured::Nodes(nodes) => {
                let document = check_nodes(&nodes, self.limits)?;
                Ok(ParsedResponse {
                    document,
                    strategy,
                    nodes: Some(nodes),
                })
            }
            Structured::Table(text) => self.table(strategy, &text),
        }
    }

    fn table(&self, strategy: Strategy, text: &str) -> Result<ParsedResponse, String> {
        let document = check_table(text, self.limits)?;
        Ok(ParsedResponse {
            document,
            strategy,
            nodes: None,
        })
    }
}

/// First candidate that succeeds. When all fail, the last reason is kept
/// unless there was only a generic one to give.
fn first_success<'a>(
    candidates: impl Iterator<Item = &'a str>,
    mut attempt: impl FnMut(&'a str) -> Result<ParsedResponse, String>,
    generic: &str,
) -> Result<ParsedResponse, String> {
    let mut last = None;
    for candidate in candidates {
        match attempt(candidate) {
            Ok(parsed) => return Ok(parsed),
            Err(reason) => last = Some(reason),
        }
    }
    Err(match last {
        Some(reason) => format!("{} (last: {})", generic, reason),
        None => generic.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::{header_line, Row};
    use serde_json::json;

    fn nodes_json(ids: &[u32]) -> String {
        let nodes: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "kind": "D", "name": format!("Step {}", id)}))
            .collect();
        serde_json::to_string(&nodes).unwrap()
    }

    fn table(ids: &[u32]) -> String {
        let mut lines = vec![header_line()];
        lines.extend(ids.iter().map(|id| Row::from_node(&Node::decision(*id, "x")).raw().to_string()));
        lines.join("\n")
    }

    #[test]
    fn test_fenced_block_beats_loose_braces() {
        let response = format!(
            "Note {{\"id\": 99}} first.\n```json\n{}\n```\nAlso {}",
            nodes_json(&[1, 2, 3, 4]),
            nodes_json(&[50, 51, 52, 53, 54])
        );
        let parsed = ResponseParser::document().parse(&response).unwrap();
        assert_eq!(parsed.strategy, Strategy::FencedBlock);
        assert_eq!(parsed.document.len(), 4);
        assert!(!parsed.used_fallback());
    }

    #[test]
    fn test_balanced_braces_when_no_fence() {
        let response = format!("Here is the flow: {{\"nodes\": {}}} Enjoy.", nodes_json(&[1, 2, 3, 4]));
        let parsed = ResponseParser::document().parse(&response).unwrap();
        assert_eq!(parsed.strategy, Strategy::BalancedBraces);
        assert!(parsed.nodes.is_some());
    }

    #[test]
    fn test_fenced_table() {
        let response = format!("```csv\n{}\n```", table(&[1, 2, 3, 4]));
        let parsed = ResponseParser::document().parse(&response).unwrap();
        assert_eq!(parsed.strategy, Strategy::FencedTable);
        assert!(parsed.nodes.is_none());
    }

    #[test]
    fn test_header_scan_on_raw_text() {
        let response = format!("Sure!\n\n{}\n\nLet me know.", table(&[1, 2, 3, 4, 5]));
        let parsed = ResponseParser::document().parse(&response).unwrap();
        assert_eq!(parsed.strategy, Strategy::HeaderScan);
        assert_eq!(parsed.document.len(), 5);
    }

    #[test]
    fn test_explicit_failure_lists_every_strategy() {
        let failure = ResponseParser::document()
            .parse("I could not build that flow, sorry.")
            .unwrap_err();
        let tried: Vec<Strategy> = failure.attempted.iter().map(|a| a.strategy).collect();
        assert_eq!(tried, Strategy::ORDER.to_vec());
        assert_eq!(failure.reason_for(Strategy::HeaderScan), Some("canonical header not found"));
    }

    #[test]
    fn test_too_few_nodes_is_a_failure_not_a_document() {
        let response = format!("```json\n{}\n```", nodes_json(&[1, 2]));
        assert!(ResponseParser::document().parse(&response).is_err());
        let parsed = ResponseParser::document().with_min_rows(1).parse(&response).unwrap();
        assert_eq!(parsed.document.len(), 2);
    }

    #[test]
    fn test_rows_scope_accepts_single_row() {
        let row = Row::from_node(&Node::decision(105, "Fixed")).raw().to_string();
        let parsed = ResponseParser::rows().parse(&format!("Fixed row:\n{}\n", row)).unwrap();
        assert_eq!(parsed.strategy, Strategy::HeaderScan);
        assert_eq!(parsed.document.node_ids().len(), 1);
    }
}
