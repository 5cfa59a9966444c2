//! Generation round: context, generator, parser, structural warnings.

use crate::context::ContextGatherer;
use crate::generator::FlowGenerator;
use crate::request::{GenerationOutput, GenerationRequest};
use flowsmith_parser::{ResponseParser, Strategy};
use flowsmith_types::{FlowDocument, FlowsmithError, FlowsmithResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A generated document plus what looked off about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFlow {
    pub document: FlowDocument,
    pub warnings: Vec<String>,
    /// Extraction strategy that produced the document; `None` for
    /// structured generator output.
    pub strategy: Option<Strategy>,
}

/// Runs one generation round.
pub struct GenerationService {
    generator: Arc<dyn FlowGenerator>,
    context: ContextGatherer,
    parser: ResponseParser,
}

impl GenerationService {
    pub fn new(generator: Arc<dyn FlowGenerator>) -> Self {
        Self {
            generator,
            context: ContextGatherer::new(),
            parser: ResponseParser::document(),
        }
    }

    pub fn with_context(mut self, context: ContextGatherer) -> Self {
        self.context = context;
        self
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    /// Generate a document. Parse failures are errors; structural problems
    /// the validator will reject anyway are reported as warnings.
    #[instrument(skip(self, request), fields(topics = request.lookup_topics.len()))]
    pub async fn generate(&self, request: &GenerationRequest) -> FlowsmithResult<GeneratedFlow> {
        let context = if self.context.is_empty() || request.lookup_topics.is_empty() {
            Vec::new()
        } else {
            self.context.gather(&request.lookup_topics).await
        };

        let mut warnings = Vec::new();
        let (document, strategy) = match self.generator.generate(request, &context).await? {
            GenerationOutput::Structured(nodes) => {
                let document = self.parser.check_nodes(&nodes).map_err(|reason| {
                    warn!(nodes = nodes.len(), reason = %reason, "Structured generator output rejected");
                    FlowsmithError::Parse {
                        attempted: vec![format!("structured output: {}", reason)],
                    }
                })?;
                (document, None)
            }
            GenerationOutput::Text(text) => {
                let parsed = self.parser.parse(&text)?;
                if parsed.used_fallback() {
                    warn!(strategy = ?parsed.strategy, "Generator output needed a fallback strategy");
                    warnings.push(format!(
                        "generator output was not structured; recovered with {}",
                        parsed.strategy
                    ));
                }
                (parsed.document, Some(parsed.strategy))
            }
        };

        warnings.extend(structural_warnings(&document));
        info!(rows = document.len(), warnings = warnings.len(), "Generated document");
        Ok(GeneratedFlow {
            document,
            warnings,
            strategy,
        })
    }
}

/// Duplicate identifiers and routes to missing nodes.
pub fn structural_warnings(document: &FlowDocument) -> Vec<String> {
    let mut warnings: Vec<String> = document
        .duplicate_ids()
        .into_iter()
        .map(|id| format!("node {} appears more than once", id))
        .collect();
    warnings.extend(
        document
            .dangling_references()
            .into_iter()
            .map(|(source, target)| format!("node {} routes to missing node {}", source, target)),
    );
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::{serialize, Node};

    #[test]
    fn test_structural_warnings() {
        let document = serialize(&[
            Node::decision(1, "Welcome").with_next([2]),
            Node::decision(2, "Menu").with_next([7]),
            Node::decision(2, "Menu again"),
        ]);
        let warnings = structural_warnings(&document);
        assert_eq!(
            warnings,
            vec![
                "node 2 appears more than once".to_string(),
                "node 2 routes to missing node 7".to_string(),
            ]
        );
    }
}
