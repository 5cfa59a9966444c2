//! Generation inputs and outputs.

use crate::context::ContextSnippet;
use flowsmith_types::{header_line, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An answer the user gave while the flow was being specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorAnswer {
    pub question: String,
    pub answer: String,
}

/// Everything the generator is told about the desired flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Flow configuration (purpose, channel, features). Opaque here.
    #[serde(default)]
    pub config: Value,
    #[serde(default, alias = "prior_answers")]
    pub prior_answers: Vec<PriorAnswer>,
    #[serde(default, alias = "reference_material")]
    pub reference_material: Vec<String>,
    /// Topics to look up in the context sources before generating.
    #[serde(default, alias = "lookup_topics")]
    pub lookup_topics: Vec<String>,
}

impl GenerationRequest {
    pub fn new(config: Value) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.prior_answers.push(PriorAnswer {
            question: question.into(),
            answer: answer.into(),
        });
        self
    }

    pub fn with_reference(mut self, material: impl Into<String>) -> Self {
        self.reference_material.push(material.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.lookup_topics.push(topic.into());
        self
    }

    /// Plain-text rendering for text-only generators.
    pub fn render(&self, context: &[ContextSnippet]) -> String {
        let mut out = String::from("FLOW CONFIGURATION:\n");
        out.push_str(&serde_json::to_string_pretty(&self.config).unwrap_or_default());
        out.push('\n');

        if !self.prior_answers.is_empty() {
            out.push_str("\nANSWERS:\n");
            for answer in &self.prior_answers {
                out.push_str(&format!("- {}: {}\n", answer.question, answer.answer));
            }
        }
        if !self.reference_material.is_empty() {
            out.push_str("\nREFERENCE MATERIAL:\n");
            for material in &self.reference_material {
                out.push_str(material.trim());
                out.push('\n');
            }
        }
        if !context.is_empty() {
            out.push_str("\nDOCUMENTATION:\n");
            for snippet in context {
                out.push_str(&format!("[{} / {}] {}\n", snippet.source, snippet.topic, snippet.content.trim()));
            }
        }
        out
    }
}

/// Instructions sent alongside every generation request.
pub fn generation_instructions() -> String {
    format!(
        "Respond with a flow document: this header line, then one comma-separated row per node \
         with exactly the same number of fields. Quote any field containing a comma, quote or \
         newline, doubling embedded quotes.\n{}",
        header_line()
    )
}

/// What a generator produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    /// Nodes from a structured-output capable generator.
    Structured(Vec<Node>),
    /// Free-form text that still has to be parsed.
    Text(String),
}
