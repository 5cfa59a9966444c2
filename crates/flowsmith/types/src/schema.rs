//! Fixed column schema of a flow document.
//!
//! Column position, not column naming, carries meaning downstream. The
//! order below is the wire contract with the remote compiler and must not
//! change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator of the canonical text form.
pub const SEPARATOR: char = ',';

/// Quoting character of the canonical text form.
pub const QUOTE: char = '"';

/// Separator between multiple values packed into one field.
pub const LIST_SEPARATOR: char = '|';

/// Separator between a returned value and its destination inside a route.
pub const ROUTE_VALUE_SEPARATOR: char = '~';

/// One column of the flow document, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    NodeNumber,
    NodeType,
    NodeName,
    Intent,
    EntityType,
    Entity,
    NluDisabled,
    NextNodes,
    Message,
    RichAssetType,
    RichAssetContent,
    AnswerRequired,
    Behaviors,
    Command,
    Description,
    Output,
    NodeInput,
    ParameterInput,
    DecisionVariable,
    WhatHappened,
    NodeTags,
    SkillTag,
    Variable,
    PlatformFlag,
    Flows,
    CssClassname,
}

impl Column {
    /// Every column in canonical order.
    pub const ALL: [Column; 26] = [
        Column::NodeNumber,
        Column::NodeType,
        Column::NodeName,
        Column::Intent,
        Column::EntityType,
        Column::Entity,
        Column::NluDisabled,
        Column::NextNodes,
        Column::Message,
        Column::RichAssetType,
        Column::RichAssetContent,
        Column::AnswerRequired,
        Column::Behaviors,
        Column::Command,
        Column::Description,
        Column::Output,
        Column::NodeInput,
        Column::ParameterInput,
        Column::DecisionVariable,
        Column::WhatHappened,
        Column::NodeTags,
        Column::SkillTag,
        Column::Variable,
        Column::PlatformFlag,
        Column::Flows,
        Column::CssClassname,
    ];

    /// Zero-based position of this column in every row.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Header text of this column.
    pub fn header(self) -> &'static str {
        match self {
            Column::NodeNumber => "Node Number",
            Column::NodeType => "Node Type",
            Column::NodeName => "Node Name",
            Column::Intent => "Intent",
            Column::EntityType => "Entity Type",
            Column::Entity => "Entity",
            Column::NluDisabled => "NLU Disabled?",
            Column::NextNodes => "Next Nodes",
            Column::Message => "Message",
            Column::RichAssetType => "Rich Asset Type",
            Column::RichAssetContent => "Rich Asset Content",
            Column::AnswerRequired => "Answer Required?",
            Column::Behaviors => "Behaviors",
            Column::Command => "Command",
            Column::Description => "Description",
            Column::Output => "Output",
            Column::NodeInput => "Node Input",
            Column::ParameterInput => "Parameter Input",
            Column::DecisionVariable => "Decision Variable",
            Column::WhatHappened => "What Happened?",
            Column::NodeTags => "Node Tags",
            Column::SkillTag => "Skill Tag",
            Column::Variable => "Variable",
            Column::PlatformFlag => "Platform Flag",
            Column::Flows => "Flows",
            Column::CssClassname => "CSS Classname",
        }
    }

    /// Resolve a column from the field name a validator reports.
    ///
    /// Matching ignores case, spaces, underscores and a trailing `?`, so
    /// `"Next Nodes"`, `"next_nodes"` and `"nextNodes"` all resolve.
    pub fn from_field_name(name: &str) -> Option<Column> {
        let wanted = normalize_field_name(name);
        Column::ALL
            .iter()
            .copied()
            .find(|column| normalize_field_name(column.header()) == wanted)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Number of fields every row carries.
pub const FIELD_COUNT: usize = Column::ALL.len();

/// The canonical header line, without a line terminator.
pub fn header_line() -> String {
    Column::ALL
        .iter()
        .map(|column| column.header())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_indices_follow_declaration_order() {
        for (position, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.index(), position);
        }
        assert_eq!(FIELD_COUNT, 26);
    }

    #[test]
    fn test_header_line_starts_with_identifier_columns() {
        let header = header_line();
        assert!(header.starts_with("Node Number,Node Type,Node Name,"));
        assert!(header.ends_with("Flows,CSS Classname"));
        assert_eq!(header.matches(SEPARATOR).count(), FIELD_COUNT - 1);
    }

    #[test]
    fn test_field_name_resolution() {
        assert_eq!(Column::from_field_name("Next Nodes"), Some(Column::NextNodes));
        assert_eq!(Column::from_field_name("next_nodes"), Some(Column::NextNodes));
        assert_eq!(Column::from_field_name("nluDisabled"), Some(Column::NluDisabled));
        assert_eq!(Column::from_field_name("What Happened"), Some(Column::WhatHappened));
        assert_eq!(Column::from_field_name("colour"), None);
    }
}
