//! Node records of a flow document.
//!
//! Nodes reference each other by number only. Routes are never resolved at
//! construction time, so forward and self references are always legal;
//! see [`crate::graph::FlowGraph`] for lookup-time resolution.

use crate::codec::encode_record;
use crate::schema::{Column, FIELD_COUNT, LIST_SEPARATOR, ROUTE_VALUE_SEPARATOR};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Numeric node identifier, unique within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(NodeId)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Float(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => u32::try_from(n)
                .map(NodeId)
                .map_err(|_| de::Error::custom(format!("node number {} out of range", n))),
            Repr::Float(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
                Ok(NodeId(f as u32))
            }
            Repr::Float(f) => Err(de::Error::custom(format!("invalid node number {}", f))),
            Repr::Text(text) => text
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid node number '{}'", text))),
        }
    }
}

/// Node discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Presents a message and waits for, or branches on, user input.
    Decision,
    /// Runs a backend command and branches on its result.
    Action,
}

impl NodeKind {
    /// Code written in the `Node Type` column.
    pub fn code(self) -> &'static str {
        match self {
            NodeKind::Decision => "D",
            NodeKind::Action => "A",
        }
    }

    /// Parse either the column code or the spelled-out name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "decision" => Some(NodeKind::Decision),
            "a" | "action" => Some(NodeKind::Action),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Decision => write!(f, "decision"),
            NodeKind::Action => write!(f, "action"),
        }
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeKind::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown node type '{}'", raw)))
    }
}

/// One routing edge. `value` is set when the edge is taken for a specific
/// returned value (`true~105`), and empty for plain successors. A value may
/// not contain `|` or `~`; see [`Node::reserved_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub target: NodeId,
}

impl Route {
    pub fn new(value: Option<String>, target: NodeId) -> Self {
        Self { value, target }
    }

    /// Plain successor edge.
    pub fn to(target: u32) -> Self {
        Self::new(None, NodeId(target))
    }

    /// Edge taken when the node returns `value`.
    pub fn on(value: impl Into<String>, target: u32) -> Self {
        Self::new(Some(value.into()), NodeId(target))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}{}{}", value, ROUTE_VALUE_SEPARATOR, self.target),
            None => write!(f, "{}", self.target),
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.rsplit_once(ROUTE_VALUE_SEPARATOR) {
            Some((value, target)) => {
                let target = target
                    .parse()
                    .map_err(|_| format!("invalid route target in '{}'", s))?;
                Ok(Route::new(Some(value.trim().to_string()), target))
            }
            None => s
                .parse()
                .map(|target| Route::new(None, target))
                .map_err(|_| format!("invalid route '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Target(NodeId),
            Text(String),
            Mapped {
                #[serde(default)]
                value: Option<String>,
                #[serde(alias = "node", alias = "destination", alias = "next")]
                target: NodeId,
            },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Target(target) => Ok(Route::new(None, target)),
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
            Repr::Mapped { value, target } => Ok(Route { value, target }),
        }
    }
}

/// Parse a `Next Nodes` field. Unparseable entries are skipped; the remote
/// validator is authoritative on malformed routing.
pub fn parse_routes(field: &str) -> Vec<Route> {
    field
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Encode routes into a `Next Nodes` field.
pub fn encode_routes(routes: &[Route]) -> String {
    routes
        .iter()
        .map(Route::to_string)
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

fn deserialize_routes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Route>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<Route>),
        Single(NodeId),
        Text(String),
        Nothing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(routes) => routes,
        Repr::Single(target) => vec![Route::new(None, target)],
        Repr::Text(text) => parse_routes(&text),
        Repr::Nothing(()) => Vec::new(),
    })
}

fn deserialize_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Text(String),
        Nothing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(items) => items,
        Repr::Text(text) => split_list(&text),
        Repr::Nothing(()) => Vec::new(),
    })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Number(i64),
        Text(String),
        Nothing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Bool(flag) => flag,
        Repr::Number(n) => n != 0,
        Repr::Text(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Repr::Nothing(()) => false,
    })
}

fn split_list(text: &str) -> Vec<String> {
    text.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_list(items: &[String]) -> String {
    items.join(&LIST_SEPARATOR.to_string())
}

/// Selectable option of a button, quick reply or list picker. The label may
/// not contain `|` or `~`, which delimit options and targets in the
/// content column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    #[serde(alias = "text", alias = "title")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "node", alias = "next")]
    pub target: Option<NodeId>,
}

/// Card of a carousel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselCard {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<NodeId>,
}

/// Typed rich-content payload attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichContent {
    #[serde(alias = "buttons")]
    Button { options: Vec<ChoiceOption> },
    #[serde(alias = "quick_replies")]
    QuickReply { options: Vec<ChoiceOption> },
    #[serde(alias = "list_picker")]
    Listpicker { options: Vec<ChoiceOption> },
    #[serde(alias = "date_picker")]
    Datepicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    #[serde(alias = "time_picker")]
    Timepicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval_minutes: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_time: Option<String>,
    },
    FileUpload {
        #[serde(default)]
        accepted_types: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_size_mb: Option<u32>,
    },
    #[serde(alias = "web_view")]
    Webview { url: String },
    Carousel { cards: Vec<CarouselCard> },
}

impl RichContent {
    /// Value written in the `Rich Asset Type` column.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RichContent::Button { .. } => "button",
            RichContent::QuickReply { .. } => "quick_reply",
            RichContent::Listpicker { .. } => "listpicker",
            RichContent::Datepicker { .. } => "datepicker",
            RichContent::Timepicker { .. } => "timepicker",
            RichContent::FileUpload { .. } => "file_upload",
            RichContent::Webview { .. } => "webview",
            RichContent::Carousel { .. } => "carousel",
        }
    }

    /// Value written in the `Rich Asset Content` column.
    pub fn content_field(&self) -> String {
        match self {
            RichContent::Button { options }
            | RichContent::QuickReply { options }
            | RichContent::Listpicker { options } => options
                .iter()
                .map(|option| match option.target {
                    Some(target) => format!("{}{}{}", option.label, ROUTE_VALUE_SEPARATOR, target),
                    None => option.label.clone(),
                })
                .collect::<Vec<_>>()
                .join(&LIST_SEPARATOR.to_string()),
            RichContent::Webview { url } => url.clone(),
            other => match serde_json::to_value(other) {
                Ok(Value::Object(mut map)) => {
                    map.remove("type");
                    Value::Object(map).to_string()
                }
                _ => String::new(),
            },
        }
    }

    /// Destinations reachable through this widget.
    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            RichContent::Button { options }
            | RichContent::QuickReply { options }
            | RichContent::Listpicker { options } => {
                options.iter().filter_map(|option| option.target).collect()
            }
            RichContent::Carousel { cards } => cards.iter().filter_map(|card| card.target).collect(),
            _ => Vec::new(),
        }
    }
}

fn has_reserved_separator(text: &str) -> bool {
    text.contains(&[LIST_SEPARATOR, ROUTE_VALUE_SEPARATOR][..])
}

/// Widget kinds whose content column carries `label~target` options.
pub fn is_option_widget(kind: &str) -> bool {
    matches!(
        kind.trim().to_ascii_lowercase().as_str(),
        "button" | "quick_reply" | "listpicker"
    )
}

/// Free-form classification tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTags {
    #[serde(default, deserialize_with = "deserialize_list", skip_serializing_if = "Vec::is_empty")]
    pub node_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_flag: Option<String>,
    #[serde(default, deserialize_with = "deserialize_list", skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_happened: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_classname: Option<String>,
}

/// One step of the flow.
///
/// The three mandatory attributes (`id`, `kind`, `name`) have no serde
/// default, so structured generation output missing any of them fails to
/// deserialize instead of producing a half-empty row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(alias = "node_number", alias = "nodeNumber", alias = "number")]
    pub id: NodeId,
    #[serde(alias = "node_type", alias = "nodeType", alias = "type")]
    pub kind: NodeKind,
    #[serde(alias = "node_name", alias = "nodeName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub nlu_disabled: bool,
    #[serde(
        default,
        alias = "next_nodes",
        alias = "nextNodes",
        deserialize_with = "deserialize_routes"
    )]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, alias = "rich_asset", skip_serializing_if = "Option::is_none")]
    pub rich_content: Option<RichContent>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub answer_required: bool,
    #[serde(default, deserialize_with = "deserialize_list", skip_serializing_if = "Vec::is_empty")]
    pub behaviors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_input: Option<String>,
    #[serde(
        default,
        alias = "parameter_input",
        alias = "parameterInput",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameters: Option<Value>,
    #[serde(default, alias = "decisionVariable", skip_serializing_if = "Option::is_none")]
    pub decision_variable: Option<String>,
    #[serde(flatten)]
    pub tags: NodeTags,
}

impl Node {
    fn bare(id: u32, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            kind,
            name: name.into(),
            intent: None,
            entity_type: None,
            entity: None,
            nlu_disabled: false,
            routes: Vec::new(),
            message: None,
            rich_content: None,
            answer_required: false,
            behaviors: Vec::new(),
            command: None,
            description: None,
            output: None,
            node_input: None,
            parameters: None,
            decision_variable: None,
            tags: NodeTags::default(),
        }
    }

    /// A decision node with no routes.
    pub fn decision(id: u32, name: impl Into<String>) -> Self {
        Self::bare(id, NodeKind::Decision, name)
    }

    /// An action node running `command`.
    pub fn action(id: u32, name: impl Into<String>, command: impl Into<String>) -> Self {
        let mut node = Self::bare(id, NodeKind::Action, name);
        node.command = Some(command.into());
        node
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_next(mut self, targets: impl IntoIterator<Item = u32>) -> Self {
        self.routes.extend(targets.into_iter().map(Route::to));
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_rich_content(mut self, content: RichContent) -> Self {
        self.rich_content = Some(content);
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_decision_variable(mut self, variable: impl Into<String>) -> Self {
        self.decision_variable = Some(variable.into());
        self
    }

    pub fn with_tags(mut self, tags: NodeTags) -> Self {
        self.tags = tags;
        self
    }

    /// Every node this one can route to, in declaration order, duplicates
    /// removed.
    pub fn targets(&self) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = Vec::new();
        let rich = self
            .rich_content
            .as_ref()
            .map(RichContent::targets)
            .unwrap_or_default();
        for target in self.routes.iter().map(|route| route.target).chain(rich) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    /// First route value or option label holding a list or route separator.
    /// Such text would split into extra entries once encoded.
    pub fn reserved_text(&self) -> Option<&str> {
        let labels = match &self.rich_content {
            Some(RichContent::Button { options })
            | Some(RichContent::QuickReply { options })
            | Some(RichContent::Listpicker { options }) => options.as_slice(),
            _ => &[],
        };
        self.routes
            .iter()
            .filter_map(|route| route.value.as_deref())
            .chain(labels.iter().map(|option| option.label.as_str()))
            .find(|text| has_reserved_separator(text))
    }

    /// All schema fields in canonical column order. Absent attributes are
    /// empty strings; the result always has [`FIELD_COUNT`] entries.
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = vec![String::new(); FIELD_COUNT];
        let mut set = |column: Column, value: String| fields[column.index()] = value;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let flag = |value: bool| if value { "1".to_string() } else { String::new() };

        set(Column::NodeNumber, self.id.to_string());
        set(Column::NodeType, self.kind.code().to_string());
        set(Column::NodeName, self.name.clone());
        set(Column::Intent, text(&self.intent));
        set(Column::EntityType, text(&self.entity_type));
        set(Column::Entity, text(&self.entity));
        set(Column::NluDisabled, flag(self.nlu_disabled));
        set(Column::NextNodes, encode_routes(&self.routes));
        set(Column::Message, text(&self.message));
        if let Some(content) = &self.rich_content {
            set(Column::RichAssetType, content.kind_name().to_string());
            set(Column::RichAssetContent, content.content_field());
        }
        set(Column::AnswerRequired, flag(self.answer_required));
        set(Column::Behaviors, join_list(&self.behaviors));
        set(Column::Command, text(&self.command));
        set(Column::Description, text(&self.description));
        set(Column::Output, text(&self.output));
        set(Column::NodeInput, text(&self.node_input));
        set(
            Column::ParameterInput,
            match &self.parameters {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(raw)) => raw.clone(),
                Some(other) => other.to_string(),
            },
        );
        set(Column::DecisionVariable, text(&self.decision_variable));
        set(Column::WhatHappened, text(&self.tags.what_happened));
        set(Column::NodeTags, join_list(&self.tags.node_tags));
        set(Column::SkillTag, text(&self.tags.skill_tag));
        set(Column::Variable, text(&self.tags.variable));
        set(Column::PlatformFlag, text(&self.tags.platform_flag));
        set(Column::Flows, join_list(&self.tags.flows));
        set(Column::CssClassname, text(&self.tags.css_classname));
        fields
    }

    /// The node as one canonical record.
    pub fn to_record(&self) -> String {
        encode_record(&self.to_fields())
    }
}
