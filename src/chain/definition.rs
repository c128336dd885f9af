use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a record by the backing store.
pub type RecordId = u64;

/// Free-form chain settings, persisted as a JSON object.
pub type ChainSettings = serde_json::Map<String, serde_json::Value>;

/// The kind of input a node renders as once the chain is compiled into a form.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Select,
    Multiselect,
    Number,
    Email,
    Url,
}

impl FieldType {
    /// Select-style fields are only meaningful with a list of options.
    pub fn requires_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Url => "url",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    #[default]
    Draft,
    Published,
}

impl ChainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainStatus::Draft => "draft",
            ChainStatus::Published => "published",
        }
    }

    /// Unknown or missing values fall back to `Draft`.
    pub fn parse(value: &str) -> Self {
        match value {
            "published" => ChainStatus::Published,
            _ => ChainStatus::Draft,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A display condition attached to a node. Stored with the chain but never evaluated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// One form-field definition within a chain, bound to a template variable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub variable: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            variable: variable.into(),
            field_type: FieldType::Text,
            options: Vec::new(),
            required: false,
            position: Position::default(),
            conditions: Vec::new(),
            placeholder: None,
            help_text: None,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// A directed edge between two nodes. Presentational only; substitution ignores it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::default_id(&source, &target),
            source,
            target,
        }
    }

    pub(crate) fn default_id(source: &str, target: &str) -> String {
        format!("e-{}-{}", source, target)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// A user-authored graph of form-field nodes that compiles into a single templated prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub settings: ChainSettings,
    #[serde(default)]
    pub final_prompt: String,
    #[serde(default)]
    pub status: ChainStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The chain the editor opens with: one required text node bound to `user_input`.
    pub fn starter() -> Self {
        let mut settings = ChainSettings::new();
        settings.insert("autoSave".to_string(), serde_json::Value::Bool(true));
        settings.insert("version".to_string(), serde_json::json!("1.0"));
        Self {
            name: "Untitled Chain".to_string(),
            nodes: vec![
                Node::new("node-1", "Start Here", "user_input")
                    .required(true)
                    .at(Position::new(250.0, 100.0)),
            ],
            settings,
            ..Default::default()
        }
    }

    pub fn with_final_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.final_prompt = prompt.into();
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Fills in connection ids that older records were persisted without.
    pub(crate) fn normalize(&mut self) {
        for connection in &mut self.connections {
            if connection.id.is_empty() {
                connection.id = Connection::default_id(&connection.source, &connection.target);
            }
        }
    }
}
