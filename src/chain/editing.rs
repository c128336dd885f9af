use super::definition::{Chain, Connection, FieldType, Node, Position};
use crate::error::GraphError;
use ahash::{AHashMap, AHashSet};
use std::fmt;

/// A problem found by [`Chain::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChainIssue {
    MissingName,
    DanglingConnection {
        connection_id: String,
        missing_node_id: String,
    },
    MissingOptions {
        node_id: String,
        field_type: FieldType,
    },
    DuplicateVariable {
        variable: String,
        node_ids: Vec<String>,
    },
}

impl ChainIssue {
    /// Duplicate variables are tolerated; everything else blocks a save.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ChainIssue::DuplicateVariable { .. })
    }
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIssue::MissingName => write!(f, "Please enter a chain name"),
            ChainIssue::DanglingConnection {
                connection_id,
                missing_node_id,
            } => write!(
                f,
                "Connection '{}' references missing node '{}'",
                connection_id, missing_node_id
            ),
            ChainIssue::MissingOptions {
                node_id,
                field_type,
            } => write!(f, "Node '{}' is a {} field without options", node_id, field_type),
            ChainIssue::DuplicateVariable { variable, node_ids } => write!(
                f,
                "Variable '{}' is bound by several nodes: {}",
                variable,
                node_ids.join(", ")
            ),
        }
    }
}

/// A partial edit applied to a node. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub variable: Option<String>,
    pub field_type: Option<FieldType>,
    pub options: Option<Vec<String>>,
    pub required: Option<bool>,
    pub position: Option<Position>,
    pub placeholder: Option<Option<String>>,
    pub help_text: Option<Option<String>>,
}

impl Chain {
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.node(&node.id).is_some() {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn update_node(&mut self, node_id: &str, update: NodeUpdate) -> Result<&Node, GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.to_string(),
            })?;

        if let Some(label) = update.label {
            node.label = label;
        }
        if let Some(variable) = update.variable {
            node.variable = variable;
        }
        if let Some(field_type) = update.field_type {
            node.field_type = field_type;
        }
        if let Some(options) = update.options {
            node.options = options;
        }
        if let Some(required) = update.required {
            node.required = required;
        }
        if let Some(position) = update.position {
            node.position = position;
        }
        if let Some(placeholder) = update.placeholder {
            node.placeholder = placeholder;
        }
        if let Some(help_text) = update.help_text {
            node.help_text = help_text;
        }
        Ok(node)
    }

    /// Removes a node and every connection that has it as source or target.
    pub fn remove_node(&mut self, node_id: &str) -> Result<Node, GraphError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: node_id.to_string(),
            })?;
        let removed = self.nodes.remove(index);
        let before = self.connections.len();
        self.connections.retain(|c| !c.touches(node_id));
        tracing::debug!(
            node_id,
            dropped_connections = before - self.connections.len(),
            "Removed node"
        );
        Ok(removed)
    }

    pub fn connect(&mut self, source: &str, target: &str) -> Result<&Connection, GraphError> {
        for endpoint in [source, target] {
            if self.node(endpoint).is_none() {
                return Err(GraphError::NodeNotFound {
                    node_id: endpoint.to_string(),
                });
            }
        }
        let connection = Connection::new(source, target);
        if let Some(index) = self.connections.iter().position(|c| c.id == connection.id) {
            return Ok(&self.connections[index]);
        }
        self.connections.push(connection);
        Ok(&self.connections[self.connections.len() - 1])
    }

    pub fn disconnect(&mut self, connection_id: &str) -> Result<Connection, GraphError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == connection_id)
            .ok_or_else(|| GraphError::ConnectionNotFound(connection_id.to_string()))?;
        Ok(self.connections.remove(index))
    }

    /// Checks the structural invariants of the chain without modifying it.
    pub fn validate(&self) -> Vec<ChainIssue> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ChainIssue::MissingName);
        }

        let node_ids: AHashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for connection in &self.connections {
            for endpoint in [&connection.source, &connection.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    issues.push(ChainIssue::DanglingConnection {
                        connection_id: connection.id.clone(),
                        missing_node_id: endpoint.clone(),
                    });
                }
            }
        }

        for node in &self.nodes {
            if node.field_type.requires_options() && node.options.is_empty() {
                issues.push(ChainIssue::MissingOptions {
                    node_id: node.id.clone(),
                    field_type: node.field_type,
                });
            }
        }

        let mut by_variable: AHashMap<&str, Vec<String>> = AHashMap::new();
        for node in &self.nodes {
            by_variable
                .entry(node.variable.as_str())
                .or_default()
                .push(node.id.clone());
        }
        // Report in node order so the output is stable.
        let mut reported = AHashSet::new();
        for node in &self.nodes {
            let ids = &by_variable[node.variable.as_str()];
            if ids.len() > 1 && reported.insert(node.variable.as_str()) {
                issues.push(ChainIssue::DuplicateVariable {
                    variable: node.variable.clone(),
                    node_ids: ids.clone(),
                });
            }
        }

        issues
    }
}
