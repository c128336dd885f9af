use crate::chain::{ChainIssue, RecordId};
use crate::store::EntityKind;
use thiserror::Error;

/// Errors raised while editing the node graph of a chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node '{node_id}' does not exist in this chain")]
    NodeNotFound { node_id: String },

    #[error("A node with id '{node_id}' already exists in this chain")]
    DuplicateNode { node_id: String },

    #[error("Connection '{connection_id}' references missing node '{missing_node_id}'")]
    DanglingConnection {
        connection_id: String,
        missing_node_id: String,
    },

    #[error("Connection '{0}' does not exist in this chain")]
    ConnectionNotFound(String),
}

/// A single field that failed client-side validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub variable: String,
    pub label: String,
    pub message: String,
}

/// All field errors found while validating a set of form responses.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Please fix the following fields: {}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn for_variable(&self, variable: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.variable == variable)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors reported by a record store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} record {id} not found")]
    NotFound { kind: EntityKind, id: RecordId },

    #[error("Record store rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to decode field '{field}' of {kind} record: {message}")]
    Decode {
        kind: EntityKind,
        field: String,
        message: String,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Failures of a model backend. A real integration must surface these; the simulator never does.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("The API key was rejected by the model provider")]
    InvalidApiKey,

    #[error("Rate limited by the model provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Model '{0}' is currently unavailable")]
    ModelUnavailable(String),

    #[error("The model request timed out after {0} ms")]
    Timeout(u64),
}

impl ExecutionError {
    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecutionError::InvalidApiKey)
    }
}

/// Errors surfaced by the service layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: RecordId },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Chain is invalid: {}", .0.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidChain(Vec<ChainIssue>),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(StoreError),

    #[error("No record was written: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("A save for chain {0} is already in progress")]
    SaveInProgress(RecordId),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl ServiceError {
    /// NotFound and transient failures get a retry action in the UI.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::NotFound { .. } | ServiceError::Store(_) | ServiceError::SaveInProgress(_) => true,
            ServiceError::Execution(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
            other => ServiceError::Store(other),
        }
    }
}

/// Errors that can occur when converting another model (a template, a wizard draft) into a `Chain`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Add at least one field to continue")]
    NoFields,

    #[error("Invalid data: {0}")]
    ValidationError(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
