//! Prelude module for convenient imports
//!
//! Re-exports the types most callers need to build, compile and run chains.
//!
//! # Example
//!
//! ```rust
//! use chainforge::prelude::*;
//!
//! let mut chain = Chain::starter().with_final_prompt("Summarise {{user_input}}");
//! chain.add_node(Node::new("node-2", "Tone", "tone")).unwrap();
//! chain.connect("node-1", "node-2").unwrap();
//!
//! let form = FormCompiler::new().compile_form(&chain.nodes, &chain.final_prompt);
//! assert_eq!(form.fields.len(), 2);
//! ```

// Chain model and editing
pub use crate::chain::{
    Chain, ChainIssue, ChainStatus, Connection, FieldType, IntoChain, Node, NodeUpdate, Position,
    RecordId, Template,
};

// Engines
pub use crate::execution::{ChainExecutor, ExecutionBackend, ResponseRecord, SimulatedBackend};
pub use crate::form::{FormCompiler, FormDescriptor, RequiredPolicy};
pub use crate::inference::{FieldInferer, FieldSuggestion, WizardDraft, suggest_for_label};
pub use crate::substitution::{Responses, substitute};

// Persistence and services
pub use crate::config::{Config, DEFAULT_MODEL};
pub use crate::service::{
    AnalyticsService, ChainService, ServiceContext, SettingsService, TemplateService,
};
pub use crate::store::{InMemoryStore, RecordStore};

// Error types
pub use crate::error::{ConversionError, ExecutionError, ServiceError, ValidationErrors};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
