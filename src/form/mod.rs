use crate::chain::{FieldType, Node};
use crate::error::{FieldError, ValidationErrors};
use crate::substitution::Responses;
use serde::{Deserialize, Serialize};

mod validation;

/// How the compiler decides whether a field is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredPolicy {
    /// Every field is required, regardless of the node's own flag.
    #[default]
    Always,
    /// Use the `required` flag stored on each node.
    FromNode,
}

/// A runtime form field, derived one-to-one from a chain node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldDescriptor {
    pub id: String,
    pub label: String,
    pub variable: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

/// The compiled form of a chain plus the prompt template its answers feed into.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub fields: Vec<FormFieldDescriptor>,
    pub final_prompt: String,
}

/// What a form view should show.
#[derive(Debug, PartialEq)]
pub enum FormLayout<'a> {
    /// The chain has no nodes; render an explicit empty state, never a blank form.
    EmptyState { message: &'static str },
    Fields(&'a [FormFieldDescriptor]),
}

impl FormDescriptor {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn layout(&self) -> FormLayout<'_> {
        if self.fields.is_empty() {
            FormLayout::EmptyState {
                message: "This chain has no fields yet. Add nodes in the editor to build a form.",
            }
        } else {
            FormLayout::Fields(&self.fields)
        }
    }

    pub fn field(&self, variable: &str) -> Option<&FormFieldDescriptor> {
        self.fields.iter().find(|f| f.variable == variable)
    }

    /// Client-side validation of user responses, run before anything is sent anywhere.
    ///
    /// Produces one error per offending field, in form order.
    pub fn validate(&self, responses: &Responses) -> Result<(), ValidationErrors> {
        let errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|field| validation::check_field(field, responses.get(&field.variable)))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(failed = errors.len(), "Form responses failed validation");
            Err(ValidationErrors { errors })
        }
    }
}

/// Compiles chain nodes into form field descriptors.
#[derive(Debug, Clone, Default)]
pub struct FormCompiler {
    policy: RequiredPolicy,
}

impl FormCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_policy(mut self, policy: RequiredPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maps each node to exactly one descriptor, preserving order.
    pub fn compile(&self, nodes: &[Node]) -> Vec<FormFieldDescriptor> {
        nodes
            .iter()
            .map(|node| FormFieldDescriptor {
                id: node.id.clone(),
                label: node.label.clone(),
                variable: node.variable.clone(),
                field_type: node.field_type,
                required: match self.policy {
                    RequiredPolicy::Always => true,
                    RequiredPolicy::FromNode => node.required,
                },
                options: (!node.options.is_empty()).then(|| node.options.clone()),
                placeholder: node.placeholder.clone(),
                help_text: node.help_text.clone(),
            })
            .collect()
    }

    pub fn compile_form(&self, nodes: &[Node], final_prompt: &str) -> FormDescriptor {
        FormDescriptor {
            fields: self.compile(nodes),
            final_prompt: final_prompt.to_string(),
        }
    }
}

/// Compiles nodes with the default policy.
pub fn compile(nodes: &[Node]) -> Vec<FormFieldDescriptor> {
    FormCompiler::default().compile(nodes)
}
