use super::FieldSuggestion;
use crate::chain::{Chain, IntoChain, Position};
use crate::error::ConversionError;
use ahash::AHashSet;

const COLUMN_X: f64 = 250.0;
const ROW_START_Y: f64 = 100.0;
const ROW_SPACING: f64 = 150.0;

/// The state of the guided builder once the user has approved the inferred fields.
#[derive(Debug, Clone, Default)]
pub struct WizardDraft {
    pub name: Option<String>,
    pub prompt: String,
    pub fields: Vec<FieldSuggestion>,
}

impl WizardDraft {
    pub fn new(prompt: impl Into<String>, fields: Vec<FieldSuggestion>) -> Self {
        Self {
            name: None,
            prompt: prompt.into(),
            fields,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The original prompt followed by one `Label: {{variable}}` line per field.
    pub fn final_prompt(&self) -> String {
        let mut prompt = self.prompt.trim().to_string();
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        let lines: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{}: {{{{{}}}}}", f.label, f.variable))
            .collect();
        prompt.push_str(&lines.join("\n"));
        prompt
    }
}

/// Lays the approved fields out as a single column of nodes linked top to bottom.
impl IntoChain for WizardDraft {
    fn into_chain(self) -> Result<Chain, ConversionError> {
        if self.fields.is_empty() {
            return Err(ConversionError::NoFields);
        }
        let mut seen = AHashSet::new();
        for field in &self.fields {
            if !seen.insert(field.variable.as_str()) {
                return Err(ConversionError::ValidationError(format!(
                    "Variable '{}' is used by more than one field",
                    field.variable
                )));
            }
        }

        let final_prompt = self.final_prompt();
        let mut chain = Chain::new(self.name.unwrap_or_else(|| "Untitled Chain".to_string()))
            .with_final_prompt(final_prompt);

        let mut previous: Option<String> = None;
        for (row, field) in self.fields.into_iter().enumerate() {
            let position = Position::new(COLUMN_X, ROW_START_Y + ROW_SPACING * row as f64);
            let node = field.into_node(position);
            let node_id = node.id.clone();
            chain
                .add_node(node)
                .map_err(|e| ConversionError::ValidationError(e.to_string()))?;
            if let Some(prev) = previous.take() {
                chain
                    .connect(&prev, &node_id)
                    .map_err(|e| ConversionError::ValidationError(e.to_string()))?;
            }
            previous = Some(node_id);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer;

    #[test]
    fn draft_becomes_a_linked_column_of_nodes() {
        let prompt = "Write a product description";
        let chain = WizardDraft::new(prompt, infer(prompt))
            .named("Listing")
            .into_chain()
            .unwrap();

        assert_eq!(chain.name, "Listing");
        assert_eq!(chain.nodes.len(), 2);
        assert_eq!(chain.nodes[1].position, Position::new(250.0, 250.0));
        assert_eq!(chain.connections.len(), 1);
        assert_eq!(chain.connections[0].source, "field-1");
        assert_eq!(
            chain.final_prompt,
            "Write a product description\n\nName/Title: {{name_title}}\nDescription: {{description}}"
        );
        assert!(chain.validate().is_empty());
    }

    #[test]
    fn empty_draft_is_rejected() {
        let err = WizardDraft::new("anything", vec![]).into_chain().unwrap_err();
        assert_eq!(err, ConversionError::NoFields);
    }
}
