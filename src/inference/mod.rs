//! Keyword-based inference of form fields from free-text prompts.
//!
//! The engine walks an ordered table of [`InferenceRule`]s. Rules are not exclusive:
//! every rule whose pattern matches contributes one suggestion, in table order. When
//! nothing matches, a single `User Input` field is suggested so the result is never empty.

use crate::chain::{FieldType, Node, Position};
use serde::{Deserialize, Serialize};

mod label;
mod rules;
mod wizard;

pub use label::{LabelSuggestion, suggest_for_label};
pub use rules::{InferenceRule, default_rules};
pub use wizard::WizardDraft;

/// A form field proposed by the inference engine, awaiting user approval.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSuggestion {
    pub id: String,
    pub label: String,
    pub variable: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub required: bool,
}

impl FieldSuggestion {
    /// Turns an approved suggestion into a chain node.
    pub fn into_node(self, position: Position) -> Node {
        Node {
            id: self.id,
            label: self.label,
            variable: self.variable,
            field_type: self.field_type,
            options: self.options.unwrap_or_default(),
            required: self.required,
            position,
            conditions: Vec::new(),
            placeholder: None,
            help_text: None,
        }
    }
}

/// Derives a template variable from a label: lowercase, with every run of
/// characters outside `[a-z0-9]` collapsed into a single `_`.
pub fn variable_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut in_gap = false;
    for c in label.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }
    out
}

/// The result of analysing a prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptAnalysis {
    pub fields: Vec<FieldSuggestion>,
    pub analyzed_prompt: String,
}

pub struct FieldInferer {
    rules: Vec<InferenceRule>,
}

pub struct FieldInfererBuilder {
    rules: Vec<InferenceRule>,
}

impl FieldInfererBuilder {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Appends a rule after the existing ones.
    pub fn with_rule(mut self, rule: InferenceRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replaces the whole table, including the built-in rules.
    pub fn with_rules(mut self, rules: Vec<InferenceRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn build(self) -> FieldInferer {
        FieldInferer { rules: self.rules }
    }
}

impl Default for FieldInfererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for FieldInferer {
    fn default() -> Self {
        FieldInfererBuilder::new().build()
    }
}

impl FieldInferer {
    pub fn builder() -> FieldInfererBuilder {
        FieldInfererBuilder::new()
    }

    pub fn rules(&self) -> &[InferenceRule] {
        &self.rules
    }

    /// Suggests form fields for `prompt`. Always returns at least one field.
    pub fn infer(&self, prompt: &str) -> Vec<FieldSuggestion> {
        let mut fields: Vec<FieldSuggestion> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(prompt))
            .enumerate()
            .map(|(index, rule)| FieldSuggestion {
                id: format!("field-{}", index + 1),
                label: rule.label.clone(),
                variable: variable_name(&rule.label),
                field_type: rule.field_type,
                options: rule.options.clone(),
                required: true,
            })
            .collect();

        if fields.is_empty() {
            fields.push(FieldSuggestion {
                id: "field-1".to_string(),
                label: "User Input".to_string(),
                variable: "user_input".to_string(),
                field_type: FieldType::Text,
                options: None,
                required: true,
            });
        }

        tracing::debug!(
            matched = fields.len(),
            variables = ?fields.iter().map(|f| f.variable.as_str()).collect::<Vec<_>>(),
            "Inferred form fields"
        );
        fields
    }

    pub fn analyze(&self, prompt: &str) -> PromptAnalysis {
        PromptAnalysis {
            fields: self.infer(prompt),
            analyzed_prompt: prompt.to_string(),
        }
    }
}

/// Runs the built-in rule table against `prompt`.
pub fn infer(prompt: &str) -> Vec<FieldSuggestion> {
    FieldInferer::default().infer(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables(fields: &[FieldSuggestion]) -> Vec<&str> {
        fields.iter().map(|f| f.variable.as_str()).collect()
    }

    #[test]
    fn empty_prompt_yields_the_fallback_field() {
        let fields = infer("");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, "field-1");
        assert_eq!(fields[0].label, "User Input");
        assert_eq!(fields[0].variable, "user_input");
        assert_eq!(fields[0].field_type, FieldType::Text);
        assert!(fields[0].required);
    }

    #[test]
    fn product_description_prompt() {
        // "product" -> Name/Title, "description" -> Description. Nothing else matches.
        let fields = infer("Create a product description for health-conscious consumers");
        assert_eq!(variables(&fields), vec!["name_title", "description"]);
        assert_eq!(fields[1].field_type, FieldType::Textarea);
        assert_eq!(fields[1].id, "field-2");
    }

    #[test]
    fn style_matches_both_category_and_tone() {
        let fields = infer("Keep the style consistent");
        assert_eq!(variables(&fields), vec!["category", "tone"]);
        assert_eq!(
            fields[1].options.as_deref(),
            Some(&["Professional", "Casual", "Friendly", "Formal"].map(String::from)[..])
        );
    }

    #[test]
    fn every_rule_can_fire_in_table_order() {
        let prompt = "Product email with details, a category, for our target audience, \
                      friendly tone, budget and website";
        let fields = infer(prompt);
        assert_eq!(
            variables(&fields),
            vec![
                "name_title",
                "email_address",
                "description",
                "category",
                "target_audience",
                "tone",
                "budget",
                "website_url"
            ]
        );
        let ids: Vec<_> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids[7], "field-8");
    }

    #[test]
    fn inference_is_deterministic() {
        let prompt = "Explain our pricing to the target demographic";
        assert_eq!(infer(prompt), infer(prompt));
    }

    #[test]
    fn variable_names_collapse_runs_of_separators() {
        assert_eq!(variable_name("Name/Title"), "name_title");
        assert_eq!(variable_name("Website  -- URL"), "website_url");
        assert_eq!(variable_name("Q3 Budget"), "q3_budget");
    }

    #[test]
    fn custom_rules_are_appended_after_the_defaults() {
        let inferer = FieldInferer::builder()
            .with_rule(InferenceRule::new("deadline|due", FieldType::Text, "Deadline").unwrap())
            .build();
        let fields = inferer.infer("Product launch due Friday");
        assert_eq!(variables(&fields), vec!["name_title", "deadline"]);
    }
}
