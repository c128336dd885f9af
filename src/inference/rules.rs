use crate::chain::FieldType;
use regex::{Regex, RegexBuilder};

/// One entry of the inference table: when `pattern` matches the prompt, suggest a field.
#[derive(Debug, Clone)]
pub struct InferenceRule {
    pattern: Regex,
    pub field_type: FieldType,
    pub label: String,
    pub options: Option<Vec<String>>,
}

impl InferenceRule {
    /// Builds a rule from a case-insensitive pattern.
    pub fn new(pattern: &str, field_type: FieldType, label: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            field_type,
            label: label.to_string(),
            options: None,
        })
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|o| o.to_string()).collect());
        self
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Master macro to define the built-in rule table in evaluation order.
macro_rules! define_default_rules {
    ( $( ($pattern:expr, $field_type:expr, $label:expr $(, [$($option:expr),* $(,)?])? ) ),* $(,)? ) => {
        /// The built-in rules, in the order they are evaluated.
        pub fn default_rules() -> Vec<InferenceRule> {
            let mut rules = Vec::new();
            $(
                #[allow(unused_mut)]
                let mut rule = InferenceRule::new($pattern, $field_type, $label)
                    .expect("built-in inference patterns are valid");
                $( rule = rule.with_options(&[$($option),*]); )?
                rules.push(rule);
            )*
            rules
        }
    };
}

define_default_rules! {
    ("name|title|product", FieldType::Text, "Name/Title"),
    ("email|contact", FieldType::Email, "Email Address"),
    ("description|details|explain", FieldType::Textarea, "Description"),
    ("category|type|style", FieldType::Select, "Category", ["Option 1", "Option 2", "Option 3"]),
    ("audience|target|demographic", FieldType::Select, "Target Audience", ["General", "Professional", "Students", "Seniors"]),
    ("tone|voice|style", FieldType::Select, "Tone", ["Professional", "Casual", "Friendly", "Formal"]),
    ("budget|price|cost", FieldType::Number, "Budget"),
    ("website|url|link", FieldType::Url, "Website URL"),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_ordered_and_complete() {
        let labels: Vec<_> = default_rules().into_iter().map(|r| r.label).collect();
        assert_eq!(
            labels,
            vec![
                "Name/Title",
                "Email Address",
                "Description",
                "Category",
                "Target Audience",
                "Tone",
                "Budget",
                "Website URL"
            ]
        );
    }

    #[test]
    fn patterns_are_case_insensitive_substring_matches() {
        let rules = default_rules();
        assert!(rules[0].matches("PRODUCTION notes"));
        assert!(rules[7].matches("Clickable Links"));
        assert!(!rules[6].matches("free of charge"));
    }
}
