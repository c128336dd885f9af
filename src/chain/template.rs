use super::conversion::IntoChain;
use super::definition::{Chain, ChainSettings, ChainStatus, Connection, Node, RecordId};
use crate::error::ConversionError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A reusable chain blueprint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub settings: ChainSettings,
    #[serde(default)]
    pub final_prompt: String,
    #[serde(default)]
    pub uses: u32,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Template {
    /// Case-insensitive match on name or description, optionally restricted to one category.
    pub fn matches(&self, query: &str, category: Option<&str>) -> bool {
        let query = query.trim().to_lowercase();
        let matches_search = query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query);
        let matches_category = category.is_none_or(|c| c == "all" || self.category == c);
        matches_search && matches_category
    }
}

/// Distinct categories in first-seen order.
pub fn categories(templates: &[Template]) -> Vec<String> {
    templates
        .iter()
        .map(|t| t.category.clone())
        .filter(|c| !c.is_empty())
        .unique()
        .collect()
}

/// "Using" a template clones its graph into a fresh, unsaved draft.
impl IntoChain for Template {
    fn into_chain(self) -> Result<Chain, ConversionError> {
        let mut settings = self.settings;
        if !self.category.is_empty() {
            settings.insert(
                "category".to_string(),
                serde_json::Value::String(self.category),
            );
        }
        let mut chain = Chain {
            id: None,
            name: format!("{} - Copy", self.name),
            description: self.description,
            nodes: self.nodes,
            connections: self.connections,
            settings,
            final_prompt: self.final_prompt,
            status: ChainStatus::Draft,
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        chain.normalize();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str, category: &str) -> Template {
        Template {
            id: Some(7),
            name: name.to_string(),
            description: format!("{} for busy teams", name),
            category: category.to_string(),
            nodes: vec![Node::new("n1", "Topic", "topic")],
            uses: 12,
            rating: 4.5,
            ..Default::default()
        }
    }

    #[test]
    fn using_a_template_produces_an_unsaved_copy() {
        let chain = template("Blog Writer", "Content").into_chain().unwrap();
        assert_eq!(chain.id, None);
        assert_eq!(chain.name, "Blog Writer - Copy");
        assert_eq!(chain.status, ChainStatus::Draft);
        assert_eq!(chain.nodes.len(), 1);
        assert_eq!(chain.settings["category"], "Content");
    }

    #[test]
    fn search_matches_name_description_and_category() {
        let t = template("Blog Writer", "Content");
        assert!(t.matches("blog", None));
        assert!(t.matches("BUSY", Some("all")));
        assert!(t.matches("", Some("Content")));
        assert!(!t.matches("", Some("Research")));
        assert!(!t.matches("invoice", None));
    }

    #[test]
    fn categories_are_unique_in_first_seen_order() {
        let all = vec![
            template("A", "Research"),
            template("B", "Content"),
            template("C", "Research"),
            template("D", ""),
        ];
        assert_eq!(categories(&all), vec!["Research", "Content"]);
    }
}
