use crate::chain::{FieldType, NodeUpdate};

/// Field settings suggested for a node based on its label alone.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSuggestion {
    pub field_type: FieldType,
    pub placeholder: Option<String>,
    pub required: bool,
    pub options: Option<Vec<String>>,
}

impl LabelSuggestion {
    pub fn into_update(self) -> NodeUpdate {
        NodeUpdate {
            field_type: Some(self.field_type),
            placeholder: self.placeholder.map(Some),
            required: Some(self.required),
            options: self.options,
            ..Default::default()
        }
    }
}

/// Suggests a field type for a node label. The first matching keyword group wins.
pub fn suggest_for_label(label: &str) -> LabelSuggestion {
    let lower = label.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let (field_type, placeholder, required, options) = if has(&["email"]) {
        (FieldType::Email, Some("Enter your email address".to_string()), true, None)
    } else if has(&["phone", "number"]) {
        (FieldType::Number, Some("Enter phone number".to_string()), true, None)
    } else if has(&["url", "website", "link"]) {
        (FieldType::Url, Some("https://".to_string()), false, None)
    } else if has(&["select", "choose", "option"]) {
        let options = ["Option 1", "Option 2", "Option 3"].map(String::from).to_vec();
        (FieldType::Select, None, true, Some(options))
    } else if has(&["description", "comment", "message"]) {
        (
            FieldType::Textarea,
            Some("Enter detailed information...".to_string()),
            false,
            None,
        )
    } else {
        (FieldType::Text, Some(format!("Enter {}", lower)), true, None)
    };

    LabelSuggestion {
        field_type,
        placeholder,
        required,
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_groups_are_checked_in_order() {
        assert_eq!(suggest_for_label("Work Email").field_type, FieldType::Email);
        // "email" wins over "link" because it is checked first.
        assert_eq!(suggest_for_label("Email link").field_type, FieldType::Email);
        assert_eq!(suggest_for_label("Phone").field_type, FieldType::Number);
        let site = suggest_for_label("Company Website");
        assert_eq!(site.field_type, FieldType::Url);
        assert!(!site.required);
        assert_eq!(suggest_for_label("Choose a plan").options.map(|o| o.len()), Some(3));
        assert_eq!(suggest_for_label("Message").field_type, FieldType::Textarea);
    }

    #[test]
    fn fallback_is_a_required_text_field() {
        let s = suggest_for_label("Product Name");
        assert_eq!(s.field_type, FieldType::Text);
        assert_eq!(s.placeholder.as_deref(), Some("Enter product name"));
        assert!(s.required);
    }
}
