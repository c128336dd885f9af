use super::FormFieldDescriptor;
use crate::chain::FieldType;
use crate::error::FieldError;

pub(super) fn check_field(field: &FormFieldDescriptor, value: Option<&String>) -> Option<FieldError> {
    let value = value.map(|v| v.trim()).unwrap_or_default();
    if value.is_empty() {
        return field
            .required
            .then(|| error(field, format!("{} is required", field.label)));
    }

    let valid = match field.field_type {
        FieldType::Text | FieldType::Textarea => true,
        FieldType::Number => value.parse::<f64>().is_ok_and(f64::is_finite),
        FieldType::Email => is_email(value),
        FieldType::Url => url::Url::parse(value)
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some()),
        FieldType::Select => in_options(field, value),
        FieldType::Multiselect => value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .all(|v| in_options(field, v)),
    };
    if valid {
        return None;
    }

    let message = match field.field_type {
        FieldType::Number => format!("{} must be a number", field.label),
        FieldType::Email => format!("{} must be a valid email address", field.label),
        FieldType::Url => format!("{} must be a valid URL", field.label),
        _ => format!(
            "{} must be one of: {}",
            field.label,
            field.options.as_deref().unwrap_or_default().join(", ")
        ),
    };
    Some(error(field, message))
}

fn error(field: &FormFieldDescriptor, message: String) -> FieldError {
    FieldError {
        variable: field.variable.clone(),
        label: field.label.clone(),
        message,
    }
}

fn in_options(field: &FormFieldDescriptor, value: &str) -> bool {
    // A select without options cannot be checked; accept whatever was typed.
    field
        .options
        .as_ref()
        .is_none_or(|options| options.iter().any(|o| o == value))
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use crate::chain::{FieldType, Node};
    use crate::form::{FormCompiler, RequiredPolicy};
    use crate::substitution::Responses;

    fn form() -> crate::form::FormDescriptor {
        let nodes = vec![
            Node::new("1", "Product Name", "product").required(true),
            Node::new("2", "Contact", "email").with_type(FieldType::Email),
            Node::new("3", "Budget", "budget").with_type(FieldType::Number),
            Node::new("4", "Website", "site").with_type(FieldType::Url),
            Node::new("5", "Tone", "tone")
                .with_type(FieldType::Select)
                .with_options(["Casual", "Formal"]),
            Node::new("6", "Channels", "channels")
                .with_type(FieldType::Multiselect)
                .with_options(["Email", "Social", "Print"]),
        ];
        FormCompiler::new()
            .with_required_policy(RequiredPolicy::FromNode)
            .compile_form(&nodes, "")
    }

    fn responses(pairs: &[(&str, &str)]) -> Responses {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_required_fields_are_reported_by_label() {
        let err = form()
            .validate(&responses(&[("product", "   ")]))
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(
            err.for_variable("product").unwrap().message,
            "Product Name is required"
        );
    }

    #[test]
    fn optional_fields_may_be_left_blank() {
        assert!(form().validate(&responses(&[("product", "Kettle")])).is_ok());
    }

    #[test]
    fn typed_fields_are_checked() {
        let err = form()
            .validate(&responses(&[
                ("product", "Kettle"),
                ("email", "not-an-email"),
                ("budget", "lots"),
                ("site", "kettle dot com"),
                ("tone", "Shouty"),
                ("channels", "Email, Radio"),
            ]))
            .unwrap_err();
        let failed: Vec<_> = err.errors.iter().map(|e| e.variable.as_str()).collect();
        assert_eq!(failed, vec!["email", "budget", "site", "tone", "channels"]);
        assert_eq!(err.errors[3].message, "Tone must be one of: Casual, Formal");
    }

    #[test]
    fn well_formed_values_pass() {
        let ok = form().validate(&responses(&[
            ("product", "Kettle"),
            ("email", "ops@kettle.io"),
            ("budget", "1200.50"),
            ("site", "https://kettle.io/launch"),
            ("tone", "Formal"),
            ("channels", "Email, Print"),
        ]));
        assert!(ok.is_ok());
    }
}
