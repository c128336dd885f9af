//! `{{variable}}` substitution for prompt templates.
//!
//! Tokens are ASCII double-curly-brace delimited and case-sensitive, with no nesting and
//! no escaping. The template is scanned once from left to right. Text inserted for a
//! token is never rescanned, so the result does not depend on the order of `responses`.

use std::collections::BTreeMap;

/// Values supplied for template variables, keyed by variable name.
pub type Responses = BTreeMap<String, String>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replaces every `{{var}}` whose `var` is present in `responses`.
///
/// Tokens for variables missing from `responses` are left verbatim; extra keys are ignored.
pub fn substitute(template: &str, responses: &Responses) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => match responses.get(&after_open[..end]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after_open[end + CLOSE.len()..];
                }
                None => {
                    // Step over one brace only, so `{{{name}}` still resolves `{{name}}`.
                    out.push('{');
                    rest = &rest[start + 1..];
                }
            },
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Every variable referenced by the template, in first-seen order, without duplicates.
pub fn referenced_variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(close) = rest.find(CLOSE) {
        // The innermost opener wins for runs like `{{{name}}`.
        if let Some(open) = rest[..close].rfind(OPEN) {
            let name = &rest[open + OPEN.len()..close];
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        rest = &rest[close + CLOSE.len()..];
    }
    names
}

/// Variables the template references that `responses` does not supply.
pub fn unresolved_variables(template: &str, responses: &Responses) -> Vec<String> {
    referenced_variables(template)
        .into_iter()
        .filter(|name| !responses.contains_key(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(pairs: &[(&str, &str)]) -> Responses {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_all_supplied_variables() {
        let out = substitute(
            "Write about {{topic}} for {{audience}}.",
            &responses(&[("topic", "bikes"), ("audience", "teens")]),
        );
        assert_eq!(out, "Write about bikes for teens.");
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = substitute("{{x}}-{{x}}-{{x}}", &responses(&[("x", "1")]));
        assert_eq!(out, "1-1-1");
    }

    #[test]
    fn empty_responses_leave_template_untouched() {
        let template = "Hello {{name}}, {{ unknown }} {{";
        assert_eq!(substitute(template, &Responses::new()), template);
    }

    #[test]
    fn missing_variables_stay_as_tokens_and_extra_keys_are_ignored() {
        let out = substitute(
            "{{greeting}} {{name}}",
            &responses(&[("name", "Ada"), ("unused", "zzz")]),
        );
        assert_eq!(out, "{{greeting}} Ada");
        assert_eq!(
            unresolved_variables("{{greeting}} {{name}}", &responses(&[("name", "Ada")])),
            vec!["greeting"]
        );
    }

    #[test]
    fn prefix_named_variables_do_not_collide() {
        let out = substitute(
            "{{name}} / {{name2}}",
            &responses(&[("name", "A"), ("name2", "B")]),
        );
        assert_eq!(out, "A / B");
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let out = substitute(
            "{{a}} {{b}}",
            &responses(&[("a", "{{b}}"), ("b", "two")]),
        );
        assert_eq!(out, "{{b}} two");
    }

    #[test]
    fn tokens_are_case_sensitive_and_whitespace_is_significant() {
        let out = substitute("{{Name}} {{ name }} {{name}}", &responses(&[("name", "x")]));
        assert_eq!(out, "{{Name}} {{ name }} x");
    }

    #[test]
    fn stray_leading_braces_are_preserved() {
        let out = substitute("{{{name}}}", &responses(&[("name", "x")]));
        assert_eq!(out, "{x}");
    }

    #[test]
    fn fully_supplied_templates_have_no_unresolved_tokens() {
        let template = "Dear {{name}}, your {{plan}} plan renews on {{date}}. Thanks, {{name}}";
        let vars = referenced_variables(template);
        assert_eq!(vars, vec!["name", "plan", "date"]);

        let supplied: Responses = vars.iter().map(|v| (v.clone(), format!("<{}>", v))).collect();
        let out = substitute(template, &supplied);
        assert!(referenced_variables(&out).is_empty());
        assert!(unresolved_variables(template, &supplied).is_empty());
    }
}
