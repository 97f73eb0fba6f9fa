//! `{{key}}` placeholder rendering.
//!
//! Rendering is a single left-to-right pass over the template: substituted
//! values are copied verbatim and never scanned again.

use std::collections::BTreeMap;

pub fn render_map(template: &str, variables: &BTreeMap<String, String>) -> String {
    render(template, variables).0
}

/// Names of placeholders in `template` with no entry in `variables`, in order of appearance.
pub fn undefined(template: &str, variables: &BTreeMap<String, String>) -> Vec<String> {
    render(template, variables).1
}

fn render(template: &str, variables: &BTreeMap<String, String>) -> (String, Vec<String>) {
    let mut result = String::with_capacity(template.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        result.push_str(&rest[..start]);

        let name = after[..end].trim();
        match variables.get(name) {
            Some(value) => result.push_str(value),
            None => {
                result.push_str(&rest[start..start + 2 + end + 2]);
                if !name.is_empty() && !missing.iter().any(|n| n == name) {
                    missing.push(name.to_string());
                }
            }
        }
        rest = &after[end + 2..];
    }
    result.push_str(rest);

    (result, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn render_map_replaces_every_occurrence() {
        let rendered = render_map(
            "{{remote}}/{{branch}} -> {{remote}}",
            &vars(&[("remote", "origin"), ("branch", "main")]),
        );
        assert_eq!(rendered, "origin/main -> origin");
    }

    #[test]
    fn render_map_leaves_unknown_placeholders() {
        let rendered = render_map("{{known}} {{unknown}}", &vars(&[("known", "x")]));
        assert_eq!(rendered, "x {{unknown}}");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let rendered = render_map(
            "git commit -m {{message}}",
            &vars(&[("message", "fix {{remote}} and {{x}}"), ("remote", "origin")]),
        );
        assert_eq!(rendered, "git commit -m fix {{remote}} and {{x}}");
        assert!(undefined(
            "{{message}}",
            &vars(&[("message", "literal {{x}}")])
        )
        .is_empty());
    }

    #[test]
    fn undefined_lists_missing_names_once() {
        assert_eq!(
            undefined("{{a}} and {{ b }} and {{a}} {{c}}", &vars(&[("c", "1")])),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(undefined("plain text {{", &vars(&[])).is_empty());
    }

    #[test]
    fn unterminated_placeholder_is_kept_verbatim() {
        assert_eq!(render_map("a {{b", &vars(&[("b", "x")])), "a {{b");
    }
}
