//! Template variable expansion
//!
//! Turns a prompt template such as `"A {{color}} {{subject}}"` plus a list
//! of variables into one prompt per combination of values.

use serde::{Deserialize, Serialize};

/// A named template variable and the values it ranges over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl TemplateVariable {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Expand `template` over the Cartesian product of `variables`
///
/// The first variable varies slowest and the last fastest. Every occurrence
/// of `{{name}}` in the template is replaced; substituted values are never
/// scanned for placeholders themselves. With no variables the template is
/// returned as the only item; a variable with no values yields no items.
pub fn expand_variables(template: &str, variables: &[TemplateVariable]) -> Vec<String> {
    let mut combinations: Vec<Vec<&str>> = vec![Vec::new()];

    for variable in variables {
        combinations = combinations
            .iter()
            .flat_map(|prefix| {
                variable.values.iter().map(move |value| {
                    let mut combination = prefix.clone();
                    combination.push(value.as_str());
                    combination
                })
            })
            .collect();
    }

    combinations
        .iter()
        .map(|combination| substitute(template, variables, combination))
        .collect()
}

/// Single left-to-right pass over `template`
fn substitute(template: &str, variables: &[TemplateVariable], values: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let value = after.find("}}").and_then(|end| {
            let name = &after[..end];
            variables
                .iter()
                .position(|v| v.name == name)
                .map(|index| (values[index], end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                // not a known placeholder; keep one brace and rescan
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_order() {
        let vars = vec![
            TemplateVariable::new("c", ["red", "blue"]),
            TemplateVariable::new("s", ["cat", "dog"]),
        ];
        assert_eq!(
            expand_variables("A {{c}} {{s}}", &vars),
            vec!["A red cat", "A red dog", "A blue cat", "A blue dog"]
        );
    }

    #[test]
    fn test_no_variables_returns_template() {
        assert_eq!(expand_variables("plain {{x}}", &[]), vec!["plain {{x}}"]);
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let vars = vec![TemplateVariable::new("x", ["ab"])];
        assert_eq!(expand_variables("{{x}}-{{x}}", &vars), vec!["ab-ab"]);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let vars = vec![
            TemplateVariable::new("c", ["{{s}}"]),
            TemplateVariable::new("s", ["cat", "dog"]),
        ];
        assert_eq!(
            expand_variables("A {{c}} {{s}}", &vars),
            vec!["A {{s}} cat", "A {{s}} dog"]
        );
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let vars = vec![TemplateVariable::new("x", ["ab"])];
        assert_eq!(
            expand_variables("{{y}} {{{x}}} {{x", &vars),
            vec!["{{y}} {ab} {{x"]
        );
    }

    #[test]
    fn test_empty_variable_yields_nothing() {
        let vars = vec![
            TemplateVariable::new("c", ["red"]),
            TemplateVariable::new("s", Vec::<String>::new()),
        ];
        assert!(expand_variables("{{c}} {{s}}", &vars).is_empty());
    }

    #[test]
    fn test_unused_variable_still_multiplies() {
        let vars = vec![TemplateVariable::new("unused", ["1", "2"])];
        assert_eq!(expand_variables("same", &vars), vec!["same", "same"]);
    }

    #[test]
    fn test_deserializes_from_node_config() {
        let vars: Vec<TemplateVariable> = serde_json::from_value(serde_json::json!([
            { "name": "mood", "values": ["calm", "wild"] }
        ]))
        .unwrap();
        assert_eq!(vars[0].values.len(), 2);
    }
}
