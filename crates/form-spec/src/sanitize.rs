use serde_json::Value;

use crate::spec::config::{ChoiceConfig, FormConfig, GroupConfig, QuestionConfig};
use crate::spec::form::{FormSpec, GroupSpec};
use crate::spec::question::{ChoiceSpec, QuestionSpec};

/// Fills in everything a loose config leaves out. The input is not touched.
///
/// Missing ids come from the item's position: `g{i}` / `q{i}` at the root,
/// `{parent}_g{i}`, `{parent}_q{i}` and `{question}_c{i}` below it. A choice
/// without a value takes its id as value.
pub fn sanitize(config: &FormConfig) -> FormSpec {
    FormSpec {
        groups: config
            .groups
            .as_deref()
            .map(|groups| sanitize_groups(None, groups))
            .unwrap_or_default(),
        questions: config
            .questions
            .as_deref()
            .map(|questions| sanitize_questions(None, questions))
            .unwrap_or_default(),
    }
}

fn item_id(explicit: Option<&String>, parent_id: Option<&str>, prefix: char, index: usize) -> String {
    match (explicit, parent_id) {
        (Some(id), _) => id.clone(),
        (None, Some(parent)) => format!("{parent}_{prefix}{index}"),
        (None, None) => format!("{prefix}{index}"),
    }
}

fn sanitize_groups(parent_id: Option<&str>, groups: &[GroupConfig]) -> Vec<GroupSpec> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let id = item_id(group.id.as_ref(), parent_id, 'g', index);
            GroupSpec {
                default_disabled: group.default_disabled.unwrap_or(false),
                enabled_when: group.enabled_when.clone().unwrap_or_default(),
                disabled_when: group.disabled_when.clone().unwrap_or_default(),
                custom: group.custom.clone(),
                groups: group
                    .groups
                    .as_deref()
                    .map(|groups| sanitize_groups(Some(id.as_str()), groups))
                    .unwrap_or_default(),
                questions: group
                    .questions
                    .as_deref()
                    .map(|questions| sanitize_questions(Some(id.as_str()), questions))
                    .unwrap_or_default(),
                id,
            }
        })
        .collect()
}

fn sanitize_questions(group_id: Option<&str>, questions: &[QuestionConfig]) -> Vec<QuestionSpec> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let id = item_id(question.id.as_ref(), group_id, 'q', index);
            let choices = if question.kind.has_choices() {
                sanitize_choices(&id, question.choices.as_deref().unwrap_or_default())
            } else {
                Vec::new()
            };
            QuestionSpec {
                kind: question.kind,
                default_disabled: question.default_disabled.unwrap_or(false),
                enabled_when: question.enabled_when.clone().unwrap_or_default(),
                disabled_when: question.disabled_when.clone().unwrap_or_default(),
                custom: question.custom.clone(),
                choices,
                validators: question.validators.clone().unwrap_or_default(),
                default_answer: question.default_answer.clone(),
                id,
            }
        })
        .collect()
}

fn sanitize_choices(question_id: &str, choices: &[ChoiceConfig]) -> Vec<ChoiceSpec> {
    choices
        .iter()
        .enumerate()
        .map(|(index, choice)| {
            let id = item_id(choice.id.as_ref(), Some(question_id), 'c', index);
            ChoiceSpec {
                default_disabled: choice.default_disabled.unwrap_or(false),
                enabled_when: choice.enabled_when.clone().unwrap_or_default(),
                disabled_when: choice.disabled_when.clone().unwrap_or_default(),
                custom: choice.custom.clone(),
                value: choice
                    .value
                    .clone()
                    .unwrap_or_else(|| Value::String(id.clone())),
                on_selected: choice.on_selected.clone().unwrap_or_default(),
                id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> FormConfig {
        serde_json::from_value(value).expect("config")
    }

    #[test]
    fn generates_positional_ids() {
        let spec = sanitize(&config(json!({
            "groups": [{
                "groups": [{ "questions": [{ "type": "any" }] }],
                "questions": [{ "type": "choice", "choices": [{}, { "id": "named" }] }]
            }],
            "questions": [{ "type": "any" }, { "type": "any" }]
        })));

        let group = &spec.groups[0];
        assert_eq!(group.id, "g0");
        assert_eq!(group.groups[0].id, "g0_g0");
        assert_eq!(group.groups[0].questions[0].id, "g0_g0_q0");
        assert_eq!(group.questions[0].id, "g0_q0");
        assert_eq!(group.questions[0].choices[0].id, "g0_q0_c0");
        assert_eq!(group.questions[0].choices[1].id, "named");
        assert_eq!(spec.questions[1].id, "q1");
    }

    #[test]
    fn choice_value_defaults_to_id() {
        let spec = sanitize(&config(json!({
            "questions": [{
                "id": "q",
                "type": "choices",
                "choices": [{ "id": "a" }, { "id": "b", "value": 2 }]
            }]
        })));

        let choices = &spec.questions[0].choices;
        assert_eq!(choices[0].value, json!("a"));
        assert_eq!(choices[1].value, json!(2));
    }

    #[test]
    fn any_question_drops_choices_and_fills_defaults() {
        let spec = sanitize(&config(json!({
            "groups": [{
                "id": "g",
                "defaultDisabled": true,
                "questions": [{ "id": "q", "type": "input", "choices": [{ "id": "c" }] }]
            }]
        })));

        let group = &spec.groups[0];
        assert!(group.default_disabled);
        let question = &group.questions[0];
        assert!(question.choices.is_empty());
        assert!(question.validators.is_empty());
        assert!(!question.default_disabled);
        assert!(question.default_answer.is_none());
    }

    #[test]
    fn does_not_touch_input() {
        let input = config(json!({ "groups": [{ "questions": [{ "type": "any" }] }] }));
        let before = input.clone();
        let _ = sanitize(&input);
        assert_eq!(input, before);
    }
}
