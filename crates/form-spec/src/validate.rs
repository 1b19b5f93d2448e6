use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::answers::contains_value;
use crate::spec::form::{FormSpec, GroupSpec};
use crate::spec::question::{ChoiceConditions, ChoiceSpec, QuestionSpec};

/// One problem found in a form config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("There are no groups or questions")]
    NoGroupsOrQuestions,
    #[error("Id is not unique")]
    DuplicateId,
    #[error("There are no questions")]
    NoQuestions,
    #[error("There are no choices")]
    NoChoices,
    #[error("There are choices with same values")]
    DuplicateChoiceValues,
    #[error("Circular relationship with '{0}'")]
    Circular(String),
    #[error("There are unrecognized id(s) in onSelected configs")]
    UnrecognizedOnSelected,
    #[error("There are unrecognized id(s) in enabledWhen/disabledWhen configs")]
    UnrecognizedCondition,
}

/// Severity buckets, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigErrorKind {
    Structure,
    Integrity,
    Cycle,
}

impl ConfigIssue {
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigIssue::Circular(_) => ConfigErrorKind::Cycle,
            ConfigIssue::UnrecognizedOnSelected | ConfigIssue::UnrecognizedCondition => {
                ConfigErrorKind::Integrity
            }
            _ => ConfigErrorKind::Structure,
        }
    }
}

/// Result of [`validate_configs`]. `errors` is keyed by item id; the empty key holds form-level errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip)]
    issues: Vec<(String, ConfigIssue)>,
}

impl ConfigReport {
    fn from_issues(issues: Vec<(String, ConfigIssue)>) -> Self {
        if issues.is_empty() {
            return Self {
                valid: true,
                errors: None,
                issues,
            };
        }

        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, issue) in &issues {
            errors.entry(id.clone()).or_default().push(issue.to_string());
        }
        Self {
            valid: false,
            errors: Some(errors),
            issues,
        }
    }

    /// Issues in the order they were found.
    pub fn issues(&self) -> &[(String, ConfigIssue)] {
        &self.issues
    }

    /// The most severe kind of issue present, if any.
    pub fn kind(&self) -> Option<ConfigErrorKind> {
        self.issues.iter().map(|(_, issue)| issue.kind()).min()
    }

    /// Messages recorded for one id.
    pub fn errors_for(&self, id: &str) -> &[String] {
        self.errors
            .as_ref()
            .and_then(|errors| errors.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(errors) = &self.errors else {
            return f.write_str("valid");
        };
        let mut first = true;
        for (id, messages) in errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                if id.is_empty() {
                    write!(f, "{message}")?;
                } else {
                    write!(f, "{id}: {message}")?;
                }
            }
        }
        Ok(())
    }
}

/// Checks a canonical config. With `strict`, cross-references must resolve too.
///
/// All failures are collected. The circular-relationship walk needs unique ids
/// and is skipped when duplicates exist.
pub fn validate_configs(spec: &FormSpec, strict: bool) -> ConfigReport {
    if spec.is_empty() {
        return ConfigReport::from_issues(vec![(String::new(), ConfigIssue::NoGroupsOrQuestions)]);
    }

    let mut collected = Collected::default();
    collected.collect_groups(None, &spec.groups);
    collected.collect_questions(None, &spec.questions);
    collected.link_dependents();

    let mut issues = Vec::new();

    let duplicated_ids = find_duplicates(&collected.all_ids);
    for id in &duplicated_ids {
        issues.push((id.clone(), ConfigIssue::DuplicateId));
    }

    issues.append(&mut collected.structure_issues);

    for (question_id, values) in &collected.choice_values {
        if has_duplicate_values(values) {
            issues.push((question_id.clone(), ConfigIssue::DuplicateChoiceValues));
        }
    }

    if duplicated_ids.is_empty() {
        collected.check_circular(&mut issues);
    }

    if strict {
        collected.check_references(&mut issues);
    }

    ConfigReport::from_issues(issues)
}

#[derive(Default)]
struct Collected {
    all_ids: Vec<String>,
    choice_ids: HashSet<String>,
    structure_issues: Vec<(String, ConfigIssue)>,
    choice_values: Vec<(String, Vec<Value>)>,
    on_selected: Vec<(String, Vec<String>)>,
    conditions: Vec<(String, Vec<String>)>,
    parents: HashMap<String, Vec<String>>,
}

impl Collected {
    fn collect_item(
        &mut self,
        parent_id: Option<&str>,
        id: &str,
        enabled_when: &ChoiceConditions,
        disabled_when: &ChoiceConditions,
    ) {
        self.all_ids.push(id.to_string());
        let parents: Vec<String> = parent_id.map(str::to_string).into_iter().collect();

        let condition_ids: Vec<String> = enabled_when
            .iter()
            .chain(disabled_when.iter())
            .flatten()
            .cloned()
            .collect();
        if !condition_ids.is_empty() {
            self.conditions.push((id.to_string(), condition_ids));
        }

        self.parents.insert(id.to_string(), parents);
    }

    fn collect_groups(&mut self, parent_id: Option<&str>, groups: &[GroupSpec]) {
        for group in groups {
            self.collect_item(parent_id, &group.id, &group.enabled_when, &group.disabled_when);
            self.collect_groups(Some(group.id.as_str()), &group.groups);

            if group.questions.is_empty() {
                self.structure_issues
                    .push((group.id.clone(), ConfigIssue::NoQuestions));
                continue;
            }

            self.collect_questions(Some(group.id.as_str()), &group.questions);
        }
    }

    fn collect_questions(&mut self, group_id: Option<&str>, questions: &[QuestionSpec]) {
        for question in questions {
            self.collect_item(
                group_id,
                &question.id,
                &question.enabled_when,
                &question.disabled_when,
            );

            if !question.kind.has_choices() {
                continue;
            }
            if question.choices.is_empty() {
                self.structure_issues
                    .push((question.id.clone(), ConfigIssue::NoChoices));
                continue;
            }

            self.collect_choices(&question.id, &question.choices);
            self.choice_values.push((
                question.id.clone(),
                question.choices.iter().map(|choice| choice.value.clone()).collect(),
            ));
        }
    }

    fn collect_choices(&mut self, question_id: &str, choices: &[ChoiceSpec]) {
        for choice in choices {
            self.collect_item(
                Some(question_id),
                &choice.id,
                &choice.enabled_when,
                &choice.disabled_when,
            );
            self.choice_ids.insert(choice.id.clone());

            let targets: Vec<String> = choice.on_selected.targets().cloned().collect();
            if !targets.is_empty() {
                self.on_selected.push((choice.id.clone(), targets));
            }
        }
    }

    /// Choices named by an item's conditions, and choices whose selection toggles
    /// an item, become parents of that item.
    fn link_dependents(&mut self) {
        for (item_id, condition_ids) in &self.conditions {
            let Some(parents) = self.parents.get_mut(item_id) else {
                continue;
            };
            parents.extend(
                condition_ids
                    .iter()
                    .filter(|id| self.choice_ids.contains(id.as_str()))
                    .cloned(),
            );
        }
        for (choice_id, targets) in &self.on_selected {
            for target in targets {
                if let Some(parents) = self.parents.get_mut(target) {
                    parents.push(choice_id.clone());
                }
            }
        }
    }

    fn check_circular(&self, issues: &mut Vec<(String, ConfigIssue)>) {
        let mut circular: HashSet<&str> = HashSet::new();
        for id in &self.all_ids {
            let mut visited = HashSet::new();
            if let Some(with) = self.find_cycle(id, id, &circular, &mut visited) {
                issues.push((id.clone(), ConfigIssue::Circular(with)));
                circular.insert(id.as_str());
            }
        }
    }

    fn find_cycle<'a>(
        &'a self,
        main_id: &str,
        sub_id: &'a str,
        circular: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<String> {
        let parents = self.parents.get(sub_id)?;

        if parents.iter().any(|parent| parent == main_id) {
            return Some(sub_id.to_string());
        }

        for parent in parents {
            if circular.contains(parent.as_str()) || !visited.insert(parent.as_str()) {
                continue;
            }
            if let Some(with) = self.find_cycle(main_id, parent, circular, visited) {
                return Some(with);
            }
        }

        None
    }

    fn check_references(&self, issues: &mut Vec<(String, ConfigIssue)>) {
        let known: HashSet<&str> = self.all_ids.iter().map(String::as_str).collect();

        for (choice_id, targets) in &self.on_selected {
            if targets.iter().any(|target| !known.contains(target.as_str())) {
                issues.push((choice_id.clone(), ConfigIssue::UnrecognizedOnSelected));
            }
        }

        for (item_id, choice_ids) in &self.conditions {
            if choice_ids.iter().any(|id| !self.choice_ids.contains(id)) {
                issues.push((item_id.clone(), ConfigIssue::UnrecognizedCondition));
            }
        }
    }
}

fn find_duplicates(ids: &[String]) -> Vec<String> {
    let mut sorted: Vec<&String> = ids.iter().collect();
    sorted.sort();
    let mut duplicates: Vec<String> = Vec::new();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] && duplicates.last() != Some(pair[0]) {
            duplicates.push(pair[0].clone());
        }
    }
    duplicates
}

fn has_duplicate_values(values: &[Value]) -> bool {
    values
        .iter()
        .enumerate()
        .any(|(index, value)| contains_value(&values[index + 1..], value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;
    use serde_json::json;

    fn check(value: Value, strict: bool) -> ConfigReport {
        let config = serde_json::from_value(value).expect("config");
        validate_configs(&sanitize(&config), strict)
    }

    #[test]
    fn empty_form_is_rejected() {
        let report = check(json!({}), false);
        assert!(!report.valid);
        assert_eq!(report.errors_for(""), ["There are no groups or questions"]);

        let report = check(json!({ "groups": [], "questions": [] }), false);
        assert_eq!(report.kind(), Some(ConfigErrorKind::Structure));
    }

    #[test]
    fn group_needs_direct_questions() {
        let report = check(json!({ "groups": [{ "groups": [{}] }] }), false);
        assert_eq!(report.errors_for("g0"), ["There are no questions"]);
        assert_eq!(report.errors_for("g0_g0"), ["There are no questions"]);

        let report = check(
            json!({ "groups": [{ "groups": [{ "questions": [{ "type": "any" }] }] }] }),
            false,
        );
        assert_eq!(report.errors_for("g0"), ["There are no questions"]);
        assert!(report.errors_for("g0_g0").is_empty());
    }

    #[test]
    fn choice_questions_need_choices() {
        for kind in ["choice", "choices"] {
            let report = check(json!({ "groups": [{ "questions": [{ "type": kind }] }] }), false);
            assert_eq!(report.errors_for("g0_q0"), ["There are no choices"]);
        }

        let report = check(json!({ "groups": [{ "questions": [{ "type": "any" }] }] }), false);
        assert!(report.valid);
        assert!(report.errors.is_none());
    }

    #[test]
    fn duplicated_ids_are_reported_once() {
        let report = check(
            json!({
                "groups": [{
                    "questions": [
                        { "id": "id", "type": "any" },
                        { "id": "id", "type": "any" },
                        { "id": "id", "type": "any" }
                    ]
                }]
            }),
            false,
        );
        assert_eq!(report.errors_for("id"), ["Id is not unique"]);
    }

    #[test]
    fn duplicated_choice_values_within_question() {
        let report = check(
            json!({
                "groups": [{
                    "questions": [{
                        "type": "choice",
                        "choices": [{ "id": "id" }, { "value": "id" }]
                    }]
                }]
            }),
            false,
        );
        assert_eq!(report.errors_for("g0_q0"), ["There are choices with same values"]);

        let report = check(
            json!({
                "groups": [
                    { "questions": [{ "type": "choice", "choices": [{ "value": "a" }, { "value": "b" }] }] },
                    { "questions": [{ "type": "choice", "choices": [{ "value": "a" }, { "value": "b" }] }] }
                ]
            }),
            false,
        );
        assert!(report.valid);
    }

    #[test]
    fn integer_and_float_values_are_duplicates() {
        let report = check(
            json!({
                "questions": [{
                    "id": "q",
                    "type": "choices",
                    "choices": [{ "id": "a", "value": 1 }, { "id": "b", "value": 1.0 }]
                }]
            }),
            false,
        );
        assert_eq!(report.errors_for("q"), ["There are choices with same values"]);
    }

    #[test]
    fn condition_on_a_non_choice_id_is_not_a_parent() {
        let report = check(
            json!({
                "groups": [{
                    "id": "g1",
                    "enabledWhen": [["q1"]],
                    "questions": [{ "id": "q1", "type": "any" }]
                }]
            }),
            false,
        );
        assert!(report.valid);

        let report = check(
            json!({
                "questions": [{
                    "id": "q1",
                    "type": "choice",
                    "enabledWhen": [["c1"]],
                    "choices": [{ "id": "c1" }, { "id": "c2" }]
                }]
            }),
            false,
        );
        assert_eq!(report.errors_for("q1"), ["Circular relationship with 'c1'"]);
    }

    #[test]
    fn circular_choice_pair() {
        let report = check(
            json!({
                "groups": [{
                    "id": "g1",
                    "questions": [{
                        "id": "q1",
                        "type": "choice",
                        "choices": [
                            { "id": "c1", "onSelected": { "enable": ["c2"] } },
                            { "id": "c2", "onSelected": { "enable": ["c1"] } }
                        ]
                    }]
                }]
            }),
            true,
        );
        assert!(!report.valid);
        assert_eq!(report.errors_for("c1"), ["Circular relationship with 'c2'"]);
        assert_eq!(report.kind(), Some(ConfigErrorKind::Cycle));
    }

    #[test]
    fn choice_targeting_its_own_ancestors() {
        for (target, with) in [("q1", "c2"), ("g1", "q1")] {
            let report = check(
                json!({
                    "groups": [{
                        "id": "g1",
                        "questions": [{
                            "id": "q1",
                            "type": "choice",
                            "choices": [{ "id": "c1" }, { "id": "c2", "onSelected": { "enable": [target] } }]
                        }]
                    }]
                }),
                true,
            );
            assert_eq!(
                report.errors_for(target),
                [format!("Circular relationship with '{with}'")]
            );
        }
    }

    #[test]
    fn sibling_choice_is_not_circular() {
        let report = check(
            json!({
                "groups": [{
                    "id": "g1",
                    "questions": [{
                        "id": "q1",
                        "type": "choice",
                        "choices": [{ "id": "c1", "onSelected": { "enable": ["c2"] } }, { "id": "c2" }]
                    }]
                }]
            }),
            true,
        );
        assert!(report.valid);
    }

    #[test]
    fn cycle_outside_the_start_item_terminates() {
        // q2 hangs below a loop between c1 and c3 that does not pass through q2.
        let report = check(
            json!({
                "questions": [
                    { "id": "q1", "type": "choice", "choices": [
                        { "id": "c1", "onSelected": { "disable": ["q3"] } },
                        { "id": "c2", "onSelected": { "enable": ["q2"] } }
                    ] },
                    { "id": "q2", "type": "any" },
                    { "id": "q3", "type": "choice", "choices": [
                        { "id": "c3", "onSelected": { "enable": ["q1"] } }
                    ] }
                ]
            }),
            false,
        );
        assert!(!report.valid);
        assert!(report.errors_for("q2").is_empty());
        assert!(!report.errors_for("q1").is_empty());
    }

    #[test]
    fn strict_mode_flags_unknown_targets() {
        let config = json!({
            "groups": [{
                "id": "g1",
                "questions": [{
                    "id": "q1",
                    "type": "choice",
                    "choices": [{ "id": "c1" }, { "id": "c2", "onSelected": { "disable": ["xx"] } }]
                }]
            }]
        });
        assert!(check(config.clone(), false).valid);

        let report = check(config, true);
        assert_eq!(
            report.errors_for("c2"),
            ["There are unrecognized id(s) in onSelected configs"]
        );
        assert_eq!(report.kind(), Some(ConfigErrorKind::Integrity));
    }

    #[test]
    fn strict_mode_flags_unknown_condition_choices() {
        let report = check(
            json!({
                "questions": [
                    { "id": "q1", "type": "choice", "choices": [{ "id": "c1" }] },
                    { "id": "q2", "type": "any", "enabledWhen": [["c1", "q1"]] }
                ]
            }),
            true,
        );
        assert_eq!(
            report.errors_for("q2"),
            ["There are unrecognized id(s) in enabledWhen/disabledWhen configs"]
        );
    }

    #[test]
    fn report_serializes_without_errors_when_valid() {
        let report = check(json!({ "questions": [{ "type": "any" }] }), true);
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({ "valid": true }));
    }
}
