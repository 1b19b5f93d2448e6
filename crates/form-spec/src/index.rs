use std::collections::HashMap;

use serde_json::Value;

use crate::spec::form::{FormSpec, GroupSpec};
use crate::spec::question::{ChoiceConditions, QuestionSpec};

/// Position of an item in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Group(usize),
    Question(usize),
    Choice(usize),
}

#[derive(Debug, Clone)]
pub struct GroupNode {
    pub id: String,
    pub default_disabled: bool,
    pub custom: Option<Value>,
    pub parent: Option<usize>,
    pub groups: Vec<usize>,
    pub questions: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct QuestionNode {
    pub spec: QuestionSpec,
    pub group: Option<usize>,
    pub choices: Vec<usize>,
}

impl QuestionNode {
    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

#[derive(Debug, Clone)]
pub struct ChoiceNode {
    pub id: String,
    pub value: Value,
    pub default_disabled: bool,
    pub custom: Option<Value>,
    pub question: usize,
}

/// `enabled_when` / `disabled_when` resolved to choice positions.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub enabled_when: Vec<Vec<usize>>,
    pub disabled_when: Vec<Vec<usize>>,
}

/// Id lookups, parent links and reverse dependency maps, built once per form.
///
/// Items live in three arenas and refer to each other by position.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    groups: Vec<GroupNode>,
    questions: Vec<QuestionNode>,
    choices: Vec<ChoiceNode>,
    root_groups: Vec<usize>,
    root_questions: Vec<usize>,
    lookup: HashMap<String, ItemRef>,
    disabled_by: HashMap<ItemRef, Vec<usize>>,
    enabled_by: HashMap<ItemRef, Vec<usize>>,
    conditions: HashMap<ItemRef, Conditions>,
}

impl ItemIndex {
    pub fn build(spec: &FormSpec) -> Self {
        let mut index = ItemIndex::default();
        let mut pending_conditions = Vec::new();

        for group in &spec.groups {
            let position = index.add_group(None, group, &mut pending_conditions);
            index.root_groups.push(position);
        }
        for question in &spec.questions {
            let position = index.add_question(None, question, &mut pending_conditions);
            index.root_questions.push(position);
        }

        index.link_on_selected(spec);
        for (item, enabled_when, disabled_when) in pending_conditions {
            let conditions = Conditions {
                enabled_when: index.resolve_conditions(&enabled_when),
                disabled_when: index.resolve_conditions(&disabled_when),
            };
            if !conditions.enabled_when.is_empty() || !conditions.disabled_when.is_empty() {
                index.conditions.insert(item, conditions);
            }
        }

        index
    }

    fn add_group(
        &mut self,
        parent: Option<usize>,
        group: &GroupSpec,
        pending: &mut Vec<(ItemRef, ChoiceConditions, ChoiceConditions)>,
    ) -> usize {
        let position = self.groups.len();
        self.groups.push(GroupNode {
            id: group.id.clone(),
            default_disabled: group.default_disabled,
            custom: group.custom.clone(),
            parent,
            groups: Vec::new(),
            questions: Vec::new(),
        });
        self.register(&group.id, ItemRef::Group(position));
        queue_conditions(
            pending,
            ItemRef::Group(position),
            &group.enabled_when,
            &group.disabled_when,
        );

        let sub_groups: Vec<usize> = group
            .groups
            .iter()
            .map(|sub_group| self.add_group(Some(position), sub_group, pending))
            .collect();
        let questions: Vec<usize> = group
            .questions
            .iter()
            .map(|question| self.add_question(Some(position), question, pending))
            .collect();

        let node = &mut self.groups[position];
        node.groups = sub_groups;
        node.questions = questions;
        position
    }

    fn add_question(
        &mut self,
        group: Option<usize>,
        question: &QuestionSpec,
        pending: &mut Vec<(ItemRef, ChoiceConditions, ChoiceConditions)>,
    ) -> usize {
        let position = self.questions.len();
        self.register(&question.id, ItemRef::Question(position));
        queue_conditions(
            pending,
            ItemRef::Question(position),
            &question.enabled_when,
            &question.disabled_when,
        );

        let mut choices = Vec::new();
        if question.kind.has_choices() {
            for choice in &question.choices {
                let choice_position = self.choices.len();
                self.choices.push(ChoiceNode {
                    id: choice.id.clone(),
                    value: choice.value.clone(),
                    default_disabled: choice.default_disabled,
                    custom: choice.custom.clone(),
                    question: position,
                });
                self.register(&choice.id, ItemRef::Choice(choice_position));
                queue_conditions(
                    pending,
                    ItemRef::Choice(choice_position),
                    &choice.enabled_when,
                    &choice.disabled_when,
                );
                choices.push(choice_position);
            }
        }

        self.questions.push(QuestionNode {
            spec: question.clone(),
            group,
            choices,
        });
        position
    }

    fn register(&mut self, id: &str, item: ItemRef) {
        self.lookup.entry(id.to_string()).or_insert(item);
    }

    /// Targets may be declared after the choice naming them, so linking waits for the full walk.
    fn link_on_selected(&mut self, spec: &FormSpec) {
        let mut links = Vec::new();
        for_each_question(spec, &mut |question| {
            for choice in &question.choices {
                links.push((choice.id.clone(), choice.on_selected.clone()));
            }
        });

        for (choice_id, on_selected) in links {
            let Some(ItemRef::Choice(choice)) = self.lookup.get(&choice_id).copied() else {
                continue;
            };
            for target in &on_selected.disable {
                if let Some(item) = self.lookup.get(target).copied() {
                    self.disabled_by.entry(item).or_default().push(choice);
                }
            }
            for target in &on_selected.enable {
                if let Some(item) = self.lookup.get(target).copied() {
                    self.enabled_by.entry(item).or_default().push(choice);
                }
            }
        }
    }

    /// Sets that are empty or name anything but a known choice can never hold, so they are dropped.
    fn resolve_conditions(&self, conditions: &ChoiceConditions) -> Vec<Vec<usize>> {
        conditions
            .iter()
            .filter(|set| !set.is_empty())
            .filter_map(|set| {
                set.iter()
                    .map(|id| match self.lookup.get(id) {
                        Some(ItemRef::Choice(choice)) => Some(*choice),
                        _ => None,
                    })
                    .collect::<Option<Vec<usize>>>()
            })
            .collect()
    }

    pub fn item(&self, id: &str) -> Option<ItemRef> {
        self.lookup.get(id).copied()
    }

    pub fn group_position(&self, id: &str) -> Option<usize> {
        match self.item(id)? {
            ItemRef::Group(position) => Some(position),
            _ => None,
        }
    }

    pub fn question_position(&self, id: &str) -> Option<usize> {
        match self.item(id)? {
            ItemRef::Question(position) => Some(position),
            _ => None,
        }
    }

    pub fn choice_position(&self, id: &str) -> Option<usize> {
        match self.item(id)? {
            ItemRef::Choice(position) => Some(position),
            _ => None,
        }
    }

    pub fn group(&self, position: usize) -> &GroupNode {
        &self.groups[position]
    }

    pub fn question(&self, position: usize) -> &QuestionNode {
        &self.questions[position]
    }

    pub fn choice(&self, position: usize) -> &ChoiceNode {
        &self.choices[position]
    }

    pub fn groups(&self) -> &[GroupNode] {
        &self.groups
    }

    pub fn questions(&self) -> &[QuestionNode] {
        &self.questions
    }

    pub fn choices(&self) -> &[ChoiceNode] {
        &self.choices
    }

    pub fn root_groups(&self) -> &[usize] {
        &self.root_groups
    }

    pub fn root_questions(&self) -> &[usize] {
        &self.root_questions
    }

    /// Choices whose selection disables `item`.
    pub fn disabled_by(&self, item: ItemRef) -> &[usize] {
        self.disabled_by.get(&item).map(Vec::as_slice).unwrap_or_default()
    }

    /// Choices whose selection enables `item`.
    pub fn enabled_by(&self, item: ItemRef) -> &[usize] {
        self.enabled_by.get(&item).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn conditions(&self, item: ItemRef) -> Option<&Conditions> {
        self.conditions.get(&item)
    }

    pub fn id_of(&self, item: ItemRef) -> &str {
        match item {
            ItemRef::Group(position) => &self.groups[position].id,
            ItemRef::Question(position) => self.questions[position].id(),
            ItemRef::Choice(position) => &self.choices[position].id,
        }
    }

    /// Every question below `group`, sub-groups first, in tree order.
    pub fn questions_in_group(&self, group: usize) -> Vec<usize> {
        let mut collected = Vec::new();
        self.collect_group_questions(group, &mut collected);
        collected
    }

    fn collect_group_questions(&self, group: usize, collected: &mut Vec<usize>) {
        let node = &self.groups[group];
        for sub_group in &node.groups {
            self.collect_group_questions(*sub_group, collected);
        }
        collected.extend(node.questions.iter().copied());
    }
}

fn queue_conditions(
    pending: &mut Vec<(ItemRef, ChoiceConditions, ChoiceConditions)>,
    item: ItemRef,
    enabled_when: &ChoiceConditions,
    disabled_when: &ChoiceConditions,
) {
    if !enabled_when.is_empty() || !disabled_when.is_empty() {
        pending.push((item, enabled_when.clone(), disabled_when.clone()));
    }
}

fn for_each_question(spec: &FormSpec, visit: &mut impl FnMut(&QuestionSpec)) {
    fn walk_group(group: &GroupSpec, visit: &mut impl FnMut(&QuestionSpec)) {
        for sub_group in &group.groups {
            walk_group(sub_group, visit);
        }
        for question in &group.questions {
            visit(question);
        }
    }

    for group in &spec.groups {
        walk_group(group, visit);
    }
    for question in &spec.questions {
        visit(question);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;
    use serde_json::json;

    fn index(value: serde_json::Value) -> ItemIndex {
        let config = serde_json::from_value(value).expect("config");
        ItemIndex::build(&sanitize(&config))
    }

    #[test]
    fn links_parents_and_children() {
        let index = index(json!({
            "groups": [{
                "id": "g1",
                "groups": [{ "id": "g2", "questions": [{ "id": "q2", "type": "any" }] }],
                "questions": [{
                    "id": "q1",
                    "type": "choice",
                    "choices": [{ "id": "c1" }, { "id": "c2" }]
                }]
            }],
            "questions": [{ "id": "q3", "type": "any" }]
        }));

        let g1 = index.group_position("g1").unwrap();
        let g2 = index.group_position("g2").unwrap();
        assert_eq!(index.group(g2).parent, Some(g1));
        assert_eq!(index.group(g1).parent, None);

        let q1 = index.question_position("q1").unwrap();
        assert_eq!(index.question(q1).group, Some(g1));
        assert_eq!(index.question(q1).choices.len(), 2);

        let c2 = index.choice_position("c2").unwrap();
        assert_eq!(index.choice(c2).question, q1);

        let q3 = index.question_position("q3").unwrap();
        assert_eq!(index.question(q3).group, None);
        assert_eq!(index.root_questions(), &[q3]);

        assert_eq!(index.questions_in_group(g1), vec![index.question_position("q2").unwrap(), q1]);
        assert!(index.question_position("c1").is_none());
    }

    #[test]
    fn reverse_maps_accept_forward_references() {
        let index = index(json!({
            "questions": [
                {
                    "id": "q1",
                    "type": "choice",
                    "choices": [
                        { "id": "c1", "onSelected": { "enable": ["q2"], "disable": ["q2", "missing"] } },
                        { "id": "c2", "onSelected": { "enable": ["q2"] } }
                    ]
                },
                { "id": "q2", "type": "any" }
            ]
        }));

        let q2 = ItemRef::Question(index.question_position("q2").unwrap());
        let c1 = index.choice_position("c1").unwrap();
        let c2 = index.choice_position("c2").unwrap();
        assert_eq!(index.enabled_by(q2), &[c1, c2]);
        assert_eq!(index.disabled_by(q2), &[c1]);
        assert!(index.item("missing").is_none());
    }

    #[test]
    fn conditions_resolve_to_choices() {
        let index = index(json!({
            "questions": [
                { "id": "q1", "type": "choices", "choices": [{ "id": "c1" }, { "id": "c2" }] },
                {
                    "id": "q2",
                    "type": "any",
                    "disabledWhen": [["c1", "c2"], [], ["c1", "q1"]],
                    "enabledWhen": [["c2"]]
                }
            ]
        }));

        let q2 = ItemRef::Question(index.question_position("q2").unwrap());
        let conditions = index.conditions(q2).expect("conditions");
        assert_eq!(conditions.disabled_when, vec![vec![0, 1]]);
        assert_eq!(conditions.enabled_when, vec![vec![1]]);
    }
}
