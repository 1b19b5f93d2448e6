use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::answers::{AnswerBook, contains_value, values_equal};
use crate::index::{ItemIndex, ItemRef};
use crate::spec::question::QuestionType;

/// Disabled flag by item id.
pub type DisabledMap = BTreeMap<String, bool>;

/// Resolver over one state snapshot. Results are memoized for its lifetime.
///
/// A disabled ancestor always disables its descendants. Otherwise an item's own
/// state comes from the first rule that applies: a selected `on_selected.disable`
/// source, a fully selected `disabled_when` set, a selected `on_selected.enable`
/// source, a fully selected `enabled_when` set, then `default_disabled`.
pub struct Disablement<'a> {
    index: &'a ItemIndex,
    answers: &'a AnswerBook,
    cache: RefCell<HashMap<ItemRef, bool>>,
}

impl<'a> Disablement<'a> {
    pub fn new(index: &'a ItemIndex, answers: &'a AnswerBook) -> Self {
        Self {
            index,
            answers,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_disabled(&self, item: ItemRef) -> bool {
        if let Some(disabled) = self.cache.borrow().get(&item) {
            return *disabled;
        }
        let parent = match item {
            ItemRef::Group(group) => self.index.group(group).parent.map(ItemRef::Group),
            ItemRef::Question(question) => self.index.question(question).group.map(ItemRef::Group),
            ItemRef::Choice(choice) => Some(ItemRef::Question(self.index.choice(choice).question)),
        };
        let disabled = parent.is_some_and(|parent| self.is_disabled(parent)) || self.is_item_disabled(item);
        self.cache.borrow_mut().insert(item, disabled);
        disabled
    }

    pub fn is_group_disabled(&self, group: usize) -> bool {
        self.is_disabled(ItemRef::Group(group))
    }

    pub fn is_question_disabled(&self, question: usize) -> bool {
        self.is_disabled(ItemRef::Question(question))
    }

    pub fn is_choice_disabled(&self, choice: usize) -> bool {
        self.is_disabled(ItemRef::Choice(choice))
    }

    /// An enabled choice whose value is (or is part of) its question's current answer.
    pub fn is_choice_selected(&self, choice: usize) -> bool {
        if self.is_choice_disabled(choice) {
            return false;
        }
        let node = self.index.choice(choice);
        let question = self.index.question(node.question);
        let Some(current) = self.answers.current(node.question) else {
            return false;
        };
        match question.spec.kind {
            QuestionType::Choice => values_equal(current, &node.value),
            QuestionType::Choices => current
                .as_array()
                .is_some_and(|values| contains_value(values, &node.value)),
            QuestionType::Any => false,
        }
    }

    fn is_item_disabled(&self, item: ItemRef) -> bool {
        let any_selected = |choices: &[usize]| choices.iter().any(|choice| self.is_choice_selected(*choice));
        let any_set_selected = |sets: &[Vec<usize>]| sets.iter().any(|set| set.iter().all(|choice| self.is_choice_selected(*choice)));
        let conditions = self.index.conditions(item);

        if any_selected(self.index.disabled_by(item)) {
            return true;
        }
        if conditions.is_some_and(|conditions| any_set_selected(&conditions.disabled_when)) {
            return true;
        }
        if any_selected(self.index.enabled_by(item)) {
            return false;
        }
        if conditions.is_some_and(|conditions| any_set_selected(&conditions.enabled_when)) {
            return false;
        }
        self.default_disabled(item)
    }

    fn default_disabled(&self, item: ItemRef) -> bool {
        match item {
            ItemRef::Group(group) => self.index.group(group).default_disabled,
            ItemRef::Question(question) => self.index.question(question).spec.default_disabled,
            ItemRef::Choice(choice) => self.index.choice(choice).default_disabled,
        }
    }
}

/// Disabled flag of every group, question and choice.
pub fn resolve_disablement(index: &ItemIndex, answers: &AnswerBook) -> DisabledMap {
    let resolver = Disablement::new(index, answers);
    let groups = (0..index.groups().len()).map(ItemRef::Group);
    let questions = (0..index.questions().len()).map(ItemRef::Question);
    let choices = (0..index.choices().len()).map(ItemRef::Choice);

    groups
        .chain(questions)
        .chain(choices)
        .map(|item| (index.id_of(item).to_string(), resolver.is_disabled(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;
    use serde_json::{Value, json};

    struct Fixture {
        index: ItemIndex,
        answers: AnswerBook,
    }

    impl Fixture {
        fn new(config: Value) -> Self {
            let config = serde_json::from_value(config).expect("config");
            let index = ItemIndex::build(&sanitize(&config));
            let answers = AnswerBook::new(index.questions().len());
            Self { index, answers }
        }

        fn answer(&mut self, question: &str, value: Value) -> &mut Self {
            let position = self.index.question_position(question).expect("question");
            self.answers.state_mut(position).current = Some(value);
            self
        }

        fn disabled(&self) -> DisabledMap {
            resolve_disablement(&self.index, &self.answers)
        }
    }

    fn cascade() -> Value {
        json!({
            "groups": [{
                "id": "g1",
                "questions": [
                    {
                        "id": "q1",
                        "type": "choice",
                        "choices": [
                            { "id": "c1", "onSelected": { "enable": ["q2"] } },
                            { "id": "c2", "onSelected": { "disable": ["g2"] } },
                            { "id": "c3", "onSelected": { "enable": ["q2"], "disable": ["q2"] } }
                        ]
                    },
                    { "id": "q2", "type": "any", "defaultDisabled": true }
                ]
            }, {
                "id": "g2",
                "questions": [{
                    "id": "q3",
                    "type": "choices",
                    "choices": [{ "id": "c4" }, { "id": "c5" }]
                }]
            }]
        })
    }

    #[test]
    fn selected_choice_enables_target() {
        let mut fixture = Fixture::new(cascade());
        assert!(fixture.disabled()["q2"]);

        fixture.answer("q1", json!("c1"));
        assert!(!fixture.disabled()["q2"]);
    }

    #[test]
    fn disable_beats_enable() {
        let mut fixture = Fixture::new(cascade());
        fixture.answer("q1", json!("c3"));
        assert!(fixture.disabled()["q2"]);
    }

    #[test]
    fn disabled_group_disables_descendants() {
        let mut fixture = Fixture::new(cascade());
        fixture.answer("q1", json!("c2")).answer("q3", json!(["c4", "c5"]));

        let disabled = fixture.disabled();
        assert!(disabled["g2"]);
        assert!(disabled["q3"]);
        assert!(disabled["c4"]);
        assert!(disabled["c5"]);
    }

    #[test]
    fn disabled_choice_is_never_selected() {
        let mut fixture = Fixture::new(json!({
            "questions": [{
                "id": "q",
                "type": "choices",
                "choices": [{ "id": "a", "defaultDisabled": true }, { "id": "b" }]
            }]
        }));
        fixture.answer("q", json!(["a", "b"]));

        let resolver = Disablement::new(&fixture.index, &fixture.answers);
        assert!(!resolver.is_choice_selected(fixture.index.choice_position("a").unwrap()));
        assert!(resolver.is_choice_selected(fixture.index.choice_position("b").unwrap()));
    }

    #[test]
    fn choice_sets_need_every_member_selected() {
        let mut fixture = Fixture::new(json!({
            "questions": [
                { "id": "q1", "type": "choices", "choices": [{ "id": "a" }, { "id": "b" }] },
                { "id": "q2", "type": "any", "disabledWhen": [["a", "b"]] },
                { "id": "q3", "type": "any", "defaultDisabled": true, "enabledWhen": [["a"], ["b"]] }
            ]
        }));

        fixture.answer("q1", json!(["a"]));
        let disabled = fixture.disabled();
        assert!(!disabled["q2"]);
        assert!(!disabled["q3"]);

        fixture.answer("q1", json!(["a", "b"]));
        assert!(fixture.disabled()["q2"]);

        fixture.answer("q1", json!([]));
        assert!(fixture.disabled()["q3"]);
    }
}
