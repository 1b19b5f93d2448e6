use std::collections::BTreeMap;

use serde_json::Value;

/// Answers keyed by question id. Absent keys are unanswered questions.
pub type Answers = BTreeMap<String, Value>;

/// Error messages keyed by question id.
pub type Errors = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionState {
    pub current: Option<Value>,
    pub validated: Option<Value>,
    pub validating: bool,
    pub error: Option<String>,
    generation: u64,
}

impl QuestionState {
    /// Starts a new validation run; settlements carrying an older generation are stale.
    pub(crate) fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn pass(&mut self, answer: Option<Value>) {
        self.validated = answer;
        self.error = None;
        self.validating = false;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.validated = None;
        self.error = Some(message);
        self.validating = false;
    }

    pub(crate) fn skip(&mut self) {
        self.validated = None;
        self.error = None;
        self.validating = false;
    }

    pub(crate) fn pending(&mut self) {
        self.validated = None;
        self.validating = true;
    }

    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|message| !message.is_empty())
    }
}

/// Answer state for every question, by question position in the item index.
#[derive(Debug, Clone, Default)]
pub struct AnswerBook {
    states: Vec<QuestionState>,
}

impl AnswerBook {
    pub fn new(questions: usize) -> Self {
        Self {
            states: vec![QuestionState::default(); questions],
        }
    }

    pub fn state(&self, question: usize) -> &QuestionState {
        &self.states[question]
    }

    pub(crate) fn state_mut(&mut self, question: usize) -> &mut QuestionState {
        &mut self.states[question]
    }

    pub fn current(&self, question: usize) -> Option<&Value> {
        self.states[question].current.as_ref()
    }

    pub fn any_validating(&self) -> bool {
        self.states.iter().any(|state| state.validating)
    }
}

/// Absent, `null`, `""` and `[]` all count as "no answer".
pub fn is_blank(answer: Option<&Value>) -> bool {
    match answer {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Equality for choice values: numbers compare by magnitude, so `1` equals `1.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

pub fn contains_value(values: &[Value], value: &Value) -> bool {
    values.iter().any(|existing| values_equal(existing, value))
}
