use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Choice-id sets: the condition holds while every choice of any one set is selected.
pub type ChoiceConditions = Vec<Vec<String>>;

/// The three answer shapes a question can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Free-form answer.
    #[serde(alias = "input")]
    Any,
    /// Single-select over the question's choices.
    #[serde(alias = "single")]
    Choice,
    /// Multi-select over the question's choices.
    #[serde(alias = "multiple")]
    Choices,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Any => "any",
            QuestionType::Choice => "choice",
            QuestionType::Choices => "choices",
        }
    }

    pub fn has_choices(&self) -> bool {
        !matches!(self, QuestionType::Any)
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Items forced enabled or disabled while a choice is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OnSelected {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disable: Vec<String>,
}

impl OnSelected {
    pub fn is_empty(&self) -> bool {
        self.enable.is_empty() && self.disable.is_empty()
    }

    /// Every targeted id, enable list first.
    pub fn targets(&self) -> impl Iterator<Item = &String> {
        self.enable.iter().chain(self.disable.iter())
    }
}

/// Constraints read by the built-in `constraint` validator from `custom.constraint`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

/// Canonical choice: every field populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceSpec {
    pub id: String,
    #[serde(default)]
    pub default_disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "OnSelected::is_empty")]
    pub on_selected: OnSelected,
}

/// Canonical question: every field populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub default_disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default)]
    pub choices: Vec<ChoiceSpec>,
    #[serde(default)]
    pub validators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_answer: Option<Value>,
}

impl QuestionSpec {
    /// Parses `custom.constraint`, ignoring a missing or malformed object.
    pub fn constraint(&self) -> Option<Constraint> {
        let raw = self.custom.as_ref()?.get("constraint")?;
        serde_json::from_value(raw.clone()).ok()
    }
}
