use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::question::{ChoiceConditions, QuestionSpec};

/// Canonical group: every field populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupSpec {
    pub id: String,
    #[serde(default)]
    pub default_disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_when: ChoiceConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

/// Canonical form tree, as produced by [`crate::sanitize`] and returned by `Form::get_configs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

impl FormSpec {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.questions.is_empty()
    }
}
