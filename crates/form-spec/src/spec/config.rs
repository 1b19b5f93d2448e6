use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::form::{FormSpec, GroupSpec};
use crate::spec::question::{
    ChoiceConditions, ChoiceSpec, OnSelected, QuestionSpec, QuestionType,
};

/// Loosely specified choice; anything left out is filled in by [`crate::sanitize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "defaultDisabled", skip_serializing_if = "Option::is_none")]
    pub default_disabled: Option<bool>,
    #[serde(default, alias = "enabledWhen", skip_serializing_if = "Option::is_none")]
    pub enabled_when: Option<ChoiceConditions>,
    #[serde(default, alias = "disabledWhen", skip_serializing_if = "Option::is_none")]
    pub disabled_when: Option<ChoiceConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, alias = "onSelected", skip_serializing_if = "Option::is_none")]
    pub on_selected: Option<OnSelected>,
}

/// Loosely specified question. Only `type` is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, alias = "defaultDisabled", skip_serializing_if = "Option::is_none")]
    pub default_disabled: Option<bool>,
    #[serde(default, alias = "enabledWhen", skip_serializing_if = "Option::is_none")]
    pub enabled_when: Option<ChoiceConditions>,
    #[serde(default, alias = "disabledWhen", skip_serializing_if = "Option::is_none")]
    pub disabled_when: Option<ChoiceConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<String>>,
    #[serde(default, alias = "defaultAnswer", skip_serializing_if = "Option::is_none")]
    pub default_answer: Option<Value>,
}

impl QuestionConfig {
    pub fn new(kind: QuestionType) -> Self {
        Self {
            id: None,
            kind,
            default_disabled: None,
            enabled_when: None,
            disabled_when: None,
            custom: None,
            choices: None,
            validators: None,
            default_answer: None,
        }
    }
}

/// Loosely specified group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "defaultDisabled", skip_serializing_if = "Option::is_none")]
    pub default_disabled: Option<bool>,
    #[serde(default, alias = "enabledWhen", skip_serializing_if = "Option::is_none")]
    pub enabled_when: Option<ChoiceConditions>,
    #[serde(default, alias = "disabledWhen", skip_serializing_if = "Option::is_none")]
    pub disabled_when: Option<ChoiceConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionConfig>>,
}

/// Top-level form configuration accepted by `Form::new`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionConfig>>,
}

impl From<ChoiceSpec> for ChoiceConfig {
    fn from(choice: ChoiceSpec) -> Self {
        Self {
            id: Some(choice.id),
            default_disabled: Some(choice.default_disabled),
            enabled_when: Some(choice.enabled_when),
            disabled_when: Some(choice.disabled_when),
            custom: choice.custom,
            value: Some(choice.value),
            on_selected: Some(choice.on_selected),
        }
    }
}

impl From<QuestionSpec> for QuestionConfig {
    fn from(question: QuestionSpec) -> Self {
        Self {
            id: Some(question.id),
            kind: question.kind,
            default_disabled: Some(question.default_disabled),
            enabled_when: Some(question.enabled_when),
            disabled_when: Some(question.disabled_when),
            custom: question.custom,
            choices: Some(question.choices.into_iter().map(Into::into).collect()),
            validators: Some(question.validators),
            default_answer: question.default_answer,
        }
    }
}

impl From<GroupSpec> for GroupConfig {
    fn from(group: GroupSpec) -> Self {
        Self {
            id: Some(group.id),
            default_disabled: Some(group.default_disabled),
            enabled_when: Some(group.enabled_when),
            disabled_when: Some(group.disabled_when),
            custom: group.custom,
            groups: Some(group.groups.into_iter().map(Into::into).collect()),
            questions: Some(group.questions.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<FormSpec> for FormConfig {
    fn from(spec: FormSpec) -> Self {
        Self {
            groups: Some(spec.groups.into_iter().map(Into::into).collect()),
            questions: Some(spec.questions.into_iter().map(Into::into).collect()),
        }
    }
}
