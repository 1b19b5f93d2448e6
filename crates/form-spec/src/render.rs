use serde::Serialize;
use serde_json::Value;

use crate::answers::AnswerBook;
use crate::disablement::Disablement;
use crate::index::ItemIndex;
use crate::spec::question::QuestionType;

/// Snapshot of a choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceInstruction {
    pub id: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    pub value: Value,
    pub selected: bool,
}

/// Snapshot of a question and its answer state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionInstruction {
    pub id: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub choices: Vec<ChoiceInstruction>,
    pub current_answer: Option<Value>,
    /// Always `None` while the question is disabled.
    pub validated_answer: Option<Value>,
    pub validating: bool,
    pub error: Option<String>,
}

/// Snapshot of a group and everything below it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInstruction {
    pub id: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    pub groups: Vec<GroupInstruction>,
    pub questions: Vec<QuestionInstruction>,
}

/// Immutable projection of the whole form, compared by value to detect changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderInstructions {
    pub groups: Vec<GroupInstruction>,
    pub questions: Vec<QuestionInstruction>,
}

impl RenderInstructions {
    pub fn find_group(&self, id: &str) -> Option<&GroupInstruction> {
        fn search<'a>(groups: &'a [GroupInstruction], id: &str) -> Option<&'a GroupInstruction> {
            groups
                .iter()
                .find_map(|group| if group.id == id { Some(group) } else { search(&group.groups, id) })
        }
        search(&self.groups, id)
    }

    pub fn find_question(&self, id: &str) -> Option<&QuestionInstruction> {
        self.all_questions().into_iter().find(|question| question.id == id)
    }

    pub fn find_choice(&self, id: &str) -> Option<&ChoiceInstruction> {
        self.all_questions()
            .into_iter()
            .flat_map(|question| question.choices.iter())
            .find(|choice| choice.id == id)
    }

    /// Every question in tree order.
    pub fn all_questions(&self) -> Vec<&QuestionInstruction> {
        fn collect<'a>(group: &'a GroupInstruction, out: &mut Vec<&'a QuestionInstruction>) {
            for sub_group in &group.groups {
                collect(sub_group, out);
            }
            out.extend(group.questions.iter());
        }

        let mut questions = Vec::new();
        for group in &self.groups {
            collect(group, &mut questions);
        }
        questions.extend(self.questions.iter());
        questions
    }
}

/// Project the index and answer state into render instructions.
pub fn build_render_instructions(index: &ItemIndex, answers: &AnswerBook) -> RenderInstructions {
    let projector = Projector {
        index,
        answers,
        disablement: Disablement::new(index, answers),
    };
    RenderInstructions {
        groups: index
            .root_groups()
            .iter()
            .map(|group| projector.group(*group))
            .collect(),
        questions: index
            .root_questions()
            .iter()
            .map(|question| projector.question(*question))
            .collect(),
    }
}

struct Projector<'a> {
    index: &'a ItemIndex,
    answers: &'a AnswerBook,
    disablement: Disablement<'a>,
}

impl Projector<'_> {
    fn group(&self, position: usize) -> GroupInstruction {
        let node = self.index.group(position);
        GroupInstruction {
            id: node.id.clone(),
            disabled: self.disablement.is_group_disabled(position),
            custom: node.custom.clone(),
            groups: node.groups.iter().map(|group| self.group(*group)).collect(),
            questions: node
                .questions
                .iter()
                .map(|question| self.question(*question))
                .collect(),
        }
    }

    fn question(&self, position: usize) -> QuestionInstruction {
        let node = self.index.question(position);
        let state = self.answers.state(position);
        let disabled = self.disablement.is_question_disabled(position);
        QuestionInstruction {
            id: node.spec.id.clone(),
            disabled,
            custom: node.spec.custom.clone(),
            kind: node.spec.kind,
            choices: node.choices.iter().map(|choice| self.choice(*choice)).collect(),
            current_answer: state.current.clone(),
            validated_answer: if disabled { None } else { state.validated.clone() },
            validating: state.validating,
            error: state.error.clone(),
        }
    }

    fn choice(&self, position: usize) -> ChoiceInstruction {
        let node = self.index.choice(position);
        ChoiceInstruction {
            id: node.id.clone(),
            disabled: self.disablement.is_choice_disabled(position),
            custom: node.custom.clone(),
            value: node.value.clone(),
            selected: self.disablement.is_choice_selected(position),
        }
    }
}

/// Render the snapshot as human-friendly text.
pub fn render_text(instructions: &RenderInstructions) -> String {
    let mut lines = Vec::new();
    for group in &instructions.groups {
        group_lines(group, 0, &mut lines);
    }
    for question in &instructions.questions {
        question_lines(question, 0, &mut lines);
    }
    if lines.is_empty() {
        lines.push("Form is empty.".to_string());
    }
    lines.join("\n")
}

fn group_lines(group: &GroupInstruction, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mut entry = format!("{indent}Group {}", group.id);
    if group.disabled {
        entry.push_str(" [disabled]");
    }
    lines.push(entry);
    for sub_group in &group.groups {
        group_lines(sub_group, depth + 1, lines);
    }
    for question in &group.questions {
        question_lines(question, depth + 1, lines);
    }
}

fn question_lines(question: &QuestionInstruction, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mut entry = format!("{indent}- {} ({})", question.id, question.kind);
    if question.disabled {
        entry.push_str(" [disabled]");
    }
    if let Some(current) = &question.current_answer {
        entry.push_str(&format!(" = {}", value_to_display(current)));
    }
    if question.validating {
        entry.push_str(" [validating]");
    } else if question.validated_answer.is_some() {
        entry.push_str(" [valid]");
    }
    lines.push(entry);

    if let Some(error) = &question.error {
        lines.push(format!("{indent}  ! {error}"));
    }
    for choice in &question.choices {
        let mark = if choice.selected { "[x]" } else { "[ ]" };
        let mut entry = format!("{indent}  {mark} {} = {}", choice.id, value_to_display(&choice.value));
        if choice.disabled {
            entry.push_str(" [disabled]");
        }
        lines.push(entry);
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        other => other.to_string(),
    }
}
