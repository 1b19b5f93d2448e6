use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::answers::{AnswerBook, Answers, Errors, contains_value, values_equal};
use crate::disablement::{DisabledMap, Disablement, resolve_disablement};
use crate::error::FormError;
use crate::index::ItemIndex;
use crate::render::{RenderInstructions, build_render_instructions};
use crate::sanitize::sanitize;
use crate::spec::config::FormConfig;
use crate::spec::form::FormSpec;
use crate::spec::question::{QuestionSpec, QuestionType};
use crate::validate::ConfigReport;
use crate::validators::{
    ChainStart, PendingChain, ValidationError, ValidationResult, Validators, start_chain,
};

const ASYNC_VALIDATE_POLL: Duration = Duration::from_millis(10);

/// Error stored when a suspended validator chain panics.
pub const VALIDATOR_PANICKED: &str = "Validator panicked.";

/// Called with the form after every change to its render snapshot.
pub type FormListener = Arc<dyn Fn(&Form) + Send + Sync>;

/// Construction options for [`Form`].
#[derive(Clone)]
pub struct FormOptions {
    /// Defaults to [`Validators::builtin`].
    pub validators: Validators,
    /// Validate default answers during construction.
    pub validate: bool,
    pub on_form_update: Option<FormListener>,
    /// Reject configs with unresolved id references.
    pub strict: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validators: Validators::builtin(),
            validate: true,
            on_form_update: None,
            strict: false,
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validators(mut self, validators: Validators) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Form) + Send + Sync + 'static,
    {
        self.on_form_update = Some(Arc::new(listener));
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOptions")
            .field("validators", &self.validators)
            .field("validate", &self.validate)
            .field("on_form_update", &self.on_form_update.is_some())
            .field("strict", &self.strict)
            .finish()
    }
}

/// Per-write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    pub validate: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl SetOptions {
    /// Store the answer and drop any validated answer or error instead of validating.
    pub fn skip_validation() -> Self {
        Self { validate: false }
    }
}

/// A live form instance.
///
/// Every write runs synchronously up to the first pending validator. The rest of
/// that chain is spawned on the ambient Tokio runtime, or driven inline with
/// `futures::executor::block_on` when there is none. A settlement whose question
/// was written again in the meantime is dropped.
pub struct Form {
    shared: Arc<Shared>,
}

struct Shared {
    spec: FormSpec,
    index: ItemIndex,
    validators: Validators,
    listener: Option<FormListener>,
    state: Mutex<FormState>,
}

struct FormState {
    answers: AnswerBook,
    snapshot: Option<RenderInstructions>,
}

/// A chain suspended during a write, spawned once the state lock is released.
struct PendingValidation {
    question: usize,
    generation: u64,
    answer: Option<Value>,
    chain: PendingChain,
}

impl Form {
    /// Sanitizes and checks `config`, then applies every question's default answer.
    ///
    /// The listener, if any, is called once before this returns with the first snapshot.
    pub fn new(config: &FormConfig, options: FormOptions) -> Result<Self, FormError> {
        let spec = sanitize(config);
        let report = crate::validate::validate_configs(&spec, options.strict);
        if !report.valid {
            debug!(errors = %report, "rejecting form config");
            return Err(FormError::from_report(report));
        }

        let index = ItemIndex::build(&spec);
        for question in index.questions() {
            options.validators.warn_unregistered(&question.spec);
        }
        debug!(
            groups = index.groups().len(),
            questions = index.questions().len(),
            choices = index.choices().len(),
            "form constructed"
        );

        let answers = AnswerBook::new(index.questions().len());
        let form = Form {
            shared: Arc::new(Shared {
                spec,
                index,
                validators: options.validators,
                listener: options.on_form_update,
                state: Mutex::new(FormState {
                    answers,
                    snapshot: None,
                }),
            }),
        };

        let set_options = SetOptions {
            validate: options.validate,
        };
        form.write(|shared, state, pending| {
            for question in 0..shared.index.questions().len() {
                let default = shared.index.question(question).spec.default_answer.clone();
                shared.apply(state, question, default.as_ref(), set_options, pending);
            }
            Ok(())
        })?;
        Ok(form)
    }

    /// Checks a config without building a form.
    pub fn validate_configs(config: &FormConfig, strict: bool) -> ConfigReport {
        crate::validate::validate_configs(&sanitize(config), strict)
    }

    pub fn get_configs(&self) -> FormSpec {
        self.shared.spec.clone()
    }

    pub fn get_render_instructions(&self) -> RenderInstructions {
        let state = self.shared.lock();
        build_render_instructions(&self.shared.index, &state.answers)
    }

    /// Answers to dispatch by question type: `set_any`, `set_choice` or `set_choices`.
    pub fn set_answer(&self, id: &str, answer: Option<Value>, options: SetOptions) -> Result<(), FormError> {
        let question = self.question_position(id)?;
        self.set(question, answer, options)
    }

    pub fn set_any(&self, id: &str, answer: Option<Value>, options: SetOptions) -> Result<(), FormError> {
        let question = self.typed_question(id, QuestionType::Any)?;
        self.set(question, answer, options)
    }

    /// Stores the value of the enabled choice equal to `value`, or nothing.
    pub fn set_choice(&self, id: &str, value: Option<Value>, options: SetOptions) -> Result<(), FormError> {
        let question = self.typed_question(id, QuestionType::Choice)?;
        self.set(question, value, options)
    }

    /// Stores the values of the enabled choices found in `values`, in choice order.
    pub fn set_choices(&self, id: &str, values: Vec<Value>, options: SetOptions) -> Result<(), FormError> {
        let question = self.typed_question(id, QuestionType::Choices)?;
        self.set(question, Some(Value::Array(values)), options)
    }

    /// Selects or unselects one choice by id.
    pub fn select_choice(&self, id: &str, selected: bool, options: SetOptions) -> Result<(), FormError> {
        let choice = self
            .shared
            .index
            .choice_position(id)
            .ok_or_else(|| FormError::ChoiceNotFound(id.to_string()))?;
        let node = self.shared.index.choice(choice);
        let question = node.question;
        let value = node.value.clone();
        let kind = self.shared.index.question(question).spec.kind;

        self.write(move |shared, state, pending| {
            let current = state.answers.current(question).cloned();
            let next = match kind {
                QuestionType::Choices => {
                    let mut values = match current {
                        Some(Value::Array(values)) => values,
                        _ => Vec::new(),
                    };
                    if !selected {
                        values.retain(|existing| !values_equal(existing, &value));
                    } else if !contains_value(&values, &value) {
                        values.push(value);
                    }
                    Some(Value::Array(values))
                }
                _ if selected => Some(value),
                _ if current.as_ref().is_some_and(|current| values_equal(current, &value)) => None,
                _ => current,
            };
            shared.apply(state, question, next.as_ref(), options, pending);
            Ok(())
        })
    }

    pub fn clear(&self, options: SetOptions) {
        self.write_all(self.all_questions(), |_| None, options);
    }

    pub fn clear_group(&self, id: &str, options: SetOptions) -> Result<(), FormError> {
        let questions = self.group_questions(id)?;
        self.write_all(questions, |_| None, options);
        Ok(())
    }

    pub fn clear_answer(&self, id: &str, options: SetOptions) -> Result<(), FormError> {
        let question = self.question_position(id)?;
        self.set(question, None, options)
    }

    /// Restores every question's default answer.
    pub fn reset(&self, options: SetOptions) {
        self.write_all(self.all_questions(), |spec| spec.default_answer.clone(), options);
    }

    pub fn reset_group(&self, id: &str, options: SetOptions) -> Result<(), FormError> {
        let questions = self.group_questions(id)?;
        self.write_all(questions, |spec| spec.default_answer.clone(), options);
        Ok(())
    }

    pub fn reset_answer(&self, id: &str, options: SetOptions) -> Result<(), FormError> {
        let question = self.question_position(id)?;
        let default = self.shared.index.question(question).spec.default_answer.clone();
        self.set(question, default, options)
    }

    /// Writes every question from `answers`; questions missing from it are cleared.
    /// Fires at most one update notification.
    pub fn import_answers(&self, answers: &Answers, options: SetOptions) {
        self.write_all(self.all_questions(), |spec| answers.get(&spec.id).cloned(), options);
    }

    /// Re-validates every current answer. Returns whether the form is clean, which
    /// does not account for chains that are still pending.
    pub fn validate(&self) -> bool {
        let answers = self.get_current_answers();
        self.import_answers(&answers, SetOptions::default());
        self.is_clean()
    }

    /// Validates a detached copy of this form, polling every 10 ms until no chain is
    /// pending. Returns the copy's validated answers, or `None` if it is not clean.
    ///
    /// Needs a Tokio runtime. This form's state and listener are left untouched.
    pub async fn async_validate(&self) -> Result<Option<Answers>, FormError> {
        let options = FormOptions {
            validators: self.shared.validators.clone(),
            validate: false,
            on_form_update: None,
            strict: false,
        };
        let detached = Form::new(&self.get_configs().into(), options)?;
        detached.import_answers(&self.get_current_answers(), SetOptions::default());

        while detached.is_validating() {
            tokio::time::sleep(ASYNC_VALIDATE_POLL).await;
        }

        Ok(detached.is_clean().then(|| detached.get_validated_answers()))
    }

    pub fn get_current_answer(&self, id: &str) -> Result<Option<Value>, FormError> {
        let question = self.question_position(id)?;
        Ok(self.shared.lock().answers.current(question).cloned())
    }

    pub fn get_current_answers(&self) -> Answers {
        let state = self.shared.lock();
        self.shared
            .index
            .questions()
            .iter()
            .enumerate()
            .filter_map(|(position, node)| {
                let answer = state.answers.current(position)?;
                Some((node.id().to_string(), answer.clone()))
            })
            .collect()
    }

    /// `None` while the question is disabled.
    pub fn get_validated_answer(&self, id: &str) -> Result<Option<Value>, FormError> {
        let question = self.question_position(id)?;
        let state = self.shared.lock();
        if self.shared.disablement(&state).is_question_disabled(question) {
            return Ok(None);
        }
        Ok(state.answers.state(question).validated.clone())
    }

    /// Validated answers of enabled questions.
    pub fn get_validated_answers(&self) -> Answers {
        let state = self.shared.lock();
        let disablement = self.shared.disablement(&state);
        self.shared
            .index
            .questions()
            .iter()
            .enumerate()
            .filter(|(position, _)| !disablement.is_question_disabled(*position))
            .filter_map(|(position, node)| {
                let answer = state.answers.state(position).validated.as_ref()?;
                Some((node.id().to_string(), answer.clone()))
            })
            .collect()
    }

    pub fn get_error(&self, id: &str) -> Result<Option<String>, FormError> {
        let question = self.question_position(id)?;
        Ok(self.shared.lock().answers.state(question).error.clone())
    }

    /// Errors of enabled questions.
    pub fn get_errors(&self) -> Errors {
        let state = self.shared.lock();
        let disablement = self.shared.disablement(&state);
        self.shared
            .index
            .questions()
            .iter()
            .enumerate()
            .filter(|(position, _)| !disablement.is_question_disabled(*position))
            .filter_map(|(position, node)| {
                let error = state.answers.state(position).error.as_ref()?;
                Some((node.id().to_string(), error.clone()))
            })
            .collect()
    }

    /// True while any question has a pending validator chain.
    pub fn is_validating(&self) -> bool {
        self.shared.lock().answers.any_validating()
    }

    /// True when no enabled question holds a non-empty error.
    pub fn is_clean(&self) -> bool {
        let state = self.shared.lock();
        let disablement = self.shared.disablement(&state);
        (0..self.shared.index.questions().len()).all(|position| {
            !state.answers.state(position).has_error() || disablement.is_question_disabled(position)
        })
    }

    /// Effective disabled state of any group, question or choice.
    pub fn is_disabled(&self, id: &str) -> Result<bool, FormError> {
        let item = self
            .shared
            .index
            .item(id)
            .ok_or_else(|| FormError::ItemNotFound(id.to_string()))?;
        let state = self.shared.lock();
        Ok(self.shared.disablement(&state).is_disabled(item))
    }

    pub fn get_disabled_items(&self) -> DisabledMap {
        let state = self.shared.lock();
        resolve_disablement(&self.shared.index, &state.answers)
    }

    fn question_position(&self, id: &str) -> Result<usize, FormError> {
        self.shared
            .index
            .question_position(id)
            .ok_or_else(|| FormError::QuestionNotFound(id.to_string()))
    }

    fn typed_question(&self, id: &str, expected: QuestionType) -> Result<usize, FormError> {
        let question = self.question_position(id)?;
        let actual = self.shared.index.question(question).spec.kind;
        if actual != expected {
            return Err(FormError::TypeMismatch {
                id: id.to_string(),
                expected,
                actual,
            });
        }
        Ok(question)
    }

    fn group_questions(&self, id: &str) -> Result<Vec<usize>, FormError> {
        let group = self
            .shared
            .index
            .group_position(id)
            .ok_or_else(|| FormError::GroupNotFound(id.to_string()))?;
        Ok(self.shared.index.questions_in_group(group))
    }

    fn all_questions(&self) -> Vec<usize> {
        (0..self.shared.index.questions().len()).collect()
    }

    fn set(&self, question: usize, answer: Option<Value>, options: SetOptions) -> Result<(), FormError> {
        self.write(|shared, state, pending| {
            shared.apply(state, question, answer.as_ref(), options, pending);
            Ok(())
        })
    }

    /// One write per question under a single lock, followed by a single refresh.
    fn write_all<F>(&self, questions: Vec<usize>, answer_for: F, options: SetOptions)
    where
        F: Fn(&QuestionSpec) -> Option<Value>,
    {
        let mut pending = Vec::new();
        {
            let mut state = self.shared.lock();
            for question in questions {
                let answer = answer_for(&self.shared.index.question(question).spec);
                self.shared
                    .apply(&mut state, question, answer.as_ref(), options, &mut pending);
            }
        }
        self.finish_write(pending);
    }

    fn write<F>(&self, mutate: F) -> Result<(), FormError>
    where
        F: FnOnce(&Shared, &mut FormState, &mut Vec<PendingValidation>) -> Result<(), FormError>,
    {
        let mut pending = Vec::new();
        {
            let mut state = self.shared.lock();
            mutate(&*self.shared, &mut *state, &mut pending)?;
        }
        self.finish_write(pending);
        Ok(())
    }

    fn finish_write(&self, pending: Vec<PendingValidation>) {
        self.refresh();
        for job in pending {
            self.spawn(job);
        }
    }

    fn spawn(&self, job: PendingValidation) {
        let form = Form {
            shared: Arc::clone(&self.shared),
        };
        let task = async move {
            let PendingValidation {
                question,
                generation,
                answer,
                chain,
            } = job;
            let outcome = {
                let spec = &form.shared.index.question(question).spec;
                AssertUnwindSafe(chain.run(answer.as_ref(), spec))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!(question = %spec.id, "validator panicked");
                        Err(ValidationError::new(VALIDATOR_PANICKED))
                    })
            };
            form.settle(question, generation, answer, outcome);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => futures::executor::block_on(task),
        }
    }

    fn settle(&self, question: usize, generation: u64, answer: Option<Value>, outcome: ValidationResult) {
        {
            let mut state = self.shared.lock();
            let id = self.shared.index.question(question).id();
            let entry = state.answers.state_mut(question);
            if !entry.is_current(generation) {
                debug!(question = id, generation, "dropping stale validation result");
                return;
            }
            match outcome {
                Ok(()) => entry.pass(answer),
                Err(error) => entry.fail(error.message),
            }
            debug!(question = id, generation, error = ?entry.error, "validation settled");
        }
        self.refresh();
    }

    /// Rebuilds the snapshot and notifies the listener if it changed.
    fn refresh(&self) {
        let changed = {
            let mut state = self.shared.lock();
            let snapshot = build_render_instructions(&self.shared.index, &state.answers);
            if state.snapshot.as_ref() == Some(&snapshot) {
                false
            } else {
                state.snapshot = Some(snapshot);
                true
            }
        };

        if changed {
            trace!("render snapshot changed");
            if let Some(listener) = &self.shared.listener {
                listener(self);
            }
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("questions", &self.shared.index.questions().len())
            .field("validators", &self.shared.validators)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disablement<'a>(&'a self, state: &'a FormState) -> Disablement<'a> {
        Disablement::new(&self.index, &state.answers)
    }

    /// Stores the disablement-filtered answer and starts validating it.
    fn apply(
        &self,
        state: &mut FormState,
        question: usize,
        input: Option<&Value>,
        options: SetOptions,
        pending: &mut Vec<PendingValidation>,
    ) {
        let answer = self.normalize(state, question, input);
        state.answers.state_mut(question).current = answer.clone();
        self.start_validation(state, question, answer, options, pending);
    }

    /// Maps raw input onto the question's enabled choices.
    fn normalize(&self, state: &FormState, question: usize, input: Option<&Value>) -> Option<Value> {
        let node = self.index.question(question);
        let disablement = self.disablement(state);
        let mut enabled_values = node
            .choices
            .iter()
            .filter(|choice| !disablement.is_choice_disabled(**choice))
            .map(|choice| &self.index.choice(*choice).value);

        match node.spec.kind {
            QuestionType::Any => input.cloned(),
            QuestionType::Choice => {
                let input = input?;
                enabled_values.find(|value| values_equal(value, input)).cloned()
            }
            QuestionType::Choices => {
                let requested = input
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                Some(Value::Array(
                    enabled_values
                        .filter(|value| contains_value(requested, value))
                        .cloned()
                        .collect(),
                ))
            }
        }
    }

    fn start_validation(
        &self,
        state: &mut FormState,
        question: usize,
        answer: Option<Value>,
        options: SetOptions,
        pending: &mut Vec<PendingValidation>,
    ) {
        let spec = &self.index.question(question).spec;
        let entry = state.answers.state_mut(question);
        let generation = entry.begin();
        if !options.validate {
            entry.skip();
            return;
        }

        match start_chain(self.validators.chain_for(spec), spec, answer.as_ref()) {
            ChainStart::Passed => entry.pass(answer),
            ChainStart::Failed(error) => {
                debug!(question = %spec.id, %error, "validation failed");
                entry.fail(error.message);
            }
            ChainStart::Deferred(chain) => {
                debug!(question = %spec.id, generation, "validation pending");
                entry.pending();
                pending.push(PendingValidation {
                    question,
                    generation,
                    answer,
                    chain,
                });
            }
        }
    }
}
