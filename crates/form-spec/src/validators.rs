use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::answers::is_blank;
use crate::spec::question::{Constraint, QuestionSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Outcome of one validator call. After a `Pending` result, the rest of the
/// question's chain runs once the future resolves; the first failure wins.
pub enum Validation {
    Done(ValidationResult),
    Pending(BoxFuture<'static, ValidationResult>),
}

impl From<ValidationResult> for Validation {
    fn from(result: ValidationResult) -> Self {
        Validation::Done(result)
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Done(result) => f.debug_tuple("Done").field(result).finish(),
            Validation::Pending(_) => f.write_str("Pending"),
        }
    }
}

pub type ValidatorFn = Arc<dyn Fn(Option<&Value>, &QuestionSpec) -> Validation + Send + Sync>;

pub const REQUIRED: &str = "required";
pub const CONSTRAINT: &str = "constraint";

/// Registry of validators by name.
#[derive(Clone, Default)]
pub struct Validators {
    registry: HashMap<String, ValidatorFn>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `required` and `constraint`.
    pub fn builtin() -> Self {
        Self::new()
            .with_sync(REQUIRED, required)
            .with_sync(CONSTRAINT, constraint)
    }

    pub fn register<F>(&mut self, name: impl Into<String>, validator: F)
    where
        F: Fn(Option<&Value>, &QuestionSpec) -> Validation + Send + Sync + 'static,
    {
        self.registry.insert(name.into(), Arc::new(validator));
    }

    pub fn with<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Option<&Value>, &QuestionSpec) -> Validation + Send + Sync + 'static,
    {
        self.register(name, validator);
        self
    }

    pub fn with_sync<F>(self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Option<&Value>, &QuestionSpec) -> ValidationResult + Send + Sync + 'static,
    {
        self.with(name, move |answer, question| {
            Validation::Done(validator(answer, question))
        })
    }

    /// The returned future must not borrow the question; clone what it needs.
    pub fn with_async<F, Fut>(self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Option<Value>, &QuestionSpec) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ValidationResult> + Send + 'static,
    {
        self.with(name, move |answer, question| {
            Validation::Pending(validator(answer.cloned(), question).boxed())
        })
    }

    pub fn get(&self, name: &str) -> Option<&ValidatorFn> {
        self.registry.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered validators named by `question`, in declaration order.
    pub(crate) fn chain_for(&self, question: &QuestionSpec) -> Vec<ValidatorFn> {
        question
            .validators
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect()
    }

    /// Logs every validator name in `question` that has no registration.
    pub(crate) fn warn_unregistered(&self, question: &QuestionSpec) {
        for name in &question.validators {
            if !self.contains(name) {
                warn!(question = %question.id, validator = %name, "validator is not registered; skipping");
            }
        }
    }
}

impl fmt::Debug for Validators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.registry.keys().collect();
        names.sort();
        f.debug_struct("Validators").field("names", &names).finish()
    }
}

pub(crate) enum ChainStart {
    Passed,
    Failed(ValidationError),
    Deferred(PendingChain),
}

/// The suspended remainder of a chain: the future that suspended it and what follows.
pub(crate) struct PendingChain {
    pending: BoxFuture<'static, ValidationResult>,
    rest: Vec<ValidatorFn>,
}

/// Runs validators synchronously until one fails or suspends.
pub(crate) fn start_chain(
    chain: Vec<ValidatorFn>,
    question: &QuestionSpec,
    answer: Option<&Value>,
) -> ChainStart {
    let mut validators = chain.into_iter();
    while let Some(validator) = validators.next() {
        match validator(answer, question) {
            Validation::Done(Ok(())) => continue,
            Validation::Done(Err(error)) => return ChainStart::Failed(error),
            Validation::Pending(pending) => {
                return ChainStart::Deferred(PendingChain {
                    pending,
                    rest: validators.collect(),
                });
            }
        }
    }
    ChainStart::Passed
}

impl PendingChain {
    pub(crate) async fn run(self, answer: Option<&Value>, question: &QuestionSpec) -> ValidationResult {
        self.pending.await?;
        for validator in self.rest {
            match validator(answer, question) {
                Validation::Done(result) => result?,
                Validation::Pending(pending) => pending.await?,
            }
        }
        Ok(())
    }
}

fn required(answer: Option<&Value>, _question: &QuestionSpec) -> ValidationResult {
    if is_blank(answer) {
        return Err(ValidationError::new("This field is required."));
    }
    Ok(())
}

fn constraint(answer: Option<&Value>, question: &QuestionSpec) -> ValidationResult {
    match (answer, question.constraint()) {
        (Some(value), Some(constraint)) => enforce_constraint(value, &constraint),
        _ => Ok(()),
    }
}

fn enforce_constraint(value: &Value, constraint: &Constraint) -> ValidationResult {
    if let Some(pattern) = &constraint.pattern
        && let Some(text) = value.as_str()
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Err("value does not match pattern".into());
    }

    let length = match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };

    if let Some(min_len) = constraint.min_len
        && let Some(length) = length
        && length < min_len
    {
        return Err("value shorter than min length".into());
    }

    if let Some(max_len) = constraint.max_len
        && let Some(length) = length
        && length > max_len
    {
        return Err("value longer than max length".into());
    }

    if let Some(min) = constraint.min
        && let Some(number) = value.as_f64()
        && number < min
    {
        return Err("value below minimum".into());
    }

    if let Some(max) = constraint.max
        && let Some(number) = value.as_f64()
        && number > max
    {
        return Err("value above maximum".into());
    }

    Ok(())
}
