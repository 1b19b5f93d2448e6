use thiserror::Error;

use crate::spec::question::QuestionType;
use crate::validate::{ConfigErrorKind, ConfigReport};

/// Errors returned by [`crate::Form`] construction and its id-addressed methods.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid form config: {0}")]
    ConfigStructure(ConfigReport),
    #[error("unresolved references in form config: {0}")]
    ConfigIntegrity(ConfigReport),
    #[error("circular relationships in form config: {0}")]
    ConfigCycle(ConfigReport),
    #[error("Group '{0}' is not found.")]
    GroupNotFound(String),
    #[error("Question '{0}' is not found.")]
    QuestionNotFound(String),
    #[error("Choice '{0}' is not found.")]
    ChoiceNotFound(String),
    #[error("Item '{0}' is not found.")]
    ItemNotFound(String),
    #[error("Question '{id}' is of type '{actual}', expected '{expected}'.")]
    TypeMismatch {
        id: String,
        expected: QuestionType,
        actual: QuestionType,
    },
}

impl FormError {
    /// Picks the variant for the most severe issue in an invalid report.
    pub(crate) fn from_report(report: ConfigReport) -> Self {
        match report.kind() {
            Some(ConfigErrorKind::Integrity) => FormError::ConfigIntegrity(report),
            Some(ConfigErrorKind::Cycle) => FormError::ConfigCycle(report),
            Some(ConfigErrorKind::Structure) | None => FormError::ConfigStructure(report),
        }
    }

    /// The config report behind a construction failure.
    pub fn report(&self) -> Option<&ConfigReport> {
        match self {
            FormError::ConfigStructure(report)
            | FormError::ConfigIntegrity(report)
            | FormError::ConfigCycle(report) => Some(report),
            _ => None,
        }
    }
}
