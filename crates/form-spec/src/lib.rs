#![allow(missing_docs)]

pub mod answers;
pub mod disablement;
pub mod error;
pub mod form;
pub mod index;
pub mod render;
pub mod sanitize;
pub mod spec;
pub mod validate;
pub mod validators;

pub use answers::{AnswerBook, Answers, Errors, QuestionState};
pub use disablement::{DisabledMap, Disablement, resolve_disablement};
pub use error::FormError;
pub use form::{Form, FormListener, FormOptions, SetOptions, VALIDATOR_PANICKED};
pub use index::{ItemIndex, ItemRef};
pub use render::{
    ChoiceInstruction, GroupInstruction, QuestionInstruction, RenderInstructions,
    build_render_instructions, render_text,
};
pub use sanitize::sanitize;
pub use spec::{
    ChoiceConfig, ChoiceSpec, Constraint, FormConfig, FormSpec, GroupConfig, GroupSpec,
    OnSelected, QuestionConfig, QuestionSpec, QuestionType,
};
pub use validate::{ConfigErrorKind, ConfigIssue, ConfigReport, validate_configs};
pub use validators::{Validation, ValidationError, ValidationResult, ValidatorFn, Validators};
