pub mod config;
pub mod form;
pub mod question;

pub use config::{ChoiceConfig, FormConfig, GroupConfig, QuestionConfig};
pub use form::{FormSpec, GroupSpec};
pub use question::{ChoiceConditions, ChoiceSpec, Constraint, OnSelected, QuestionSpec, QuestionType};
