//! Payer classification: a prioritised rule table, manually curated
//! overrides, and a name-shape heuristic for individuals.

mod classifier;
mod error;
mod overrides;
pub mod rules;

pub use classifier::{Classification, ClassificationSource, PayerClassifier};
pub use error::ClassifyError;
pub use overrides::{Override, OverrideSet};
pub use rules::{Pattern, RuleSpec, default_rules};
