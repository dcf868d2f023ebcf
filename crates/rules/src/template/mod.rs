//! Template language: `{{path}}` interpolation plus named helpers.

pub mod analysis;
pub mod evaluator;
pub mod helpers;
pub mod markdown;
pub mod parser;

pub use evaluator::TemplateEvaluator;
