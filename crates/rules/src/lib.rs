//! Declarative rule engine mapping GitHub events to Asana task effects.
//!
//! This crate provides:
//! - YAML rule parsing and up-front validation
//! - Condition matching over typed event contexts
//! - A small template language with named helpers
//! - The execution engine folding matched rules into one action plan
//! - The post-run comment context for result reporting

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod outcome;
pub mod template;
pub mod types;
pub mod validator;

pub use config::parse_rules;
pub use context::{build_context, IssueContext, PullRequestContext, RuleContext};
pub use engine::execute;
pub use error::{RuleError, RuleResult};
pub use outcome::{build_comment_context, TaskOutcome};
pub use template::TemplateEvaluator;
pub use types::{
    Condition, CreateTaskAction, CreateTaskSpec, Rule, RuleAction, RuleExecutionResult,
    RulesConfig, StringOrList, MARK_COMPLETE_KEY,
};
