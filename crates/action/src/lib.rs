//! GitHub Action syncing PR and issue events to Asana tasks.
//!
//! This crate provides:
//! - GitHub Actions environment configuration
//! - GitHub and Asana REST clients with bounded retry
//! - Custom field schema caching and value coercion
//! - Task discovery and sequential per-task application
//! - The end-to-end run orchestration

pub mod asana;
pub mod config;
pub mod fields;
pub mod github;
pub mod retry;
pub mod runner;
pub mod tasks;

pub use asana::AsanaClient;
pub use config::ActionConfig;
pub use fields::FieldSchemaCache;
pub use github::GithubClient;
pub use retry::{ApiError, RetryPolicy};
