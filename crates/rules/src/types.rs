//! Rule configuration and engine output types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel key in the merged field map marking task completion.
pub const MARK_COMPLETE_KEY: &str = "__mark_complete";

/// A YAML scalar or sequence of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StringOrList {
    /// Single value.
    Single(String),
    /// Multiple values.
    List(Vec<String>),
}

impl StringOrList {
    /// Check whether the given value equals (scalar) or is contained in (list).
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrList::Single(s) => s == value,
            StringOrList::List(items) => items.iter().any(|s| s == value),
        }
    }

    /// All carried values.
    pub fn values(&self) -> Vec<&str> {
        match self {
            StringOrList::Single(s) => vec![s.as_str()],
            StringOrList::List(items) => items.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// True for an empty scalar or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            StringOrList::Single(s) => s.is_empty(),
            StringOrList::List(items) => items.is_empty(),
        }
    }
}

/// Conjunctive predicate set gating a rule (the `when` block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Event name: `pull_request` or `issues`.
    pub event: String,

    /// Event action, e.g. `opened`, `closed`, `labeled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<StringOrList>,

    /// PR merged flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,

    /// PR draft flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,

    /// Exact label name carried by `labeled`/`unlabeled` payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// At least one of these labels must be on the PR/issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_labels: Option<StringOrList>,

    /// Whether the PR/issue body already references Asana tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_asana_tasks: Option<bool>,

    /// PR/issue author login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<StringOrList>,
}

/// Effect bag applied when a rule matches (the `then` block).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleAction {
    /// Custom field updates: field gid to value template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_fields: Option<HashMap<String, String>>,

    /// Mark matched tasks complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark_complete: Option<bool>,

    /// Comment template posted back to the PR/issue after the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_pr_comment: Option<String>,

    /// Attach the PR to matched tasks via the integration endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_pr_to_tasks: Option<bool>,

    /// Create a new task instead of updating referenced ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_task: Option<CreateTaskAction>,
}

impl RuleAction {
    /// True when no recognized action is present.
    pub fn is_empty(&self) -> bool {
        self.update_fields.is_none()
            && self.mark_complete.is_none()
            && self.post_pr_comment.is_none()
            && self.attach_pr_to_tasks.is_none()
            && self.create_task.is_none()
    }

    /// True when any update-style effect is present.
    pub fn has_update_effects(&self) -> bool {
        self.update_fields.is_some()
            || self.mark_complete.is_some()
            || self.attach_pr_to_tasks.is_some()
    }
}

/// Raw (template-bearing) task creation spec from the rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskAction {
    /// Project gid the task is created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Workspace gid, used when no project is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Section gid the created task is moved into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Task title template. Must resolve non-empty at run time.
    pub title: String,

    /// Plain-text notes template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Rich-text notes template, mutually exclusive with `notes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_notes: Option<String>,

    /// Assignee template resolving to an Asana user gid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Initial custom field values: field gid to value template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_fields: Option<HashMap<String, String>>,
}

/// One line of the declarative policy: a when/then pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// The gating condition.
    pub when: Condition,

    /// The effects applied on match.
    pub then: RuleAction,
}

/// Loaded rule set plus run-level options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Ordered rule list.
    pub rules: Vec<Rule>,

    /// GitHub login to Asana user gid mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_mapping: Option<HashMap<String, String>>,

    /// Secret for the GitHub-for-Asana attachment endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_secret: Option<String>,
}

/// Template-resolved task creation spec, ready for the Asana client.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskSpec {
    /// Project gid, if any.
    pub project: Option<String>,

    /// Workspace gid, if any.
    pub workspace: Option<String>,

    /// Section gid, if any.
    pub section: Option<String>,

    /// Resolved task title, guaranteed non-empty.
    pub title: String,

    /// Resolved plain-text notes.
    pub notes: Option<String>,

    /// Resolved rich-text notes.
    pub html_notes: Option<String>,

    /// Resolved assignee.
    pub assignee: Option<String>,

    /// Resolved initial field values, empty resolutions dropped.
    pub initial_fields: HashMap<String, String>,
}

/// Merged output of one engine run over all matching rules.
#[derive(Debug, Clone, Default)]
pub struct RuleExecutionResult {
    /// Field gid to resolved value, plus the completion sentinel.
    pub fields: HashMap<String, String>,

    /// Raw comment templates in match order.
    pub comments: Vec<String>,

    /// Resolved task creation specs in match order.
    pub create_tasks: Vec<CreateTaskSpec>,

    /// Whether any matching rule requested PR attachment.
    pub attach_pr_to_tasks: bool,
}

impl RuleExecutionResult {
    /// Whether any matching rule requested completion.
    pub fn mark_complete(&self) -> bool {
        self.fields.contains_key(MARK_COMPLETE_KEY)
    }

    /// Field updates without the completion sentinel, sorted by field gid.
    pub fn field_updates(&self) -> Vec<(&str, &str)> {
        let mut updates: Vec<(&str, &str)> = self
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != MARK_COMPLETE_KEY)
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        updates.sort_by(|a, b| a.0.cmp(b.0));
        updates
    }

    /// True when the run produced nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.comments.is_empty()
            && self.create_tasks.is_empty()
            && !self.attach_pr_to_tasks
    }
}
