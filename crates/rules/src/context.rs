//! Typed projection of an incoming GitHub event.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RuleError, RuleResult};

/// Pull request fields the engine depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PullRequestContext {
    /// PR number.
    pub number: u64,

    /// PR title.
    pub title: String,

    /// PR body, empty when GitHub sends null.
    pub body: String,

    /// Whether the PR was merged.
    pub merged: bool,

    /// Whether the PR is a draft.
    pub draft: bool,

    /// Author login.
    pub author: String,

    /// Assignee login, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Base branch name.
    pub base_ref: String,

    /// Head branch name.
    pub head_ref: String,

    /// Web URL of the PR.
    pub url: String,
}

/// Issue fields the engine depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IssueContext {
    /// Issue number.
    pub number: u64,

    /// Issue title.
    pub title: String,

    /// Issue body, empty when GitHub sends null.
    pub body: String,

    /// Issue state: `open` or `closed`.
    pub state: String,

    /// Author login.
    pub author: String,

    /// Assignee login, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Web URL of the issue.
    pub url: String,
}

/// Everything a rule evaluation can see about one event.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    /// Event name: `pull_request` or `issues`.
    pub event: String,

    /// Event action, empty when the payload omits it.
    pub action: String,

    /// PR record for pull_request events.
    pub pull_request: Option<PullRequestContext>,

    /// Issue record for issues events.
    pub issue: Option<IssueContext>,

    /// Label carried by labeled/unlabeled payloads.
    pub label: Option<String>,

    /// All labels currently on the PR/issue.
    pub labels: Option<Vec<String>>,

    /// Prefetched comment bodies, newline-joined.
    pub comments: Option<String>,

    /// Whether the body references Asana tasks.
    pub has_asana_tasks: bool,

    /// GitHub login to Asana user gid mapping.
    pub user_mapping: Option<HashMap<String, String>>,
}

impl RuleContext {
    /// Render the context as a JSON tree for template evaluation.
    pub fn to_template_context(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("event".to_string(), serde_json::json!(self.event));
        map.insert("action".to_string(), serde_json::json!(self.action));
        if let Some(ref pr) = self.pull_request {
            map.insert(
                "pull_request".to_string(),
                serde_json::to_value(pr).unwrap_or_default(),
            );
        }
        if let Some(ref issue) = self.issue {
            map.insert(
                "issue".to_string(),
                serde_json::to_value(issue).unwrap_or_default(),
            );
        }
        if let Some(ref label) = self.label {
            map.insert("label".to_string(), serde_json::json!(label));
        }
        if let Some(ref labels) = self.labels {
            map.insert("labels".to_string(), serde_json::json!(labels));
        }
        if let Some(ref comments) = self.comments {
            map.insert("comments".to_string(), serde_json::json!(comments));
        }
        map.insert(
            "has_asana_tasks".to_string(),
            serde_json::json!(self.has_asana_tasks),
        );
        serde_json::Value::Object(map)
    }

    /// Author login of whichever record is populated.
    pub fn author(&self) -> Option<&str> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.author.as_str())
            .or_else(|| self.issue.as_ref().map(|issue| issue.author.as_str()))
    }

    /// Body of whichever record is populated.
    pub fn body(&self) -> Option<&str> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.body.as_str())
            .or_else(|| self.issue.as_ref().map(|issue| issue.body.as_str()))
    }

    /// Title of whichever record is populated.
    pub fn title(&self) -> Option<&str> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.title.as_str())
            .or_else(|| self.issue.as_ref().map(|issue| issue.title.as_str()))
    }

    /// Number of whichever record is populated.
    pub fn number(&self) -> Option<u64> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.number)
            .or_else(|| self.issue.as_ref().map(|issue| issue.number))
    }

    /// Web URL of whichever record is populated.
    pub fn url(&self) -> Option<&str> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.url.as_str())
            .or_else(|| self.issue.as_ref().map(|issue| issue.url.as_str()))
    }
}

/// Build a rule context from a raw webhook payload.
///
/// The payload must carry the record matching the event name; anything
/// else is a payload error. Unknown event names are rejected up front.
pub fn build_context(
    event: &str,
    payload: &serde_json::Value,
    comments: Option<String>,
    has_asana_tasks: bool,
    user_mapping: Option<HashMap<String, String>>,
) -> RuleResult<RuleContext> {
    let action = payload
        .get("action")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();

    let mut context = RuleContext {
        event: event.to_string(),
        action,
        comments,
        has_asana_tasks,
        user_mapping,
        ..Default::default()
    };

    match event {
        "pull_request" => {
            let pr = payload.get("pull_request").ok_or_else(|| {
                RuleError::Payload("pull_request event without a pull_request record".to_string())
            })?;
            context.pull_request = Some(project_pull_request(pr));
            context.labels = project_labels(pr);
        }
        "issues" => {
            let issue = payload.get("issue").ok_or_else(|| {
                RuleError::Payload("issues event without an issue record".to_string())
            })?;
            context.issue = Some(project_issue(issue));
            context.labels = project_labels(issue);
        }
        other => {
            return Err(RuleError::UnsupportedEvent(format!(
                "'{}' (supported: pull_request, issues)",
                other
            )));
        }
    }

    context.label = payload
        .get("label")
        .and_then(|label| label.get("name"))
        .and_then(|name| name.as_str())
        .map(|s| s.to_string());

    Ok(context)
}

fn project_pull_request(pr: &serde_json::Value) -> PullRequestContext {
    PullRequestContext {
        number: pr.get("number").and_then(|n| n.as_u64()).unwrap_or_default(),
        title: str_field(pr, "title"),
        body: str_field(pr, "body"),
        merged: bool_field(pr, "merged"),
        draft: bool_field(pr, "draft"),
        author: login_of(pr.get("user")),
        assignee: pr
            .get("assignee")
            .and_then(|a| a.get("login"))
            .and_then(|l| l.as_str())
            .map(|s| s.to_string()),
        base_ref: pr
            .get("base")
            .and_then(|b| b.get("ref"))
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        head_ref: pr
            .get("head")
            .and_then(|h| h.get("ref"))
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        url: str_field(pr, "html_url"),
    }
}

fn project_issue(issue: &serde_json::Value) -> IssueContext {
    IssueContext {
        number: issue
            .get("number")
            .and_then(|n| n.as_u64())
            .unwrap_or_default(),
        title: str_field(issue, "title"),
        body: str_field(issue, "body"),
        state: str_field(issue, "state"),
        author: login_of(issue.get("user")),
        assignee: issue
            .get("assignee")
            .and_then(|a| a.get("login"))
            .and_then(|l| l.as_str())
            .map(|s| s.to_string()),
        url: str_field(issue, "html_url"),
    }
}

fn project_labels(record: &serde_json::Value) -> Option<Vec<String>> {
    record
        .get("labels")
        .and_then(|labels| labels.as_array())
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label.get("name").and_then(|n| n.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn bool_field(value: &serde_json::Value, key: &str) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn login_of(user: Option<&serde_json::Value>) -> String {
    user.and_then(|u| u.get("login"))
        .and_then(|l| l.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_payload() -> serde_json::Value {
        serde_json::json!({
            "action": "closed",
            "pull_request": {
                "number": 42,
                "title": "fix: resolve login race",
                "body": "Fixes https://app.asana.com/0/123/456",
                "merged": true,
                "draft": false,
                "user": { "login": "octocat" },
                "base": { "ref": "main" },
                "head": { "ref": "fix/login-race" },
                "html_url": "https://github.com/acme/app/pull/42",
                "labels": [ { "name": "bug" }, { "name": "backend" } ]
            }
        })
    }

    #[test]
    fn test_build_context_pull_request() {
        let context = build_context("pull_request", &pr_payload(), None, true, None).unwrap();

        assert_eq!(context.event, "pull_request");
        assert_eq!(context.action, "closed");
        assert!(context.has_asana_tasks);

        let pr = context.pull_request.as_ref().unwrap();
        assert_eq!(pr.number, 42);
        assert!(pr.merged);
        assert_eq!(pr.author, "octocat");
        assert_eq!(pr.base_ref, "main");
        assert_eq!(
            context.labels,
            Some(vec!["bug".to_string(), "backend".to_string()])
        );
    }

    #[test]
    fn test_build_context_issue() {
        let payload = serde_json::json!({
            "action": "opened",
            "issue": {
                "number": 7,
                "title": "Crash on startup",
                "body": null,
                "state": "open",
                "user": { "login": "reporter" },
                "html_url": "https://github.com/acme/app/issues/7"
            }
        });

        let context = build_context("issues", &payload, None, false, None).unwrap();
        let issue = context.issue.as_ref().unwrap();
        assert_eq!(issue.number, 7);
        assert_eq!(issue.body, "");
        assert_eq!(context.author(), Some("reporter"));
    }

    #[test]
    fn test_build_context_unsupported_event() {
        let payload = serde_json::json!({ "action": "created" });
        let err = build_context("push", &payload, None, false, None).unwrap_err();
        assert!(err.to_string().contains("push"));
    }

    #[test]
    fn test_build_context_missing_record() {
        let payload = serde_json::json!({ "action": "opened" });
        let err = build_context("pull_request", &payload, None, false, None).unwrap_err();
        assert!(err.to_string().contains("pull_request"));
    }

    #[test]
    fn test_build_context_label_event() {
        let mut payload = pr_payload();
        payload["action"] = serde_json::json!("labeled");
        payload["label"] = serde_json::json!({ "name": "urgent" });

        let context = build_context("pull_request", &payload, None, false, None).unwrap();
        assert_eq!(context.label.as_deref(), Some("urgent"));
    }

    #[test]
    fn test_to_template_context_keys() {
        let context = build_context(
            "pull_request",
            &pr_payload(),
            Some("first comment".to_string()),
            true,
            None,
        )
        .unwrap();

        let tree = context.to_template_context();
        assert_eq!(tree["event"], "pull_request");
        assert_eq!(tree["pull_request"]["title"], "fix: resolve login race");
        assert_eq!(tree["comments"], "first comment");
        assert_eq!(tree["has_asana_tasks"], true);
        assert_eq!(tree["labels"][0], "bug");
    }

    #[test]
    fn test_accessors_prefer_populated_record() {
        let context = build_context("pull_request", &pr_payload(), None, false, None).unwrap();
        assert_eq!(context.title(), Some("fix: resolve login race"));
        assert_eq!(context.number(), Some(42));
        assert_eq!(context.url(), Some("https://github.com/acme/app/pull/42"));
    }
}
