//! Task outcomes and the post-run comment context.

use serde::{Deserialize, Serialize};

use crate::context::RuleContext;
use crate::types::RuleExecutionResult;

/// Result of one task-level operation (update or create).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Asana task gid, empty when creation failed before a gid existed.
    pub gid: String,

    /// Task display name.
    pub name: String,

    /// Task permalink.
    pub url: String,

    /// Whether the operation succeeded.
    pub success: bool,
}

/// Build the context tree for post_pr_comment templates.
///
/// Comment templates see everything the event context exposes plus
/// `tasks` (per-task outcomes), `updates` (applied field values and the
/// completion flag), and `summary` (success/failure counts).
pub fn build_comment_context(
    context: &RuleContext,
    result: &RuleExecutionResult,
    outcomes: &[TaskOutcome],
) -> serde_json::Value {
    let mut tree = context.to_template_context();

    let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
    let fields: Vec<serde_json::Value> = result
        .field_updates()
        .into_iter()
        .map(|(id, value)| serde_json::json!({ "id": id, "value": value }))
        .collect();

    if let serde_json::Value::Object(ref mut map) = tree {
        map.insert(
            "tasks".to_string(),
            serde_json::to_value(outcomes).unwrap_or_default(),
        );
        map.insert(
            "updates".to_string(),
            serde_json::json!({
                "fields": fields,
                "mark_complete": result.mark_complete(),
            }),
        );
        map.insert(
            "summary".to_string(),
            serde_json::json!({
                "total": outcomes.len(),
                "succeeded": succeeded,
                "failed": outcomes.len() - succeeded,
            }),
        );
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::template::TemplateEvaluator;
    use crate::types::MARK_COMPLETE_KEY;

    fn context() -> RuleContext {
        let payload = serde_json::json!({
            "action": "closed",
            "pull_request": {
                "number": 42,
                "title": "fix: login",
                "body": "b",
                "merged": true,
                "user": { "login": "octocat" },
                "html_url": "https://github.com/acme/app/pull/42"
            }
        });
        build_context("pull_request", &payload, None, true, None).unwrap()
    }

    fn outcomes() -> Vec<TaskOutcome> {
        vec![
            TaskOutcome {
                gid: "456".to_string(),
                name: "Login race".to_string(),
                url: "https://app.asana.com/0/123/456".to_string(),
                success: true,
            },
            TaskOutcome {
                gid: "789".to_string(),
                name: "Flaky audit".to_string(),
                url: "https://app.asana.com/0/123/789".to_string(),
                success: false,
            },
        ]
    }

    #[test]
    fn test_comment_context_shape() {
        let mut result = RuleExecutionResult::default();
        result.fields.insert("1".to_string(), "Shipped".to_string());
        result
            .fields
            .insert(MARK_COMPLETE_KEY.to_string(), "true".to_string());

        let tree = build_comment_context(&context(), &result, &outcomes());

        assert_eq!(tree["summary"]["total"], 2);
        assert_eq!(tree["summary"]["succeeded"], 1);
        assert_eq!(tree["summary"]["failed"], 1);
        assert_eq!(tree["tasks"][0]["gid"], "456");
        assert_eq!(tree["tasks"][1]["success"], false);
        assert_eq!(tree["updates"]["mark_complete"], true);
        assert_eq!(tree["updates"]["fields"][0]["id"], "1");
        // Event context stays visible.
        assert_eq!(tree["pull_request"]["number"], 42);
    }

    #[test]
    fn test_comment_templates_render_against_tree() {
        let base = context();
        let result = RuleExecutionResult::default();
        let tree = build_comment_context(&base, &result, &outcomes());
        let evaluator = TemplateEvaluator::with_tree(&base, tree);

        let rendered = evaluator.render(
            "Synced {{summary.succeeded}}/{{summary.total}}: {{tasks.0.name}} ({{tasks.0.url}})",
        );
        assert_eq!(
            rendered,
            "Synced 1/2: Login race (https://app.asana.com/0/123/456)"
        );
    }
}
