//! Task discovery and per-task operations.

use std::collections::HashMap;

use regex::Regex;
use tasksync_rules::{CreateTaskSpec, RuleExecutionResult, TaskOutcome};

use crate::asana::AsanaClient;
use crate::fields::{coerce_value, FieldSchemaCache};

/// Extract Asana task gids referenced by URL in a body text.
///
/// Recognizes the classic `/0/<project>/<task>` form and the current
/// `/1/<workspace>/.../task/<gid>` form. Body order is preserved and
/// duplicates are dropped.
pub fn extract_task_gids(text: &str) -> Vec<String> {
    let pattern = r"https://app\.asana\.com/(?:0/\d+/(\d+)|1/\d+(?:/[0-9a-z_-]+)*/task/(\d+))";
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!(error = %e, "Invalid task URL pattern");
            return Vec::new();
        }
    };

    let mut gids = Vec::new();
    for caps in re.captures_iter(text) {
        let gid = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
        if let Some(gid) = gid {
            if !gids.contains(&gid) {
                gids.push(gid);
            }
        }
    }
    gids
}

/// Apply the merged field updates and completion flag to each task,
/// sequentially. One failed task never blocks the rest.
pub async fn apply_field_updates(
    client: &AsanaClient,
    cache: &mut FieldSchemaCache,
    task_gids: &[String],
    result: &RuleExecutionResult,
) -> Vec<TaskOutcome> {
    let completed = if result.mark_complete() {
        Some(true)
    } else {
        None
    };
    let custom_fields = coerce_fields(client, cache, result.field_updates()).await;

    let mut outcomes = Vec::new();
    for gid in task_gids {
        outcomes.push(apply_to_task(client, gid, &custom_fields, completed).await);
    }
    outcomes
}

async fn apply_to_task(
    client: &AsanaClient,
    gid: &str,
    custom_fields: &HashMap<String, serde_json::Value>,
    completed: Option<bool>,
) -> TaskOutcome {
    let task = match client.get_task(gid).await {
        Ok(task) => task,
        Err(e) => {
            tracing::error!(task = gid, error = %e, "Failed to fetch task");
            return TaskOutcome {
                gid: gid.to_string(),
                name: String::new(),
                url: String::new(),
                success: false,
            };
        }
    };

    if custom_fields.is_empty() && completed.is_none() {
        tracing::info!(task = gid, "No applicable updates for task");
        return TaskOutcome {
            gid: task.gid,
            name: task.name,
            url: task.permalink_url,
            success: true,
        };
    }

    match client.update_task(gid, custom_fields, completed).await {
        Ok(()) => {
            tracing::info!(
                task = gid,
                fields = custom_fields.len(),
                completed = completed.unwrap_or(false),
                "Task updated"
            );
            TaskOutcome {
                gid: task.gid,
                name: task.name,
                url: task.permalink_url,
                success: true,
            }
        }
        Err(e) => {
            tracing::error!(task = gid, error = %e, "Failed to update task");
            TaskOutcome {
                gid: task.gid,
                name: task.name,
                url: task.permalink_url,
                success: false,
            }
        }
    }
}

/// Create tasks from resolved specs, sequentially. A failed creation
/// yields a failed outcome carrying the intended title.
pub async fn create_tasks(
    client: &AsanaClient,
    cache: &mut FieldSchemaCache,
    specs: &[CreateTaskSpec],
) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::new();

    for spec in specs {
        let updates: Vec<(&str, &str)> = spec
            .initial_fields
            .iter()
            .map(|(field_id, value)| (field_id.as_str(), value.as_str()))
            .collect();
        let initial_fields = coerce_fields(client, cache, updates).await;

        match client.create_task(spec, &initial_fields).await {
            Ok(task) => {
                tracing::info!(task = %task.gid, title = %spec.title, "Task created");
                if let Some(ref section) = spec.section {
                    if let Err(e) = client.add_task_to_section(section, &task.gid).await {
                        tracing::warn!(
                            task = %task.gid,
                            section = %section,
                            error = %e,
                            "Failed to move task into section"
                        );
                    }
                }
                outcomes.push(TaskOutcome {
                    gid: task.gid,
                    name: task.name,
                    url: task.permalink_url,
                    success: true,
                });
            }
            Err(e) => {
                tracing::error!(title = %spec.title, error = %e, "Failed to create task");
                outcomes.push(TaskOutcome {
                    gid: String::new(),
                    name: spec.title.clone(),
                    url: String::new(),
                    success: false,
                });
            }
        }
    }

    outcomes
}

/// Attach the PR to each task through the integration endpoint. Skips
/// with a warning when no integration secret is configured.
pub async fn attach_pr_to_tasks(
    client: &AsanaClient,
    secret: Option<&str>,
    task_gids: &[String],
    pr_url: &str,
) -> usize {
    let secret = match secret {
        Some(secret) => secret,
        None => {
            tracing::warn!("attach_pr_to_tasks requested but no integration_secret configured");
            return 0;
        }
    };

    let mut attached = 0;
    for gid in task_gids {
        match client.attach_resource(secret, gid, pr_url).await {
            Ok(()) => {
                tracing::info!(task = %gid, "PR attached to task");
                attached += 1;
            }
            Err(e) => {
                tracing::error!(task = %gid, error = %e, "Failed to attach PR to task");
            }
        }
    }
    attached
}

/// Coerce resolved field values against their (cached) schemas.
/// Uncoercible values are logged and dropped.
async fn coerce_fields(
    client: &AsanaClient,
    cache: &mut FieldSchemaCache,
    updates: Vec<(&str, &str)>,
) -> HashMap<String, serde_json::Value> {
    let mut coerced = HashMap::new();

    for (field_id, raw) in updates {
        let schema = match cache.get_or_fetch(client, field_id).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(field = field_id, error = %e, "Failed to fetch field schema");
                continue;
            }
        };
        match coerce_value(&schema, raw) {
            Ok(value) => {
                coerced.insert(field_id.to_string(), value);
            }
            Err(e) => {
                tracing::warn!(field = field_id, value = raw, error = %e, "Field value skipped");
            }
        }
    }

    coerced
}
