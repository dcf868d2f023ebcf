//! End-to-end run orchestration.

use anyhow::{Context, Result};
use tasksync_rules::{
    build_comment_context, build_context, engine, parse_rules, template, RuleContext,
    RuleExecutionResult, RulesConfig, TaskOutcome, TemplateEvaluator,
};

use crate::asana::AsanaClient;
use crate::config::ActionConfig;
use crate::fields::FieldSchemaCache;
use crate::github::GithubClient;
use crate::tasks;

/// Run one synchronization pass for the configured event.
///
/// Only rule-file problems abort with an error; an unsupported event,
/// a malformed payload, or API failures are logged and the run finishes
/// cleanly so a sync hiccup never fails the surrounding workflow.
pub async fn run(config: &ActionConfig) -> Result<()> {
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        %run_id,
        event = %config.event_name,
        repository = %config.repository,
        "Starting sync run"
    );

    let rules_yaml = std::fs::read_to_string(&config.rules_file)
        .with_context(|| format!("Failed to read rules file: {}", config.rules_file))?;
    let rules_config = parse_rules(&rules_yaml)
        .with_context(|| format!("Invalid rules file: {}", config.rules_file))?;
    tracing::info!(rules = rules_config.rules.len(), "Rules loaded");

    let payload = match read_payload(&config.event_path) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, path = %config.event_path, "Could not read event payload, skipping run");
            return Ok(());
        }
    };

    let github = GithubClient::new(&config.github_token, &config.repository);
    let asana = AsanaClient::new(&config.asana_token);

    let (context, task_gids) =
        match prepare_context(&config.event_name, &payload, &rules_config, &github).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build event context, skipping run");
                return Ok(());
            }
        };
    tracing::info!(
        action = %context.action,
        tasks = task_gids.len(),
        "Event context ready"
    );

    let result = engine::execute(&rules_config.rules, &context);
    if result.is_empty() {
        tracing::info!("No rules produced effects");
        return Ok(());
    }

    let mut cache = FieldSchemaCache::new();
    let mut outcomes: Vec<TaskOutcome> = Vec::new();

    if !result.fields.is_empty() {
        if task_gids.is_empty() {
            tracing::info!("Rules produced field updates but no Asana tasks are referenced");
        } else {
            outcomes
                .extend(tasks::apply_field_updates(&asana, &mut cache, &task_gids, &result).await);
        }
    }

    if !result.create_tasks.is_empty() {
        outcomes.extend(tasks::create_tasks(&asana, &mut cache, &result.create_tasks).await);
    }

    if result.attach_pr_to_tasks {
        if let Some(url) = context.url() {
            tasks::attach_pr_to_tasks(
                &asana,
                rules_config.integration_secret.as_deref(),
                &task_gids,
                url,
            )
            .await;
        }
    }

    post_comments(&github, &context, &result, &outcomes).await;

    let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
    tracing::info!(
        %run_id,
        tasks = outcomes.len(),
        succeeded,
        failed = outcomes.len() - succeeded,
        comments = result.comments.len(),
        "Sync run complete"
    );

    Ok(())
}

/// Validate a rule file and report the result (the `validate` command).
pub fn validate_file(path: &str) -> Result<()> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path))?;
    let config = parse_rules(&yaml)?;
    println!("{}: {} rule(s) OK", path, config.rules.len());
    Ok(())
}

/// Assemble the rule context and the referenced task list.
///
/// Comment bodies are prefetched only when a rule template can actually
/// read them, saving an API call on every other run.
async fn prepare_context(
    event: &str,
    payload: &serde_json::Value,
    rules_config: &RulesConfig,
    github: &GithubClient,
) -> Result<(RuleContext, Vec<String>)> {
    let record = payload
        .get("pull_request")
        .or_else(|| payload.get("issue"));
    let body = record
        .and_then(|record| record.get("body"))
        .and_then(|body| body.as_str())
        .unwrap_or_default();
    let number = record
        .and_then(|record| record.get("number"))
        .and_then(|number| number.as_u64());

    let task_gids = tasks::extract_task_gids(body);

    let comments = if template::analysis::uses_helper(rules_config, "extract_from_comments") {
        match number {
            Some(number) => match github.list_comments(number).await {
                Ok(bodies) => Some(bodies.join("\n")),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not fetch comments, extraction will see none");
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    let context = build_context(
        event,
        payload,
        comments,
        !task_gids.is_empty(),
        rules_config.user_mapping.clone(),
    )?;

    Ok((context, task_gids))
}

/// Render comment templates against the post-run context and post the
/// non-empty results back to the PR/issue.
async fn post_comments(
    github: &GithubClient,
    context: &RuleContext,
    result: &RuleExecutionResult,
    outcomes: &[TaskOutcome],
) {
    if result.comments.is_empty() {
        return;
    }

    let number = match context.number() {
        Some(number) => number,
        None => return,
    };

    let comment_context = build_comment_context(context, result, outcomes);
    let evaluator = TemplateEvaluator::with_tree(context, comment_context);

    for comment_template in &result.comments {
        let body = evaluator.render(comment_template);
        if body.is_empty() {
            tracing::debug!("Comment template rendered empty, not posted");
            continue;
        }
        if let Err(e) = github.post_comment(number, &body).await {
            tracing::error!(error = %e, "Failed to post comment");
        }
    }
}

fn read_payload(path: &str) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid event payload JSON: {}", path))
}
