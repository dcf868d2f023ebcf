//! Rule execution: fold matching rules into one merged action plan.

use std::collections::HashMap;

use crate::context::RuleContext;
use crate::matcher;
use crate::template::TemplateEvaluator;
use crate::types::{
    CreateTaskAction, CreateTaskSpec, Rule, RuleExecutionResult, MARK_COMPLETE_KEY,
};

/// Execute all rules against the context in declaration order.
///
/// Field updates merge with last-matching-rule-wins per field id.
/// Completion and attachment flags aggregate as a monotonic OR; no rule
/// can clear a flag a previous rule set. Comment templates are collected
/// raw for post-run evaluation. A field whose template resolves to the
/// empty string is skipped, leaving any earlier value in place.
pub fn execute(rules: &[Rule], context: &RuleContext) -> RuleExecutionResult {
    let evaluator = TemplateEvaluator::new(context);
    let mut result = RuleExecutionResult::default();

    for (index, rule) in rules.iter().enumerate() {
        if !matcher::matches(&rule.when, context) {
            tracing::debug!(
                rule = index + 1,
                event = %context.event,
                action = %context.action,
                "Rule did not match"
            );
            continue;
        }
        tracing::debug!(rule = index + 1, "Rule matched");

        if let Some(ref fields) = rule.then.update_fields {
            for (field_id, template) in fields {
                let value = evaluator.render(template);
                if value.is_empty() {
                    tracing::debug!(
                        rule = index + 1,
                        field = %field_id,
                        "Field template resolved empty, skipped"
                    );
                    continue;
                }
                result.fields.insert(field_id.clone(), value);
            }
        }

        if rule.then.mark_complete == Some(true) {
            result
                .fields
                .insert(MARK_COMPLETE_KEY.to_string(), "true".to_string());
        }

        if rule.then.attach_pr_to_tasks == Some(true) {
            result.attach_pr_to_tasks = true;
        }

        if let Some(ref create) = rule.then.create_task {
            match resolve_create_task(create, &evaluator) {
                Ok(spec) => result.create_tasks.push(spec),
                Err(reason) => {
                    tracing::error!(rule = index + 1, %reason, "Task creation skipped");
                }
            }
        }

        if let Some(ref comment) = rule.then.post_pr_comment {
            result.comments.push(comment.clone());
        }
    }

    result
}

/// Resolve a create_task action's templates. An empty resolved title
/// aborts this creation only; other empty resolutions are dropped.
fn resolve_create_task(
    action: &CreateTaskAction,
    evaluator: &TemplateEvaluator,
) -> Result<CreateTaskSpec, String> {
    let title = evaluator.render(&action.title);
    if title.is_empty() {
        return Err(format!("title template resolved empty: {}", action.title));
    }

    let render_opt = |template: &Option<String>| -> Option<String> {
        template
            .as_deref()
            .map(|t| evaluator.render(t))
            .filter(|s| !s.is_empty())
    };

    let mut initial_fields = HashMap::new();
    if let Some(ref fields) = action.initial_fields {
        for (field_id, template) in fields {
            let value = evaluator.render(template);
            if value.is_empty() {
                continue;
            }
            initial_fields.insert(field_id.clone(), value);
        }
    }

    Ok(CreateTaskSpec {
        project: action.project.clone(),
        workspace: action.workspace.clone(),
        section: action.section.clone(),
        title,
        notes: render_opt(&action.notes),
        html_notes: render_opt(&action.html_notes),
        assignee: render_opt(&action.assignee),
        initial_fields,
    })
}
