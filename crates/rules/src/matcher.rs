//! Condition matching against a rule context.

use crate::context::RuleContext;
use crate::types::Condition;

/// Evaluate a condition set against the context.
///
/// All present sub-conditions must hold; absent ones impose no
/// constraint. PR-only checks (`merged`, `draft`) fail on issue events.
pub fn matches(condition: &Condition, context: &RuleContext) -> bool {
    if condition.event != context.event {
        return false;
    }

    if let Some(ref action) = condition.action {
        if !action.contains(&context.action) {
            return false;
        }
    }

    if let Some(merged) = condition.merged {
        match context.pull_request {
            Some(ref pr) if pr.merged == merged => {}
            _ => return false,
        }
    }

    if let Some(draft) = condition.draft {
        match context.pull_request {
            Some(ref pr) if pr.draft == draft => {}
            _ => return false,
        }
    }

    if let Some(ref label) = condition.label {
        match context.label {
            Some(ref current) if current == label => {}
            _ => return false,
        }
    }

    if let Some(ref has_labels) = condition.has_labels {
        let current: &[String] = context.labels.as_deref().unwrap_or_default();
        let wanted = has_labels.values();
        if !current.iter().any(|label| wanted.contains(&label.as_str())) {
            return false;
        }
    }

    if let Some(has_tasks) = condition.has_asana_tasks {
        if context.has_asana_tasks != has_tasks {
            return false;
        }
    }

    if let Some(ref author) = condition.author {
        match context.author() {
            Some(login) if author.contains(login) => {}
            _ => return false,
        }
    }

    true
}
