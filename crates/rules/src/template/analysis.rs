//! Static inspection of the templates carried by a rule set.

use std::collections::HashSet;

use crate::template::parser::{self, Expr, Segment};
use crate::types::{Rule, RulesConfig};

/// Collect the helper names referenced anywhere in a rule set.
///
/// Malformed templates contribute nothing; they evaluate to an empty
/// string at run time anyway.
pub fn referenced_helpers(config: &RulesConfig) -> HashSet<String> {
    let mut helpers = HashSet::new();
    for rule in &config.rules {
        for template in rule_templates(rule) {
            collect_helpers(template, &mut helpers);
        }
    }
    helpers
}

/// Whether any template in the rule set invokes the given helper.
///
/// Drives conditional prefetching: comment bodies are only fetched when
/// a rule can actually read them.
pub fn uses_helper(config: &RulesConfig, helper: &str) -> bool {
    referenced_helpers(config).contains(helper)
}

/// All template strings carried by one rule.
fn rule_templates(rule: &Rule) -> Vec<&str> {
    let mut templates = Vec::new();
    if let Some(ref fields) = rule.then.update_fields {
        templates.extend(fields.values().map(|s| s.as_str()));
    }
    if let Some(ref comment) = rule.then.post_pr_comment {
        templates.push(comment.as_str());
    }
    if let Some(ref create) = rule.then.create_task {
        templates.push(create.title.as_str());
        if let Some(ref notes) = create.notes {
            templates.push(notes.as_str());
        }
        if let Some(ref html_notes) = create.html_notes {
            templates.push(html_notes.as_str());
        }
        if let Some(ref assignee) = create.assignee {
            templates.push(assignee.as_str());
        }
        if let Some(ref fields) = create.initial_fields {
            templates.extend(fields.values().map(|s| s.as_str()));
        }
    }
    templates
}

fn collect_helpers(template: &str, helpers: &mut HashSet<String>) {
    let segments = match parser::parse(template) {
        Ok(segments) => segments,
        Err(_) => return,
    };
    for segment in segments {
        if let Segment::Expr(Expr::Helper { name, .. }) = segment {
            helpers.insert(name);
        }
    }
}
