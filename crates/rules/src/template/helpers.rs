//! Registered template helpers.

use regex::Regex;

use crate::context::RuleContext;
use crate::template::evaluator::{is_truthy, value_to_string};
use crate::template::markdown;

/// All registered helper names.
pub const HELPER_NAMES: &[&str] = &[
    "extract_from_body",
    "extract_from_title",
    "extract_from_comments",
    "clean_title",
    "sanitize_markdown",
    "markdown_to_html",
    "map_github_to_asana",
    "or",
];

/// Check whether a name refers to a registered helper.
pub fn is_helper(name: &str) -> bool {
    HELPER_NAMES.contains(&name)
}

/// Check helper arity: `or` is variadic, everything else takes one argument.
pub fn arity_ok(name: &str, argc: usize) -> bool {
    match name {
        "or" => argc >= 1,
        _ => argc == 1,
    }
}

/// Invoke a helper with already-resolved arguments.
///
/// Runtime misses (no regex match, unmapped login) yield an empty
/// string; an invalid pattern is logged and yields an empty string.
pub fn call(name: &str, args: &[serde_json::Value], context: &RuleContext) -> String {
    match name {
        "extract_from_body" => extract(&arg_string(args, 0), context.body().unwrap_or_default()),
        "extract_from_title" => extract(&arg_string(args, 0), context.title().unwrap_or_default()),
        "extract_from_comments" => extract(
            &arg_string(args, 0),
            context.comments.as_deref().unwrap_or_default(),
        ),
        "clean_title" => clean_title(&arg_string(args, 0)),
        "sanitize_markdown" => markdown::sanitize(&arg_string(args, 0)),
        "markdown_to_html" => markdown::to_html(&arg_string(args, 0)),
        "map_github_to_asana" => map_github_to_asana(&arg_string(args, 0), context),
        "or" => args
            .iter()
            .find(|&value| is_truthy(value))
            .map(value_to_string)
            .unwrap_or_default(),
        other => {
            tracing::error!(helper = other, "Unknown template helper");
            String::new()
        }
    }
}

fn arg_string(args: &[serde_json::Value], index: usize) -> String {
    args.get(index).map(value_to_string).unwrap_or_default()
}

/// Apply a regex to the text: first capture group when the pattern
/// defines one, otherwise the whole match.
fn extract(pattern: &str, text: &str) -> String {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!(pattern, error = %e, "Invalid extraction pattern");
            return String::new();
        }
    };

    match re.captures(text) {
        Some(caps) if re.captures_len() > 1 => caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        Some(caps) => caps
            .get(0)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// Strip a leading conventional-commit prefix from a title.
fn clean_title(title: &str) -> String {
    const PREFIX: &str =
        r"(?i)^(build|chore|ci|docs|feat|fix|perf|refactor|revert|style|test)(\([^)]*\))?!?:\s*";
    match Regex::new(PREFIX) {
        Ok(re) => re.replace(title, "").to_string(),
        Err(_) => title.to_string(),
    }
}

/// Translate a GitHub login through the configured user mapping.
fn map_github_to_asana(login: &str, context: &RuleContext) -> String {
    context
        .user_mapping
        .as_ref()
        .and_then(|mapping| mapping.get(login))
        .cloned()
        .unwrap_or_default()
}
