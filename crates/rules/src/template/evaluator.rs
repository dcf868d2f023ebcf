//! Template evaluation against a rule context.

use crate::context::RuleContext;
use crate::error::RuleResult;
use crate::template::helpers;
use crate::template::parser::{self, Arg, Expr, Segment};

/// Evaluates templates against one event context.
///
/// `render` never fails: a syntax error is logged and yields an empty
/// string for the whole template, while an unresolved path or a helper
/// miss yields an empty string for that expression only.
pub struct TemplateEvaluator {
    tree: serde_json::Value,
    context: RuleContext,
}

impl TemplateEvaluator {
    /// Build an evaluator for one context.
    pub fn new(context: &RuleContext) -> Self {
        Self {
            tree: context.to_template_context(),
            context: context.clone(),
        }
    }

    /// Build an evaluator over a custom context tree (the post-run
    /// comment context), keeping helper access to the original event.
    pub fn with_tree(context: &RuleContext, tree: serde_json::Value) -> Self {
        Self {
            tree,
            context: context.clone(),
        }
    }

    /// Render a template to a string.
    pub fn render(&self, template: &str) -> String {
        match self.try_render(template) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::error!(error = %e, template, "Template evaluation failed");
                String::new()
            }
        }
    }

    fn try_render(&self, template: &str) -> RuleResult<String> {
        let segments = parser::parse(template)?;
        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&self.eval_expr(expr)),
            }
        }
        Ok(out)
    }

    fn eval_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Path(path) => value_to_string(&self.resolve_path(path)),
            Expr::Helper { name, args } => {
                let values: Vec<serde_json::Value> =
                    args.iter().map(|arg| self.resolve_arg(arg)).collect();
                helpers::call(name, &values, &self.context)
            }
        }
    }

    fn resolve_arg(&self, arg: &Arg) -> serde_json::Value {
        match arg {
            Arg::Literal(s) => serde_json::Value::String(s.clone()),
            Arg::Path(path) => self.resolve_path(path),
        }
    }

    fn resolve_path(&self, path: &str) -> serde_json::Value {
        json_path(&self.tree, path)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Navigate a dotted JSON path; numeric segments index arrays.
pub(crate) fn json_path<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        match current {
            serde_json::Value::Object(obj) => {
                current = obj.get(segment)?;
            }
            serde_json::Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a JSON value as template output.
pub(crate) fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Check if a JSON value is truthy.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{build_context, RuleContext};
    use std::collections::HashMap;

    fn context() -> RuleContext {
        let payload = serde_json::json!({
            "action": "closed",
            "pull_request": {
                "number": 42,
                "title": "feat(auth): add SSO login",
                "body": "Asana: https://app.asana.com/0/123/456\n\nTicket-ID: ABC-99",
                "merged": true,
                "draft": false,
                "user": { "login": "octocat" },
                "base": { "ref": "main" },
                "head": { "ref": "feat/sso" },
                "html_url": "https://github.com/acme/app/pull/42"
            }
        });
        let mut mapping = HashMap::new();
        mapping.insert("octocat".to_string(), "120011223344".to_string());
        build_context("pull_request", &payload, None, true, Some(mapping)).unwrap()
    }

    #[test]
    fn test_render_path() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(
            evaluator.render("{{pull_request.title}}"),
            "feat(auth): add SSO login"
        );
        assert_eq!(evaluator.render("#{{pull_request.number}}"), "#42");
        assert_eq!(evaluator.render("{{pull_request.merged}}"), "true");
    }

    #[test]
    fn test_render_missing_path_is_empty() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(evaluator.render("[{{pull_request.nope}}]"), "[]");
        assert_eq!(evaluator.render("[{{issue.title}}]"), "[]");
    }

    #[test]
    fn test_render_syntax_error_empties_whole_template() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(evaluator.render("text {{pull_request.title"), "");
        assert_eq!(evaluator.render(r#"{{bogus_helper "x"}} text"#), "");
    }

    #[test]
    fn test_render_helper_extract() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(
            evaluator.render(r#"{{extract_from_body "Ticket-ID: ([A-Z]+-\d+)"}}"#),
            "ABC-99"
        );
        assert_eq!(
            evaluator.render(r#"{{extract_from_body "Missing: (\d+)"}}"#),
            ""
        );
    }

    #[test]
    fn test_render_helper_or_with_paths() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(
            evaluator.render("{{or pull_request.assignee pull_request.author}}"),
            "octocat"
        );
        assert_eq!(
            evaluator.render(r#"{{or pull_request.assignee "fallback"}}"#),
            "fallback"
        );
    }

    #[test]
    fn test_render_user_mapping() {
        let evaluator = TemplateEvaluator::new(&context());
        assert_eq!(
            evaluator.render("{{map_github_to_asana pull_request.author}}"),
            "120011223344"
        );
        assert_eq!(
            evaluator.render(r#"{{map_github_to_asana "stranger"}}"#),
            ""
        );
    }

    #[test]
    fn test_with_tree_resolves_custom_paths() {
        let base = context();
        let tree = serde_json::json!({
            "tasks": [ { "url": "https://app.asana.com/0/1/2", "success": true } ],
            "summary": { "total": 1 }
        });
        let evaluator = TemplateEvaluator::with_tree(&base, tree);
        assert_eq!(
            evaluator.render("{{tasks.0.url}}"),
            "https://app.asana.com/0/1/2"
        );
        assert_eq!(evaluator.render("{{summary.total}}"), "1");
        // Helpers still see the original event.
        assert_eq!(
            evaluator.render("{{map_github_to_asana pull_request.author}}"),
            "120011223344"
        );
    }

    #[test]
    fn test_json_path_navigation() {
        let value = serde_json::json!({ "a": { "b": [ { "c": 7 } ] } });
        assert_eq!(json_path(&value, "a.b.0.c"), Some(&serde_json::json!(7)));
        assert_eq!(json_path(&value, "a.b.1.c"), None);
        assert_eq!(json_path(&value, "a.x"), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&serde_json::Value::Null));
        assert!(!is_truthy(&serde_json::json!(false)));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(!is_truthy(&serde_json::json!([])));
        assert!(is_truthy(&serde_json::json!(true)));
        assert!(is_truthy(&serde_json::json!(1.5)));
        assert!(is_truthy(&serde_json::json!("x")));
        assert!(is_truthy(&serde_json::json!([0])));
    }

    #[test]
    fn test_value_to_string_forms() {
        assert_eq!(value_to_string(&serde_json::Value::Null), "");
        assert_eq!(value_to_string(&serde_json::json!("s")), "s");
        assert_eq!(value_to_string(&serde_json::json!(3)), "3");
        assert_eq!(value_to_string(&serde_json::json!([1, 2])), "[1,2]");
    }
}
