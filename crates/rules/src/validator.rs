//! Structural validation of a loaded rule set.

use crate::error::{RuleError, RuleResult};
use crate::types::{Condition, CreateTaskAction, Rule, RuleAction, RulesConfig, StringOrList};

/// Validate a rule set before execution.
///
/// Fails fast on the first violation with a 1-based rule index in the
/// message. Shape errors (wrong YAML types) never reach this point;
/// deserialization rejects them as parse errors.
pub fn validate_rules(config: &RulesConfig) -> RuleResult<()> {
    if config.rules.is_empty() {
        return Err(RuleError::Validation(
            "Rule set must contain at least one rule".to_string(),
        ));
    }

    for (index, rule) in config.rules.iter().enumerate() {
        validate_rule(rule, index + 1)?;
    }

    Ok(())
}

fn validate_rule(rule: &Rule, index: usize) -> RuleResult<()> {
    validate_condition(&rule.when, index)?;
    validate_action(&rule.then, &rule.when, index)?;
    Ok(())
}

fn validate_condition(when: &Condition, index: usize) -> RuleResult<()> {
    if when.event.is_empty() {
        return Err(RuleError::Validation(format!(
            "Rule {}: when.event must not be empty",
            index
        )));
    }

    check_non_empty(when.action.as_ref(), "when.action", index)?;
    check_non_empty(when.has_labels.as_ref(), "when.has_labels", index)?;
    check_non_empty(when.author.as_ref(), "when.author", index)?;

    if let Some(ref label) = when.label {
        if label.is_empty() {
            return Err(RuleError::Validation(format!(
                "Rule {}: when.label must not be empty",
                index
            )));
        }
    }

    Ok(())
}

fn check_non_empty(value: Option<&StringOrList>, field: &str, index: usize) -> RuleResult<()> {
    if let Some(value) = value {
        if value.is_empty() {
            return Err(RuleError::Validation(format!(
                "Rule {}: {} must not be empty",
                index, field
            )));
        }
    }
    Ok(())
}

fn validate_action(then: &RuleAction, when: &Condition, index: usize) -> RuleResult<()> {
    if then.is_empty() {
        return Err(RuleError::Validation(format!(
            "Rule {}: then must contain at least one action",
            index
        )));
    }

    if let Some(ref fields) = then.update_fields {
        if fields.is_empty() {
            return Err(RuleError::Validation(format!(
                "Rule {}: update_fields must not be empty",
                index
            )));
        }
        for (field_id, template) in fields {
            if !is_numeric_id(field_id) {
                return Err(RuleError::Validation(format!(
                    "Rule {}: update_fields key '{}' must be a numeric field id",
                    index, field_id
                )));
            }
            if template.is_empty() {
                return Err(RuleError::Validation(format!(
                    "Rule {}: update_fields['{}'] template must not be empty",
                    index, field_id
                )));
            }
        }
    }

    if let Some(ref comment) = then.post_pr_comment {
        if comment.is_empty() {
            return Err(RuleError::Validation(format!(
                "Rule {}: post_pr_comment must not be empty",
                index
            )));
        }
    }

    if let Some(ref create) = then.create_task {
        // Creation only makes sense when the body references no tasks yet;
        // the flag defaults to the update-mode reading when omitted.
        if when.has_asana_tasks.unwrap_or(true) {
            return Err(RuleError::Validation(format!(
                "Rule {}: create_task requires 'has_asana_tasks: false' in when",
                index
            )));
        }
        if then.has_update_effects() {
            return Err(RuleError::Validation(format!(
                "Rule {}: create_task cannot be combined with update_fields, mark_complete, or attach_pr_to_tasks",
                index
            )));
        }
        validate_create_task(create, index)?;
    }

    Ok(())
}

fn validate_create_task(create: &CreateTaskAction, index: usize) -> RuleResult<()> {
    if create.title.is_empty() {
        return Err(RuleError::Validation(format!(
            "Rule {}: create_task.title must not be empty",
            index
        )));
    }

    if create.project.is_none() && create.workspace.is_none() {
        return Err(RuleError::Validation(format!(
            "Rule {}: create_task requires a project or workspace id",
            index
        )));
    }

    for (field, value) in [
        ("create_task.project", create.project.as_ref()),
        ("create_task.workspace", create.workspace.as_ref()),
        ("create_task.section", create.section.as_ref()),
    ] {
        if let Some(id) = value {
            if !is_numeric_id(id) {
                return Err(RuleError::Validation(format!(
                    "Rule {}: {} must be a numeric id, got '{}'",
                    index, field, id
                )));
            }
        }
    }

    if create.notes.is_some() && create.html_notes.is_some() {
        return Err(RuleError::Validation(format!(
            "Rule {}: create_task notes and html_notes are mutually exclusive",
            index
        )));
    }

    if let Some(ref fields) = create.initial_fields {
        for field_id in fields.keys() {
            if !is_numeric_id(field_id) {
                return Err(RuleError::Validation(format!(
                    "Rule {}: initial_fields key '{}' must be a numeric field id",
                    index, field_id
                )));
            }
        }
    }

    Ok(())
}

/// A numeric-only identifier, the shape of every Asana gid.
fn is_numeric_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use crate::config::parse_rules;

    #[test]
    fn test_empty_rule_set_rejected() {
        let err = parse_rules("rules: []").unwrap_err();
        assert!(err.to_string().contains("at least one rule"));
    }

    #[test]
    fn test_empty_action_list_rejected() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
      action: []
    then:
      mark_complete: true
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("Rule 1: when.action"));
    }

    #[test]
    fn test_empty_has_labels_rejected() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
      has_labels: []
    then:
      mark_complete: true
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("when.has_labels"));
    }

    #[test]
    fn test_empty_author_rejected() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
      author: []
    then:
      mark_complete: true
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("when.author"));
    }

    #[test]
    fn test_empty_then_rejected() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
    then: {}
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("Rule 1: then must contain"));
    }

    #[test]
    fn test_non_numeric_field_key_rejected() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
    then:
      update_fields:
        status: "Shipped"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("numeric field id"));
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_rule_index_is_one_based() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
    then:
      mark_complete: true
  - when:
      event: pull_request
    then: {}
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("Rule 2:"));
    }

    #[test]
    fn test_create_task_needs_no_tasks_condition() {
        let yaml = r#"
rules:
  - when:
      event: issues
      action: opened
    then:
      create_task:
        project: "1200000000000001"
        title: "{{issue.title}}"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("has_asana_tasks: false"));
    }

    #[test]
    fn test_create_task_combined_with_updates_rejected() {
        let yaml = r#"
rules:
  - when:
      event: issues
      action: opened
      has_asana_tasks: false
    then:
      update_fields:
        "1": "Started"
      create_task:
        project: "1200000000000001"
        title: "{{issue.title}}"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn test_create_task_valid_form_accepted() {
        let yaml = r#"
rules:
  - when:
      event: issues
      action: opened
      has_asana_tasks: false
    then:
      create_task:
        workspace: "1100000000000001"
        section: "1200000000000002"
        title: "{{issue.title}}"
        html_notes: "{{markdown_to_html issue.body}}"
      post_pr_comment: "Created {{tasks.0.url}}"
"#;
        let config = parse_rules(yaml).unwrap();
        let create = config.rules[0].then.create_task.as_ref().unwrap();
        assert_eq!(create.workspace.as_deref(), Some("1100000000000001"));
        assert!(create.notes.is_none());
    }

    #[test]
    fn test_create_task_requires_project_or_workspace() {
        let yaml = r#"
rules:
  - when:
      event: issues
      has_asana_tasks: false
    then:
      create_task:
        title: "{{issue.title}}"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("project or workspace"));
    }

    #[test]
    fn test_create_task_notes_exclusivity() {
        let yaml = r#"
rules:
  - when:
      event: issues
      has_asana_tasks: false
    then:
      create_task:
        project: "1200000000000001"
        title: "t"
        notes: "plain"
        html_notes: "<b>rich</b>"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_create_task_non_numeric_ids_rejected() {
        let yaml = r#"
rules:
  - when:
      event: issues
      has_asana_tasks: false
    then:
      create_task:
        project: "my-project"
        title: "t"
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("create_task.project"));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
      merged: "yes"
    then:
      mark_complete: true
"#;
        let err = parse_rules(yaml).unwrap_err();
        assert!(err.to_string().contains("Parse error"));
    }

    #[test]
    fn test_valid_rule_set_accepted() {
        let yaml = r#"
rules:
  - when:
      event: pull_request
      action: [opened, reopened]
      draft: false
    then:
      update_fields:
        "1205199000000000": "In Review"
      attach_pr_to_tasks: true
  - when:
      event: pull_request
      action: closed
      merged: true
    then:
      update_fields:
        "1205199000000000": "Shipped"
      mark_complete: true
      post_pr_comment: "Synced {{summary.succeeded}} task(s)."
user_mapping:
  octocat: "120011223344"
integration_secret: "shh"
"#;
        let config = parse_rules(yaml).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(
            config.user_mapping.unwrap().get("octocat").unwrap(),
            "120011223344"
        );
        assert_eq!(config.integration_secret.as_deref(), Some("shh"));
    }
}
