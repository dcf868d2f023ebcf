//! Action configuration from the GitHub Actions environment.

use anyhow::Result;

/// Runtime configuration of one action invocation.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Event name (GITHUB_EVENT_NAME).
    pub event_name: String,

    /// Path to the event payload file (GITHUB_EVENT_PATH).
    pub event_path: String,

    /// Repository in owner/repo form (GITHUB_REPOSITORY).
    pub repository: String,

    /// Asana personal access token (INPUT_ASANA_TOKEN).
    pub asana_token: String,

    /// GitHub API token (INPUT_GITHUB_TOKEN).
    pub github_token: String,

    /// Path to the rule file (INPUT_RULES_FILE).
    pub rules_file: String,
}

impl ActionConfig {
    /// Load configuration from the environment. Tokens and the event
    /// coordinates are required; the rule file path has a default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            event_name: required_var("GITHUB_EVENT_NAME")?,
            event_path: required_var("GITHUB_EVENT_PATH")?,
            repository: required_var("GITHUB_REPOSITORY")?,
            asana_token: required_var("INPUT_ASANA_TOKEN")?,
            github_token: required_var("INPUT_GITHUB_TOKEN")?,
            rules_file: std::env::var("INPUT_RULES_FILE")
                .unwrap_or_else(|_| ".github/tasksync.yml".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("Missing required environment variable: {}", name))?;
    if value.is_empty() {
        anyhow::bail!("Environment variable {} must not be empty", name);
    }
    Ok(value)
}
