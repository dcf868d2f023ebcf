//! Rule file loading.

use crate::error::{RuleError, RuleResult};
use crate::types::RulesConfig;
use crate::validator;

/// Parse a YAML rule file and validate it.
pub fn parse_rules(yaml_content: &str) -> RuleResult<RulesConfig> {
    let config: RulesConfig =
        serde_yaml::from_str(yaml_content).map_err(|e| RuleError::Parse(e.to_string()))?;

    validator::validate_rules(&config)?;

    Ok(config)
}
