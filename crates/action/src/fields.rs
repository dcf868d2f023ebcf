//! Custom field schemas and value coercion.

use std::collections::HashMap;

use serde::Deserialize;

use crate::asana::AsanaClient;
use crate::retry::ApiError;

/// One option of an enum or multi_enum field.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumOption {
    /// Option gid.
    pub gid: String,

    /// Option display name.
    #[serde(default)]
    pub name: String,

    /// Whether the option is selectable.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Custom field definition fetched from Asana.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    /// Field gid.
    pub gid: String,

    /// Field subtype: text, number, enum, multi_enum, date.
    #[serde(default)]
    pub resource_subtype: String,

    /// Options for enum/multi_enum fields.
    #[serde(default)]
    pub enum_options: Vec<EnumOption>,
}

/// Run-scoped cache of field schemas.
///
/// Injected into task operations so one run fetches each schema at most
/// once; `clear` resets it between independent runs.
#[derive(Debug, Default)]
pub struct FieldSchemaCache {
    schemas: HashMap<String, FieldSchema>,
}

impl FieldSchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a schema, fetching and caching it on first use.
    pub async fn get_or_fetch(
        &mut self,
        client: &AsanaClient,
        gid: &str,
    ) -> Result<FieldSchema, ApiError> {
        if !self.schemas.contains_key(gid) {
            let schema = client.get_custom_field(gid).await?;
            tracing::debug!(field = gid, subtype = %schema.resource_subtype, "Field schema cached");
            self.schemas.insert(gid.to_string(), schema);
        }
        Ok(self.schemas[gid].clone())
    }

    /// Seed a schema without fetching.
    pub fn insert(&mut self, schema: FieldSchema) {
        self.schemas.insert(schema.gid.clone(), schema);
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Drop all cached schemas.
    pub fn clear(&mut self) {
        self.schemas.clear();
    }
}

/// Coerce a resolved template value to the field's wire representation.
pub fn coerce_value(schema: &FieldSchema, raw: &str) -> Result<serde_json::Value, ApiError> {
    match schema.resource_subtype.as_str() {
        "text" | "" => Ok(serde_json::json!(raw)),
        "number" => raw.trim().parse::<f64>().map(|n| serde_json::json!(n)).map_err(|_| {
            ApiError::Coerce(format!("field {}: '{}' is not a number", schema.gid, raw))
        }),
        "enum" => match_enum_option(schema, raw)
            .map(|gid| serde_json::json!(gid))
            .ok_or_else(|| {
                ApiError::Coerce(format!(
                    "field {}: no enum option named '{}'",
                    schema.gid, raw
                ))
            }),
        "multi_enum" => coerce_multi_enum(schema, raw),
        "date" => coerce_date(schema, raw),
        other => Err(ApiError::Coerce(format!(
            "field {}: unsupported subtype '{}'",
            schema.gid, other
        ))),
    }
}

/// Case-insensitive name match among enabled options.
fn match_enum_option(schema: &FieldSchema, name: &str) -> Option<String> {
    schema
        .enum_options
        .iter()
        .filter(|option| option.enabled)
        .find(|option| option.name.eq_ignore_ascii_case(name.trim()))
        .map(|option| option.gid.clone())
}

/// Comma-separated option names; unknown names are skipped with a
/// warning, an all-unknown list is an error.
fn coerce_multi_enum(schema: &FieldSchema, raw: &str) -> Result<serde_json::Value, ApiError> {
    let mut gids = Vec::new();
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() {
            continue;
        }
        match match_enum_option(schema, name) {
            Some(gid) => gids.push(gid),
            None => {
                tracing::warn!(field = %schema.gid, option = name, "Unknown enum option, skipped")
            }
        }
    }

    if gids.is_empty() {
        return Err(ApiError::Coerce(format!(
            "field {}: no enum options matched '{}'",
            schema.gid, raw
        )));
    }
    Ok(serde_json::json!(gids))
}

/// Accept YYYY-MM-DD as-is or take the date part of an RFC 3339 stamp.
fn coerce_date(schema: &FieldSchema, raw: &str) -> Result<serde_json::Value, ApiError> {
    let value = raw.trim();

    if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return Ok(serde_json::json!(value));
    }

    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(serde_json::json!(stamp
            .date_naive()
            .format("%Y-%m-%d")
            .to_string()));
    }

    Err(ApiError::Coerce(format!(
        "field {}: '{}' is not a date",
        schema.gid, raw
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_schema() -> FieldSchema {
        FieldSchema {
            gid: "1205199000000000".to_string(),
            resource_subtype: "enum".to_string(),
            enum_options: vec![
                EnumOption {
                    gid: "111".to_string(),
                    name: "In Review".to_string(),
                    enabled: true,
                },
                EnumOption {
                    gid: "222".to_string(),
                    name: "Shipped".to_string(),
                    enabled: true,
                },
                EnumOption {
                    gid: "333".to_string(),
                    name: "Retired".to_string(),
                    enabled: false,
                },
            ],
        }
    }

    fn schema(subtype: &str) -> FieldSchema {
        FieldSchema {
            gid: "42".to_string(),
            resource_subtype: subtype.to_string(),
            enum_options: Vec::new(),
        }
    }

    #[test]
    fn test_coerce_text_passthrough() {
        let value = coerce_value(&schema("text"), "anything at all").unwrap();
        assert_eq!(value, serde_json::json!("anything at all"));
    }

    #[test]
    fn test_coerce_empty_subtype_defaults_to_text() {
        let value = coerce_value(&schema(""), "x").unwrap();
        assert_eq!(value, serde_json::json!("x"));

        let err = coerce_value(&schema("people"), "x").unwrap_err();
        assert!(err.to_string().contains("unsupported subtype"));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(
            coerce_value(&schema("number"), " 3.5 ").unwrap(),
            serde_json::json!(3.5)
        );
        let err = coerce_value(&schema("number"), "three").unwrap_err();
        assert!(err.to_string().contains("not a number"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_coerce_enum_case_insensitive() {
        let value = coerce_value(&enum_schema(), "shipped").unwrap();
        assert_eq!(value, serde_json::json!("222"));
    }

    #[test]
    fn test_coerce_enum_ignores_disabled_options() {
        let err = coerce_value(&enum_schema(), "Retired").unwrap_err();
        assert!(err.to_string().contains("no enum option"));
    }

    #[test]
    fn test_coerce_multi_enum_partial_match() {
        let mut schema = enum_schema();
        schema.resource_subtype = "multi_enum".to_string();

        let value = coerce_value(&schema, "Shipped, Unknown, in review").unwrap();
        assert_eq!(value, serde_json::json!(["222", "111"]));

        let err = coerce_value(&schema, "Nothing, Known").unwrap_err();
        assert!(err.to_string().contains("no enum options matched"));
    }

    #[test]
    fn test_coerce_date_forms() {
        assert_eq!(
            coerce_value(&schema("date"), "2026-08-25").unwrap(),
            serde_json::json!("2026-08-25")
        );
        assert_eq!(
            coerce_value(&schema("date"), "2026-08-25T14:30:00Z").unwrap(),
            serde_json::json!("2026-08-25")
        );
        assert!(coerce_value(&schema("date"), "yesterday").is_err());
    }

    #[test]
    fn test_cache_insert_and_clear() {
        let mut cache = FieldSchemaCache::new();
        assert!(cache.is_empty());

        cache.insert(enum_schema());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
