//! Asana REST client.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tasksync_rules::CreateTaskSpec;

use crate::fields::FieldSchema;
use crate::retry::{with_retry, ApiError, RetryPolicy};

const ASANA_API: &str = "https://app.asana.com/api/1.0";
const ATTACHMENT_API: &str = "https://github.integrations.asana.plus/custom/v1/actions/widget";

/// The integration endpoint is slower than the core API; give it a
/// dedicated per-request timeout.
const ATTACHMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope wrapping every Asana response body.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Task fields the action depends on.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    /// Task gid.
    pub gid: String,

    /// Task display name.
    #[serde(default)]
    pub name: String,

    /// Task permalink.
    #[serde(default)]
    pub permalink_url: String,
}

/// HTTP client for the Asana API.
#[derive(Clone)]
pub struct AsanaClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
    attachment_base: String,
    retry: RetryPolicy,
}

impl AsanaClient {
    /// Create a client from a personal access token.
    pub fn new(token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            token: token.to_string(),
            api_base: ASANA_API.to_string(),
            attachment_base: ATTACHMENT_API.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the API base URL (tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Override the attachment endpoint URL (tests).
    pub fn with_attachment_base(mut self, base: &str) -> Self {
        self.attachment_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Fetch a task.
    pub async fn get_task(&self, gid: &str) -> Result<Task, ApiError> {
        let url = format!("{}/tasks/{}", self.api_base, gid);
        let envelope: Envelope<Task> =
            with_retry(&self.retry, "get task", || self.get_json(&url)).await?;
        Ok(envelope.data)
    }

    /// Update custom fields and/or completion in a single call.
    pub async fn update_task(
        &self,
        gid: &str,
        custom_fields: &HashMap<String, serde_json::Value>,
        completed: Option<bool>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/tasks/{}", self.api_base, gid);

        let mut data = serde_json::Map::new();
        if !custom_fields.is_empty() {
            data.insert(
                "custom_fields".to_string(),
                serde_json::to_value(custom_fields).unwrap_or_default(),
            );
        }
        if let Some(completed) = completed {
            data.insert("completed".to_string(), serde_json::json!(completed));
        }
        let payload = serde_json::json!({ "data": data });

        with_retry(&self.retry, "update task", || self.put_unit(&url, &payload)).await
    }

    /// Create a task from a resolved spec. `initial_fields` must already
    /// be coerced to wire values.
    pub async fn create_task(
        &self,
        spec: &CreateTaskSpec,
        initial_fields: &HashMap<String, serde_json::Value>,
    ) -> Result<Task, ApiError> {
        let url = format!("{}/tasks", self.api_base);

        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), serde_json::json!(spec.title));
        if let Some(ref project) = spec.project {
            data.insert("projects".to_string(), serde_json::json!([project]));
        } else if let Some(ref workspace) = spec.workspace {
            data.insert("workspace".to_string(), serde_json::json!(workspace));
        }
        if let Some(ref notes) = spec.notes {
            data.insert("notes".to_string(), serde_json::json!(notes));
        }
        if let Some(ref html) = spec.html_notes {
            // Asana requires html_notes wrapped in a body element.
            data.insert(
                "html_notes".to_string(),
                serde_json::json!(format!("<body>{}</body>", html)),
            );
        }
        if let Some(ref assignee) = spec.assignee {
            data.insert("assignee".to_string(), serde_json::json!(assignee));
        }
        if !initial_fields.is_empty() {
            data.insert(
                "custom_fields".to_string(),
                serde_json::to_value(initial_fields).unwrap_or_default(),
            );
        }
        let payload = serde_json::json!({ "data": data });

        let envelope: Envelope<Task> =
            with_retry(&self.retry, "create task", || self.post_json(&url, &payload)).await?;
        Ok(envelope.data)
    }

    /// Move a task into a section.
    pub async fn add_task_to_section(&self, section: &str, task_gid: &str) -> Result<(), ApiError> {
        let url = format!("{}/sections/{}/addTask", self.api_base, section);
        let payload = serde_json::json!({ "data": { "task": task_gid } });
        with_retry(&self.retry, "add task to section", || {
            self.post_unit(&url, &payload)
        })
        .await
    }

    /// Fetch a custom field definition.
    pub async fn get_custom_field(&self, gid: &str) -> Result<FieldSchema, ApiError> {
        let url = format!("{}/custom_fields/{}", self.api_base, gid);
        let envelope: Envelope<FieldSchema> =
            with_retry(&self.retry, "get custom field", || self.get_json(&url)).await?;
        Ok(envelope.data)
    }

    /// Link a resource URL to a task through the GitHub-for-Asana
    /// integration endpoint, authorized by the rule file's secret.
    pub async fn attach_resource(
        &self,
        secret: &str,
        task_gid: &str,
        resource_url: &str,
    ) -> Result<(), ApiError> {
        let payload = serde_json::json!({
            "task_gid": task_gid,
            "resource_url": resource_url,
        });

        with_retry(&self.retry, "attach resource", || {
            self.try_attach(secret, &payload)
        })
        .await
    }

    async fn try_attach(
        &self,
        secret: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(&self.attachment_base)
            .bearer_auth(secret)
            .timeout(ATTACHMENT_TIMEOUT)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: self.attachment_base.clone(),
                body,
            });
        }

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_unit(&self, url: &str, payload: &serde_json::Value) -> Result<(), ApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(())
    }

    async fn put_unit(&self, url: &str, payload: &serde_json::Value) -> Result<(), ApiError> {
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AsanaClient::new("token");
        assert_eq!(client.api_base, "https://app.asana.com/api/1.0");
    }

    #[test]
    fn test_base_overrides_trim_slash() {
        let client = AsanaClient::new("token")
            .with_api_base("http://localhost:8080/")
            .with_attachment_base("http://localhost:8081/widget/");
        assert_eq!(client.api_base, "http://localhost:8080");
        assert_eq!(client.attachment_base, "http://localhost:8081/widget");
    }

    #[test]
    fn test_task_envelope_decoding() {
        let body = r#"{
            "data": {
                "gid": "456",
                "name": "Login race",
                "permalink_url": "https://app.asana.com/0/123/456"
            }
        }"#;
        let envelope: Envelope<Task> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.gid, "456");
        assert_eq!(envelope.data.name, "Login race");
    }

    #[test]
    fn test_task_optional_fields_default() {
        let envelope: Envelope<Task> =
            serde_json::from_str(r#"{ "data": { "gid": "9" } }"#).unwrap();
        assert_eq!(envelope.data.name, "");
        assert_eq!(envelope.data.permalink_url, "");
    }
}
