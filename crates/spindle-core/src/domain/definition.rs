//! Task-definition metadata advertised to the orchestrator at registration.

use serde::{Deserialize, Serialize};

use super::TaskType;

/// What to do when a task exceeds `timeout_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutPolicy {
    Retry,
    TimeOutWf,
    AlertOnly,
}

/// Metadata for one task type.
///
/// Retries and timeouts are enforced by the orchestrator, never by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: TaskType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub retry_count: u32,
    pub timeout_seconds: u64,
    pub response_timeout_seconds: u64,
    pub timeout_policy: TimeoutPolicy,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

impl TaskDefinition {
    /// Definition with the orchestrator's usual defaults.
    pub fn new(name: TaskType) -> Self {
        Self {
            name,
            description: None,
            retry_count: 3,
            timeout_seconds: 3600,
            response_timeout_seconds: 600,
            timeout_policy: TimeoutPolicy::TimeOutWf,
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            owner_email: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeouts(mut self, timeout_seconds: u64, response_timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self.response_timeout_seconds = response_timeout_seconds;
        self
    }

    pub fn with_input_keys(mut self, keys: &[&str]) -> Self {
        self.input_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_output_keys(mut self, keys: &[&str]) -> Self {
        self.output_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_serializes_with_snake_case_fields() {
        let def = TaskDefinition::new(TaskType::new("thumbnail"))
            .with_description("make thumbnails")
            .with_input_keys(&["url"]);
        let v = serde_json::to_value(&def).unwrap();

        assert_eq!(v["name"], "thumbnail");
        assert_eq!(v["timeout_policy"], "TIME_OUT_WF");
        assert_eq!(v["input_keys"][0], "url");
        assert!(v.get("output_keys").is_none());
        assert!(v.get("owner_email").is_none());
    }
}
