use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

/// Name of a task type as known to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// JSON object used for task input and output.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A concrete unit of work handed over by a successful claim.
///
/// If `external_input_path` is set, `input` is only a placeholder: the real
/// input lives in external storage and must be resolved before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    pub task_id: TaskId,
    pub task_type: TaskType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_instance_id: Option<String>,

    #[serde(default)]
    pub input: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_input_path: Option<String>,

    /// How many times the orchestrator has handed this task out.
    #[serde(default)]
    pub poll_count: u32,

    pub claimed_at: DateTime<Utc>,
}

impl TaskUnit {
    pub fn new(task_id: TaskId, task_type: TaskType, input: Payload) -> Self {
        Self {
            task_id,
            task_type,
            workflow_instance_id: None,
            input,
            external_input_path: None,
            poll_count: 0,
            claimed_at: Utc::now(),
        }
    }

    pub fn with_workflow_instance(mut self, id: impl Into<String>) -> Self {
        self.workflow_instance_id = Some(id.into());
        self
    }

    /// Mark the input as stored externally; the inline input is cleared.
    pub fn with_external_input(mut self, path: impl Into<String>) -> Self {
        self.external_input_path = Some(path.into());
        self.input = Payload::new();
        self
    }

    pub fn needs_payload_resolution(&self) -> bool {
        self.external_input_path.is_some()
    }

    /// Replace the placeholder with the fetched input.
    pub fn resolve_input(&mut self, input: Payload) {
        self.input = input;
        self.external_input_path = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn external_input_clears_inline_placeholder() {
        let task = TaskUnit::new(
            TaskId::new("t1"),
            TaskType::new("resize"),
            payload(json!({"placeholder": true})),
        )
        .with_external_input("blob://inputs/t1.json");

        assert!(task.needs_payload_resolution());
        assert!(task.input.is_empty());
    }

    #[test]
    fn resolve_input_replaces_placeholder() {
        let mut task = TaskUnit::new(TaskId::new("t1"), TaskType::new("resize"), Payload::new())
            .with_external_input("blob://inputs/t1.json");

        task.resolve_input(payload(json!({"width": 640})));

        assert!(!task.needs_payload_resolution());
        assert_eq!(task.input["width"], 640);
    }

    #[test]
    fn task_unit_deserializes_with_defaults() {
        let task: TaskUnit = serde_json::from_value(json!({
            "task_id": "t9",
            "task_type": "encode",
            "claimed_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(task.task_type, TaskType::new("encode"));
        assert!(task.input.is_empty());
        assert_eq!(task.workflow_instance_id, None);
        assert_eq!(task.poll_count, 0);
    }
}
