//! Handler results and task reports.
//!
//! `TaskResult` is what a handler hands back; `TaskReport` is what the engine
//! sends to the orchestrator. The two are kept apart so that a handler result
//! is validated once at the boundary before anything is reported.

use serde::{Deserialize, Serialize};

use super::{Payload, TaskId, TaskType, TaskUnit, WorkerId};
use crate::error::ContractViolation;

/// Status of a task as understood by the orchestrator.
///
/// Serialized as SCREAMING_SNAKE_CASE: IN_PROGRESS / SUCCESS / FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    InProgress,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
        }
    }
}

/// Structured result a handler must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskResult {
    pub status: TaskStatus,

    #[serde(default)]
    pub output: Payload,

    #[serde(default)]
    pub logs: Vec<String>,

    #[serde(default)]
    pub callback_delay_seconds: i64,
}

impl TaskResult {
    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            output: Payload::new(),
            logs: Vec::new(),
            callback_delay_seconds: 0,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            output: Payload::new(),
            logs: vec![reason.into()],
            callback_delay_seconds: 0,
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.output.insert(key.into(), value);
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn with_callback_delay(mut self, seconds: i64) -> Self {
        self.callback_delay_seconds = seconds;
        self
    }

    /// Check the result against the handler contract.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if !self.status.is_terminal() {
            return Err(ContractViolation::NonTerminalStatus(
                self.status.as_str().to_string(),
            ));
        }
        if self.callback_delay_seconds < 0 {
            return Err(ContractViolation::NegativeCallbackDelay(
                self.callback_delay_seconds,
            ));
        }
        Ok(())
    }

    /// Decode a loosely shaped JSON result (dynamic handlers) and validate it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ContractViolation> {
        if !value.is_object() {
            return Err(ContractViolation::Malformed(format!(
                "expected an object, got {value}"
            )));
        }
        let result: TaskResult = serde_json::from_value(value)
            .map_err(|e| ContractViolation::Malformed(e.to_string()))?;
        result.validate()?;
        Ok(result)
    }
}

/// Terminal status report sent to the orchestrator via `update_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub task_type: TaskType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_instance_id: Option<String>,

    pub worker_id: WorkerId,
    pub status: TaskStatus,

    #[serde(default)]
    pub output: Payload,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,

    #[serde(default)]
    pub callback_after_seconds: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_incompletion: Option<String>,
}

impl TaskReport {
    /// Build a report from a validated handler result.
    pub fn from_result(task: &TaskUnit, worker_id: WorkerId, result: TaskResult) -> Self {
        let reason_for_incompletion = match result.status {
            TaskStatus::Failed => result.logs.last().cloned(),
            _ => None,
        };
        Self {
            task_id: task.task_id.clone(),
            task_type: task.task_type.clone(),
            workflow_instance_id: task.workflow_instance_id.clone(),
            worker_id,
            status: result.status,
            output: result.output,
            logs: result.logs,
            callback_after_seconds: result.callback_delay_seconds,
            reason_for_incompletion,
        }
    }

    /// Build a FAILED report carrying diagnostic text.
    pub fn failed(task: &TaskUnit, worker_id: WorkerId, diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        Self {
            task_id: task.task_id.clone(),
            task_type: task.task_type.clone(),
            workflow_instance_id: task.workflow_instance_id.clone(),
            worker_id,
            status: TaskStatus::Failed,
            output: Payload::new(),
            logs: vec![diagnostics.clone()],
            callback_after_seconds: 0,
            reason_for_incompletion: Some(diagnostics),
        }
    }
}
