//! TaskExecutor - claim 済みタスク 1 件の処理
//!
//! CLAIMED → (payload 解決) → EXECUTING → SUCCESS|FAILED → REPORTED
//!
//! エンジン内でのリトライはしない。未報告のタスクは orchestrator 側が再キューする。

use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::domain::{TaskReport, TaskResult, TaskStatus, TaskUnit, WorkerId};
use crate::error::HandlerError;
use crate::handler::HandlerBlueprint;
use crate::ports::Orchestrator;
use crate::typed::PayloadCodec;

pub struct TaskExecutor {
    worker_id: WorkerId,
    orchestrator: Arc<dyn Orchestrator>,
}

impl TaskExecutor {
    pub fn new(worker_id: WorkerId, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            worker_id,
            orchestrator,
        }
    }

    /// Resolve, execute and report one claimed task. Returns the status
    /// that was reported (or attempted to be reported).
    pub async fn process(
        &self,
        mut task: TaskUnit,
        blueprint: &Arc<dyn HandlerBlueprint>,
    ) -> TaskStatus {
        let report = match self.resolve_payload(&mut task).await {
            Ok(()) => match run_isolated(blueprint, &task).await {
                Ok(result) => TaskReport::from_result(&task, self.worker_id, result),
                Err(diagnostics) => TaskReport::failed(&task, self.worker_id, diagnostics),
            },
            Err(diagnostics) => TaskReport::failed(&task, self.worker_id, diagnostics),
        };

        if let Some(reason) = &report.reason_for_incompletion {
            warn!(
                worker = %self.worker_id,
                task_id = %task.task_id,
                task_type = %task.task_type,
                reason = %reason,
                "task failed"
            );
        }

        self.report(report).await
    }

    async fn resolve_payload(&self, task: &mut TaskUnit) -> Result<(), String> {
        let Some(path) = task.external_input_path.clone() else {
            return Ok(());
        };

        let bytes = self
            .orchestrator
            .resolve_external_payload(&path)
            .await
            .map_err(|e| format!("failed to fetch external payload {path}: {e}"))?;
        let input = PayloadCodec::decode_external(&bytes)
            .map_err(|e| format!("failed to decode external payload {path}: {e}"))?;

        task.resolve_input(input);
        Ok(())
    }

    /// Report delivery failures are logged and swallowed: the task may have
    /// already expired server-side and nothing more can be done here.
    async fn report(&self, report: TaskReport) -> TaskStatus {
        let status = report.status;
        match self.orchestrator.update_task(&report).await {
            Ok(()) => {
                info!(
                    worker = %self.worker_id,
                    task_id = %report.task_id,
                    task_type = %report.task_type,
                    status = ?status,
                    "task reported"
                );
            }
            Err(e) => {
                error!(
                    worker = %self.worker_id,
                    task_id = %report.task_id,
                    error = %e,
                    "failed to report task result"
                );
            }
        }
        status
    }
}

/// Run a fresh handler instance on its own task so that a panic is caught
/// and turned into diagnostic text instead of taking down the worker.
async fn run_isolated(
    blueprint: &Arc<dyn HandlerBlueprint>,
    task: &TaskUnit,
) -> Result<TaskResult, String> {
    let mut handler = blueprint.instantiate();
    let input = task.clone();
    let joined = tokio::spawn(async move { handler.execute(&input).await }).await;

    match joined {
        Ok(Ok(result)) => match result.validate() {
            Ok(()) => Ok(result),
            Err(violation) => Err(format!("handler contract violation: {violation}")),
        },
        Ok(Err(HandlerError::Contract(violation))) => {
            Err(format!("handler contract violation: {violation}"))
        }
        Ok(Err(HandlerError::Failed(message))) if message.trim().is_empty() => {
            Err("handler failed without a message".to_string())
        }
        Ok(Err(HandlerError::Failed(message))) => Err(message),
        Err(join_error) => Err(describe_join_error(join_error)),
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if join_error.is_cancelled() {
        return "handler execution was cancelled".to_string();
    }
    let payload = join_error.into_panic();
    format!("handler panicked: {}", panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Payload, TaskId, TaskType};
    use crate::impls::InMemoryOrchestrator;
    use async_trait::async_trait;
    use serde_json::json;
    use ulid::Ulid;

    #[derive(Clone)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
        NonTerminal,
        EchoInput,
    }

    #[derive(Clone)]
    struct ScriptedHandler(Behavior);

    #[async_trait]
    impl crate::handler::TaskHandler for ScriptedHandler {
        async fn execute(&mut self, task: &TaskUnit) -> Result<TaskResult, HandlerError> {
            match self.0 {
                Behavior::Succeed => Ok(TaskResult::success().with_log("ok")),
                Behavior::Fail => Err(HandlerError::new("database is down")),
                Behavior::Panic => panic!("index out of bounds"),
                Behavior::NonTerminal => Ok(TaskResult {
                    status: TaskStatus::InProgress,
                    ..TaskResult::success()
                }),
                Behavior::EchoInput => Ok(TaskResult {
                    output: task.input.clone(),
                    ..TaskResult::success()
                }),
            }
        }
    }

    fn setup() -> (Arc<InMemoryOrchestrator>, TaskExecutor) {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let executor = TaskExecutor::new(WorkerId::from_ulid(Ulid::new()), orchestrator.clone());
        (orchestrator, executor)
    }

    fn blueprint(behavior: Behavior) -> Arc<dyn HandlerBlueprint> {
        Arc::new(ScriptedHandler(behavior))
    }

    fn task(id: &str) -> TaskUnit {
        TaskUnit::new(TaskId::new(id), TaskType::new("work"), Payload::new())
    }

    #[tokio::test]
    async fn success_is_reported() {
        let (orchestrator, executor) = setup();
        let status = executor.process(task("t1"), &blueprint(Behavior::Succeed)).await;

        assert_eq!(status, TaskStatus::Success);
        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        assert_eq!(report.status, TaskStatus::Success);
        assert_eq!(report.logs, vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn handler_error_is_reported_as_failed() {
        let (orchestrator, executor) = setup();
        executor.process(task("t1"), &blueprint(Behavior::Fail)).await;

        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        assert_eq!(report.status, TaskStatus::Failed);
        assert_eq!(report.reason_for_incompletion.as_deref(), Some("database is down"));
    }

    #[tokio::test]
    async fn panic_is_reported_with_diagnostics() {
        let (orchestrator, executor) = setup();
        let status = executor.process(task("t1"), &blueprint(Behavior::Panic)).await;

        assert_eq!(status, TaskStatus::Failed);
        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        let reason = report.reason_for_incompletion.unwrap();
        assert!(reason.contains("panicked"));
        assert!(reason.contains("index out of bounds"));
    }

    #[tokio::test]
    async fn contract_violation_is_reported_as_failed() {
        let (orchestrator, executor) = setup();
        executor.process(task("t1"), &blueprint(Behavior::NonTerminal)).await;

        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        assert_eq!(report.status, TaskStatus::Failed);
        assert!(report.reason_for_incompletion.unwrap().contains("contract violation"));
    }

    #[tokio::test]
    async fn external_payload_is_resolved_before_execution() {
        let (orchestrator, executor) = setup();
        orchestrator.store_external_payload("blob://t1", br#"{"size": 4096}"#.to_vec());
        let t = task("t1").with_external_input("blob://t1");

        executor.process(t, &blueprint(Behavior::EchoInput)).await;

        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        assert_eq!(report.status, TaskStatus::Success);
        assert_eq!(report.output["size"], json!(4096));
    }

    #[tokio::test]
    async fn missing_external_payload_skips_execution() {
        let (orchestrator, executor) = setup();
        let t = task("t1").with_external_input("blob://missing");

        // Panic ハンドラでも panic しない = 実行されていない
        executor.process(t, &blueprint(Behavior::Panic)).await;

        let report = orchestrator.report_for(&TaskId::new("t1")).unwrap();
        assert_eq!(report.status, TaskStatus::Failed);
        let reason = report.reason_for_incompletion.unwrap();
        assert!(reason.contains("blob://missing"));
        assert!(!reason.contains("panicked"));
    }

    #[tokio::test]
    async fn report_failure_is_swallowed() {
        let (orchestrator, executor) = setup();
        orchestrator.fail_next_updates(1);

        let status = executor.process(task("t1"), &blueprint(Behavior::Succeed)).await;

        assert_eq!(status, TaskStatus::Success);
        assert!(orchestrator.report_for(&TaskId::new("t1")).is_none());
    }
}
