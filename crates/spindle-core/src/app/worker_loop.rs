//! WorkerLoop - consumer 側のループ
//!
//! # フロー
//! 1. DispatchTable::next(last_type) で次に試す task_type を得る
//! 2. なければ poll_interval だけ待つ
//! 3. Orchestrator::claim() で 1 件 claim
//!    - NotFound: invalidate して即座に次へ（待たない）
//!    - TransportError: 少し待って次へ
//!    - Claimed: TaskExecutor で実行・報告

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::executor::TaskExecutor;
use crate::dispatch::DispatchTable;
use crate::domain::{TaskStatus, TaskType, WorkerId};
use crate::ports::{ClaimOutcome, Orchestrator};

/// What one dispatch cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing dispatchable right now.
    Idle,
    /// The claim came back empty; the type was invalidated.
    LostClaim(TaskType),
    /// The claim call itself failed.
    ClaimFailed(TaskType),
    /// A task was executed and its status reported.
    Completed(TaskType, TaskStatus),
}

impl StepOutcome {
    /// The `previous_type` to hand to the next `DispatchTable::next` call.
    ///
    /// A lost claim already released its running slot in `invalidate`.
    fn finished_type(self) -> Option<TaskType> {
        match self {
            StepOutcome::Idle | StepOutcome::LostClaim(_) => None,
            StepOutcome::ClaimFailed(t) | StepOutcome::Completed(t, _) => Some(t),
        }
    }

    fn should_back_off(&self) -> bool {
        matches!(self, StepOutcome::Idle | StepOutcome::ClaimFailed(_))
    }
}

pub struct WorkerLoop {
    worker_id: WorkerId,
    orchestrator: Arc<dyn Orchestrator>,
    table: Arc<DispatchTable>,
    executor: TaskExecutor,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn new(
        worker_id: WorkerId,
        orchestrator: Arc<dyn Orchestrator>,
        table: Arc<DispatchTable>,
        poll_interval: Duration,
    ) -> Self {
        let executor = TaskExecutor::new(worker_id, Arc::clone(&orchestrator));
        Self {
            worker_id,
            orchestrator,
            table,
            executor,
            poll_interval,
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Run until shutdown is requested. An in-flight task always finishes
    /// its cycle (execute + report) before the loop checks again.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(worker = %self.worker_id, "worker started");
        let mut last_type: Option<TaskType> = None;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let outcome = self.step(last_type.take()).await;
            let back_off = outcome.should_back_off();
            last_type = outcome.finished_type();

            if back_off {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        info!(worker = %self.worker_id, "worker stopped");
    }

    /// One dispatch cycle.
    pub async fn step(&self, last_type: Option<TaskType>) -> StepOutcome {
        let Some(assignment) = self.table.next(last_type.as_ref()) else {
            return StepOutcome::Idle;
        };
        let task_type = assignment.task_type().clone();

        match self.orchestrator.claim(&task_type, &self.worker_id).await {
            ClaimOutcome::NotFound => {
                let removed = self.table.invalidate(&assignment);
                debug!(
                    worker = %self.worker_id,
                    task_type = %task_type,
                    generation = %assignment.generation(),
                    removed,
                    "claim came back empty"
                );
                StepOutcome::LostClaim(task_type)
            }
            ClaimOutcome::TransportError(e) => {
                warn!(
                    worker = %self.worker_id,
                    task_type = %task_type,
                    error = %e,
                    "claim failed"
                );
                StepOutcome::ClaimFailed(task_type)
            }
            ClaimOutcome::Claimed(task) => {
                info!(
                    worker = %self.worker_id,
                    task_id = %task.task_id,
                    task_type = %task_type,
                    "task claimed"
                );
                let status = self.executor.process(task, assignment.blueprint()).await;
                StepOutcome::Completed(task_type, status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Payload, TaskId, TaskResult, TaskUnit};
    use crate::error::HandlerError;
    use crate::handler::TaskHandler;
    use crate::impls::InMemoryOrchestrator;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use ulid::Ulid;

    #[derive(Clone)]
    struct Handler {
        panic_on: Option<&'static str>,
    }

    #[async_trait]
    impl TaskHandler for Handler {
        async fn execute(&mut self, task: &TaskUnit) -> Result<TaskResult, HandlerError> {
            if self.panic_on == Some(task.task_id.as_str()) {
                panic!("handler blew up on {}", task.task_id);
            }
            Ok(TaskResult::success())
        }
    }

    struct Fixture {
        orchestrator: Arc<InMemoryOrchestrator>,
        table: Arc<DispatchTable>,
        worker: WorkerLoop,
    }

    fn fixture(types: &[&str], panic_on: Option<&'static str>) -> Fixture {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let table = Arc::new(DispatchTable::new());
        for t in types {
            table.register(TaskType::new(*t), Arc::new(Handler { panic_on }));
        }
        let worker = WorkerLoop::new(
            WorkerId::from_ulid(Ulid::new()),
            orchestrator.clone(),
            table.clone(),
            Duration::from_millis(5),
        );
        Fixture {
            orchestrator,
            table,
            worker,
        }
    }

    fn unit(id: &str, task_type: &str) -> TaskUnit {
        TaskUnit::new(TaskId::new(id), TaskType::new(task_type), Payload::new())
    }

    fn counts(entries: &[(&str, i64)]) -> HashMap<TaskType, i64> {
        entries
            .iter()
            .map(|(t, c)| (TaskType::new(*t), *c))
            .collect()
    }

    #[tokio::test]
    async fn idle_when_nothing_is_pending() {
        let f = fixture(&["A"], None);
        assert_eq!(f.worker.step(None).await, StepOutcome::Idle);
    }

    #[tokio::test]
    async fn lost_claim_invalidates_type_for_the_generation() {
        let f = fixture(&["A", "B"], None);
        // サーバ側の件数は 5 と言っているが、実際には B が 1 件あるだけ
        f.table.refresh(counts(&[("A", 5), ("B", 5)]));
        f.orchestrator.enqueue(unit("b1", "B"));

        assert_eq!(
            f.worker.step(None).await,
            StepOutcome::LostClaim(TaskType::new("A"))
        );
        assert_eq!(
            f.worker.step(None).await,
            StepOutcome::Completed(TaskType::new("B"), TaskStatus::Success)
        );

        // A は同じ世代ではもう選ばれない
        let next = f.table.next(Some(&TaskType::new("B"))).unwrap();
        assert_eq!(next.task_type(), &TaskType::new("B"));
    }

    #[tokio::test]
    async fn transport_error_keeps_type_and_releases_slot_next_time() {
        let f = fixture(&["A"], None);
        f.table.refresh(counts(&[("A", 3)]));
        f.orchestrator.fail_next_claims(1);

        let outcome = f.worker.step(None).await;
        assert_eq!(outcome, StepOutcome::ClaimFailed(TaskType::new("A")));
        assert!(outcome.should_back_off());

        // invalidate されていないので予算は 2 残っている
        assert_eq!(f.table.stats().pending.get(&TaskType::new("A")), Some(&2));

        f.orchestrator.enqueue(unit("a1", "A"));
        let last = outcome.finished_type();
        f.worker.step(last).await;
        assert_eq!(f.table.stats().running.get(&TaskType::new("A")), Some(&1));
    }

    #[tokio::test]
    async fn worker_continues_after_handler_panic() {
        let f = fixture(&["A"], Some("a1"));
        f.orchestrator.enqueue(unit("a1", "A"));
        f.orchestrator.enqueue(unit("a2", "A"));
        f.table.refresh(counts(&[("A", 2)]));

        let first = f.worker.step(None).await;
        assert_eq!(
            first,
            StepOutcome::Completed(TaskType::new("A"), TaskStatus::Failed)
        );
        let second = f.worker.step(first.finished_type()).await;
        assert_eq!(
            second,
            StepOutcome::Completed(TaskType::new("A"), TaskStatus::Success)
        );

        let failed = f.orchestrator.report_for(&TaskId::new("a1")).unwrap();
        assert!(!failed.reason_for_incompletion.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture(&["A"], None);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(f.worker.run(rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn lost_claim_does_not_carry_previous_type() {
        assert_eq!(StepOutcome::LostClaim(TaskType::new("A")).finished_type(), None);
        assert!(!StepOutcome::LostClaim(TaskType::new("A")).should_back_off());
        assert_eq!(
            StepOutcome::Completed(TaskType::new("A"), TaskStatus::Success).finished_type(),
            Some(TaskType::new("A"))
        );
    }
}
