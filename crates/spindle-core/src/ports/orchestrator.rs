//! Orchestrator port - リモートのタスクキューへのインターフェース
//!
//! HTTP/gRPC などのトランスポートはこの trait の実装側に閉じ込める。
//! エンジンはここに定義された 5 つの操作しか知らない。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{TaskDefinition, TaskReport, TaskType, TaskUnit, WorkerId};
use crate::error::TransportError;

/// Result of a physical claim attempt.
///
/// `NotFound` is a normal outcome (another client won the race, or the
/// pending count was stale) and drives invalidation. Only `TransportError`
/// counts as a failure.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(TaskUnit),
    NotFound,
    TransportError(TransportError),
}

/// Orchestrator は pending 数の照会・claim・結果報告・定義登録を提供
///
/// # Thread Safety
/// - poller と全ワーカーから同時に呼ばれるので `Send + Sync`
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Pending task counts for the given types. Types without pending work
    /// may be absent from the map.
    async fn get_pending_counts(
        &self,
        task_types: &[TaskType],
    ) -> Result<HashMap<TaskType, i64>, TransportError>;

    /// Try to claim one task unit of `task_type` for `worker_id`.
    async fn claim(&self, task_type: &TaskType, worker_id: &WorkerId) -> ClaimOutcome;

    /// Fetch an input payload that was too large to send inline.
    async fn resolve_external_payload(&self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// Report the terminal status of a claimed task.
    async fn update_task(&self, report: &TaskReport) -> Result<(), TransportError>;

    /// Advertise a task type. Failure is not fatal for the caller.
    async fn register_definition(&self, definition: &TaskDefinition)
    -> Result<(), TransportError>;
}
