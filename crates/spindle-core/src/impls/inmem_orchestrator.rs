//! InMemoryOrchestrator - 開発用・テスト用の orchestrator
//!
//! # 実装詳細
//! - task_type ごとの FIFO キュー（HashMap<TaskType, VecDeque<TaskUnit>>）
//! - 外部ストレージの payload を path → bytes で保持
//! - 受け取った report と definition を記録
//! - 障害注入: 次の N 回の呼び出しを失敗させる
//!
//! 全操作はロック内で完結するので std の Mutex を使う（`.await` を跨がない）。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{TaskDefinition, TaskId, TaskReport, TaskType, TaskUnit, WorkerId};
use crate::error::TransportError;
use crate::ports::{ClaimOutcome, Orchestrator};

#[derive(Default)]
struct Faults {
    pending_counts: u32,
    claims: u32,
    updates: u32,
    registrations: u32,
}

impl Faults {
    /// Consume one injected failure from `counter`, if any.
    fn take(counter: &mut u32) -> bool {
        if *counter == 0 {
            return false;
        }
        *counter -= 1;
        true
    }
}

#[derive(Default)]
struct OrchestratorState {
    queues: HashMap<TaskType, VecDeque<TaskUnit>>,
    in_flight: HashMap<TaskId, WorkerId>,
    external_payloads: HashMap<String, Vec<u8>>,
    reports: Vec<TaskReport>,
    definitions: Vec<TaskDefinition>,
    faults: Faults,
}

/// In-process orchestrator with per-type FIFO queues.
#[derive(Default)]
pub struct InMemoryOrchestrator {
    state: Mutex<OrchestratorState>,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a task available for claiming.
    pub fn enqueue(&self, task: TaskUnit) {
        let mut state = self.lock();
        state
            .queues
            .entry(task.task_type.clone())
            .or_default()
            .push_back(task);
    }

    /// Store a payload that tasks can reference via `external_input_path`.
    pub fn store_external_payload(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.lock().external_payloads.insert(path.into(), bytes);
    }

    pub fn fail_next_pending_counts(&self, n: u32) {
        self.lock().faults.pending_counts = n;
    }

    pub fn fail_next_claims(&self, n: u32) {
        self.lock().faults.claims = n;
    }

    pub fn fail_next_updates(&self, n: u32) {
        self.lock().faults.updates = n;
    }

    pub fn fail_next_registrations(&self, n: u32) {
        self.lock().faults.registrations = n;
    }

    pub fn pending(&self, task_type: &TaskType) -> usize {
        self.lock().queues.get(task_type).map_or(0, VecDeque::len)
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// No queued and no unreported tasks left.
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.in_flight.is_empty() && state.queues.values().all(VecDeque::is_empty)
    }

    pub fn reports(&self) -> Vec<TaskReport> {
        self.lock().reports.clone()
    }

    /// Latest report for a task.
    pub fn report_for(&self, task_id: &TaskId) -> Option<TaskReport> {
        self.lock()
            .reports
            .iter()
            .rev()
            .find(|r| &r.task_id == task_id)
            .cloned()
    }

    pub fn definitions(&self) -> Vec<TaskDefinition> {
        self.lock().definitions.clone()
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn get_pending_counts(
        &self,
        task_types: &[TaskType],
    ) -> Result<HashMap<TaskType, i64>, TransportError> {
        let mut state = self.lock();
        if Faults::take(&mut state.faults.pending_counts) {
            return Err(TransportError::Unavailable(
                "injected queue-size failure".to_string(),
            ));
        }
        Ok(task_types
            .iter()
            .filter_map(|t| {
                let len = state.queues.get(t).map_or(0, VecDeque::len);
                (len > 0).then(|| (t.clone(), len as i64))
            })
            .collect())
    }

    async fn claim(&self, task_type: &TaskType, worker_id: &WorkerId) -> ClaimOutcome {
        let mut state = self.lock();
        if Faults::take(&mut state.faults.claims) {
            return ClaimOutcome::TransportError(TransportError::Unavailable(
                "injected claim failure".to_string(),
            ));
        }
        let Some(mut task) = state.queues.get_mut(task_type).and_then(VecDeque::pop_front)
        else {
            return ClaimOutcome::NotFound;
        };
        task.poll_count += 1;
        task.claimed_at = Utc::now();
        state.in_flight.insert(task.task_id.clone(), *worker_id);
        ClaimOutcome::Claimed(task)
    }

    async fn resolve_external_payload(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.lock()
            .external_payloads
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::PayloadNotFound(path.to_string()))
    }

    async fn update_task(&self, report: &TaskReport) -> Result<(), TransportError> {
        let mut state = self.lock();
        if Faults::take(&mut state.faults.updates) {
            return Err(TransportError::Unavailable(
                "injected update failure".to_string(),
            ));
        }
        state.in_flight.remove(&report.task_id);
        state.reports.push(report.clone());
        Ok(())
    }

    async fn register_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        if Faults::take(&mut state.faults.registrations) {
            return Err(TransportError::Rejected(format!(
                "definition {} already exists",
                definition.name
            )));
        }
        state
            .definitions
            .retain(|d| d.name != definition.name);
        state.definitions.push(definition.clone());
        Ok(())
    }
}
